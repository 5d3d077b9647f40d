//! Configuration loading and live-reload for the daemon.
//!
//! Out of scope for the core subsystem proper (spec.md §1 explicitly treats
//! config loading as an external collaborator); this module exists because a
//! complete daemon binary needs one, built the way the teacher builds its own
//! `config` module: a TOML file, a `notify`-driven watcher publishing onto a
//! `tokio::sync::watch` channel, and the same "some fields can't change while
//! running" posture.

mod loader;
mod types;
mod watcher;

pub use loader::load_config;
pub use types::{DaemonConfig, HttpConfig, SocketConfig, TlsConfig};
pub use watcher::watch_config_file;
