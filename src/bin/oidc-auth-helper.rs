//! Shim binary that calls into the `helper` library's `inner_main`.
use clap::Parser as _;
use oidc_bridge_helper::Cli;

fn main() -> std::process::ExitCode {
    oidc_bridge_helper::inner_main(Cli::parse())
}
