//! Wire types shared between the daemon and the helper binary.
//!
//! The helper is invoked once per VPN connection attempt and talks to the
//! daemon over a local filesystem socket: one JSON request, one JSON
//! response, then the connection closes. This crate defines that envelope so
//! both sides deserialize/serialize the same shapes.

mod request;
mod response;

pub use request::{AuthRequest, PendingAuthMethod, RequestKind};
pub use response::{AuthResponse, ResponseKind, ResponseStatus};

/// Maximum size in bytes accepted for a single length-framed message body.
///
/// Generous enough for any request/response this protocol produces while
/// bounding how much a misbehaving peer can make either side buffer.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;
