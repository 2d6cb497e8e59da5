//! Core wire types shared by every component of the signal mesh:
//! `Signal`/`SignalPack`, `ServerInfo` and its mode bitmasks, and `RouteCmd`.
//!
//! Nothing in this crate touches I/O; it only models the data that crosses
//! the wire and the small amount of pure logic (pair-key construction,
//! bitmask checks) that every other crate needs agreement on.

mod error;
mod route_cmd;
mod server_info;
mod signal;

pub use error::TypesError;
pub use route_cmd::{RouteCmd, RouteCmdType};
pub use server_info::{ServiceMode, ServerInfo, StationMode};
pub use signal::{Signal, SignalPack, SignalType};

/// Generates a fresh, unique signal id.
///
/// Signal ids are opaque strings on the wire; a UUIDv4 satisfies the
/// uniqueness requirement without committing callers to any particular
/// format.
pub fn new_signal_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Milliseconds since the Unix epoch, used for `SignalPack.time` and every
/// other wire/record timestamp in the mesh.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
