//! The recorder's archive: an append-only, per-channel signal history fed
//! by every station that dials in, and the `lastfrom`-prefix fetch slice
//! used to replay it.

mod cache;
mod fetch;
mod server;

pub use cache::SignalCache;
pub use fetch::slice_from;
pub use server::RecorderServer;
