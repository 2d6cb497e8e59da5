//! The station's fan-out engine: channels, participants (client/relay/
//! recorder link), and the station registry that ties them together.
//!
//! This crate is transport-agnostic: it knows how to route `SignalPack`s
//! and maintain the registries and dedup cache described by the data
//! model, but it reads and writes through the small [`link::SignalSender`]
//! / [`link::SignalReceiver`] traits rather than owning any socket type.
//! The `station` service binary supplies the WebSocket implementations.

mod channel;
mod client;
mod error;
mod handshake;
mod link;
mod notifier;
mod queue;
mod recorder_link;
mod relay;
mod station;

pub use channel::Channel;
pub use client::Client;
pub use error::StationError;
pub use handshake::{run_handshake, HandshakeRole};
pub use link::{LinkError, SignalReceiver, SignalSender};
pub use notifier::{ChangeNotifier, NullNotifier};
pub use recorder_link::RecorderLink;
pub use relay::Relay;
pub use station::{Station, StationStats};

/// This crate's fallible operations resolve to [`StationError`] unless they
/// operate below the registry layer, where [`LinkError`] alone applies.
pub type Result<T> = std::result::Result<T, StationError>;
