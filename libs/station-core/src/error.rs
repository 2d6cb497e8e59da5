use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("participant queue closed")]
    QueueClosed,

    #[error("transport error: {0}")]
    Link(#[from] LinkError),

    #[error("relay already exists for remote address {0}")]
    RelayExists(String),

    #[error("malformed handshake: {0}")]
    Handshake(String),

    #[error("no channel for cid {0}")]
    NoSuchChannel(String),
}
