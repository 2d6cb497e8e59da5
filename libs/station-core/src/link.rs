use async_trait::async_trait;

/// A transport failure, transient by construction: it always means "close
/// this connection and release the participant" (§7's Transient I/O
/// taxonomy entry).
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("peer closed the connection")]
    Closed,

    #[error("io error: {0}")]
    Io(String),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

/// The write half of a participant's connection. Implemented by the
/// `station` service binary over whichever concrete WebSocket type applies
/// (inbound warp upgrade, or outbound `tokio-tungstenite` dial).
#[async_trait]
pub trait SignalSender: Send {
    async fn send_json(&mut self, value: &serde_json::Value) -> Result<(), LinkError>;
    async fn close(&mut self);
}

/// The read half of a participant's connection.
#[async_trait]
pub trait SignalReceiver: Send {
    /// Returns `Ok(None)` when the peer has closed cleanly.
    async fn recv_json(&mut self) -> Result<Option<serde_json::Value>, LinkError>;

    /// The remote socket address as observed by the transport, if known.
    /// Used by the info-switch handshake to fill in an empty `ip` field.
    fn peer_addr(&self) -> Option<String> {
        None
    }
}
