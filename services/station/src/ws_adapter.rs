//! [`SignalSender`]/[`SignalReceiver`] over an inbound, warp-upgraded
//! WebSocket connection.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use station_core::{LinkError, SignalReceiver, SignalSender};
use warp::ws::{Message, WebSocket};

pub struct WarpSender {
    sink: SplitSink<WebSocket, Message>,
}

impl WarpSender {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl SignalSender for WarpSender {
    async fn send_json(&mut self, value: &serde_json::Value) -> Result<(), LinkError> {
        let text = serde_json::to_string(value)?;
        self.sink.send(Message::text(text)).await.map_err(|e| LinkError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

pub struct WarpReceiver {
    stream: SplitStream<WebSocket>,
    peer_addr: Option<String>,
}

impl WarpReceiver {
    pub fn new(stream: SplitStream<WebSocket>, peer_addr: Option<String>) -> Self {
        Self { stream, peer_addr }
    }
}

#[async_trait]
impl SignalReceiver for WarpReceiver {
    async fn recv_json(&mut self) -> Result<Option<serde_json::Value>, LinkError> {
        loop {
            let Some(frame) = self.stream.next().await else {
                return Ok(None);
            };
            let msg = frame.map_err(|e| LinkError::Io(e.to_string()))?;
            if msg.is_close() {
                return Ok(None);
            }
            if !msg.is_text() {
                continue;
            }
            let text = msg.to_str().map_err(|_| LinkError::Io("non-utf8 text frame".to_string()))?;
            let value: serde_json::Value = serde_json::from_str(text)?;
            return Ok(Some(value));
        }
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

/// Splits an upgraded connection into the boxed trait objects `station-core`
/// participants expect.
pub fn split(ws: WebSocket, peer_addr: Option<String>) -> (Box<dyn SignalSender>, Box<dyn SignalReceiver>) {
    let (sink, stream) = ws.split();
    (Box::new(WarpSender::new(sink)), Box::new(WarpReceiver::new(stream, peer_addr)))
}
