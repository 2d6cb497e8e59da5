//! [`SignalSender`]/[`SignalReceiver`] over an outbound `tokio-tungstenite`
//! connection, used for relay dials, the recorder link, and the route-client
//! link.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use station_core::{LinkError, SignalReceiver, SignalSender};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct DialSender {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SignalSender for DialSender {
    async fn send_json(&mut self, value: &serde_json::Value) -> Result<(), LinkError> {
        let text = serde_json::to_string(value)?;
        self.sink.send(Message::Text(text)).await.map_err(|e| LinkError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

pub struct DialReceiver {
    stream: SplitStream<WsStream>,
    peer_addr: Option<String>,
}

#[async_trait]
impl SignalReceiver for DialReceiver {
    async fn recv_json(&mut self) -> Result<Option<serde_json::Value>, LinkError> {
        loop {
            let Some(frame) = self.stream.next().await else {
                return Ok(None);
            };
            match frame.map_err(|e| LinkError::Io(e.to_string()))? {
                Message::Close(_) => return Ok(None),
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                _ => continue,
            }
        }
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

/// Dials `ws://host:port/path`, returning the split halves. `host` is kept
/// as the known peer address so the info-switch handshake never needs to
/// introspect the raw socket on the dialing side — we already know who we
/// called.
pub async fn dial(host_port: &str, path: &str) -> Result<(Box<dyn SignalSender>, Box<dyn SignalReceiver>), LinkError> {
    let url = format!("ws://{host_port}{path}");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.map_err(|e| LinkError::Io(e.to_string()))?;
    let (sink, stream) = ws_stream.split();
    Ok((
        Box::new(DialSender { sink }),
        Box::new(DialReceiver { stream, peer_addr: Some(host_port.to_string()) }),
    ))
}
