//! Shared real-socket test harness: a tiny two-endpoint warp server exposing
//! just enough of the station surface (`/station/client/join`,
//! `/station/relay/join`) to exercise a live relay mesh end to end, the way
//! the full `signal-station` binary does over a production listener.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use station_core::{run_handshake, HandshakeRole, LinkError, SignalReceiver, SignalSender, Station};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use warp::ws::{Message as WarpMessage, WebSocket};
use warp::Filter;

pub struct WarpSender(SplitSink<WebSocket, WarpMessage>);
pub struct WarpReceiver(SplitStream<WebSocket>);

#[async_trait]
impl SignalSender for WarpSender {
    async fn send_json(&mut self, value: &serde_json::Value) -> Result<(), LinkError> {
        let text = serde_json::to_string(value)?;
        self.0.send(WarpMessage::text(text)).await.map_err(|e| LinkError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

#[async_trait]
impl SignalReceiver for WarpReceiver {
    async fn recv_json(&mut self) -> Result<Option<serde_json::Value>, LinkError> {
        loop {
            let Some(frame) = self.0.next().await else { return Ok(None) };
            let msg = frame.map_err(|e| LinkError::Io(e.to_string()))?;
            if msg.is_close() {
                return Ok(None);
            }
            if !msg.is_text() {
                continue;
            }
            let text = msg.to_str().map_err(|_| LinkError::Io("non-utf8 frame".to_string()))?;
            return Ok(Some(serde_json::from_str(text)?));
        }
    }

    fn peer_addr(&self) -> Option<String> {
        None
    }
}

type TungsteniteSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct DialSender(SplitSink<TungsteniteSocket, TungsteniteMessage>);
pub struct DialReceiver {
    stream: SplitStream<TungsteniteSocket>,
    peer_addr: Option<String>,
}

#[async_trait]
impl SignalSender for DialSender {
    async fn send_json(&mut self, value: &serde_json::Value) -> Result<(), LinkError> {
        let text = serde_json::to_string(value)?;
        self.0.send(TungsteniteMessage::text(text)).await.map_err(|e| LinkError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.close(None).await;
    }
}

#[async_trait]
impl SignalReceiver for DialReceiver {
    async fn recv_json(&mut self) -> Result<Option<serde_json::Value>, LinkError> {
        loop {
            let Some(frame) = self.stream.next().await else { return Ok(None) };
            let msg = frame.map_err(|e| LinkError::Io(e.to_string()))?;
            if msg.is_close() {
                return Ok(None);
            }
            if !msg.is_text() {
                continue;
            }
            return Ok(Some(serde_json::from_str(msg.to_text().map_err(|e| LinkError::Io(e.to_string()))?)?));
        }
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

pub async fn dial(addr: SocketAddr, path: &str) -> (Box<dyn SignalSender>, Box<dyn SignalReceiver>) {
    let url = format!("ws://{addr}{path}");
    let (ws, _) = tokio_tungstenite::connect_async(url).await.expect("test dial failed");
    let (sink, stream) = ws.split();
    (Box::new(DialSender(sink)), Box::new(DialReceiver { stream, peer_addr: Some(addr.to_string()) }))
}

/// Binds a station behind just `/station/client/join` and `/station/relay/join`
/// on an ephemeral `127.0.0.1` port and returns the bound address.
pub async fn spawn_station(station: Arc<Station>) -> SocketAddr {
    let with_station = warp::any().map(move || station.clone());

    let client_join = warp::path!("station" / "client" / "join")
        .and(warp::ws())
        .and(warp::query::<std::collections::HashMap<String, String>>())
        .and(with_station.clone())
        .and_then(
            |ws: warp::ws::Ws, query: std::collections::HashMap<String, String>, station: Arc<Station>| async move {
                Ok::<_, std::convert::Infallible>(ws.on_upgrade(move |socket| async move {
                    let (sink, stream) = socket.split();
                    let (sender, receiver): (Box<dyn SignalSender>, Box<dyn SignalReceiver>) =
                        (Box::new(WarpSender(sink)), Box::new(WarpReceiver(stream)));
                    let cid = query.get("cid").cloned().unwrap_or_default();
                    let token = query.get("token").cloned().unwrap_or_default();
                    let (client, queue_rx) = station.client_join(&cid, token, "test-client").await;
                    let upid = client.upid().to_string();
                    client.run(sender, receiver, queue_rx).await;
                    station.client_quit(&cid, &upid).await;
                }))
            },
        );

    let relay_join = warp::path!("station" / "relay" / "join")
        .and(warp::ws())
        .and(with_station)
        .and_then(|ws: warp::ws::Ws, station: Arc<Station>| async move {
            Ok::<_, std::convert::Infallible>(ws.on_upgrade(move |socket| async move {
                let (sink, stream) = socket.split();
                let (mut sender, mut receiver): (Box<dyn SignalSender>, Box<dyn SignalReceiver>) =
                    (Box::new(WarpSender(sink)), Box::new(WarpReceiver(stream)));
                let local_info = station.server_info().await;
                let Ok(outcome) = run_handshake(sender.as_mut(), receiver.as_mut(), &local_info, HandshakeRole::Accepter).await else {
                    sender.close().await;
                    return;
                };
                let Ok((relay, queue_rx)) = station.register_relay(&outcome.peer_info, false, false).await else {
                    sender.close().await;
                    return;
                };
                let upid = relay.upid().to_string();
                relay.run(sender, receiver, queue_rx).await;
                station.relay_quit(&upid).await;
            }))
        });

    let routes = client_join.or(relay_join);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    addr
}

/// Binds a minimal `/route/register` surface over a real socket, mirroring
/// the production route server's wire contract closely enough to drive it
/// with a bare `tokio-tungstenite` client standing in for a station.
pub async fn spawn_route_server(server: Arc<route_core::RouteServer>) -> SocketAddr {
    let with_server = warp::any().map(move || server.clone());

    let register = warp::path!("route" / "register")
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_server)
        .and_then(
            |ws: warp::ws::Ws, remote: Option<SocketAddr>, server: Arc<route_core::RouteServer>| async move {
                Ok::<_, std::convert::Infallible>(ws.on_upgrade(move |mut socket| async move {
                    let Some(Ok(frame)) = socket.next().await else { return };
                    let Ok(text) = frame.to_str() else { return };
                    let Ok(info) = serde_json::from_str::<signal_types::ServerInfo>(text) else { return };
                    let remote_addr = if !info.ip.is_empty() {
                        info.addr()
                    } else {
                        format!("{}:{}", remote.map(|a| a.ip().to_string()).unwrap_or_default(), info.port)
                    };
                    if socket.send(WarpMessage::text(serde_json::to_string(&remote_addr).unwrap())).await.is_err() {
                        return;
                    }
                    let mut registration = server.register(info, remote_addr.clone()).await;
                    loop {
                        tokio::select! {
                            inbound = socket.next() => {
                                match inbound {
                                    Some(Ok(frame)) if frame.is_text() => {
                                        if let Ok(cmd) = serde_json::from_str::<signal_types::RouteCmd>(frame.to_str().unwrap_or_default()) {
                                            let _ = server.handle_command(&remote_addr, cmd).await;
                                        }
                                    }
                                    Some(Ok(_)) => continue,
                                    _ => break,
                                }
                            }
                            order = registration.order_rx.recv() => {
                                match order {
                                    Some(cmd) => {
                                        if socket.send(WarpMessage::text(serde_json::to_string(&cmd).unwrap())).await.is_err() {
                                            break;
                                        }
                                    }
                                    None => break,
                                }
                            }
                        }
                    }
                    server.unregister(&remote_addr).await;
                }))
            },
        );

    let (addr, server_fut) = warp::serve(register).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server_fut);
    addr
}

/// Dials `remote`'s `/station/relay/join`, completes the handshake and
/// registers the resulting link with `station`, the way `relay_dial.rs`
/// does in the real service binary.
pub async fn relay_with(station: Arc<Station>, remote: SocketAddr) {
    let (mut sender, mut receiver) = dial(remote, "/station/relay/join").await;
    let local_info = station.server_info().await;
    let outcome = run_handshake(sender.as_mut(), receiver.as_mut(), &local_info, HandshakeRole::Dialer)
        .await
        .expect("test relay handshake failed");
    let (relay, queue_rx) = station.register_relay(&outcome.peer_info, true, true).await.expect("test relay registration failed");
    let upid = relay.upid().to_string();
    let cleanup_station = station.clone();
    tokio::spawn(async move {
        relay.run(sender, receiver, queue_rx).await;
        cleanup_station.relay_quit(&upid).await;
    });
}
