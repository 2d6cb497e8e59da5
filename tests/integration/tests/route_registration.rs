//! A bare WebSocket client standing in for a station registers with a real
//! route server over a socket, and a second trunk station's registration
//! produces a live `RELAYWITH` order back on the first connection — the
//! trunk-mesh planning scenario driven end to end over the wire.

use futures_util::{SinkExt, StreamExt};
use route_core::RouteServer;
use signal_mesh_integration_tests::spawn_route_server;
use signal_types::{RouteCmd, RouteCmdType, ServerInfo, ServiceMode, StationMode};
use std::collections::HashMap;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

async fn register(addr: std::net::SocketAddr, sid: &str, port: u16) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let url = format!("ws://{addr}/route/register");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.expect("dial failed");

    let info = ServerInfo::new(sid.to_string(), "127.0.0.1".to_string(), port, ServiceMode::STATION, StationMode::TRUNK);
    ws.send(Message::text(serde_json::to_string(&info).unwrap())).await.unwrap();

    let reply = ws.next().await.expect("no registration reply").unwrap();
    let _observed_addr: String = serde_json::from_str(reply.to_text().unwrap()).unwrap();

    ws
}

#[tokio::test]
async fn first_trunk_station_is_ordered_to_dial_the_second() {
    let server = RouteServer::new(HashMap::new());
    let addr = spawn_route_server(server).await;

    // With exactly one pre-existing trunk station, the planner orders the
    // existing station to initiate against the newly-joining one (the
    // alternation in plan_trunk_join starts with the existing side), so
    // it's this first connection that receives the RELAYWITH order.
    let mut station_a = register(addr, "a:25152", 25152).await;
    let _station_b = register(addr, "b:25152", 25153).await;

    let order = tokio::time::timeout(Duration::from_secs(5), station_a.next())
        .await
        .expect("timed out waiting for a relay order")
        .expect("connection closed")
        .expect("transport error");

    let cmd: RouteCmd = serde_json::from_str(order.to_text().unwrap()).unwrap();
    assert_eq!(cmd.kind, RouteCmdType::RelayWith);
}
