//! Warp routes for the route server surface (§4.5, §6): `/route/register`,
//! `/route/route`, `/route/realtime`, `/route/stat`.

use futures_util::{SinkExt, StreamExt};
use route_core::RouteServer;
use signal_types::{RouteCmd, ServerInfo};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

pub fn routes(server: Arc<RouteServer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let with_server = warp::any().map(move || server.clone());

    let register = warp::path!("route" / "register")
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_server.clone())
        .and_then(register_handler);

    let route = warp::path!("route" / "route")
        .and(warp::ws())
        .and(with_server.clone())
        .and_then(route_handler);

    let realtime = warp::path!("route" / "realtime")
        .and(warp::ws())
        .and(with_server.clone())
        .and_then(realtime_handler);

    let stat = warp::path!("route" / "stat")
        .and(warp::get())
        .and(with_server)
        .and_then(stat_handler);

    register.or(route).or(realtime).or(stat)
}

async fn register_handler(ws: warp::ws::Ws, remote: Option<SocketAddr>, server: Arc<RouteServer>) -> Result<impl Reply, Infallible> {
    Ok(ws.on_upgrade(move |socket| async move {
        run_register(socket, remote, server).await;
    }))
}

async fn run_register(mut socket: WebSocket, remote: Option<SocketAddr>, server: Arc<RouteServer>) {
    let Some(Ok(frame)) = socket.next().await else { return };
    let Ok(text) = frame.to_str() else { return };
    let Ok(info) = serde_json::from_str::<ServerInfo>(text) else { return };

    let remote_addr = if !info.ip.is_empty() {
        info.addr()
    } else {
        let host = remote.map(|a| a.ip().to_string()).unwrap_or_default();
        format!("{host}:{}", info.port)
    };

    if socket.send(Message::text(serde_json::to_string(&remote_addr).unwrap_or_default())).await.is_err() {
        return;
    }

    let mut registration = server.register(info, remote_addr.clone()).await;
    loop {
        tokio::select! {
            inbound = socket.next() => {
                match inbound {
                    Some(Ok(frame)) if frame.is_text() => {
                        if let Ok(cmd) = serde_json::from_str::<RouteCmd>(frame.to_str().unwrap_or_default()) {
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
                        let payload = serde_json::to_string(&cmd).unwrap_or_default();
                        if socket.send(Message::text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    server.unregister(&remote_addr).await;
}

async fn route_handler(ws: warp::ws::Ws, server: Arc<RouteServer>) -> Result<impl Reply, Infallible> {
    Ok(ws.on_upgrade(move |mut socket| async move {
        let reply = match server.route().await {
            Ok(text) => text,
            Err(e) => format!("error:{e}"),
        };
        let _ = socket.send(Message::text(reply)).await;
    }))
}

async fn realtime_handler(ws: warp::ws::Ws, server: Arc<RouteServer>) -> Result<impl Reply, Infallible> {
    Ok(ws.on_upgrade(move |mut socket| async move {
        let (initial, mut structure_rx) = server.realtime_subscribe().await;
        if socket.send(Message::text(initial)).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                inbound = socket.next() => {
                    if !matches!(inbound, Some(Ok(_))) {
                        break;
                    }
                }
                update = structure_rx.recv() => {
                    match update {
                        Ok(json) => {
                            if socket.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    }))
}

async fn stat_handler(server: Arc<RouteServer>) -> Result<impl Reply, Infallible> {
    let stats = server.stats().await;
    Ok(format!(
        "stations={} trunk={} branch={} leaf={} observers={} relays={}\n",
        stats.station_count, stats.trunk_count, stats.branch_count, stats.leaf_count, stats.observer_count, stats.relay_count
    ))
}
