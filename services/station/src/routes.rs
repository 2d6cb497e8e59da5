//! Warp routes for the station surface (§6): `/station/client/join`,
//! `/station/relay/join`, `/station/stat`.

use crate::ws_adapter;
use serde::Deserialize;
use signal_types::Signal;
use station_core::{run_handshake, HandshakeRole, Station};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
struct ClientJoinQuery {
    cid: Option<String>,
    token: Option<String>,
}

pub fn routes(station: Arc<Station>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let with_station = warp::any().map(move || station.clone());

    let client_join = warp::path!("station" / "client" / "join")
        .and(warp::ws())
        .and(warp::query::<ClientJoinQuery>())
        .and(warp::addr::remote())
        .and(with_station.clone())
        .and_then(client_join_handler);

    let relay_join = warp::path!("station" / "relay" / "join")
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_station.clone())
        .and_then(relay_join_handler);

    let stat = warp::path!("station" / "stat")
        .and(warp::get())
        .and(with_station)
        .and_then(stat_handler);

    client_join.or(relay_join).or(stat)
}

async fn client_join_handler(
    ws: warp::ws::Ws,
    query: ClientJoinQuery,
    remote: Option<SocketAddr>,
    station: Arc<Station>,
) -> Result<impl Reply, Infallible> {
    Ok(ws.on_upgrade(move |socket| async move {
        let peer_addr = remote.map(|a| a.to_string());
        let (mut sender, receiver) = ws_adapter::split(socket, peer_addr.clone());

        let (Some(cid), Some(token)) = (query.cid, query.token) else {
            let err = Signal::error("", "missing cid or token");
            if let Ok(value) = serde_json::to_value(&err) {
                let _ = sender.send_json(&value).await;
            }
            sender.close().await;
            return;
        };

        let remote_addr = peer_addr.unwrap_or_default();
        // The original system's `token` is the client-supplied participant
        // id; authentication beyond carrying this opaque string is out of
        // scope.
        let (client, queue_rx) = station.client_join(&cid, token, &remote_addr).await;
        let upid = client.upid().to_string();
        client.run(sender, receiver, queue_rx).await;
        station.client_quit(&cid, &upid).await;
    }))
}

async fn relay_join_handler(ws: warp::ws::Ws, remote: Option<SocketAddr>, station: Arc<Station>) -> Result<impl Reply, Infallible> {
    Ok(ws.on_upgrade(move |socket| async move {
        let peer_addr = remote.map(|a| a.to_string());
        let (mut sender, mut receiver) = ws_adapter::split(socket, peer_addr.clone());

        let local_info = station.server_info().await;
        let outcome = match run_handshake(sender.as_mut(), receiver.as_mut(), &local_info, HandshakeRole::Accepter).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "inbound relay handshake failed");
                sender.close().await;
                return;
            }
        };
        if let Some(ip) = outcome.learned_local_ip {
            station.learn_ip(ip).await;
        }

        match station.register_relay(&outcome.peer_info, false, false).await {
            Ok((relay, queue_rx)) => {
                let upid = relay.upid().to_string();
                debug!(upid = %upid, "relay accepted (accepter)");
                relay.run(sender, receiver, queue_rx).await;
                station.relay_quit(&upid).await;
            }
            Err(e) => {
                debug!(error = %e, "inbound relay collided with an existing relay");
                sender.close().await;
            }
        }
    }))
}

async fn stat_handler(station: Arc<Station>) -> Result<impl Reply, Infallible> {
    let stats = station.stats().await;
    Ok(format!(
        "sid={} uptime_secs={} channels={} clients={} relays_trunk={} relays_branch={} recorders={} broadcasted_cache={}\n",
        stats.sid,
        stats.uptime_secs,
        stats.channel_count,
        stats.client_count,
        stats.trunk_relay_count,
        stats.branch_relay_count,
        stats.recorder_count,
        stats.broadcasted_cache_size,
    ))
}
