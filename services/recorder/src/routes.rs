//! Warp routes for the recorder surface (§6): `/recorder/station/join`,
//! `/recorder/fetch`.

use crate::ws_adapter;
use recorder_core::RecorderServer;
use serde::Deserialize;
use signal_types::Signal;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
struct FetchQuery {
    cid: Option<String>,
    #[allow(dead_code)]
    token: Option<String>,
    #[serde(default)]
    lastfrom: String,
}

pub fn routes(server: Arc<RecorderServer>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let with_server = warp::any().map(move || server.clone());

    let station_join = warp::path!("recorder" / "station" / "join")
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_server.clone())
        .and_then(station_join_handler);

    let fetch = warp::path!("recorder" / "fetch")
        .and(warp::get())
        .and(warp::query::<FetchQuery>())
        .and(with_server)
        .and_then(fetch_handler);

    station_join.or(fetch)
}

async fn station_join_handler(ws: warp::ws::Ws, remote: Option<SocketAddr>, server: Arc<RecorderServer>) -> Result<impl Reply, Infallible> {
    Ok(ws.on_upgrade(move |socket| async move {
        let peer_addr = remote.map(|a| a.to_string());
        let (sender, receiver) = ws_adapter::split(socket, peer_addr);
        let _ = server.station_join(sender, receiver).await;
    }))
}

async fn fetch_handler(query: FetchQuery, server: Arc<RecorderServer>) -> Result<impl Reply, Infallible> {
    let Some(cid) = query.cid else {
        let err = vec![Signal::error("", "missing cid or token")];
        return Ok(warp::reply::json(&err));
    };
    let signals = server.fetch(&cid, &query.lastfrom).await;
    Ok(warp::reply::json(&signals))
}
