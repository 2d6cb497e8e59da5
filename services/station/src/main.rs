//! Entry point for the combined station/route/recorder process. Which of
//! the three HTTP surfaces get mounted is decided by `Config.service_mode`
//! (§14): a plain deployment runs only `routes::routes`, but the same
//! binary can carry the route server and/or recorder side by side on one
//! listener when configured to.

mod dial;
mod recorder_dial;
mod recorder_routes;
mod relay_dial;
mod route_client;
mod route_routes;
mod routes;
mod ws_adapter;

use anyhow::Context;
use clap::Parser;
use recorder_core::RecorderServer;
use route_core::RouteServer;
use signal_config::ConfigArgs;
use signal_types::{ServiceMode, ServerInfo};
use station_core::{NullNotifier, Station};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ConfigArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = signal_config::load_with_cli(args.config.as_deref(), &args);
    info!(sid = %cfg.service_sid, mode = %cfg.service_mode, port = cfg.service_port, "starting");

    // Route-client report queues need to exist before the station does (the
    // notifier is one of Station::new's constructor arguments), so their
    // receiver halves are created up front and only handed to route_client::
    // spawn once `station` is available.
    let mut queues = Vec::new();
    for _ in &cfg.route_servers {
        queues.push(route_client::make_queue());
    }
    let senders = queues.iter().map(|(tx, _)| tx.clone()).collect();

    let notifier: Arc<dyn station_core::ChangeNotifier> = if cfg.route_servers.is_empty() {
        Arc::new(NullNotifier)
    } else {
        Arc::new(route_client::RouteReporter::new(senders))
    };

    let station = Station::new(
        cfg.service_sid.clone(),
        cfg.publish_ip.clone(),
        cfg.publish_port,
        cfg.service_mode,
        cfg.station_mode,
        notifier,
    );

    for ((_, rx), route_addr) in queues.into_iter().zip(cfg.route_servers.iter()) {
        route_client::spawn(station.clone(), route_addr.clone(), rx);
    }
    for recorder_addr in &cfg.recorders {
        recorder_dial::spawn(station.clone(), recorder_addr.clone());
    }

    let station_routes = routes::routes(station.clone());

    let route_server = cfg.service_mode.has(ServiceMode::ROUTE).then(|| RouteServer::new(cfg.nats.clone()));
    let recorder_server = cfg.service_mode.has(ServiceMode::RECORDER).then(|| {
        let info = ServerInfo::new(cfg.service_sid.clone(), cfg.publish_ip.clone(), cfg.publish_port, cfg.service_mode, cfg.station_mode);
        RecorderServer::new(info)
    });

    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", cfg.service_port)
        .parse()
        .context("invalid service port")?;

    let shutdown = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        info!("shutdown signal received");
    };

    match (route_server, recorder_server) {
        (Some(route_server), Some(recorder_server)) => {
            let combined = station_routes
                .or(route_routes::routes(route_server))
                .or(recorder_routes::routes(recorder_server));
            let (_, server) = warp::serve(combined).bind_with_graceful_shutdown(addr, shutdown);
            server.await;
        }
        (Some(route_server), None) => {
            let combined = station_routes.or(route_routes::routes(route_server));
            let (_, server) = warp::serve(combined).bind_with_graceful_shutdown(addr, shutdown);
            server.await;
        }
        (None, Some(recorder_server)) => {
            let combined = station_routes.or(recorder_routes::routes(recorder_server));
            let (_, server) = warp::serve(combined).bind_with_graceful_shutdown(addr, shutdown);
            server.await;
        }
        (None, None) => {
            let (_, server) = warp::serve(station_routes).bind_with_graceful_shutdown(addr, shutdown);
            server.await;
        }
    }

    Ok(())
}
