//! Entry point for a standalone route server process, exposing only the
//! `/route/*` surface (§6, §14).

mod routes;

use clap::Parser;
use route_core::RouteServer;
use signal_config::ConfigArgs;
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
    info!(sid = %cfg.service_sid, port = cfg.service_port, "starting route server");

    let server = RouteServer::new(cfg.nats.clone());
    let filter = routes::routes(server);

    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", cfg.service_port).parse()?;

    let shutdown = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        info!("shutdown signal received");
    };

    let (_, server) = warp::serve(filter).bind_with_graceful_shutdown(addr, shutdown);
    server.await;

    Ok(())
}
