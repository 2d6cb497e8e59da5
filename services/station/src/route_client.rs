//! The station's persistent reporting link to one configured route server
//! (§4.4). One instance per configured address; independent connection,
//! queue and reconnect timer.

use crate::dial;
use crate::relay_dial;
use signal_types::{RouteCmd, RouteCmdType};
use station_core::{ChangeNotifier, Station};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const REPORT_QUEUE_CAPACITY: usize = 100;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Fans out every station change notification to one bounded queue per
/// configured route server; draining (and thus backpressure) happens
/// independently per server (§4.4's "no cross-route-server coordination").
pub struct RouteReporter {
    senders: Vec<mpsc::Sender<RouteCmd>>,
}

impl RouteReporter {
    pub fn new(senders: Vec<mpsc::Sender<RouteCmd>>) -> Self {
        Self { senders }
    }
}

#[async_trait::async_trait]
impl ChangeNotifier for RouteReporter {
    async fn notify(&self, upid: &str, kind: RouteCmdType) {
        let cmd = RouteCmd::new(kind, upid.to_string());
        for sender in &self.senders {
            let _ = sender.send(cmd.clone()).await;
        }
    }
}

/// Creates one report queue for a configured route server. The sender half
/// is folded into a [`RouteReporter`] built before the owning [`Station`]
/// exists; the receiver half is handed to [`spawn`] once the station is
/// constructed.
pub fn make_queue() -> (mpsc::Sender<RouteCmd>, mpsc::Receiver<RouteCmd>) {
    mpsc::channel(REPORT_QUEUE_CAPACITY)
}

/// Spawns the long-lived link to `route_addr`, draining `rx` for outgoing
/// reports.
pub fn spawn(station: Arc<Station>, route_addr: String, rx: mpsc::Receiver<RouteCmd>) {
    tokio::spawn(run_forever(station, route_addr, rx));
}

async fn run_forever(station: Arc<Station>, route_addr: String, mut rx: mpsc::Receiver<RouteCmd>) {
    loop {
        match run_once(&station, &route_addr, &mut rx).await {
            Ok(()) => debug!(route_addr = %route_addr, "route-client disconnected"),
            Err(e) => warn!(route_addr = %route_addr, error = %e, "route-client connection failed"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn run_once(
    station: &Arc<Station>,
    route_addr: &str,
    rx: &mut mpsc::Receiver<RouteCmd>,
) -> Result<(), station_core::LinkError> {
    let (mut sender, mut receiver) = dial::dial(route_addr, "/route/register").await?;

    let local_info = station.server_info().await;
    sender.send_json(&serde_json::to_value(&local_info)?).await?;

    let value = receiver.recv_json().await?.ok_or(station_core::LinkError::Closed)?;
    let observed_addr: String = serde_json::from_value(value)?;
    if local_info.ip.is_empty() {
        if let Some((host, _)) = observed_addr.rsplit_once(':') {
            station.learn_ip(host.to_string()).await;
        }
    }
    info!(route_addr = %route_addr, observed_addr = %observed_addr, "route-client registered");

    report(&mut sender, RouteCmdType::Relays, station.all_relay_upids().await).await?;
    report(&mut sender, RouteCmdType::Recorders, station.all_recorder_upids().await).await?;
    report(&mut sender, RouteCmdType::Clients, station.all_client_upids().await).await?;

    loop {
        tokio::select! {
            inbound = receiver.recv_json() => {
                match inbound? {
                    None => return Ok(()),
                    Some(value) => {
                        if let Ok(cmd) = serde_json::from_value::<RouteCmd>(value) {
                            handle_command(station, cmd);
                        }
                    }
                }
            }
            cmd = rx.recv() => {
                match cmd {
                    Some(cmd) => sender.send_json(&serde_json::to_value(&cmd)?).await?,
                    None => return Ok(()),
                }
            }
        }
    }
}

async fn report(sender: &mut Box<dyn station_core::SignalSender>, kind: RouteCmdType, upids: Vec<String>) -> Result<(), station_core::LinkError> {
    let cmd = RouteCmd::new(kind, upids.join(";"));
    sender.send_json(&serde_json::to_value(&cmd)?).await
}

/// The only inbound command the route-client handles: `RELAYWITH(addr)`
/// (§4.4). Dispatched asynchronously so a slow dial never stalls this
/// link's read loop.
fn handle_command(station: &Arc<Station>, cmd: RouteCmd) {
    if cmd.kind == RouteCmdType::RelayWith {
        let station = station.clone();
        let addr = cmd.text;
        tokio::spawn(async move {
            relay_dial::relay_with_station(station, addr).await;
        });
    }
}
