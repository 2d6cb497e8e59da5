use crate::error::RouteError;
use crate::model::{RecorderRecord, RelayRecord, StationView};
use crate::planner::{self, RelayOrder};
use signal_types::{RouteCmd, RouteCmdType, ServerInfo};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

const AUDIT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
const STRUCTURE_CHANNEL_CAPACITY: usize = 64;

/// Handed back to the caller of [`RouteServer::register`]; the transport
/// layer owns `order_rx` and forwards each item as a `RELAYWITH` command to
/// the station over its connection.
pub struct Registration {
    pub remote_addr: String,
    pub publish_addr: String,
    pub order_rx: mpsc::UnboundedReceiver<RouteCmd>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteStats {
    pub station_count: usize,
    pub trunk_count: usize,
    pub branch_count: usize,
    pub leaf_count: usize,
    pub observer_count: usize,
    pub relay_count: usize,
}

/// The live cluster model and planner (§4.5). Holds one [`StationView`] per
/// connected station, keyed by that station's remote address, and a set of
/// realtime observer subscriptions fed from a single broadcast channel.
pub struct RouteServer {
    nats: HashMap<String, String>,
    stations: RwLock<HashMap<String, StationView>>,
    orders: RwLock<HashMap<String, mpsc::UnboundedSender<RouteCmd>>>,
    structure_tx: broadcast::Sender<String>,
    self_weak: Weak<RouteServer>,
}

impl RouteServer {
    pub fn new(nats: HashMap<String, String>) -> Arc<Self> {
        let (structure_tx, _) = broadcast::channel(STRUCTURE_CHANNEL_CAPACITY);

        let server = Arc::new_cyclic(|weak| Self {
            nats,
            stations: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
            structure_tx,
            self_weak: weak.clone(),
        });

        let audit_target = Arc::downgrade(&server);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(AUDIT_INTERVAL);
            loop {
                interval.tick().await;
                let Some(server) = audit_target.upgrade() else { return };
                server.run_trunk_audit().await;
            }
        });

        server
    }

    /// Looks up `addr` (a full `ip:port`) in the NAT table, falling back to
    /// the address unchanged — `Nats[ipAddr]` is keyed by the complete
    /// station address, not the bare IP.
    fn publish_addr(&self, addr: &str) -> String {
        self.nats.get(addr).cloned().unwrap_or_else(|| addr.to_string())
    }

    // ---- registration (§4.5 Register) ----------------------------------

    /// `remote_addr` is the station's resolved `ip:port`: `remote_info.addr()`
    /// when it reported a non-empty IP, otherwise the observed socket
    /// address with `remote_info.port` substituted in (the caller performs
    /// this resolution, since only it sees the raw socket address).
    pub async fn register(self: &Arc<Self>, remote_info: ServerInfo, remote_addr: String) -> Registration {
        let publish_addr = self.publish_addr(&remote_addr);
        let time = signal_types::now_millis();
        let view = StationView::new(remote_addr.clone(), remote_info, publish_addr.clone(), time);

        let (order_tx, order_rx) = mpsc::unbounded_channel();
        self.orders.write().await.insert(remote_addr.clone(), order_tx);
        self.stations.write().await.insert(remote_addr.clone(), view);

        self.emit_structure_change().await;
        info!(remote_addr = %remote_addr, publish_addr = %publish_addr, "station registered");

        let orders = {
            let stations = self.stations.read().await;
            planner::plan_relay(&stations, &remote_addr)
        };
        self.dispatch_orders(orders).await;

        Registration { remote_addr, publish_addr, order_rx }
    }

    pub async fn unregister(&self, remote_addr: &str) {
        self.stations.write().await.remove(remote_addr);
        self.orders.write().await.remove(remote_addr);
        self.emit_structure_change().await;
        info!(remote_addr, "station unregistered");
    }

    async fn dispatch_orders(&self, orders: Vec<RelayOrder>) {
        let senders = self.orders.read().await;
        for order in orders {
            let Some(tx) = senders.get(&order.initiator) else {
                warn!(initiator = %order.initiator, target = %order.target, "relay order dropped, initiator not connected");
                continue;
            };
            let cmd = RouteCmd::new(RouteCmdType::RelayWith, order.target.clone());
            let _ = tx.send(cmd);
        }
    }

    async fn run_trunk_audit(&self) {
        let orders = {
            let stations = self.stations.read().await;
            planner::audit_trunk_mesh(&stations)
        };
        if !orders.is_empty() {
            debug!(count = orders.len(), "trunk audit issuing relay orders");
        }
        self.dispatch_orders(orders).await;
    }

    // ---- inbound command table (§4.5.3) --------------------------------

    pub async fn handle_command(&self, remote_addr: &str, cmd: RouteCmd) -> Result<(), RouteError> {
        match cmd.kind {
            RouteCmdType::RelayJoin => self.relay_join(remote_addr, &cmd.text).await?,
            RouteCmdType::RelayQuit => self.relay_quit(&cmd.text).await?,
            RouteCmdType::RelayExists => self.relay_exists(remote_addr, &cmd.text).await?,
            RouteCmdType::ClientJoin => self.client_join(remote_addr, &cmd.text).await?,
            RouteCmdType::ClientQuit => self.client_quit(remote_addr, &cmd.text).await?,
            RouteCmdType::RecorderJoin => self.recorder_join(remote_addr, &cmd.text).await?,
            RouteCmdType::RecorderQuit => self.recorder_quit(remote_addr, &cmd.text).await?,
            RouteCmdType::Relays => {
                for item in cmd.split_items() {
                    self.relay_join(remote_addr, item).await?;
                }
            }
            RouteCmdType::Clients => {
                for item in cmd.split_items() {
                    self.client_join(remote_addr, item).await?;
                }
            }
            RouteCmdType::Recorders => {
                for item in cmd.split_items() {
                    self.recorder_join(remote_addr, item).await?;
                }
            }
        }
        self.emit_structure_change().await;
        Ok(())
    }

    async fn relay_join(&self, remote_addr: &str, pair_text: &str) -> Result<(), RouteError> {
        let (from, to) = RouteCmd::split_pair(pair_text)?;
        let mut stations = self.stations.write().await;
        let (from_sid, from_trunk) = station_sid_and_trunk(&stations, from)?;
        let (to_sid, to_trunk) = station_sid_and_trunk(&stations, to)?;
        let is_trunk = from_trunk && to_trunk;

        let reporter = stations.get_mut(remote_addr).ok_or_else(|| RouteError::UnknownStation(remote_addr.to_string()))?;
        let key = RouteCmd::pair_key(from, to);
        let record = RelayRecord { from_sid, to_sid, is_trunk, time: signal_types::now_millis() };
        if is_trunk {
            reporter.trunk_relays.insert(key, record);
        } else {
            reporter.relays.insert(key, record);
        }
        Ok(())
    }

    async fn relay_quit(&self, pair_text: &str) -> Result<(), RouteError> {
        let (from, to) = RouteCmd::split_pair(pair_text)?;
        let key = RouteCmd::pair_key(from, to);
        let mut stations = self.stations.write().await;
        for addr in [from, to] {
            if let Some(view) = stations.get_mut(addr) {
                view.trunk_relays.remove(&key);
                view.relays.remove(&key);
            }
        }
        Ok(())
    }

    async fn relay_exists(&self, remote_addr: &str, pair_text: &str) -> Result<(), RouteError> {
        let (from, to) = RouteCmd::split_pair(pair_text)?;
        let key = RouteCmd::pair_key(from, to);
        let already_present = {
            let stations = self.stations.read().await;
            stations
                .get(remote_addr)
                .map(|view| view.trunk_relays.contains_key(&key) || view.relays.contains_key(&key))
                .unwrap_or(false)
        };
        if !already_present {
            self.relay_join(remote_addr, pair_text).await?;
        }
        Ok(())
    }

    async fn client_join(&self, remote_addr: &str, upid: &str) -> Result<(), RouteError> {
        let mut stations = self.stations.write().await;
        let view = stations.get_mut(remote_addr).ok_or_else(|| RouteError::UnknownStation(remote_addr.to_string()))?;
        view.clients.insert(upid.to_string(), signal_types::now_millis());
        Ok(())
    }

    async fn client_quit(&self, remote_addr: &str, upid: &str) -> Result<(), RouteError> {
        let mut stations = self.stations.write().await;
        let view = stations.get_mut(remote_addr).ok_or_else(|| RouteError::UnknownStation(remote_addr.to_string()))?;
        view.clients.remove(upid);
        Ok(())
    }

    async fn recorder_join(&self, remote_addr: &str, upid: &str) -> Result<(), RouteError> {
        let (_station_addr, recorder_addr) = RouteCmd::split_pair(upid)?;
        let publish_addr = self.publish_addr(recorder_addr);
        let mut stations = self.stations.write().await;
        let view = stations.get_mut(remote_addr).ok_or_else(|| RouteError::UnknownStation(remote_addr.to_string()))?;
        view.recorders.insert(
            upid.to_string(),
            RecorderRecord { upid: upid.to_string(), publish_addr, time: signal_types::now_millis() },
        );
        Ok(())
    }

    async fn recorder_quit(&self, remote_addr: &str, upid: &str) -> Result<(), RouteError> {
        let mut stations = self.stations.write().await;
        let view = stations.get_mut(remote_addr).ok_or_else(|| RouteError::UnknownStation(remote_addr.to_string()))?;
        view.recorders.remove(upid);
        Ok(())
    }

    // ---- client-facing queries (§4.5 Route/RealTime/StructureString) ---

    pub async fn route(&self) -> Result<String, RouteError> {
        let stations = self.stations.read().await;
        let picked = stations
            .values()
            .filter(|view| view.is_online)
            .min_by_key(|view| view.client_count())
            .ok_or(RouteError::NoStationAvailable)?;

        let recorder_addr = picked
            .first_recorder()
            .map(|r| r.publish_addr.clone())
            .or_else(|| stations.values().find_map(|view| view.first_recorder().map(|r| r.publish_addr.clone())))
            .unwrap_or_default();

        Ok(format!("data:{};{}", picked.publish_addr, recorder_addr))
    }

    pub async fn realtime_subscribe(&self) -> (String, broadcast::Receiver<String>) {
        let rx = self.structure_tx.subscribe();
        (self.structure_string().await, rx)
    }

    pub async fn structure_string(&self) -> String {
        let stations = self.stations.read().await;
        let views: Vec<&StationView> = stations.values().collect();
        serde_json::to_string(&views).unwrap_or_else(|_| "[]".to_string())
    }

    async fn emit_structure_change(&self) {
        let json = self.structure_string().await;
        let _ = self.structure_tx.send(json);
    }

    pub async fn stats(&self) -> RouteStats {
        let stations = self.stations.read().await;
        let mut stats = RouteStats { station_count: stations.len(), observer_count: self.structure_tx.receiver_count(), ..Default::default() };
        let mut seen_relays = std::collections::HashSet::new();
        for view in stations.values() {
            if view.is_trunk() {
                stats.trunk_count += 1;
            } else if view.station_mode.has(signal_types::StationMode::BRANCH) {
                stats.branch_count += 1;
            } else {
                stats.leaf_count += 1;
            }
            // Each relay is reported independently by whichever station(s)
            // observe it, so the same link can appear in two views; dedup on
            // the unordered sid pair to get a cluster-wide count.
            for record in view.trunk_relays.values().chain(view.relays.values()) {
                let key = if record.from_sid <= record.to_sid {
                    (record.from_sid.clone(), record.to_sid.clone())
                } else {
                    (record.to_sid.clone(), record.from_sid.clone())
                };
                seen_relays.insert(key);
            }
        }
        stats.relay_count = seen_relays.len();
        stats
    }

    /// Upgradable handle to self, for callers that only hold a reference
    /// but need to spawn a task carrying a strong reference (mirrors
    /// `Station`'s self-weak pattern).
    pub fn handle(&self) -> Weak<RouteServer> {
        self.self_weak.clone()
    }
}

fn station_sid_and_trunk(stations: &HashMap<String, StationView>, addr: &str) -> Result<(String, bool), RouteError> {
    stations
        .get(addr)
        .map(|view| (view.sid.clone(), view.is_trunk()))
        .ok_or_else(|| RouteError::UnknownStation(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_types::{ServiceMode, StationMode};

    fn info(ip: &str, port: u16, mode: StationMode) -> ServerInfo {
        ServerInfo::new(format!("{ip}:{port}"), ip, port, ServiceMode::STATION, mode)
    }

    #[tokio::test]
    async fn register_then_route_picks_least_loaded_station() {
        let server = RouteServer::new(HashMap::new());
        let reg_a = server.register(info("10.0.0.1", 25152, StationMode::TRUNK), "10.0.0.1:25152".into()).await;
        let _reg_b = server.register(info("10.0.0.2", 25152, StationMode::TRUNK), "10.0.0.2:25152".into()).await;
        drop(reg_a);

        server.client_join("10.0.0.2:25152", "p_1").await.unwrap();

        let routed = server.route().await.unwrap();
        assert!(routed.starts_with("data:10.0.0.1:25152;"));
    }

    #[tokio::test]
    async fn route_with_no_stations_errors() {
        let server = RouteServer::new(HashMap::new());
        assert!(matches!(server.route().await, Err(RouteError::NoStationAvailable)));
    }

    #[tokio::test]
    async fn relay_exists_is_idempotent_unless_missing() {
        let server = RouteServer::new(HashMap::new());
        server.register(info("10.0.0.1", 25152, StationMode::TRUNK), "10.0.0.1:25152".into()).await;
        server.register(info("10.0.0.2", 25152, StationMode::TRUNK), "10.0.0.2:25152".into()).await;

        server
            .handle_command("10.0.0.1:25152", RouteCmd::new(RouteCmdType::RelayExists, "10.0.0.1:25152-10.0.0.2:25152"))
            .await
            .unwrap();

        let stations = server.stations.read().await;
        let view = stations.get("10.0.0.1:25152").unwrap();
        assert!(view.trunk_relays.contains_key("10.0.0.1:25152-10.0.0.2:25152"));
    }

    #[tokio::test]
    async fn stats_relay_count_dedups_both_sides_reporting() {
        let server = RouteServer::new(HashMap::new());
        server.register(info("10.0.0.1", 25152, StationMode::TRUNK), "10.0.0.1:25152".into()).await;
        server.register(info("10.0.0.2", 25152, StationMode::TRUNK), "10.0.0.2:25152".into()).await;

        server
            .handle_command("10.0.0.1:25152", RouteCmd::new(RouteCmdType::RelayJoin, "10.0.0.1:25152-10.0.0.2:25152"))
            .await
            .unwrap();
        server
            .handle_command("10.0.0.2:25152", RouteCmd::new(RouteCmdType::RelayJoin, "10.0.0.2:25152-10.0.0.1:25152"))
            .await
            .unwrap();

        let stats = server.stats().await;
        assert_eq!(stats.relay_count, 1);
    }

    #[tokio::test]
    async fn recorder_join_computes_publish_addr_from_nat_table() {
        let mut nats = HashMap::new();
        nats.insert("10.0.0.9:9000".to_string(), "203.0.113.9:9000".to_string());
        let server = RouteServer::new(nats);
        server.register(info("10.0.0.1", 25152, StationMode::TRUNK), "10.0.0.1:25152".into()).await;

        server
            .handle_command("10.0.0.1:25152", RouteCmd::new(RouteCmdType::RecorderJoin, "10.0.0.1:25152-10.0.0.9:9000"))
            .await
            .unwrap();

        let stations = server.stations.read().await;
        let view = stations.get("10.0.0.1:25152").unwrap();
        let record = view.recorders.get("10.0.0.1:25152-10.0.0.9:9000").unwrap();
        assert_eq!(record.publish_addr, "203.0.113.9:9000");
    }
}
