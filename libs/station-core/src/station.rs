use crate::channel::Channel;
use crate::client::Client;
use crate::error::StationError;
use crate::notifier::ChangeNotifier;
use crate::recorder_link::RecorderLink;
use crate::relay::Relay;
use signal_types::{RouteCmdType, ServerInfo, ServiceMode, Signal, SignalPack, SignalType, StationMode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info};

/// A duplicate `signal.id` seen within this window is dropped rather than
/// re-broadcast (§3, §4.3.1).
const BROADCASTED_CACHE_TIMEOUT: Duration = Duration::from_secs(30);
const BROADCASTED_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// Grace period before an empty channel is actually torn down (§4.3.2).
const CHANNEL_RELEASE_GRACE: Duration = Duration::from_millis(500);

/// Snapshot for the `/station/stat` endpoint (SPEC_FULL §6/§14).
#[derive(Debug, Clone)]
pub struct StationStats {
    pub sid: String,
    pub uptime_secs: u64,
    pub channel_count: usize,
    pub client_count: i64,
    pub trunk_relay_count: usize,
    pub branch_relay_count: usize,
    pub recorder_count: usize,
    pub broadcasted_cache_size: usize,
}

/// The per-process fan-out engine: channel registry, relay mesh peer,
/// dedup cache and recorder feed (§4.3).
pub struct Station {
    sid: String,
    ip: RwLock<String>,
    port: u16,
    mode: ServiceMode,
    station_mode: StationMode,
    started_at: Instant,

    notifier: Arc<dyn ChangeNotifier>,
    self_weak: Weak<Station>,

    channels: RwLock<HashMap<String, Arc<Channel>>>,
    relays: RwLock<HashMap<String, Arc<Relay>>>,
    recorders: RwLock<HashMap<String, Arc<RecorderLink>>>,
    broadcasted: RwLock<HashMap<String, Instant>>,
    relay_locker: Mutex<()>,

    client_count: Arc<AtomicI64>,
    count_tx: mpsc::UnboundedSender<i64>,
}

impl Station {
    pub fn new(
        sid: String,
        ip: String,
        port: u16,
        mode: ServiceMode,
        station_mode: StationMode,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Arc<Self> {
        let (count_tx, mut count_rx) = mpsc::unbounded_channel::<i64>();
        let client_count = Arc::new(AtomicI64::new(0));

        let station = Arc::new_cyclic(|weak| Self {
            sid,
            ip: RwLock::new(ip),
            port,
            mode,
            station_mode,
            started_at: Instant::now(),
            notifier,
            self_weak: weak.clone(),
            channels: RwLock::new(HashMap::new()),
            relays: RwLock::new(HashMap::new()),
            recorders: RwLock::new(HashMap::new()),
            broadcasted: RwLock::new(HashMap::new()),
            relay_locker: Mutex::new(()),
            client_count: client_count.clone(),
            count_tx,
        });

        // clientCount's dedicated serial delta consumer (§5): the only
        // writer to `client_count`, so readers see eventually-consistent
        // values without a shared mutex on the hot broadcast path.
        tokio::spawn(async move {
            while let Some(delta) = count_rx.recv().await {
                client_count.fetch_add(delta, Ordering::Relaxed);
            }
        });

        let sweep_target = Arc::downgrade(&station);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(BROADCASTED_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let Some(station) = sweep_target.upgrade() else { return };
                station.evict_broadcasted().await;
            }
        });

        station
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    pub fn station_mode(&self) -> StationMode {
        self.station_mode
    }

    pub async fn ip(&self) -> String {
        self.ip.read().await.clone()
    }

    /// Adopts `ip` if this station's own IP was unset, per the info-switch
    /// handshake's "if our own IP was empty, adopt whatever the peer
    /// returned" rule (§6).
    pub async fn learn_ip(&self, ip: String) {
        let mut guard = self.ip.write().await;
        if guard.is_empty() && !ip.is_empty() {
            debug!(learned_ip = %ip, "station learned its own IP from a peer handshake");
            *guard = ip;
        }
    }

    pub async fn addr(&self) -> String {
        format!("{}:{}", self.ip.read().await, self.port)
    }

    pub async fn server_info(&self) -> ServerInfo {
        ServerInfo::new(self.sid.clone(), self.ip().await, self.port, self.mode, self.station_mode)
    }

    // ---- channel lifecycle (§4.3.2) ----------------------------------

    pub async fn get_channel(self: &Arc<Self>, cid: &str) -> Arc<Channel> {
        if let Some(existing) = self.channels.read().await.get(cid) {
            return existing.clone();
        }
        let mut channels = self.channels.write().await;
        if let Some(existing) = channels.get(cid) {
            return existing.clone();
        }
        let channel = Channel::new(cid.to_string(), self.self_weak.clone());
        channels.insert(cid.to_string(), channel.clone());
        channel
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    fn schedule_release_channel(self: &Arc<Self>, cid: String) {
        let station = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CHANNEL_RELEASE_GRACE).await;
            station.release_channel_if_empty(&cid).await;
        });
    }

    async fn release_channel_if_empty(&self, cid: &str) {
        let channel = { self.channels.read().await.get(cid).cloned() };
        let Some(channel) = channel else { return };
        if channel.client_count().await != 0 {
            return;
        }
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.get(cid) {
            if channel.client_count().await == 0 {
                channel.close();
                channels.remove(cid);
                info!(cid, "channel released after grace period");
            }
        }
    }

    // ---- client join/quit (§4.3.3) ------------------------------------

    pub async fn client_join(
        self: &Arc<Self>,
        cid: &str,
        pid: String,
        remote_addr: &str,
    ) -> (Arc<Client>, mpsc::Receiver<SignalPack>) {
        let channel = self.get_channel(cid).await;
        let (client, rx) = Client::new(pid, remote_addr, cid.to_string(), Arc::downgrade(&channel));
        channel.client_join(client.clone()).await;

        let count = channel.client_count().await;
        let join_signal = Signal::new(signal_types::new_signal_id(), client.upid().to_string(), SignalType::PJoin, count.to_string());
        let pack = SignalPack::originate(join_signal, cid.to_string(), signal_types::now_millis());
        channel.broadcast(pack).await;

        (client, rx)
    }

    pub async fn client_quit(self: &Arc<Self>, cid: &str, upid: &str) {
        let Some(channel) = self.channels.read().await.get(cid).cloned() else {
            return;
        };
        channel.client_quit(upid).await;

        let count = channel.client_count().await;
        let quit_signal = Signal::new(signal_types::new_signal_id(), upid.to_string(), SignalType::PQuit, count.to_string());
        let pack = SignalPack::originate(quit_signal, cid.to_string(), signal_types::now_millis());
        channel.broadcast(pack).await;

        if count == 0 {
            self.schedule_release_channel(cid.to_string());
        }
    }

    pub fn client_count(&self) -> i64 {
        self.client_count.load(Ordering::Relaxed)
    }

    /// Station's before-broadcast hook (§4.3.3): fires only for
    /// locally-originated join/quit packs (empty `stations`), never for
    /// ones arriving over a relay.
    pub(crate) async fn before_broadcast(&self, _cid: &str, pack: &SignalPack) -> bool {
        if pack.stations.is_empty() {
            match pack.signal.kind {
                SignalType::PJoin => {
                    let _ = self.count_tx.send(1);
                    self.notifier.notify(&pack.signal.pid, RouteCmdType::ClientJoin).await;
                }
                SignalType::PQuit => {
                    let _ = self.count_tx.send(-1);
                    self.notifier.notify(&pack.signal.pid, RouteCmdType::ClientQuit).await;
                }
                _ => {}
            }
        }
        true
    }

    pub(crate) async fn after_broadcast(&self, _cid: &str, _pack: &SignalPack) {}

    // ---- broadcast routing (§4.3.1) -----------------------------------

    pub async fn broadcast(&self, pack: SignalPack) {
        if self.is_broadcasted(&pack.signal.id).await {
            return;
        }
        let channel = self.channels.read().await.get(&pack.cid).cloned();
        match channel {
            Some(channel) => channel.broadcast(pack).await,
            None => {
                // Transit node: no local subscribers, still relay onward
                // and feed recorders.
                self.relay_to_remote_stations(pack.clone()).await;
                self.record_signal(&pack).await;
            }
        }
    }

    pub async fn relay_to_remote_stations(&self, mut pack: SignalPack) {
        if self.is_broadcasted(&pack.signal.id).await {
            return;
        }
        let predecessor = pack.stations.last().cloned();
        pack.visit(self.addr().await);
        self.mark_broadcasted(pack.signal.id.clone()).await;

        let local_is_trunk = self.station_mode.has(StationMode::TRUNK);
        let relays: Vec<Arc<Relay>> = self.relays.read().await.values().cloned().collect();
        for relay in relays {
            let both_trunk = local_is_trunk && relay.remote_station_mode().has(StationMode::TRUNK);
            let send = pack.stations.len() == 1
                || (predecessor.as_deref() != Some(relay.remote_addr()) && !both_trunk);
            if send {
                let _ = relay.push_signal(pack.clone()).await;
            }
        }
    }

    pub async fn record_signal(&self, pack: &SignalPack) {
        let recorders: Vec<Arc<RecorderLink>> = self.recorders.read().await.values().cloned().collect();
        for recorder in recorders {
            let _ = recorder.push_signal(pack.clone()).await;
        }
    }

    async fn is_broadcasted(&self, id: &str) -> bool {
        self.broadcasted.read().await.contains_key(id)
    }

    async fn mark_broadcasted(&self, id: String) {
        self.broadcasted.write().await.insert(id, Instant::now());
    }

    async fn evict_broadcasted(&self) {
        let mut map = self.broadcasted.write().await;
        map.retain(|_, inserted| inserted.elapsed() < BROADCASTED_CACHE_TIMEOUT);
    }

    pub async fn broadcasted_cache_size(&self) -> usize {
        self.broadcasted.read().await.len()
    }

    // ---- relay establishment (§4.3.4) ---------------------------------

    /// Registers a relay to `remote_info`. `requester` is true when this
    /// station dialed out; `emit_exists_on_collision` distinguishes the
    /// inbound-accept path (`relayJoin`, false — no RELAYEXISTS) from the
    /// order-driven outbound path (`relayWithStation`, true — RELAYEXISTS
    /// acknowledges the order). See SPEC_FULL §4.3.4.
    pub async fn register_relay(
        self: &Arc<Self>,
        remote_info: &ServerInfo,
        requester: bool,
        emit_exists_on_collision: bool,
    ) -> Result<(Arc<Relay>, mpsc::Receiver<SignalPack>), StationError> {
        let _guard = self.relay_locker.lock().await;
        let remote_addr = remote_info.addr();

        {
            let relays = self.relays.read().await;
            if let Some(existing) = relays.values().find(|r| r.remote_addr() == remote_addr) {
                if emit_exists_on_collision {
                    self.notifier.notify(existing.upid(), RouteCmdType::RelayExists).await;
                }
                return Err(StationError::RelayExists(remote_addr));
            }
        }

        let my_addr = self.addr().await;
        let (dialer, dialed) = if requester {
            (my_addr, remote_addr.clone())
        } else {
            (remote_addr.clone(), self.addr().await)
        };
        let upid = Relay::make_upid(&dialer, &dialed);
        let is_trunk = self.station_mode.has(StationMode::TRUNK) && remote_info.station_mode.has(StationMode::TRUNK);

        let (relay, rx) = Relay::new(
            upid.clone(),
            remote_addr,
            remote_info.sid.clone(),
            remote_info.station_mode,
            is_trunk,
            requester,
            self.self_weak.clone(),
        );
        self.relays.write().await.insert(upid.clone(), relay.clone());
        self.notifier.notify(&upid, RouteCmdType::RelayJoin).await;
        Ok((relay, rx))
    }

    pub async fn relay_quit(&self, upid: &str) {
        if self.relays.write().await.remove(upid).is_some() {
            self.notifier.notify(upid, RouteCmdType::RelayQuit).await;
        }
    }

    pub async fn has_relay_to(&self, remote_addr: &str) -> bool {
        self.relays.read().await.values().any(|r| r.remote_addr() == remote_addr)
    }

    pub async fn relay_count(&self) -> (usize, usize) {
        let relays = self.relays.read().await;
        let trunk = relays.values().filter(|r| r.is_trunk()).count();
        (trunk, relays.len() - trunk)
    }

    // ---- recorder link (§4.3.5) ----------------------------------------

    pub async fn add_recorder(self: &Arc<Self>, recorder_addr: &str) -> (Arc<RecorderLink>, mpsc::Receiver<SignalPack>) {
        let upid = RecorderLink::make_upid(&self.addr().await, recorder_addr);
        let (link, rx) = RecorderLink::new(upid.clone());
        self.recorders.write().await.insert(upid.clone(), link.clone());
        self.notifier.notify(&upid, RouteCmdType::RecorderJoin).await;
        (link, rx)
    }

    pub async fn recorder_quit(&self, upid: &str) {
        if self.recorders.write().await.remove(upid).is_some() {
            self.notifier.notify(upid, RouteCmdType::RecorderQuit).await;
        }
    }

    pub async fn recorder_count(&self) -> usize {
        self.recorders.read().await.len()
    }

    // ---- full-state enumeration, for the route-client's initial sync
    // report (§4.4: concatenated RELAYS/RECORDERS/CLIENTS on connect) -----

    pub async fn all_relay_upids(&self) -> Vec<String> {
        self.relays.read().await.keys().cloned().collect()
    }

    pub async fn all_recorder_upids(&self) -> Vec<String> {
        self.recorders.read().await.keys().cloned().collect()
    }

    pub async fn all_client_upids(&self) -> Vec<String> {
        let channels: Vec<Arc<Channel>> = self.channels.read().await.values().cloned().collect();
        let mut upids = Vec::new();
        for channel in channels {
            upids.extend(channel.client_upids().await);
        }
        upids
    }

    // ---- statistics (SPEC_FULL §6/§14) ---------------------------------

    pub async fn stats(&self) -> StationStats {
        let (trunk, branch) = self.relay_count().await;
        StationStats {
            sid: self.sid.clone(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            channel_count: self.channel_count().await,
            client_count: self.client_count(),
            trunk_relay_count: trunk,
            branch_relay_count: branch,
            recorder_count: self.recorder_count().await,
            broadcasted_cache_size: self.broadcasted_cache_size().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::NullNotifier;

    fn new_station() -> Arc<Station> {
        Station::new(
            "test:25152".to_string(),
            "10.0.0.1".to_string(),
            25152,
            ServiceMode::STATION,
            StationMode::TRUNK,
            Arc::new(NullNotifier),
        )
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn dedup_cache_entry_expires_after_30_seconds() {
        let station = new_station();
        station.mark_broadcasted("sig-1".to_string()).await;
        assert!(station.is_broadcasted("sig-1").await);

        tokio::time::sleep(BROADCASTED_CACHE_TIMEOUT + BROADCASTED_SWEEP_INTERVAL).await;

        assert!(!station.is_broadcasted("sig-1").await);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn empty_channel_is_released_after_grace_period() {
        let station = new_station();
        let (client, _rx) = station.client_join("room", "p_1".to_string(), "10.0.0.2:1").await;
        assert_eq!(station.channel_count().await, 1);

        station.client_quit("room", client.upid()).await;
        assert_eq!(station.channel_count().await, 1, "channel still holds the grace-period slot");

        tokio::time::sleep(CHANNEL_RELEASE_GRACE * 2).await;

        assert_eq!(station.channel_count().await, 0);
    }
}
