use crate::client::Client;
use crate::station::Station;
use parking_lot::Mutex;
use signal_types::SignalPack;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};

const DISPATCH_QUEUE_CAPACITY: usize = 100;

/// Per-CID fan-out hub (§4.1). Holds no strong reference back to its
/// owning [`Station`] — only a weak one, so the Channel/Station/Relay cycle
/// described in §9 never leaks.
pub struct Channel {
    cid: String,
    station: Weak<Station>,
    clients: Arc<RwLock<HashMap<String, Arc<Client>>>>,
    tx: Mutex<Option<mpsc::Sender<SignalPack>>>,
    closed: AtomicBool,
}

impl Channel {
    pub fn new(cid: String, station: Weak<Station>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);
        let clients: Arc<RwLock<HashMap<String, Arc<Client>>>> = Arc::new(RwLock::new(HashMap::new()));

        let channel = Arc::new(Self {
            cid,
            station: station.clone(),
            clients: clients.clone(),
            tx: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
        });

        tokio::spawn(Self::dispatch(rx, station, clients));
        channel
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn client_upids(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }

    pub async fn client_join(&self, client: Arc<Client>) {
        self.clients.write().await.insert(client.upid().to_string(), client);
    }

    pub async fn client_quit(&self, upid: &str) {
        self.clients.write().await.remove(upid);
    }

    /// Accepts `pack` for distribution: the station's before-broadcast hook
    /// runs synchronously relative to this call, then the pack is handed to
    /// the dispatcher's queue (blocking if the queue is full), then the
    /// after-broadcast hook runs.
    pub async fn broadcast(&self, pack: SignalPack) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Some(station) = self.station.upgrade() {
            if !station.before_broadcast(&self.cid, &pack).await {
                return;
            }
        }
        let tx = self.tx.lock().clone();
        let Some(tx) = tx else { return };
        if tx.send(pack.clone()).await.is_err() {
            return;
        }
        if let Some(station) = self.station.upgrade() {
            station.after_broadcast(&self.cid, &pack).await;
        }
    }

    /// Idempotent: terminates the dispatcher and drops the client map.
    pub fn close(&self) {
        if self.tx.lock().take().is_some() {
            debug!(cid = %self.cid, "channel closed");
        }
        self.closed.store(true, Ordering::Release);
    }

    /// The dispatcher: a single serialization point. Packs are consumed in
    /// submission order; for each pack the three fan-outs (record / relay /
    /// local) are launched concurrently but the next pack is not taken off
    /// the queue until all three complete, which is what keeps delivery
    /// order intact within any one subscriber (§4.1, §5).
    async fn dispatch(
        mut rx: mpsc::Receiver<SignalPack>,
        station: Weak<Station>,
        clients: Arc<RwLock<HashMap<String, Arc<Client>>>>,
    ) {
        while let Some(pack) = rx.recv().await {
            let record_fut = async {
                if let Some(st) = station.upgrade() {
                    st.record_signal(&pack).await;
                }
            };
            let relay_fut = async {
                if let Some(st) = station.upgrade() {
                    st.relay_to_remote_stations(pack.clone()).await;
                }
            };
            let local_fut = Self::send_to_clients(&clients, &pack);
            tokio::join!(record_fut, relay_fut, local_fut);
        }
    }

    async fn send_to_clients(clients: &Arc<RwLock<HashMap<String, Arc<Client>>>>, pack: &SignalPack) {
        let snapshot: Vec<Arc<Client>> = clients.read().await.values().cloned().collect();
        for client in snapshot {
            trace!(upid = client.upid(), "pushing signal to local client");
            let _ = client.push_signal(pack.clone()).await;
        }
    }
}
