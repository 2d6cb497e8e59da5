use crate::cache::SignalCache;
use signal_types::{ServerInfo, Signal, SignalPack};
use station_core::{run_handshake, HandshakeRole, LinkError, SignalReceiver, SignalSender};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A recorder process: archives every pack broadcast by its connected
/// stations and answers history queries (§4.3.5, recorder/recorderserver.go).
pub struct RecorderServer {
    info: ServerInfo,
    cache: Arc<SignalCache>,
    stations: RwLock<HashMap<String, ServerInfo>>,
}

impl RecorderServer {
    pub fn new(info: ServerInfo) -> Arc<Self> {
        Arc::new(Self {
            info,
            cache: Arc::new(SignalCache::new()),
            stations: RwLock::new(HashMap::new()),
        })
    }

    pub fn cache(&self) -> &Arc<SignalCache> {
        &self.cache
    }

    /// Drives one inbound station connection: the info-switch handshake,
    /// then read-and-record until the peer disconnects. Intended to be
    /// spawned as its own task by `/recorder/station/join`'s handler.
    pub async fn station_join(
        self: &Arc<Self>,
        mut sender: Box<dyn SignalSender>,
        mut receiver: Box<dyn SignalReceiver>,
    ) -> Result<(), LinkError> {
        let outcome = run_handshake(sender.as_mut(), receiver.as_mut(), &self.info, HandshakeRole::Accepter).await?;
        let remote_addr = outcome.peer_info.addr();
        self.stations.write().await.insert(remote_addr.clone(), outcome.peer_info);
        debug!(remote_addr = %remote_addr, "recorder accepted station connection");

        loop {
            match receiver.recv_json().await {
                Ok(Some(value)) => {
                    if let Ok(pack) = serde_json::from_value::<SignalPack>(value) {
                        self.cache.record(&pack).await;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }

        sender.close().await;
        self.stations.write().await.remove(&remote_addr);
        debug!(remote_addr = %remote_addr, "recorder station connection closed");
        Ok(())
    }

    pub async fn fetch(&self, cid: &str, lastfrom: &str) -> Vec<Signal> {
        self.cache.fetch(cid, lastfrom).await
    }

    pub async fn station_count(&self) -> usize {
        self.stations.read().await.len()
    }
}
