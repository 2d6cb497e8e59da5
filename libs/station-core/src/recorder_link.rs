use crate::error::StationError;
use crate::link::{SignalReceiver, SignalSender};
use crate::queue::ParticipantQueue;
use signal_types::SignalPack;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The station's side of a link to one configured recorder (§4.3.5).
///
/// Recorders are pure sinks: inbound traffic (if any) is discarded, and a
/// `RecorderLink` never calls back into `Station::broadcast` — every pack
/// broadcast through the station is pushed here in envelope form by the
/// station itself.
pub struct RecorderLink {
    upid: String,
    queue: ParticipantQueue,
}

impl RecorderLink {
    /// Follows the relay pair convention: `dialerAddr + "-" + dialedAddr`,
    /// and the station is always the dialer for recorder links.
    pub fn make_upid(station_addr: &str, recorder_addr: &str) -> String {
        format!("{station_addr}-{recorder_addr}")
    }

    pub fn new(upid: String) -> (Arc<Self>, mpsc::Receiver<SignalPack>) {
        let (queue, rx) = ParticipantQueue::new();
        (Arc::new(Self { upid, queue }), rx)
    }

    pub fn upid(&self) -> &str {
        &self.upid
    }

    pub async fn push_signal(&self, pack: SignalPack) -> Result<(), StationError> {
        self.queue.push(pack).await
    }

    pub async fn run(
        self: Arc<Self>,
        mut sender: Box<dyn SignalSender>,
        mut receiver: Box<dyn SignalReceiver>,
        mut queue_rx: mpsc::Receiver<SignalPack>,
    ) {
        tokio::select! {
            _ = Self::drain_inbound(&self.upid, &mut receiver) => {
                debug!(upid = %self.upid, "recorder connection closed");
            }
            _ = Self::listen_loop(&mut queue_rx, &mut sender) => {
                debug!(upid = %self.upid, "recorder queue closed");
            }
        }
        self.queue.close();
        sender.close().await;
    }

    async fn drain_inbound(upid: &str, receiver: &mut Box<dyn SignalReceiver>) {
        loop {
            match receiver.recv_json().await {
                Ok(Some(_)) => continue,
                Ok(None) => return,
                Err(e) => {
                    warn!(upid, error = %e, "recorder link read error");
                    return;
                }
            }
        }
    }

    async fn listen_loop(queue_rx: &mut mpsc::Receiver<SignalPack>, sender: &mut Box<dyn SignalSender>) {
        while let Some(pack) = queue_rx.recv().await {
            let value = match serde_json::to_value(&pack) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send_json(&value).await.is_err() {
                return;
            }
        }
    }
}
