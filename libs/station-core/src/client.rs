use crate::channel::Channel;
use crate::error::StationError;
use crate::link::{SignalReceiver, SignalSender};
use crate::queue::ParticipantQueue;
use signal_types::{Signal, SignalPack, SignalType};
use std::sync::Weak;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// An end-client subscribed to one channel.
///
/// Inbound signals are wrapped into a fresh `SignalPack` and handed to the
/// owning channel's `Broadcast`; outbound, only the bare `Signal` crosses
/// the wire (§4.2).
pub struct Client {
    upid: String,
    pid: String,
    cid: String,
    channel: Weak<Channel>,
    queue: ParticipantQueue,
}

impl Client {
    /// `upid = pid + "_" + remoteAddr"`.
    pub fn make_upid(pid: &str, remote_addr: &str) -> String {
        format!("{pid}_{remote_addr}")
    }

    pub fn new(pid: String, remote_addr: &str, cid: String, channel: Weak<Channel>) -> (std::sync::Arc<Self>, mpsc::Receiver<SignalPack>) {
        let upid = Self::make_upid(&pid, remote_addr);
        let (queue, rx) = ParticipantQueue::new();
        (
            std::sync::Arc::new(Self {
                upid,
                pid,
                cid,
                channel,
                queue,
            }),
            rx,
        )
    }

    pub fn upid(&self) -> &str {
        &self.upid
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// Enqueues `pack` for delivery to the remote end (bounded, blocks if
    /// full).
    pub async fn push_signal(&self, pack: SignalPack) -> Result<(), StationError> {
        self.queue.push(pack).await
    }

    /// Drives this client's connection until either side closes, then
    /// releases both halves. Intended to be spawned as its own task; the
    /// caller is responsible for removing `upid` from the channel's map
    /// once this returns.
    pub async fn run(
        self: std::sync::Arc<Self>,
        mut sender: Box<dyn SignalSender>,
        mut receiver: Box<dyn SignalReceiver>,
        mut queue_rx: mpsc::Receiver<SignalPack>,
    ) {
        tokio::select! {
            _ = self.broadcast_loop(&mut receiver) => {
                debug!(upid = %self.upid, "client connection closed");
            }
            _ = Self::listen_loop(&mut queue_rx, &mut sender) => {
                debug!(upid = %self.upid, "client queue closed");
            }
        }
        self.queue.close();
        sender.close().await;
    }

    async fn broadcast_loop(&self, receiver: &mut Box<dyn SignalReceiver>) {
        loop {
            let value = match receiver.recv_json().await {
                Ok(Some(v)) => v,
                Ok(None) => return,
                Err(e) => {
                    warn!(upid = %self.upid, error = %e, "client read error");
                    return;
                }
            };
            let signal: Signal = match serde_json::from_value(value) {
                Ok(s) => s,
                Err(e) => {
                    warn!(upid = %self.upid, error = %e, "malformed signal from client");
                    continue;
                }
            };
            if matches!(signal.kind, SignalType::Blank) {
                continue;
            }
            let mut outgoing = signal;
            outgoing.id = signal_types::new_signal_id();
            outgoing.pid = self.upid.clone();
            let pack = SignalPack::originate(outgoing, self.cid.clone(), signal_types::now_millis());
            trace!(upid = %self.upid, cid = %self.cid, "submitting client signal");
            if let Some(channel) = self.channel.upgrade() {
                channel.broadcast(pack).await;
            } else {
                return;
            }
        }
    }

    async fn listen_loop(queue_rx: &mut mpsc::Receiver<SignalPack>, sender: &mut Box<dyn SignalSender>) {
        while let Some(pack) = queue_rx.recv().await {
            let value = match serde_json::to_value(&pack.signal) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send_json(&value).await.is_err() {
                return;
            }
        }
    }
}
