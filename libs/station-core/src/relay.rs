use crate::error::StationError;
use crate::link::{SignalReceiver, SignalSender};
use crate::queue::ParticipantQueue;
use crate::station::Station;
use signal_types::{SignalPack, StationMode};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A peer-to-peer link to one remote station (§4.2, §4.3.4).
///
/// Inbound packs are handed whole to `Station::broadcast`, which performs
/// the predecessor/trunk skip computation described in §4.3.1 before
/// deciding which relays (including the one that produced this pack) get
/// the next hop; `Relay` itself does not re-derive that decision, it only
/// carries whatever the station already decided to send.
pub struct Relay {
    upid: String,
    remote_addr: String,
    remote_sid: String,
    remote_station_mode: StationMode,
    is_trunk: bool,
    requester: bool,
    station: Weak<Station>,
    queue: ParticipantQueue,
}

impl Relay {
    /// `upid = dialerAddr + "-" + dialedAddr"`, assigned from the dialer's
    /// perspective regardless of which side initiated (§4.3.4).
    pub fn make_upid(dialer_addr: &str, dialed_addr: &str) -> String {
        format!("{dialer_addr}-{dialed_addr}")
    }

    pub fn new(
        upid: String,
        remote_addr: String,
        remote_sid: String,
        remote_station_mode: StationMode,
        is_trunk: bool,
        requester: bool,
        station: Weak<Station>,
    ) -> (Arc<Self>, mpsc::Receiver<SignalPack>) {
        let (queue, rx) = ParticipantQueue::new();
        (
            Arc::new(Self {
                upid,
                remote_addr,
                remote_sid,
                remote_station_mode,
                is_trunk,
                requester,
                station,
                queue,
            }),
            rx,
        )
    }

    pub fn upid(&self) -> &str {
        &self.upid
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn remote_sid(&self) -> &str {
        &self.remote_sid
    }

    pub fn is_trunk(&self) -> bool {
        self.is_trunk
    }

    pub fn remote_station_mode(&self) -> StationMode {
        self.remote_station_mode
    }

    /// True if this end dialed the remote (the "requester", §3's relay
    /// invariant: exactly one endpoint originated the dial).
    pub fn is_requester(&self) -> bool {
        self.requester
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
            _ = self.broadcast_loop(&mut receiver) => {
                debug!(upid = %self.upid, "relay connection closed");
            }
            _ = Self::listen_loop(&mut queue_rx, &mut sender) => {
                debug!(upid = %self.upid, "relay queue closed");
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
                    warn!(upid = %self.upid, error = %e, "relay read error");
                    return;
                }
            };
            let pack: SignalPack = match serde_json::from_value(value) {
                Ok(p) => p,
                Err(e) => {
                    warn!(upid = %self.upid, error = %e, "malformed pack from relay peer");
                    continue;
                }
            };
            if let Some(station) = self.station.upgrade() {
                station.broadcast(pack).await;
            } else {
                return;
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
