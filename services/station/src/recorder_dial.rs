//! Station-side recorder dialer (§4.3.5): dials a configured recorder
//! address, retrying every 5 s on failure or disconnect.

use crate::dial;
use station_core::{run_handshake, HandshakeRole, Station};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub fn spawn(station: Arc<Station>, recorder_addr: String) {
    tokio::spawn(async move {
        loop {
            run_once(&station, &recorder_addr).await;
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    });
}

async fn run_once(station: &Arc<Station>, recorder_addr: &str) {
    let (mut sender, mut receiver) = match dial::dial(recorder_addr, "/recorder/station/join").await {
        Ok(halves) => halves,
        Err(e) => {
            warn!(recorder_addr, error = %e, "recorder dial failed");
            return;
        }
    };

    let local_info = station.server_info().await;
    let outcome = match run_handshake(sender.as_mut(), receiver.as_mut(), &local_info, HandshakeRole::Dialer).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(recorder_addr, error = %e, "recorder handshake failed");
            sender.close().await;
            return;
        }
    };
    if let Some(ip) = outcome.learned_local_ip {
        station.learn_ip(ip).await;
    }

    let (link, queue_rx) = station.add_recorder(recorder_addr).await;
    debug!(recorder_addr, upid = link.upid(), "recorder link established");
    let upid = link.upid().to_string();
    link.run(sender, receiver, queue_rx).await;
    station.recorder_quit(&upid).await;
}
