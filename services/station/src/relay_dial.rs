//! Outbound relay establishment: dials a remote station's
//! `/station/relay/join`, runs the info-switch handshake, and registers the
//! resulting link (§4.3.4's `RelayWithStation`).

use crate::dial;
use station_core::{run_handshake, HandshakeRole, Station};
use std::sync::Arc;
use tracing::{debug, warn};

pub async fn relay_with_station(station: Arc<Station>, remote_addr: String) {
    let (mut sender, mut receiver) = match dial::dial(&remote_addr, "/station/relay/join").await {
        Ok(halves) => halves,
        Err(e) => {
            warn!(remote_addr = %remote_addr, error = %e, "relay dial failed");
            return;
        }
    };

    let local_info = station.server_info().await;
    let outcome = match run_handshake(sender.as_mut(), receiver.as_mut(), &local_info, HandshakeRole::Dialer).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(remote_addr = %remote_addr, error = %e, "relay handshake failed");
            sender.close().await;
            return;
        }
    };
    if let Some(ip) = outcome.learned_local_ip {
        station.learn_ip(ip).await;
    }

    match station.register_relay(&outcome.peer_info, true, true).await {
        Ok((relay, queue_rx)) => {
            debug!(remote_addr = %remote_addr, upid = relay.upid(), "relay established (dialer)");
            let upid = relay.upid().to_string();
            let cleanup_station = station.clone();
            tokio::spawn(async move {
                relay.run(sender, receiver, queue_rx).await;
                cleanup_station.relay_quit(&upid).await;
            });
        }
        Err(e) => {
            debug!(remote_addr = %remote_addr, error = %e, "relay dial collided with an existing relay");
            sender.close().await;
        }
    }
}
