//! Two stations, one trunk relay link between them, two real WebSocket
//! clients joining the same channel on opposite stations: a signal
//! originated on one side must be observed on the other (spec scenario:
//! a message crosses exactly one relay hop).

use signal_mesh_integration_tests::{dial, relay_with, spawn_station};
use signal_types::{new_signal_id, Signal, ServiceMode, StationMode};
use station_core::{NullNotifier, Station};
use std::sync::Arc;
use std::time::Duration;

fn station(sid: &str) -> Arc<Station> {
    Station::new(sid.to_string(), "127.0.0.1".to_string(), 0, ServiceMode::STATION, StationMode::TRUNK, Arc::new(NullNotifier))
}

async fn next_signal(receiver: &mut Box<dyn station_core::SignalReceiver>) -> Signal {
    loop {
        let value = tokio::time::timeout(Duration::from_secs(5), receiver.recv_json())
            .await
            .expect("timed out waiting for a frame")
            .expect("transport error")
            .expect("connection closed early");
        let signal: Signal = serde_json::from_value(value).expect("frame was not a Signal");
        if !matches!(signal.kind, signal_types::SignalType::PJoin | signal_types::SignalType::PQuit) {
            return signal;
        }
    }
}

#[tokio::test]
async fn signal_crosses_a_single_relay_hop() {
    let station_a = station("a:0");
    let station_b = station("b:0");

    let addr_a = signal_mesh_integration_tests::spawn_station(station_a.clone()).await;
    let addr_b = spawn_station(station_b.clone()).await;

    relay_with(station_a.clone(), addr_b).await;
    // Give the relay handshake a moment to complete before clients join.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (mut alice_tx, mut alice_rx) = dial(addr_a, "/station/client/join?cid=room&token=alice").await;
    let (_bob_tx, mut bob_rx) = dial(addr_b, "/station/client/join?cid=room&token=bob").await;

    // Let both joins propagate across the relay before sending the probe.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let outbound = Signal::new(new_signal_id(), String::new(), signal_types::SignalType::Signal, "hello from alice".to_string());
    alice_tx.send_json(&serde_json::to_value(&outbound).unwrap()).await.expect("send failed");

    let received = next_signal(&mut bob_rx).await;
    assert_eq!(received.text, "hello from alice");

    let _ = alice_rx;
}
