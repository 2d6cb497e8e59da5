use serde::Serialize;
use signal_types::{ServerInfo, ServiceMode, StationMode};
use std::collections::HashMap;

/// A relay as seen by the route server (§3's `Relay record`).
#[derive(Debug, Clone, Serialize)]
pub struct RelayRecord {
    pub from_sid: String,
    pub to_sid: String,
    pub is_trunk: bool,
    pub time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecorderRecord {
    pub upid: String,
    pub publish_addr: String,
    pub time: i64,
}

/// The route server's mirror of one connected station (§3's
/// `RouteServer.Station view`). Serialized verbatim for the realtime
/// observer feed and `/route/stat`.
#[derive(Debug, Clone, Serialize)]
pub struct StationView {
    pub sid: String,
    pub mode: ServiceMode,
    pub station_mode: StationMode,
    pub remote_addr: String,
    pub remote_info: ServerInfo,
    pub publish_addr: String,
    pub time: i64,
    pub clients: HashMap<String, i64>,
    pub recorders: HashMap<String, RecorderRecord>,
    pub trunk_relays: HashMap<String, RelayRecord>,
    pub relays: HashMap<String, RelayRecord>,
    pub is_online: bool,
}

impl StationView {
    pub fn new(remote_addr: String, remote_info: ServerInfo, publish_addr: String, time: i64) -> Self {
        Self {
            sid: remote_info.sid.clone(),
            mode: remote_info.mode,
            station_mode: remote_info.station_mode,
            remote_addr,
            remote_info,
            publish_addr,
            time,
            clients: HashMap::new(),
            recorders: HashMap::new(),
            trunk_relays: HashMap::new(),
            relays: HashMap::new(),
            is_online: true,
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn non_trunk_relay_count(&self) -> usize {
        self.relays.len()
    }

    pub fn is_trunk(&self) -> bool {
        self.station_mode.has(StationMode::TRUNK)
    }

    pub fn is_leaf(&self) -> bool {
        self.station_mode.has(StationMode::LEAF)
    }

    pub fn has_trunk_pair_either_direction(&self, other_addr: &str) -> bool {
        let forward = signal_types::RouteCmd::pair_key(&self.remote_addr, other_addr);
        let backward = signal_types::RouteCmd::pair_key(other_addr, &self.remote_addr);
        self.trunk_relays.contains_key(&forward) || self.trunk_relays.contains_key(&backward)
    }

    /// First recorder enumerated on this station, if any (iteration-order
    /// tiebreak per §4.5's `Route(conn)` selection rule).
    pub fn first_recorder(&self) -> Option<&RecorderRecord> {
        self.recorders.values().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_types::ServiceMode;

    fn view(addr: &str, mode: StationMode) -> StationView {
        let info = ServerInfo::new("sid", "10.0.0.1", 25152, ServiceMode::STATION, mode);
        StationView::new(addr.to_string(), info, addr.to_string(), 0)
    }

    #[test]
    fn trunk_pair_lookup_is_direction_agnostic() {
        let mut a = view("a:1", StationMode::TRUNK);
        a.trunk_relays.insert(
            signal_types::RouteCmd::pair_key("b:1", "a:1"),
            RelayRecord {
                from_sid: "b".into(),
                to_sid: "a".into(),
                is_trunk: true,
                time: 0,
            },
        );
        assert!(a.has_trunk_pair_either_direction("b:1"));
        assert!(!a.has_trunk_pair_either_direction("c:1"));
    }
}
