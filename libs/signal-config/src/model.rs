use serde::{Deserialize, Serialize};
use signal_types::{ServiceMode, StationMode};
use std::collections::HashMap;

/// Default listen port for every service binary.
pub const DEFAULT_PORT: u16 = 25152;

/// The core's collaborator contract: everything a station, route server or
/// recorder needs to know to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service_mode: ServiceMode,
    pub service_port: u16,
    pub publish_ip: String,
    pub publish_port: u16,
    pub station_mode: StationMode,
    pub route_servers: Vec<String>,
    pub recorders: Vec<String>,
    pub service_sid: String,
    pub nats: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let port = DEFAULT_PORT;
        Self {
            service_mode: ServiceMode::STATION,
            service_port: port,
            publish_ip: String::new(),
            publish_port: port,
            station_mode: StationMode::TRUNK,
            route_servers: Vec::new(),
            recorders: Vec::new(),
            service_sid: default_sid(port),
            nats: HashMap::new(),
        }
    }
}

impl Config {
    /// Looks up `raw_addr`'s publish address in the NAT table, falling back
    /// to the raw address unchanged when absent (the empty-table boundary
    /// case: `publishAddr == ipAddr` for every registration).
    pub fn publish_addr(&self, raw_addr: &str) -> String {
        self.nats
            .get(raw_addr)
            .cloned()
            .unwrap_or_else(|| raw_addr.to_string())
    }
}

fn default_sid(port: u16) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.service_port, 25152);
        assert!(cfg.service_mode.has(ServiceMode::STATION));
        assert!(cfg.station_mode.has(StationMode::TRUNK));
        assert!(cfg.service_sid.ends_with(":25152"));
    }

    #[test]
    fn empty_nat_table_is_identity() {
        let cfg = Config::default();
        assert_eq!(cfg.publish_addr("10.0.0.1:25152"), "10.0.0.1:25152");
    }

    #[test]
    fn nat_table_substitutes_configured_entries() {
        let mut cfg = Config::default();
        cfg.nats.insert("10.0.0.1:25152".to_string(), "203.0.113.9:25152".to_string());
        assert_eq!(cfg.publish_addr("10.0.0.1:25152"), "203.0.113.9:25152");
        assert_eq!(cfg.publish_addr("10.0.0.2:25152"), "10.0.0.2:25152");
    }
}
