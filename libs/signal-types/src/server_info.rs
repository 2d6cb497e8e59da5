use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-level service role bitmask. A process may combine any of these,
/// e.g. a station that also runs the route server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceMode(pub u8);

impl ServiceMode {
    pub const STATION: ServiceMode = ServiceMode(1 << 0);
    pub const ROUTE: ServiceMode = ServiceMode(1 << 1);
    pub const RECORDER: ServiceMode = ServiceMode(1 << 2);

    pub fn has(self, flag: ServiceMode) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn union(self, other: ServiceMode) -> ServiceMode {
        ServiceMode(self.0 | other.0)
    }

    /// Parses a comma-separated list of symbolic names (`station,recorder`).
    pub fn parse(names: &str) -> ServiceMode {
        let mut mode = ServiceMode(0);
        for name in names.split(',').map(|s| s.trim().to_ascii_lowercase()) {
            mode = match name.as_str() {
                "station" => mode.union(ServiceMode::STATION),
                "route" => mode.union(ServiceMode::ROUTE),
                "recorder" => mode.union(ServiceMode::RECORDER),
                _ => mode,
            };
        }
        mode
    }
}

impl Default for ServiceMode {
    fn default() -> Self {
        ServiceMode::STATION
    }
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.has(ServiceMode::STATION) {
            parts.push("station");
        }
        if self.has(ServiceMode::ROUTE) {
            parts.push("route");
        }
        if self.has(ServiceMode::RECORDER) {
            parts.push("recorder");
        }
        write!(f, "{}", parts.join(","))
    }
}

/// Station role bitmask, determining eligibility in the relay mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationMode(pub u8);

impl StationMode {
    pub const TRUNK: StationMode = StationMode(1 << 0);
    pub const BRANCH: StationMode = StationMode(1 << 1);
    pub const LEAF: StationMode = StationMode(1 << 2);

    pub fn has(self, flag: StationMode) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn union(self, other: StationMode) -> StationMode {
        StationMode(self.0 | other.0)
    }

    pub fn parse(names: &str) -> StationMode {
        let mut mode = StationMode(0);
        for name in names.split(',').map(|s| s.trim().to_ascii_lowercase()) {
            mode = match name.as_str() {
                "trunk" => mode.union(StationMode::TRUNK),
                "branch" => mode.union(StationMode::BRANCH),
                "leaf" => mode.union(StationMode::LEAF),
                _ => mode,
            };
        }
        mode
    }
}

impl Default for StationMode {
    fn default() -> Self {
        StationMode::TRUNK
    }
}

impl fmt::Display for StationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.has(StationMode::TRUNK) {
            parts.push("trunk");
        }
        if self.has(StationMode::BRANCH) {
            parts.push("branch");
        }
        if self.has(StationMode::LEAF) {
            parts.push("leaf");
        }
        write!(f, "{}", parts.join(","))
    }
}

/// A station or route server's self-description, exchanged during the
/// info-switch handshake and carried in the route server's live structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    pub sid: String,
    pub ip: String,
    pub port: u16,
    pub mode: ServiceMode,
    #[serde(default)]
    pub station_mode: StationMode,
}

impl ServerInfo {
    pub fn new(sid: impl Into<String>, ip: impl Into<String>, port: u16, mode: ServiceMode, station_mode: StationMode) -> Self {
        Self {
            sid: sid.into(),
            ip: ip.into(),
            port,
            mode,
            station_mode,
        }
    }

    /// `ip:port`, as used for pair-keys, `broadcasted`/`stations` entries and
    /// relay addressing.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_mode_parses_symbolic_names() {
        let mode = ServiceMode::parse("station,recorder");
        assert!(mode.has(ServiceMode::STATION));
        assert!(mode.has(ServiceMode::RECORDER));
        assert!(!mode.has(ServiceMode::ROUTE));
    }

    #[test]
    fn addr_is_ip_colon_port() {
        let info = ServerInfo::new("a", "10.0.0.1", 25152, ServiceMode::STATION, StationMode::TRUNK);
        assert_eq!(info.addr(), "10.0.0.1:25152");
    }

    #[test]
    fn display_renders_bitmask_as_symbolic_list() {
        let mode = ServiceMode::STATION.union(ServiceMode::ROUTE);
        assert_eq!(mode.to_string(), "station,route");
    }
}
