use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire command type exchanged between a station's route-client and a route
/// server. Values are part of the wire contract; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCmdType {
    RelayJoin = 0,
    RelayQuit = 1,
    RelayExists = 2,
    ClientJoin = 3,
    ClientQuit = 4,
    RecorderJoin = 5,
    RecorderQuit = 6,
    RelayWith = 7,
    /// Aggregate report of all current relay upids, `;`-separated.
    Relays = 8,
    /// Aggregate report of all current client upids, `;`-separated.
    Clients = 9,
    /// Aggregate report of all current recorder upids, `;`-separated.
    Recorders = 10,
}

impl RouteCmdType {
    pub fn from_i32(v: i32) -> Result<Self, crate::TypesError> {
        use RouteCmdType::*;
        Ok(match v {
            0 => RelayJoin,
            1 => RelayQuit,
            2 => RelayExists,
            3 => ClientJoin,
            4 => ClientQuit,
            5 => RecorderJoin,
            6 => RecorderQuit,
            7 => RelayWith,
            8 => Relays,
            9 => Clients,
            10 => Recorders,
            other => return Err(crate::TypesError::UnknownRouteCmdType(other)),
        })
    }
}

impl Serialize for RouteCmdType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for RouteCmdType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i32::deserialize(deserializer)?;
        RouteCmdType::from_i32(v).map_err(serde::de::Error::custom)
    }
}

/// `{Type, Text}` wire shape carried over the route-client / route-server
/// link in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteCmd {
    #[serde(rename = "Type")]
    pub kind: RouteCmdType,
    #[serde(rename = "Text")]
    pub text: String,
}

impl RouteCmd {
    pub fn new(kind: RouteCmdType, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }

    /// Splits a `;`-separated multi-item `Text` into its parts, dropping
    /// empty segments (an empty aggregate report yields zero items).
    pub fn split_items(&self) -> Vec<&str> {
        self.text.split(';').filter(|s| !s.is_empty()).collect()
    }

    /// Splits a relay pair identifier `"fromAddr-toAddr"` into its two
    /// halves. Addresses themselves are `ip:port` and contain no `-`, so a
    /// single split on the first `-` is unambiguous.
    pub fn split_pair(text: &str) -> Result<(&str, &str), crate::TypesError> {
        let mut parts = text.splitn(2, '-');
        match (parts.next(), parts.next()) {
            (Some(from), Some(to)) if !from.is_empty() && !to.is_empty() => Ok((from, to)),
            _ => Err(crate::TypesError::MalformedPair(text.to_string())),
        }
    }

    /// Builds a relay pair-key `"fromAddr-toAddr"`. Direction-specific: the
    /// key for a→b differs from b→a.
    pub fn pair_key(from: &str, to: &str) -> String {
        format!("{}-{}", from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_cmd_type_round_trips_through_json() {
        let cmd = RouteCmd::new(RouteCmdType::RelayJoin, "a:1-b:2");
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"Type\":0"));
        let back: RouteCmd = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, RouteCmdType::RelayJoin);
    }

    #[test]
    fn split_items_drops_empty_segments() {
        let cmd = RouteCmd::new(RouteCmdType::Clients, "a;b;c");
        assert_eq!(cmd.split_items(), vec!["a", "b", "c"]);

        let empty = RouteCmd::new(RouteCmdType::Clients, "");
        assert!(empty.split_items().is_empty());
    }

    #[test]
    fn split_pair_handles_ip_port_addresses() {
        let (from, to) = RouteCmd::split_pair("10.0.0.1:25152-10.0.0.2:25152").unwrap();
        assert_eq!(from, "10.0.0.1:25152");
        assert_eq!(to, "10.0.0.2:25152");
    }

    #[test]
    fn split_pair_rejects_malformed_text() {
        assert!(RouteCmd::split_pair("noseparator").is_err());
    }

    #[test]
    fn pair_key_is_direction_specific() {
        assert_ne!(
            RouteCmd::pair_key("a", "b"),
            RouteCmd::pair_key("b", "a")
        );
    }
}
