use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Signal kind. Numeric values are part of the wire contract and must never
/// be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalType {
    #[default]
    Blank = 0,
    Signal = 1,
    PJoin = 2,
    PQuit = 3,
    Cmd = 4,
    Error = 5,
}

impl SignalType {
    pub fn from_i32(v: i32) -> Result<Self, crate::TypesError> {
        Ok(match v {
            0 => SignalType::Blank,
            1 => SignalType::Signal,
            2 => SignalType::PJoin,
            3 => SignalType::PQuit,
            4 => SignalType::Cmd,
            5 => SignalType::Error,
            other => return Err(crate::TypesError::UnknownSignalType(other)),
        })
    }
}

impl Serialize for SignalType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for SignalType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i32::deserialize(deserializer)?;
        SignalType::from_i32(v).map_err(serde::de::Error::custom)
    }
}

/// A single unit of information exchanged between a participant and its
/// channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub pid: String,
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub text: String,
}

impl Signal {
    pub fn new(id: impl Into<String>, pid: impl Into<String>, kind: SignalType, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pid: pid.into(),
            kind,
            text: text.into(),
        }
    }

    pub fn error(pid: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(crate::new_signal_id(), pid, SignalType::Error, text)
    }
}

/// The inter-station envelope wrapping a `Signal` as it crosses relay links.
///
/// `stations` is append-only: every hop appends its own address before
/// forwarding, which is both the loop-suppression list and the propagation
/// trail used by scenario tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalPack {
    pub signal: Signal,
    pub cid: String,
    pub time: i64,
    #[serde(default)]
    pub stations: Vec<String>,
}

impl SignalPack {
    /// A pack freshly originated at this station (no prior hops).
    pub fn originate(signal: Signal, cid: impl Into<String>, time: i64) -> Self {
        Self {
            signal,
            cid: cid.into(),
            time,
            stations: Vec::new(),
        }
    }

    /// True if `addr` is already present in the propagation trail.
    pub fn has_visited(&self, addr: &str) -> bool {
        self.stations.iter().any(|s| s == addr)
    }

    /// Appends `addr` to the propagation trail.
    pub fn visit(&mut self, addr: impl Into<String>) {
        self.stations.push(addr.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_type_round_trips_through_json() {
        let s = Signal::new("id1", "pid1", SignalType::PJoin, "2");
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"type\":2"));
        let back: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, SignalType::PJoin);
        assert_eq!(back.text, "2");
    }

    #[test]
    fn pack_visit_is_append_only_and_tracks_membership() {
        let mut pack = SignalPack::originate(Signal::default(), "X", 0);
        assert!(!pack.has_visited("10.0.0.1:25152"));
        pack.visit("10.0.0.1:25152");
        pack.visit("10.0.0.2:25152");
        assert_eq!(pack.stations, vec!["10.0.0.1:25152", "10.0.0.2:25152"]);
        assert!(pack.has_visited("10.0.0.1:25152"));
    }
}
