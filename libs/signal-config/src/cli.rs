use crate::model::Config;
use clap::Parser;
use signal_types::{ServiceMode, StationMode};
use std::path::PathBuf;

/// CLI flags mirroring [`Config`]'s fields; anything left unset keeps
/// whatever the file/environment layers already produced.
#[derive(Debug, Parser, Default)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated service mode bits: station, route, recorder.
    #[arg(long = "service-mode")]
    pub service_mode: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long = "publish-ip")]
    pub publish_ip: Option<String>,

    #[arg(long = "publish-port")]
    pub publish_port: Option<u16>,

    /// Comma-separated station mode bits: trunk, branch, leaf.
    #[arg(long = "station-mode")]
    pub station_mode: Option<String>,

    /// Repeatable; one route server address per flag occurrence.
    #[arg(long = "route-server")]
    pub route_servers: Vec<String>,

    /// Repeatable; one recorder address per flag occurrence.
    #[arg(long = "recorder")]
    pub recorders: Vec<String>,

    #[arg(long)]
    pub sid: Option<String>,

    /// Repeatable `raw=public` NAT table entry.
    #[arg(long = "nat")]
    pub nats: Vec<String>,
}

impl ConfigArgs {
    pub fn apply_to(&self, cfg: &mut Config) {
        if let Some(ref modes) = self.service_mode {
            cfg.service_mode = ServiceMode::parse(modes);
        }
        if let Some(port) = self.port {
            cfg.service_port = port;
        }
        if let Some(ref ip) = self.publish_ip {
            cfg.publish_ip = ip.clone();
        }
        if let Some(port) = self.publish_port {
            cfg.publish_port = port;
        }
        if let Some(ref modes) = self.station_mode {
            cfg.station_mode = StationMode::parse(modes);
        }
        if !self.route_servers.is_empty() {
            cfg.route_servers = self.route_servers.clone();
        }
        if !self.recorders.is_empty() {
            cfg.recorders = self.recorders.clone();
        }
        if let Some(ref sid) = self.sid {
            cfg.service_sid = sid.clone();
        }
        for entry in &self.nats {
            if let Some((raw, public)) = entry.split_once('=') {
                cfg.nats.insert(raw.to_string(), public.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flags_leave_defaults_untouched() {
        let args = ConfigArgs::default();
        let mut cfg = Config::default();
        let before = cfg.service_port;
        args.apply_to(&mut cfg);
        assert_eq!(cfg.service_port, before);
    }

    #[test]
    fn nat_flag_parses_raw_equals_public() {
        let args = ConfigArgs {
            nats: vec!["10.0.0.1:25152=203.0.113.9:25152".to_string()],
            ..Default::default()
        };
        let mut cfg = Config::default();
        args.apply_to(&mut cfg);
        assert_eq!(
            cfg.nats.get("10.0.0.1:25152").map(String::as_str),
            Some("203.0.113.9:25152")
        );
    }
}
