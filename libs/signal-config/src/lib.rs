//! Configuration loading for the signal mesh's station, route and recorder
//! processes.
//!
//! Layering mirrors the teacher's `config-crate`-based service config:
//! built-in defaults, an optional TOML file, `SIGNAL_`-prefixed environment
//! variable overrides, then CLI flags applied on top by the caller.

mod cli;
mod error;
mod model;

pub use cli::ConfigArgs;
pub use error::ConfigError;
pub use model::Config;

use config_crate::{Config as RawConfig, Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Expands a leading `~` (and any `$VAR`/`${VAR}` references) in a
/// user-supplied config path, matching the teacher's config crate's
/// tilde-expansion convention. Paths that aren't valid UTF-8 are passed
/// through unexpanded rather than rejected.
fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::full(s).map(|expanded| expanded.into_owned()).unwrap_or_else(|_| s.to_string())),
        None => path.to_path_buf(),
    }
}

/// Loads a [`Config`], applying (in increasing priority) built-in defaults,
/// an optional TOML file, and `SIGNAL_`-prefixed environment variables.
///
/// Configuration errors (unreadable file, malformed entries) are collected
/// into the returned warning list rather than aborting: startup continues
/// with defaults for anything that failed to parse.
pub fn load(file_path: Option<&Path>) -> (Config, Vec<String>) {
    let mut warnings = Vec::new();
    let mut builder = RawConfig::builder().add_source(
        RawConfig::try_from(&Config::default()).unwrap_or_else(|e| {
            warnings.push(format!("failed to seed defaults: {e}"));
            RawConfig::builder().build().expect("empty config builds")
        }),
    );

    if let Some(path) = file_path {
        let path = expand_path(path);
        if path.exists() {
            info!(path = %path.display(), "loading config file");
            builder = builder.add_source(File::from(path).required(false));
        } else {
            warnings.push(format!("config file not found: {}", path.display()));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("SIGNAL")
            .separator("_")
            .try_parsing(true),
    );

    match builder.build() {
        Ok(raw) => match raw.try_deserialize::<Config>() {
            Ok(cfg) => (cfg, warnings),
            Err(e) => {
                warnings.push(format!("failed to deserialize config: {e}"));
                (Config::default(), warnings)
            }
        },
        Err(e) => {
            warnings.push(format!("failed to build config: {e}"));
            (Config::default(), warnings)
        }
    }
}

/// Applies CLI overrides on top of an already-loaded [`Config`], logging
/// each warning collected during file/env loading.
pub fn load_with_cli(file_path: Option<&Path>, args: &ConfigArgs) -> Config {
    let (mut cfg, warnings) = load(file_path);
    for warning in &warnings {
        warn!("{warning}");
    }
    args.apply_to(&mut cfg);
    debug!(?cfg, "effective configuration");
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_overrides_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("create temp config file");
        writeln!(file, "service_port = 9001\nservice_sid = \"test-sid\"").unwrap();

        let (cfg, warnings) = load(Some(file.path()));
        assert!(warnings.is_empty());
        assert_eq!(cfg.service_port, 9001);
        assert_eq!(cfg.service_sid, "test-sid");
    }

    #[test]
    fn missing_file_falls_back_to_defaults_with_a_warning() {
        let missing = std::path::Path::new("/nonexistent/signal-mesh-config.toml");
        let (cfg, warnings) = load(Some(missing));
        assert_eq!(cfg.service_port, Config::default().service_port);
        assert_eq!(warnings.len(), 1);
    }
}
