/// Errors surfaced by configuration loading.
///
/// Per the taxonomy these are collected as warnings during normal startup
/// (see [`crate::load`]); this type exists for callers that want to treat a
/// specific failure as fatal (e.g. a CLI-only tool validating a config file
/// before deploying it).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("failed to build configuration: {0}")]
    Build(#[from] config_crate::ConfigError),
}
