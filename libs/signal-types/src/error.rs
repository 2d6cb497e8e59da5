/// Errors raised while parsing or validating wire types.
///
/// Kept deliberately small: this crate has no I/O, so the only failures are
/// malformed wire data.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("malformed pair identifier: {0}")]
    MalformedPair(String),

    #[error("unknown signal type: {0}")]
    UnknownSignalType(i32),

    #[error("unknown route command type: {0}")]
    UnknownRouteCmdType(i32),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
