#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no station registered at {0}")]
    UnknownStation(String),

    #[error(transparent)]
    MalformedPair(#[from] signal_types::TypesError),

    #[error("no station available to route to")]
    NoStationAvailable,
}
