//! The route server's cluster model: one [`model::StationView`] per
//! connected station, a pure [`planner`] that decides which relays to
//! order, and [`route_server::RouteServer`] which ties them to the
//! station-reported command stream (§4.5).

mod error;
mod model;
mod planner;
mod route_server;

pub use error::RouteError;
pub use model::{RecorderRecord, RelayRecord, StationView};
pub use planner::{audit_trunk_mesh, plan_relay, RelayOrder};
pub use route_server::{Registration, RouteServer, RouteStats};

pub type Result<T> = std::result::Result<T, RouteError>;
