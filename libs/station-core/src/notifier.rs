use async_trait::async_trait;
use signal_types::RouteCmdType;

/// The station's "change handler" upcall (§9's Design Notes): a weak
/// callback into the route-client layer, modeled here as an injected
/// capability rather than a module-level singleton. The station calls
/// `notify` whenever a relay/client/recorder joins or quits, or an
/// already-existing relay is rediscovered; the route-client layer turns
/// that into a `RouteCmd` on its reporting queue.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify(&self, upid: &str, kind: RouteCmdType);
}

/// A notifier that drops every notification. Useful for a station running
/// with no configured route servers, or in isolated tests of
/// station-core's routing logic.
pub struct NullNotifier;

#[async_trait]
impl ChangeNotifier for NullNotifier {
    async fn notify(&self, _upid: &str, _kind: RouteCmdType) {}
}
