pub mod config;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::hub::BroadcastHub;

/// Shared application state available to all route handlers.
///
/// The hub is constructed once at startup and passed by handle to the
/// WebSocket endpoint and to every event producer; it is never reachable as
/// ambient global state.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub config: Arc<Config>,
}
