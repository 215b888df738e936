use storage::services::Lifecycle;

use crate::features::live::broadcaster::LiveBroadcaster;

/// Shared handler state: the engine and the live transport it publishes to.
#[derive(Clone)]
pub struct AppState {
    pub engine: Lifecycle,
    pub broadcaster: LiveBroadcaster,
}
