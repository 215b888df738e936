use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{chat, react, start_broadcast, subscribe, vote};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/competitions/:id/reactions", post(react))
        .route("/api/competitions/:id/votes", post(vote))
        .route("/api/competitions/:id/chat", post(chat))
        .route("/api/competitions/:id/broadcast", post(start_broadcast))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/api/competitions/:id/live", get(subscribe))
        .merge(protected)
}
