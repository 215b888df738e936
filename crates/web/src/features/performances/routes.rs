use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use super::handlers::{
    advance_queue, approve_performance, assign_play_order, list_performances,
    reject_performance, submit_performance,
};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/performances", post(submit_performance))
        .route("/api/performances/:id/approve", post(approve_performance))
        .route("/api/performances/:id/reject", post(reject_performance))
        .route("/api/competitions/:id/play-order", put(assign_play_order))
        .route("/api/competitions/:id/advance", post(advance_queue))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/api/competitions/:id/performances", get(list_performances))
        .merge(protected)
}
