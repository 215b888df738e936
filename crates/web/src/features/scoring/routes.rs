use axum::{
    Router, middleware,
    routing::{get, put},
};

use super::handlers::{compute_ranking, record_scores};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/participants/:id/scores", put(record_scores))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/api/competitions/:id/ranking", get(compute_ranking))
        .merge(protected)
}
