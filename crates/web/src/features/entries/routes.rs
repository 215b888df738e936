use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use super::handlers::{
    confirm_participant, disqualify_participant, list_participants, register_participant,
    remove_participant,
};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/competitions/:id/participants", post(register_participant))
        .route("/api/participants/:id", delete(remove_participant))
        .route("/api/participants/:id/confirm", post(confirm_participant))
        .route("/api/participants/:id/disqualify", post(disqualify_participant))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/api/competitions/:id/participants", get(list_participants))
        .merge(protected)
}
