use axum::{
    Router, middleware,
    routing::{post, put},
};

use super::handlers::{process_due_transitions, update_commission_rate};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    Router::new()
        .route("/api/admin/commission", put(update_commission_rate))
        .route("/api/admin/transitions", post(process_due_transitions))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth))
}
