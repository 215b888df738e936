use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{
    cancel_competition, complete_competition, create_competition, delete_competition,
    get_competition, list_competitions, publish_competition, registration_status, standings,
    start_competition, update_competition,
};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/competitions", post(create_competition))
        .route(
            "/api/competitions/:id",
            axum::routing::put(update_competition).delete(delete_competition),
        )
        .route("/api/competitions/:id/publish", post(publish_competition))
        .route("/api/competitions/:id/start", post(start_competition))
        .route("/api/competitions/:id/complete", post(complete_competition))
        .route("/api/competitions/:id/cancel", post(cancel_competition))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/api/competitions", get(list_competitions))
        .route("/api/competitions/:id", get(get_competition))
        .route("/api/competitions/:id/registration", get(registration_status))
        .route("/api/competitions/:id/standings", get(standings))
        .merge(protected)
}
