use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::handlers::{
    complete_payment, fail_payment, get_commission_rate, get_payment, list_competition_payments,
    refund_payment,
};
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/payments/:id", get(get_payment))
        .route("/api/competitions/:id/payments", get(list_competition_payments))
        .route("/api/payments/:id/complete", post(complete_payment))
        .route("/api/payments/:id/fail", post(fail_payment))
        .route("/api/payments/:id/refund", post(refund_payment))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route("/api/commission", get(get_commission_rate))
        .merge(protected)
}
