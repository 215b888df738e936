use axum::{Json, extract::State};
use storage::dto::competition::DueTransitions;
use storage::dto::payment::{CommissionRateResponse, UpdateCommissionRateRequest};
use validator::Validate;

use crate::error::ApiResult;
use crate::middleware::auth::AuthenticatedActor;
use crate::state::AppState;

#[utoipa::path(
    put,
    path = "/api/admin/commission",
    request_body = UpdateCommissionRateRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Commission rate saved", body = CommissionRateResponse),
        (status = 400, description = "Rate outside 0..=100"),
        (status = 403, description = "Admins only")
    ),
    tag = "admin"
)]
pub async fn update_commission_rate(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<UpdateCommissionRateRequest>,
) -> ApiResult<Json<CommissionRateResponse>> {
    req.validate()?;

    let rate = state.engine.commission.update(&actor, req.rate).await?;

    Ok(Json(CommissionRateResponse { rate }))
}

/// Scheduler hook: starts and completes every competition whose time has come.
#[utoipa::path(
    post,
    path = "/api/admin/transitions",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Competitions moved by this sweep", body = DueTransitions)
    ),
    tag = "admin"
)]
pub async fn process_due_transitions(
    State(state): State<AppState>,
) -> ApiResult<Json<DueTransitions>> {
    Ok(Json(state.engine.registry.process_due_transitions().await?))
}
