use axum::{
    Json,
    extract::{Path, Query, State},
};
use storage::dto::payment::{CommissionRateResponse, FailPaymentRequest, ListPaymentsQuery};
use storage::models::Payment;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::middleware::auth::AuthenticatedActor;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/commission",
    responses(
        (status = 200, description = "Platform commission rate in percent", body = CommissionRateResponse)
    ),
    tag = "payments"
)]
pub async fn get_commission_rate(
    State(state): State<AppState>,
) -> ApiResult<Json<CommissionRateResponse>> {
    let rate = state.engine.ledger.commission_rate().await?;

    Ok(Json(CommissionRateResponse { rate }))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(
        ("id" = Uuid, Path, description = "Payment id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payment found", body = Payment),
        (status = 403, description = "Neither the payer nor the organizer"),
        (status = 404, description = "Payment not found")
    ),
    tag = "payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.engine.ledger.find(&actor, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/competitions/{id}/payments",
    params(
        ("id" = Uuid, Path, description = "Competition id"),
        ListPaymentsQuery
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payments of the competition", body = Vec<Payment>),
        (status = 403, description = "Not the organizer")
    ),
    tag = "payments"
)]
pub async fn list_competition_payments(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Query(query): Query<ListPaymentsQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    let payments = state
        .engine
        .ledger
        .list_for_competition(&actor, id, query.status)
        .await?;

    Ok(Json(payments))
}

/// Payment provider callback: the charge went through.
#[utoipa::path(
    post,
    path = "/api/payments/{id}/complete",
    params(
        ("id" = Uuid, Path, description = "Payment id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payment completed; repeated callbacks are no-ops", body = Payment),
        (status = 422, description = "Payment already failed or refunded")
    ),
    tag = "payments"
)]
pub async fn complete_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.engine.ledger.mark_completed(id).await?))
}

/// Payment provider callback: the charge was declined.
#[utoipa::path(
    post,
    path = "/api/payments/{id}/fail",
    params(
        ("id" = Uuid, Path, description = "Payment id")
    ),
    request_body = FailPaymentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payment marked failed", body = Payment),
        (status = 422, description = "Payment is no longer pending")
    ),
    tag = "payments"
)]
pub async fn fail_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FailPaymentRequest>,
) -> ApiResult<Json<Payment>> {
    req.validate()?;

    Ok(Json(state.engine.ledger.mark_failed(id, &req.reason).await?))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/refund",
    params(
        ("id" = Uuid, Path, description = "Payment id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payment refunded", body = Payment),
        (status = 409, description = "Already refunded"),
        (status = 422, description = "Refund window expired or payment not completed")
    ),
    tag = "payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.engine.ledger.refund(&actor, id).await?))
}
