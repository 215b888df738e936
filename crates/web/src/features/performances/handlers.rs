use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::dto::performance::{
    AdvanceOutcome, PlayOrderRequest, RejectPerformanceRequest, SubmitPerformanceRequest,
};
use storage::models::Performance;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::middleware::auth::AuthenticatedActor;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/competitions/{id}/performances",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Performances in play order", body = Vec<Performance>)
    ),
    tag = "performances"
)]
pub async fn list_performances(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Performance>>> {
    Ok(Json(state.engine.performances.list(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/performances",
    request_body = SubmitPerformanceRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Performance submitted for review", body = Performance),
        (status = 403, description = "Not the entrant"),
        (status = 422, description = "Competition not accepting submissions")
    ),
    tag = "performances"
)]
pub async fn submit_performance(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<SubmitPerformanceRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let performance = state
        .engine
        .performances
        .submit(&actor, req.participant_id, &req.audio_ref, req.duration_seconds)
        .await?;

    Ok((StatusCode::CREATED, Json(performance)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/performances/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Performance id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Performance approved", body = Performance),
        (status = 422, description = "Performance is not pending")
    ),
    tag = "performances"
)]
pub async fn approve_performance(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Performance>> {
    Ok(Json(state.engine.performances.approve(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/performances/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Performance id")
    ),
    request_body = RejectPerformanceRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Performance rejected", body = Performance),
        (status = 422, description = "Performance is not pending")
    ),
    tag = "performances"
)]
pub async fn reject_performance(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectPerformanceRequest>,
) -> ApiResult<Json<Performance>> {
    req.validate()?;

    let performance = state
        .engine
        .performances
        .reject(&actor, id, &req.reason)
        .await?;

    Ok(Json(performance))
}

#[utoipa::path(
    put,
    path = "/api/competitions/{id}/play-order",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    request_body = PlayOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Approved performances in their new order", body = Vec<Performance>),
        (status = 400, description = "Order does not cover the approved performances"),
        (status = 409, description = "Playback already started")
    ),
    tag = "performances"
)]
pub async fn assign_play_order(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<PlayOrderRequest>,
) -> ApiResult<Json<Vec<Performance>>> {
    let ordered = state
        .engine
        .performances
        .assign_play_order(&actor, id, req.performance_ids)
        .await?;

    Ok(Json(ordered))
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/advance",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Finished and now playing performances", body = AdvanceOutcome),
        (status = 422, description = "Competition is not live")
    ),
    tag = "performances"
)]
pub async fn advance_queue(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AdvanceOutcome>> {
    Ok(Json(state.engine.performances.advance(&actor, id).await?))
}
