use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::dto::competition::CompetitionResponse;
use storage::dto::entry::{DisqualifyRequest, RegisterParticipantRequest, Registration};
use storage::models::Participant;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::middleware::auth::AuthenticatedActor;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/competitions/{id}/participants",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Participants in registration order", body = Vec<Participant>),
        (status = 404, description = "Competition not found")
    ),
    tag = "entries"
)]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Participant>>> {
    Ok(Json(state.engine.entries.list_participants(id).await?))
}

/// Registers the calling user. A positive entry fee opens a pending payment
/// unless `fee_paid` already covers it.
#[utoipa::path(
    post,
    path = "/api/competitions/{id}/participants",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    request_body = RegisterParticipantRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Participant registered", body = Registration),
        (status = 409, description = "Already registered or competition full"),
        (status = 422, description = "Registration closed")
    ),
    tag = "entries"
)]
pub async fn register_participant(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<RegisterParticipantRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let registration = state
        .engine
        .entries
        .register_participant(id, actor.user_id, req.fee_paid)
        .await?;

    Ok((StatusCode::CREATED, Json(registration)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/participants/{id}",
    params(
        ("id" = Uuid, Path, description = "Participant id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Entry withdrawn; updated competition counters", body = CompetitionResponse),
        (status = 403, description = "Neither the entrant nor the organizer"),
        (status = 422, description = "Competition already finished")
    ),
    tag = "entries"
)]
pub async fn remove_participant(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CompetitionResponse>> {
    let competition = state.engine.entries.remove_participant(&actor, id).await?;

    Ok(Json(CompetitionResponse::from(competition)))
}

#[utoipa::path(
    post,
    path = "/api/participants/{id}/confirm",
    params(
        ("id" = Uuid, Path, description = "Participant id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Participant confirmed", body = Participant),
        (status = 400, description = "Entry fee not paid")
    ),
    tag = "entries"
)]
pub async fn confirm_participant(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Participant>> {
    Ok(Json(state.engine.entries.confirm_participant(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/participants/{id}/disqualify",
    params(
        ("id" = Uuid, Path, description = "Participant id")
    ),
    request_body = DisqualifyRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Participant disqualified", body = Participant),
        (status = 403, description = "Not the organizer")
    ),
    tag = "entries"
)]
pub async fn disqualify_participant(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<DisqualifyRequest>,
) -> ApiResult<Json<Participant>> {
    req.validate()?;

    let participant = state
        .engine
        .entries
        .disqualify(&actor, id, &req.reason)
        .await?;

    Ok(Json(participant))
}
