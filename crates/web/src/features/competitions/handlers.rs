use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::dto::competition::{
    CancellationResponse, CompetitionResponse, CreateCompetitionRequest, ListCompetitionsQuery,
    RegistrationStatusResponse, UpdateCompetitionRequest,
};
use storage::dto::scoring::{CompetitionResults, RankingEntry};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiResult, WebError};
use crate::middleware::auth::AuthenticatedActor;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/competitions",
    params(ListCompetitionsQuery),
    responses(
        (status = 200, description = "Competitions, newest first", body = Vec<CompetitionResponse>)
    ),
    tag = "competitions"
)]
pub async fn list_competitions(
    State(state): State<AppState>,
    Query(query): Query<ListCompetitionsQuery>,
) -> ApiResult<Json<Vec<CompetitionResponse>>> {
    let competitions = state.engine.registry.list(query.status).await?;

    let response: Vec<CompetitionResponse> = competitions
        .into_iter()
        .map(CompetitionResponse::from)
        .collect();

    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/competitions/{id}",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Competition found", body = CompetitionResponse),
        (status = 404, description = "Competition not found")
    ),
    tag = "competitions"
)]
pub async fn get_competition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CompetitionResponse>> {
    let competition = state.engine.registry.get(id).await?;

    Ok(Json(CompetitionResponse::from(competition)))
}

#[utoipa::path(
    get,
    path = "/api/competitions/{id}/registration",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Whether registration is currently open", body = RegistrationStatusResponse),
        (status = 404, description = "Competition not found")
    ),
    tag = "competitions"
)]
pub async fn registration_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RegistrationStatusResponse>> {
    Ok(Json(state.engine.registry.registration_status(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/competitions/{id}/standings",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Current or final standings", body = Vec<RankingEntry>),
        (status = 404, description = "Competition not found")
    ),
    tag = "competitions"
)]
pub async fn standings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RankingEntry>>> {
    Ok(Json(state.engine.registry.standings(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/competitions",
    request_body = CreateCompetitionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Competition created as draft", body = CompetitionResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Slug already exists")
    ),
    tag = "competitions"
)]
pub async fn create_competition(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<CreateCompetitionRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    req.validate_schedule()
        .map_err(|e| WebError::BadRequest(e.to_string()))?;

    let competition = state.engine.registry.create(&actor, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(CompetitionResponse::from(competition)),
    )
        .into_response())
}

#[utoipa::path(
    put,
    path = "/api/competitions/{id}",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    request_body = UpdateCompetitionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Competition updated", body = CompetitionResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the organizer"),
        (status = 404, description = "Competition not found"),
        (status = 409, description = "Slug already exists"),
        (status = 422, description = "Competition is no longer a draft")
    ),
    tag = "competitions"
)]
pub async fn update_competition(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(update_req): Json<UpdateCompetitionRequest>,
) -> ApiResult<Json<CompetitionResponse>> {
    update_req.validate()?;

    let updated = state.engine.registry.update(&actor, id, update_req).await?;

    Ok(Json(CompetitionResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/competitions/{id}",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 204, description = "Competition deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Competition not found"),
        (status = 422, description = "Competition is published or live")
    ),
    tag = "competitions"
)]
pub async fn delete_competition(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.registry.delete(&actor, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/publish",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Competition opened for registration", body = CompetitionResponse),
        (status = 422, description = "Competition is incomplete or not a draft")
    ),
    tag = "competitions"
)]
pub async fn publish_competition(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CompetitionResponse>> {
    let competition = state.engine.registry.publish(&actor, id).await?;

    Ok(Json(CompetitionResponse::from(competition)))
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/start",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Competition is live", body = CompetitionResponse),
        (status = 422, description = "Not published or not yet due")
    ),
    tag = "competitions"
)]
pub async fn start_competition(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CompetitionResponse>> {
    let competition = state.engine.registry.start(&actor, id).await?;

    Ok(Json(CompetitionResponse::from(competition)))
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/complete",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Final standings with prizes", body = CompetitionResults),
        (status = 422, description = "Competition is not live")
    ),
    tag = "competitions"
)]
pub async fn complete_competition(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CompetitionResults>> {
    Ok(Json(state.engine.registry.complete(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Competition cancelled with the refund report", body = CancellationResponse),
        (status = 422, description = "Competition already completed")
    ),
    tag = "competitions"
)]
pub async fn cancel_competition(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancellationResponse>> {
    let cancellation = state.engine.registry.cancel(&actor, id).await?;
    if !cancellation.refunds.is_complete() {
        tracing::warn!(
            competition_id = %id,
            failed = cancellation.refunds.failed.len(),
            "Cancellation left refunds pending"
        );
    }

    Ok(Json(cancellation))
}
