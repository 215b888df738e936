use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::Stream;
use storage::dto::competition::CompetitionResponse;
use storage::dto::live::{ChatRequest, ReactRequest, ReactionOutcome, VoteRequest};
use storage::models::{ChatMessage, VoteTally};
use storage::services::LiveEvent;
use storage::services::live_events::channel_for;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::middleware::auth::AuthenticatedActor;
use crate::state::AppState;

/// Server-sent events for one competition. Each frame is named after the
/// event type and carries the JSON envelope.
#[utoipa::path(
    get,
    path = "/api/competitions/{id}/live",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = LiveEvent),
        (status = 404, description = "Competition not found")
    ),
    tag = "live"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.engine.registry.get(id).await?;

    tracing::info!(
        competition_id = %id,
        "Live subscriber connected, total subscribers: {}",
        state.broadcaster.subscriber_count() + 1
    );

    Ok(Sse::new(state.broadcaster.subscribe(channel_for(id))).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/reactions",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    request_body = ReactRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Reaction recorded", body = ReactionOutcome),
        (status = 200, description = "Duplicate reaction ignored", body = ReactionOutcome),
        (status = 422, description = "Competition is not live")
    ),
    tag = "live"
)]
pub async fn react(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<ReactRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let outcome = state
        .engine
        .spectators
        .react(id, req.participant_id, actor.user_id, &req.reaction_type)
        .await?;
    let status = if outcome.inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/votes",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    request_body = VoteRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Updated tally for the participant", body = VoteTally),
        (status = 400, description = "Score must be 1 or -1"),
        (status = 422, description = "Competition is not live")
    ),
    tag = "live"
)]
pub async fn vote(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<Json<VoteTally>> {
    let tally = state
        .engine
        .spectators
        .vote(id, req.participant_id, actor.user_id, req.score)
        .await?;

    Ok(Json(tally))
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/chat",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    request_body = ChatRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Message posted", body = ChatMessage),
        (status = 422, description = "Competition is not live")
    ),
    tag = "live"
)]
pub async fn chat(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let message = state
        .engine
        .spectators
        .chat(id, actor.user_id, &req.body)
        .await?;

    Ok((StatusCode::CREATED, Json(message)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/competitions/{id}/broadcast",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Broadcast started", body = CompetitionResponse),
        (status = 403, description = "Not the organizer")
    ),
    tag = "live"
)]
pub async fn start_broadcast(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CompetitionResponse>> {
    let competition = state.engine.spectators.start_broadcast(&actor, id).await?;

    Ok(Json(CompetitionResponse::from(competition)))
}
