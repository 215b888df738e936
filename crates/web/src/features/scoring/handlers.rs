use axum::{
    Json,
    extract::{Path, State},
};
use storage::dto::scoring::{RankingEntry, RecordScoresRequest};
use storage::models::Participant;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::auth::AuthenticatedActor;
use crate::state::AppState;

/// Scores are merged into the participant's existing ones, then the weighted
/// total is recomputed.
#[utoipa::path(
    put,
    path = "/api/participants/{id}/scores",
    params(
        ("id" = Uuid, Path, description = "Participant id")
    ),
    request_body = RecordScoresRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Participant with the new total", body = Participant),
        (status = 400, description = "Unknown criterion or score outside 0..=100"),
        (status = 422, description = "Competition is not live")
    ),
    tag = "scoring"
)]
pub async fn record_scores(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordScoresRequest>,
) -> ApiResult<Json<Participant>> {
    let participant = state
        .engine
        .scoring
        .record_scores(&actor, id, req.scores)
        .await?;

    Ok(Json(participant))
}

#[utoipa::path(
    get,
    path = "/api/competitions/{id}/ranking",
    params(
        ("id" = Uuid, Path, description = "Competition id")
    ),
    responses(
        (status = 200, description = "Live ranking by total score", body = Vec<RankingEntry>),
        (status = 404, description = "Competition not found")
    ),
    tag = "scoring"
)]
pub async fn compute_ranking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RankingEntry>>> {
    Ok(Json(state.engine.scoring.compute_ranking(id).await?))
}
