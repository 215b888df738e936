use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ParticipantStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RecordScoresRequest {
    /// Judging criterion name to score in 0..=100.
    #[schema(value_type = Object)]
    pub scores: BTreeMap<String, Decimal>,
}

/// One row of the leaderboard. `prize_amount` is what the position pays out
/// (projected while the competition is running, final once completed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RankingEntry {
    pub position: i32,
    pub participant_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipantStatus,
    pub total_score: Decimal,
    pub prize_amount: Option<Decimal>,
}

/// A completed competition together with its final standings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompetitionResults {
    pub competition: super::competition::CompetitionResponse,
    pub standings: Vec<RankingEntry>,
}
