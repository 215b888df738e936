use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One row per (competition, participant, user, reaction type).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reaction {
    pub reaction_id: Uuid,
    pub competition_id: Uuid,
    pub participant_id: Uuid,
    pub user_id: Uuid,
    pub reaction_type: String,
    pub created_at: DateTime<Utc>,
}

/// One vote per (competition, participant, user); score is 1 or -1.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Vote {
    pub vote_id: Uuid,
    pub competition_id: Uuid,
    pub participant_id: Uuid,
    pub user_id: Uuid,
    pub score: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub competition_id: Uuid,
    pub user_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReactionCount {
    pub reaction_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct VoteTally {
    pub participant_id: Uuid,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}
