use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Performance;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitPerformanceRequest {
    pub participant_id: Uuid,

    /// Reference to the uploaded recording in object storage.
    #[validate(length(min = 1, max = 1024))]
    pub audio_ref: String,

    #[validate(range(min = 1, max = 3600))]
    pub duration_seconds: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RejectPerformanceRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Explicit running order; omit to order approved performances by submission time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PlayOrderRequest {
    pub performance_ids: Option<Vec<Uuid>>,
}

/// Result of moving the live queue one step forward.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvanceOutcome {
    pub finished: Option<Performance>,
    pub now_playing: Option<Performance>,
    pub remaining: usize,
}
