use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::LifecycleError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "performance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PerformanceStatus {
    Pending,
    Approved,
    Rejected,
    Playing,
    Played,
}

impl PerformanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Playing => "playing",
            Self::Played => "played",
        }
    }

    pub fn can_transition_to(&self, next: PerformanceStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Playing)
                | (Self::Playing, Self::Played)
        )
    }
}

impl fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Performance {
    pub performance_id: Uuid,
    pub competition_id: Uuid,
    pub participant_id: Uuid,
    pub audio_ref: String,
    pub duration_seconds: i32,
    pub status: PerformanceStatus,
    pub play_order: Option<i32>,
    pub rejection_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Performance {
    pub fn new(
        competition_id: Uuid,
        participant_id: Uuid,
        audio_ref: &str,
        duration_seconds: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            performance_id: Uuid::new_v4(),
            competition_id,
            participant_id,
            audio_ref: audio_ref.to_string(),
            duration_seconds,
            status: PerformanceStatus::Pending,
            play_order: None,
            rejection_reason: None,
            recorded_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    /// Once an item has been on stage its position in the queue is fixed.
    pub fn has_started(&self) -> bool {
        matches!(
            self.status,
            PerformanceStatus::Playing | PerformanceStatus::Played
        )
    }

    pub fn transition_to(
        &mut self,
        next: PerformanceStatus,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::invalid_transition(
                "performance",
                self.status,
                next,
            ));
        }
        match next {
            PerformanceStatus::Playing => self.started_at = Some(now),
            PerformanceStatus::Played => self.finished_at = Some(now),
            _ => {}
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_timestamps() {
        let now = Utc::now();
        let mut performance = Performance::new(Uuid::new_v4(), Uuid::new_v4(), "audio/1.mp3", 90, now);
        assert!(performance.transition_to(PerformanceStatus::Playing, now).is_err());

        performance.transition_to(PerformanceStatus::Approved, now).unwrap();
        performance.transition_to(PerformanceStatus::Playing, now).unwrap();
        assert!(performance.has_started());
        assert_eq!(performance.started_at, Some(now));

        performance.transition_to(PerformanceStatus::Played, now).unwrap();
        assert_eq!(performance.finished_at, Some(now));
        assert!(performance.transition_to(PerformanceStatus::Playing, now).is_err());
    }

    #[test]
    fn test_rejected_is_final() {
        let now = Utc::now();
        let mut performance = Performance::new(Uuid::new_v4(), Uuid::new_v4(), "audio/2.mp3", 60, now);
        performance.transition_to(PerformanceStatus::Rejected, now).unwrap();
        assert!(performance.transition_to(PerformanceStatus::Approved, now).is_err());
    }
}
