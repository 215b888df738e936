//! Fan-out of committed state changes to spectators.
//!
//! Each competition has one logical channel. Events are emitted after the
//! transaction that caused them has committed; delivery is at-most-once and
//! a failing transport never fails the engine operation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::clock::Clock;
use crate::dto::performance::AdvanceOutcome;
use crate::models::{
    ChatMessage, Competition, CompetitionStatus, Participant, Performance, ReactionCount, VoteTally,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum LiveEventType {
    BroadcastingStarted,
    ParticipantChanged,
    ReactionAdded,
    VoteCast,
    ChatMessage,
    PerformanceAdvanced,
    PerformanceUpdated,
    ScoresUpdated,
    StatusChanged,
}

impl LiveEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BroadcastingStarted => "broadcasting-started",
            Self::ParticipantChanged => "participant-changed",
            Self::ReactionAdded => "reaction-added",
            Self::VoteCast => "vote-cast",
            Self::ChatMessage => "chat-message",
            Self::PerformanceAdvanced => "performance-advanced",
            Self::PerformanceUpdated => "performance-updated",
            Self::ScoresUpdated => "scores-updated",
            Self::StatusChanged => "status-changed",
        }
    }
}

/// Envelope delivered on a competition channel. Consumers must tolerate
/// duplicates and reordering; `timestamp` is the only ordering hint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub event_type: LiveEventType,
    pub competition_id: Uuid,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantChange {
    Registered,
    Removed,
    Confirmed,
    Disqualified,
    PaymentCompleted,
    PaymentRefunded,
    Placed,
}

#[derive(Debug, Error)]
#[error("Publishing {event} on {channel} failed: {reason}")]
pub struct PublishError {
    pub channel: String,
    pub event: String,
    pub reason: String,
}

/// Transport collaborator: any broker able to `publish(channel, event, payload)`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &str, payload: &Value)
    -> Result<(), PublishError>;
}

pub fn channel_for(competition_id: Uuid) -> String {
    format!("competition.{competition_id}")
}

#[derive(Clone)]
pub struct LiveEventBus {
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
}

impl LiveEventBus {
    pub fn new(publisher: Arc<dyn EventPublisher>, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    pub async fn emit(&self, competition_id: Uuid, event_type: LiveEventType, payload: Value) {
        let event = LiveEvent {
            event_type,
            competition_id,
            payload,
            timestamp: self.clock.now(),
        };
        let body = match serde_json::to_value(&event) {
            Ok(body) => body,
            Err(e) => {
                warn!(%competition_id, event = event_type.as_str(), "Cannot encode live event: {}", e);
                return;
            }
        };

        let channel = channel_for(competition_id);
        match self
            .publisher
            .publish(&channel, event_type.as_str(), &body)
            .await
        {
            Ok(()) => debug!(%channel, event = event_type.as_str(), "Live event published"),
            Err(e) => warn!("{}", e),
        }
    }

    pub async fn status_changed(&self, competition: &Competition, from: CompetitionStatus) {
        self.emit(
            competition.competition_id,
            LiveEventType::StatusChanged,
            json!({
                "from": from,
                "to": competition.status,
                "currentParticipants": competition.current_participants,
                "totalPrizePool": competition.total_prize_pool,
            }),
        )
        .await;
    }

    pub async fn participant_changed(&self, participant: &Participant, change: ParticipantChange) {
        self.emit(
            participant.competition_id,
            LiveEventType::ParticipantChanged,
            json!({ "change": change, "participant": participant }),
        )
        .await;
    }

    pub async fn performance_updated(&self, performance: &Performance) {
        self.emit(
            performance.competition_id,
            LiveEventType::PerformanceUpdated,
            json!({ "performance": performance }),
        )
        .await;
    }

    pub async fn performance_advanced(&self, competition_id: Uuid, outcome: &AdvanceOutcome) {
        self.emit(
            competition_id,
            LiveEventType::PerformanceAdvanced,
            json!(outcome),
        )
        .await;
    }

    pub async fn scores_updated(&self, participant: &Participant) {
        self.emit(
            participant.competition_id,
            LiveEventType::ScoresUpdated,
            json!({
                "participantId": participant.participant_id,
                "scores": participant.scores,
                "totalScore": participant.total_score,
            }),
        )
        .await;
    }

    pub async fn reaction_added(
        &self,
        competition_id: Uuid,
        participant_id: Uuid,
        user_id: Uuid,
        reaction_type: &str,
        counts: &[ReactionCount],
    ) {
        self.emit(
            competition_id,
            LiveEventType::ReactionAdded,
            json!({
                "participantId": participant_id,
                "userId": user_id,
                "reactionType": reaction_type,
                "counts": counts,
            }),
        )
        .await;
    }

    pub async fn vote_cast(&self, competition_id: Uuid, user_id: Uuid, tally: &VoteTally) {
        self.emit(
            competition_id,
            LiveEventType::VoteCast,
            json!({ "userId": user_id, "tally": tally }),
        )
        .await;
    }

    pub async fn chat_message(&self, message: &ChatMessage) {
        self.emit(
            message.competition_id,
            LiveEventType::ChatMessage,
            json!({ "message": message }),
        )
        .await;
    }

    pub async fn broadcasting_started(&self, competition: &Competition) {
        self.emit(
            competition.competition_id,
            LiveEventType::BroadcastingStarted,
            json!({ "startedAt": competition.broadcast_started_at }),
        )
        .await;
    }
}

#[cfg(any(test, feature = "testkit"))]
pub use recording::RecordingPublisher;

#[cfg(any(test, feature = "testkit"))]
mod recording {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::{EventPublisher, PublishError};

    /// Keeps every published event; can be switched into a failing transport.
    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<(String, String, Value)>>,
        failing: AtomicBool,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn events(&self) -> Vec<(String, String, Value)> {
            self.events.lock().clone()
        }

        pub fn count(&self, event: &str) -> usize {
            self.events
                .lock()
                .iter()
                .filter(|(_, name, _)| name == event)
                .count()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(
            &self,
            channel: &str,
            event: &str,
            payload: &Value,
        ) -> Result<(), PublishError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PublishError {
                    channel: channel.to_string(),
                    event: event.to_string(),
                    reason: "transport unavailable".to_string(),
                });
            }
            self.events
                .lock()
                .push((channel.to_string(), event.to_string(), payload.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::FixedClock;

    #[tokio::test]
    async fn test_event_envelope_shape() {
        let publisher = Arc::new(RecordingPublisher::new());
        let now = Utc::now();
        let bus = LiveEventBus::new(publisher.clone(), Arc::new(FixedClock::new(now)));
        let competition_id = Uuid::new_v4();

        bus.emit(competition_id, LiveEventType::ChatMessage, json!({ "body": "hi" }))
            .await;

        let events = publisher.events();
        assert_eq!(events.len(), 1);
        let (channel, event, body) = &events[0];
        assert_eq!(channel, &format!("competition.{competition_id}"));
        assert_eq!(event, "chat-message");
        assert_eq!(body["type"], "chat-message");
        assert_eq!(body["competitionId"], competition_id.to_string());
        assert_eq!(body["payload"]["body"], "hi");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.set_failing(true);
        let bus = LiveEventBus::new(publisher.clone(), Arc::new(FixedClock::new(Utc::now())));

        bus.emit(Uuid::new_v4(), LiveEventType::VoteCast, json!({})).await;
        assert!(publisher.events().is_empty());
    }
}
