use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::LifecycleError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "participant_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Registered,
    Confirmed,
    Disqualified,
    Winner,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Confirmed => "confirmed",
            Self::Disqualified => "disqualified",
            Self::Winner => "winner",
        }
    }

    pub fn can_transition_to(&self, next: ParticipantStatus) -> bool {
        matches!(
            (self, next),
            (Self::Registered, Self::Confirmed)
                | (Self::Registered, Self::Disqualified)
                | (Self::Confirmed, Self::Disqualified)
                | (Self::Confirmed, Self::Winner)
        )
    }

    /// Statuses that take part in the ranking.
    pub fn is_ranked(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Winner)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry-fee state as seen from the participant row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "entry_payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryPaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Participant {
    pub participant_id: Uuid,
    pub competition_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipantStatus,
    pub payment_status: EntryPaymentStatus,
    #[schema(value_type = Object)]
    pub scores: Json<BTreeMap<String, Decimal>>,
    pub total_score: Option<Decimal>,
    pub position: Option<i32>,
    pub prize_amount: Option<Decimal>,
    pub disqualified_reason: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(competition_id: Uuid, user_id: Uuid, paid: bool, now: DateTime<Utc>) -> Self {
        Self {
            participant_id: Uuid::new_v4(),
            competition_id,
            user_id,
            status: ParticipantStatus::Registered,
            payment_status: if paid {
                EntryPaymentStatus::Paid
            } else {
                EntryPaymentStatus::Pending
            },
            scores: Json(BTreeMap::new()),
            total_score: None,
            position: None,
            prize_amount: None,
            disqualified_reason: None,
            registered_at: now,
        }
    }

    pub fn transition_to(&mut self, next: ParticipantStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::invalid_transition(
                "participant",
                self.status,
                next,
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == EntryPaymentStatus::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_participant_payment_status() {
        let now = Utc::now();
        let paid = Participant::new(Uuid::new_v4(), Uuid::new_v4(), true, now);
        assert_eq!(paid.status, ParticipantStatus::Registered);
        assert_eq!(paid.payment_status, EntryPaymentStatus::Paid);

        let pending = Participant::new(Uuid::new_v4(), Uuid::new_v4(), false, now);
        assert_eq!(pending.payment_status, EntryPaymentStatus::Pending);
    }

    #[test]
    fn test_winner_requires_confirmation() {
        let mut participant = Participant::new(Uuid::new_v4(), Uuid::new_v4(), true, Utc::now());
        assert!(participant.transition_to(ParticipantStatus::Winner).is_err());

        participant.transition_to(ParticipantStatus::Confirmed).unwrap();
        participant.transition_to(ParticipantStatus::Winner).unwrap();
        assert!(participant.transition_to(ParticipantStatus::Disqualified).is_err());
    }
}
