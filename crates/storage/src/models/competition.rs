use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::LifecycleError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "competition_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CompetitionStatus {
    Draft,
    Published,
    Active,
    Completed,
    Cancelled,
}

impl CompetitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: CompetitionStatus) -> bool {
        match (self, next) {
            (Self::Draft, Self::Published)
            | (Self::Published, Self::Active)
            | (Self::Active, Self::Completed) => true,
            (from, Self::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Share of the prize pool paid to the participant finishing at `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Prize {
    pub position: i32,
    pub percentage: Decimal,
}

/// Named scoring dimension; weights of a publishable competition sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JudgingCriterion {
    pub name: String,
    pub weight: Decimal,
}

/// Why registration is (or is not) possible right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    NotPublished,
    Full,
    DeadlinePassed,
    AlreadyStarted,
    Open,
}

impl RegistrationStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotPublished => "not_published",
            Self::Full => "full",
            Self::DeadlinePassed => "deadline_passed",
            Self::AlreadyStarted => "already_started",
            Self::Open => "open",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Competition {
    pub competition_id: Uuid,
    pub organizer_id: Uuid,
    pub name: String,
    pub slug: String,
    pub rules: Option<String>,
    pub status: CompetitionStatus,
    pub entry_fee: Decimal,
    pub max_participants: i32,
    pub current_participants: i32,
    pub total_prize_pool: Decimal,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub registration_deadline: Option<DateTime<Utc>>,
    #[schema(value_type = Vec<Prize>)]
    pub prizes: Json<Vec<Prize>>,
    #[schema(value_type = Vec<JudgingCriterion>)]
    pub judging_criteria: Json<Vec<JudgingCriterion>>,
    pub broadcast_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Competition {
    /// Start instant, when both the date and the time of day are known.
    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        Some(self.start_date?.and_time(self.start_time?).and_utc())
    }

    pub fn end_datetime(&self) -> Option<DateTime<Utc>> {
        let minutes = self.duration_minutes?;
        Some(self.start_datetime()? + Duration::minutes(i64::from(minutes)))
    }

    /// Registration gate. An unknown start instant does not close registration.
    pub fn registration_status(&self, now: DateTime<Utc>) -> RegistrationStatus {
        if self.status != CompetitionStatus::Published {
            return RegistrationStatus::NotPublished;
        }
        if self.current_participants >= self.max_participants {
            return RegistrationStatus::Full;
        }
        if let Some(deadline) = self.registration_deadline
            && now > deadline
        {
            return RegistrationStatus::DeadlinePassed;
        }
        if let Some(start) = self.start_datetime()
            && now >= start
        {
            return RegistrationStatus::AlreadyStarted;
        }
        RegistrationStatus::Open
    }

    pub fn can_register(&self, now: DateTime<Utc>) -> bool {
        self.registration_status(now) == RegistrationStatus::Open
    }

    pub fn is_start_due(&self, now: DateTime<Utc>) -> bool {
        self.start_datetime().is_none_or(|start| now >= start)
    }

    pub fn is_end_due(&self, now: DateTime<Utc>) -> bool {
        self.end_datetime().is_some_and(|end| now >= end)
    }

    pub fn recompute_prize_pool(&mut self) {
        self.total_prize_pool = self.entry_fee * Decimal::from(self.current_participants);
    }

    pub fn add_participant(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if self.current_participants >= self.max_participants {
            return Err(LifecycleError::CompetitionFull);
        }
        self.current_participants += 1;
        self.recompute_prize_pool();
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_participant(&mut self, now: DateTime<Utc>) {
        self.current_participants = (self.current_participants - 1).max(0);
        self.recompute_prize_pool();
        self.updated_at = now;
    }

    pub fn transition_to(
        &mut self,
        next: CompetitionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::invalid_transition(
                "competition",
                self.status,
                next,
            ));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Everything a draft must satisfy before it can be published.
    pub fn check_publishable(&self) -> Result<(), LifecycleError> {
        let fail = |reason: &str| Err(LifecycleError::PublishRequirement(reason.to_string()));

        if self.rules.as_deref().is_none_or(|r| r.trim().is_empty()) {
            return fail("rules are required");
        }
        if self.entry_fee < Decimal::ZERO {
            return fail("entry fee cannot be negative");
        }
        if self.max_participants <= 0 {
            return fail("max participants must be positive");
        }
        if self.prizes.is_empty() {
            return fail("at least one prize is required");
        }
        if self.judging_criteria.is_empty() {
            return fail("at least one judging criterion is required");
        }

        let mut positions = HashSet::new();
        let mut percentage_total = Decimal::ZERO;
        for prize in self.prizes.iter() {
            if prize.position < 1 || !positions.insert(prize.position) {
                return fail("prize positions must be unique and start at 1");
            }
            if prize.percentage <= Decimal::ZERO || prize.percentage > Decimal::ONE_HUNDRED {
                return fail("prize percentages must be between 0 and 100");
            }
            percentage_total += prize.percentage;
        }
        if percentage_total > Decimal::ONE_HUNDRED {
            return fail("prize percentages cannot exceed 100 in total");
        }

        let mut names = HashSet::new();
        let mut weight_total = Decimal::ZERO;
        for criterion in self.judging_criteria.iter() {
            if criterion.name.trim().is_empty() || !names.insert(criterion.name.as_str()) {
                return fail("judging criteria names must be unique and non-empty");
            }
            if criterion.weight <= Decimal::ZERO {
                return fail("judging criteria weights must be positive");
            }
            weight_total += criterion.weight;
        }
        if weight_total != Decimal::ONE_HUNDRED {
            return fail("judging criteria weights must sum to 100");
        }

        Ok(())
    }
}
