use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    Competition, CompetitionStatus, JudgingCriterion, Prize, RegistrationStatus,
};

/// Request payload for creating a new competition
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCompetitionRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: String,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Slug must be between 1 and 255 characters"
    ))]
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,

    #[validate(length(max = 10000))]
    pub rules: Option<String>,

    #[validate(custom(function = "validate_money"))]
    #[serde(default)]
    pub entry_fee: Decimal,

    #[validate(range(min = 1, max = 10000))]
    pub max_participants: i32,

    pub start_date: Option<NaiveDate>,

    pub start_time: Option<NaiveTime>,

    #[validate(range(min = 1, max = 10080))]
    pub duration_minutes: Option<i32>,

    pub registration_deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    pub prizes: Vec<Prize>,

    #[serde(default)]
    pub judging_criteria: Vec<JudgingCriterion>,
}

/// Request payload for updating a draft competition
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCompetitionRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 255))]
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,

    #[validate(length(max = 10000))]
    pub rules: Option<String>,

    #[validate(custom(function = "validate_money"))]
    pub entry_fee: Option<Decimal>,

    #[validate(range(min = 1, max = 10000))]
    pub max_participants: Option<i32>,

    pub start_date: Option<NaiveDate>,

    pub start_time: Option<NaiveTime>,

    #[validate(range(min = 1, max = 10080))]
    pub duration_minutes: Option<i32>,

    pub registration_deadline: Option<DateTime<Utc>>,

    pub prizes: Option<Vec<Prize>>,

    pub judging_criteria: Option<Vec<JudgingCriterion>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListCompetitionsQuery {
    pub status: Option<CompetitionStatus>,
}

/// Response containing competition details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompetitionResponse {
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
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub prizes: Vec<Prize>,
    pub judging_criteria: Vec<JudgingCriterion>,
    pub broadcast_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationStatusResponse {
    pub competition_id: Uuid,
    pub status: RegistrationStatus,
    pub can_register: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RefundFailure {
    pub payment_id: Uuid,
    pub reason: String,
}

/// Per-payment outcome of the refunds triggered by a cancellation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RefundReport {
    pub refunded: Vec<Uuid>,
    pub failed: Vec<RefundFailure>,
}

impl RefundReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancellationResponse {
    pub competition: CompetitionResponse,
    pub refunds: RefundReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransitionFailure {
    pub competition_id: Uuid,
    pub reason: String,
}

/// What one scheduler tick did.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DueTransitions {
    pub started: Vec<Uuid>,
    pub completed: Vec<Uuid>,
    pub failed: Vec<TransitionFailure>,
}

// Validation helpers
fn validate_slug(slug: &str) -> Result<(), validator::ValidationError> {
    let is_valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--");

    if is_valid {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_slug"))
    }
}

fn validate_money(amount: &Decimal) -> Result<(), validator::ValidationError> {
    if amount.is_sign_negative() || amount.scale() > 2 {
        return Err(validator::ValidationError::new("invalid_amount"));
    }
    Ok(())
}

fn check_schedule(
    start_date: Option<NaiveDate>,
    start_time: Option<NaiveTime>,
    deadline: Option<DateTime<Utc>>,
) -> Result<(), &'static str> {
    if let (Some(date), Some(time), Some(deadline)) = (start_date, start_time, deadline)
        && deadline > date.and_time(time).and_utc()
    {
        return Err("Registration deadline must not be after the start");
    }
    Ok(())
}

impl CreateCompetitionRequest {
    /// Additional validation that requires multiple fields
    pub fn validate_schedule(&self) -> Result<(), &'static str> {
        check_schedule(self.start_date, self.start_time, self.registration_deadline)
    }

    pub fn into_competition(self, organizer_id: Uuid, now: DateTime<Utc>) -> Competition {
        Competition {
            competition_id: Uuid::new_v4(),
            organizer_id,
            name: self.name,
            slug: self.slug,
            rules: self.rules,
            status: CompetitionStatus::Draft,
            entry_fee: self.entry_fee,
            max_participants: self.max_participants,
            current_participants: 0,
            total_prize_pool: Decimal::ZERO,
            start_date: self.start_date,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            registration_deadline: self.registration_deadline,
            prizes: Json(self.prizes),
            judging_criteria: Json(self.judging_criteria),
            broadcast_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl UpdateCompetitionRequest {
    pub fn apply_to(
        self,
        competition: &mut Competition,
        now: DateTime<Utc>,
    ) -> Result<(), &'static str> {
        let start_date = self.start_date.or(competition.start_date);
        let start_time = self.start_time.or(competition.start_time);
        let deadline = self
            .registration_deadline
            .or(competition.registration_deadline);
        check_schedule(start_date, start_time, deadline)?;

        if let Some(name) = self.name {
            competition.name = name;
        }
        if let Some(slug) = self.slug {
            competition.slug = slug;
        }
        if self.rules.is_some() {
            competition.rules = self.rules;
        }
        if let Some(entry_fee) = self.entry_fee {
            competition.entry_fee = entry_fee;
        }
        if let Some(max_participants) = self.max_participants {
            competition.max_participants = max_participants;
        }
        if self.duration_minutes.is_some() {
            competition.duration_minutes = self.duration_minutes;
        }
        if let Some(prizes) = self.prizes {
            competition.prizes = Json(prizes);
        }
        if let Some(criteria) = self.judging_criteria {
            competition.judging_criteria = Json(criteria);
        }
        competition.start_date = start_date;
        competition.start_time = start_time;
        competition.registration_deadline = deadline;
        competition.recompute_prize_pool();
        competition.updated_at = now;
        Ok(())
    }
}

impl From<Competition> for CompetitionResponse {
    fn from(comp: Competition) -> Self {
        Self {
            start_datetime: comp.start_datetime(),
            end_datetime: comp.end_datetime(),
            competition_id: comp.competition_id,
            organizer_id: comp.organizer_id,
            name: comp.name,
            slug: comp.slug,
            rules: comp.rules,
            status: comp.status,
            entry_fee: comp.entry_fee,
            max_participants: comp.max_participants,
            current_participants: comp.current_participants,
            total_prize_pool: comp.total_prize_pool,
            registration_deadline: comp.registration_deadline,
            prizes: comp.prizes.0,
            judging_criteria: comp.judging_criteria.0,
            broadcast_started_at: comp.broadcast_started_at,
            created_at: comp.created_at,
            updated_at: comp.updated_at,
        }
    }
}
