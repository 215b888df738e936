use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CompetitionStatus, RegistrationStatus};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StorageError::UniqueViolation(_) => true,
            StorageError::Database(sqlx::Error::Database(e)) => e.code().as_deref() == Some("23505"),
            _ => false,
        }
    }

    /// Connection loss, pool exhaustion, serialization failures and deadlocks.
    /// The caller may retry the whole operation.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Database(sqlx::Error::Io(_))
            | StorageError::Database(sqlx::Error::PoolTimedOut)
            | StorageError::Database(sqlx::Error::PoolClosed) => true,
            StorageError::Database(sqlx::Error::Database(e)) => {
                matches!(e.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Outcome of a lifecycle operation that was rejected by a domain rule or
/// failed in the store.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("User is already registered for this competition")]
    AlreadyRegistered,

    #[error("Competition is full")]
    CompetitionFull,

    #[error("Registration is closed ({})", .0.code())]
    RegistrationClosed(RegistrationStatus),

    #[error("Competition is {0}")]
    CompetitionClosed(CompetitionStatus),

    #[error("Competition can only be edited while draft (is {0})")]
    NotEditable(CompetitionStatus),

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Competition cannot be published: {0}")]
    PublishRequirement(String),

    #[error("Competition is not due before {0}")]
    NotYetDue(DateTime<Utc>),

    #[error("Unknown judging criterion: {0}")]
    InvalidScoreCriterion(String),

    #[error("Score {value} for {criterion} must be between 0 and 100")]
    InvalidScoreValue { criterion: String, value: Decimal },

    #[error("Competition {0} has no judging criteria")]
    MissingJudgingCriteria(Uuid),

    #[error("Payment has already been refunded")]
    PaymentAlreadyRefunded,

    #[error("Refund window has expired")]
    RefundWindowExpired,

    #[error("Performance {0} is not approved")]
    PerformanceNotApproved(Uuid),

    #[error("Play order cannot change once playback has started")]
    PlayOrderLocked,

    #[error("Invalid play order: {0}")]
    InvalidPlayOrder(String),

    #[error("Vote score must be 1 or -1, got {0}")]
    InvalidVote(i16),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not allowed to perform this action")]
    Forbidden,
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Registration outcome code shown to users, mirroring `can_register`.
    pub fn status_code(&self) -> Option<&'static str> {
        match self {
            Self::CompetitionFull => Some(RegistrationStatus::Full.code()),
            Self::RegistrationClosed(status) => Some(status.code()),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mirrors_registration_status() {
        assert_eq!(LifecycleError::CompetitionFull.status_code(), Some("full"));
        assert_eq!(
            LifecycleError::RegistrationClosed(RegistrationStatus::DeadlinePassed).status_code(),
            Some("deadline_passed")
        );
        assert_eq!(LifecycleError::AlreadyRegistered.status_code(), None);
    }

    #[test]
    fn test_unique_violation_detection() {
        let err = StorageError::UniqueViolation("participants_competition_id_user_id_key".into());
        assert!(err.is_unique_violation());
        assert!(!StorageError::NotFound.is_unique_violation());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = LifecycleError::from(StorageError::Database(sqlx::Error::PoolTimedOut));
        assert!(err.is_transient());
        assert!(!LifecycleError::Forbidden.is_transient());
    }
}
