use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::fmt;
use storage::error::{LifecycleError, StorageError};
use validator::ValidationErrors;

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Lifecycle(LifecycleError),
    Validation(ValidationErrors),
    BadRequest(String),
    Unauthorized(&'static str),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifecycle(e) => write!(f, "Lifecycle error: {}", e),
            Self::Validation(e) => write!(f, "Validation error: {}", e),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Lifecycle(e) => lifecycle_status(e),
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Lifecycle(e) => lifecycle_code(e),
            Self::Validation(_) => "validation_failed",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
        }
    }
}

fn lifecycle_status(error: &LifecycleError) -> StatusCode {
    use LifecycleError::*;

    match error {
        NotFound { .. } | Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
        AlreadyRegistered
        | CompetitionFull
        | Conflict(_)
        | PaymentAlreadyRefunded
        | PlayOrderLocked
        | Storage(StorageError::UniqueViolation(_)) => StatusCode::CONFLICT,
        RegistrationClosed(_)
        | CompetitionClosed(_)
        | NotEditable(_)
        | InvalidTransition { .. }
        | PublishRequirement(_)
        | NotYetDue(_)
        | MissingJudgingCriteria(_)
        | RefundWindowExpired
        | PerformanceNotApproved(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InvalidScoreCriterion(_)
        | InvalidScoreValue { .. }
        | InvalidPlayOrder(_)
        | InvalidVote(_)
        | InvalidInput(_) => StatusCode::BAD_REQUEST,
        Forbidden => StatusCode::FORBIDDEN,
        Storage(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn lifecycle_code(error: &LifecycleError) -> &'static str {
    use LifecycleError::*;

    match error {
        NotFound { .. } | Storage(StorageError::NotFound) => "not_found",
        AlreadyRegistered => "already_registered",
        CompetitionFull => "competition_full",
        Conflict(_) | Storage(StorageError::UniqueViolation(_)) => "conflict",
        RegistrationClosed(_) => "registration_closed",
        CompetitionClosed(_) => "competition_closed",
        NotEditable(_) => "not_editable",
        InvalidTransition { .. } => "invalid_transition",
        PublishRequirement(_) => "publish_requirement",
        NotYetDue(_) => "not_yet_due",
        InvalidScoreCriterion(_) => "invalid_score_criterion",
        InvalidScoreValue { .. } => "invalid_score_value",
        MissingJudgingCriteria(_) => "missing_judging_criteria",
        PaymentAlreadyRefunded => "payment_already_refunded",
        RefundWindowExpired => "refund_window_expired",
        PerformanceNotApproved(_) => "performance_not_approved",
        PlayOrderLocked => "play_order_locked",
        InvalidPlayOrder(_) => "invalid_play_order",
        InvalidVote(_) => "invalid_vote",
        InvalidInput(_) => "invalid_input",
        Forbidden => "forbidden",
        Storage(e) if e.is_transient() => "unavailable",
        Storage(_) => "internal_error",
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status_code = self.status();
        let code = self.code();

        let mut body = match &self {
            Self::Lifecycle(e) if status_code.is_server_error() => {
                tracing::error!("Lifecycle error: {:?}", e);
                json!({
                    "error": if status_code == StatusCode::SERVICE_UNAVAILABLE {
                        "Service temporarily unavailable, please retry"
                    } else {
                        "An internal error occurred"
                    }
                })
            }
            Self::Lifecycle(e) => json!({
                "error": e.to_string()
            }),
            Self::Validation(errors) => {
                let field_errors: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errors)| {
                        errors.iter().map(move |e| {
                            format!(
                                "{}: {}",
                                field,
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            )
                        })
                    })
                    .collect();

                json!({
                    "error": "Validation failed",
                    "details": field_errors
                })
            }
            Self::BadRequest(msg) => json!({
                "error": msg
            }),
            Self::Unauthorized(msg) => {
                tracing::warn!("Rejected request: {}", msg);
                json!({
                    "error": msg
                })
            }
        };

        if let Value::Object(fields) = &mut body {
            fields.insert("code".to_string(), Value::from(code));
            if let Some(status) = match &self {
                Self::Lifecycle(e) => e.status_code(),
                _ => None,
            } {
                fields.insert("status_code".to_string(), Value::from(status));
            }
        }

        (status_code, Json(body)).into_response()
    }
}

impl From<LifecycleError> for WebError {
    fn from(error: LifecycleError) -> Self {
        Self::Lifecycle(error)
    }
}

impl From<StorageError> for WebError {
    fn from(error: StorageError) -> Self {
        Self::Lifecycle(LifecycleError::Storage(error))
    }
}

impl From<ValidationErrors> for WebError {
    fn from(error: ValidationErrors) -> Self {
        Self::Validation(error)
    }
}

pub type ApiResult<T> = Result<T, WebError>;

#[cfg(test)]
mod tests {
    use storage::models::{CompetitionStatus, RegistrationStatus};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (LifecycleError::not_found("competition", Uuid::nil()), StatusCode::NOT_FOUND),
            (LifecycleError::CompetitionFull, StatusCode::CONFLICT),
            (LifecycleError::AlreadyRegistered, StatusCode::CONFLICT),
            (
                LifecycleError::RegistrationClosed(RegistrationStatus::DeadlinePassed),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                LifecycleError::CompetitionClosed(CompetitionStatus::Cancelled),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LifecycleError::RefundWindowExpired, StatusCode::UNPROCESSABLE_ENTITY),
            (LifecycleError::InvalidVote(3), StatusCode::BAD_REQUEST),
            (LifecycleError::Forbidden, StatusCode::FORBIDDEN),
            (
                LifecycleError::Storage(StorageError::UniqueViolation("slug".into())),
                StatusCode::CONFLICT,
            ),
            (LifecycleError::Storage(StorageError::NotFound), StatusCode::NOT_FOUND),
        ];

        for (error, expected) in cases {
            assert_eq!(WebError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_full_competition_code() {
        let error = WebError::from(LifecycleError::CompetitionFull);
        assert_eq!(error.code(), "competition_full");
    }
}
