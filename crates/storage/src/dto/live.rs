use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::ReactionCount;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReactRequest {
    pub participant_id: Uuid,

    #[validate(length(min = 1, max = 32))]
    #[validate(custom(function = "validate_reaction_type"))]
    pub reaction_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub participant_id: Uuid,
    /// 1 or -1.
    pub score: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Message must be between 1 and 500 characters"
    ))]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReactionOutcome {
    /// False when the user had already sent this reaction.
    pub inserted: bool,
    pub counts: Vec<ReactionCount>,
}

fn validate_reaction_type(reaction_type: &str) -> Result<(), validator::ValidationError> {
    if reaction_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_reaction_type"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_type_format() {
        let ok = ReactRequest {
            participant_id: Uuid::new_v4(),
            reaction_type: "fire".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = ReactRequest {
            participant_id: Uuid::new_v4(),
            reaction_type: "🔥 fire".to_string(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_chat_length_limits() {
        assert!(ChatRequest { body: String::new() }.validate().is_err());
        assert!(ChatRequest { body: "x".repeat(500) }.validate().is_ok());
        assert!(ChatRequest { body: "x".repeat(501) }.validate().is_err());
    }
}
