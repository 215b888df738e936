use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Participant, Payment};

/// Request payload for entering a competition as the authenticated user
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterParticipantRequest {
    /// Amount already collected for the entry fee.
    #[validate(custom(function = "validate_fee_paid"))]
    #[serde(default)]
    pub fee_paid: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DisqualifyRequest {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Reason must be between 1 and 500 characters"
    ))]
    pub reason: String,
}

/// A successful registration and the entry payment it opened, if the
/// competition charges a fee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Registration {
    pub participant: Participant,
    pub payment: Option<Payment>,
}

fn validate_fee_paid(amount: &Decimal) -> Result<(), validator::ValidationError> {
    if amount.is_sign_negative() {
        return Err(validator::ValidationError::new("negative_amount"));
    }
    Ok(())
}
