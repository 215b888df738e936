use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::PaymentStatus;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListPaymentsQuery {
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct FailPaymentRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCommissionRateRequest {
    /// Percentage, 10 means 10%.
    #[validate(custom(function = "validate_rate"))]
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommissionRateResponse {
    pub rate: Decimal,
}

fn validate_rate(rate: &Decimal) -> Result<(), validator::ValidationError> {
    if *rate < Decimal::ZERO || *rate > Decimal::ONE_HUNDRED {
        return Err(validator::ValidationError::new("rate_out_of_range"));
    }
    Ok(())
}
