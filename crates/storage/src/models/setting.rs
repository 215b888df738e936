use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub const COMPETITION_COMMISSION_RATE: &str = "competition_commission_rate";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PlatformSetting {
    pub key: String,
    pub value: Decimal,
    pub updated_at: DateTime<Utc>,
}
