use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::LifecycleError;

/// Completed payments can be refunded for this many days after `paid_at`.
pub const REFUND_WINDOW_DAYS: i64 = 30;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Completed, Self::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Money rounding used across the ledger: two decimals, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Platform commission and organizer share of an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub commission_amount: Decimal,
    pub organizer_amount: Decimal,
}

impl CommissionSplit {
    /// `rate` is a percentage (10 means 10%).
    pub fn compute(amount: Decimal, rate: Decimal) -> Self {
        let commission_amount = round_money(amount * rate / Decimal::ONE_HUNDRED);
        Self {
            commission_amount,
            organizer_amount: amount - commission_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub payment_id: Uuid,
    pub competition_id: Uuid,
    pub participant_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub organizer_amount: Decimal,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new_entry(
        competition_id: Uuid,
        participant_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        commission_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        let split = CommissionSplit::compute(amount, commission_rate);
        let payment_id = Uuid::new_v4();
        Self {
            payment_id,
            competition_id,
            participant_id: Some(participant_id),
            user_id,
            amount,
            commission_rate,
            commission_amount: split.commission_amount,
            organizer_amount: split.organizer_amount,
            status: PaymentStatus::Pending,
            transaction_id: format!("ENTRY-{}", payment_id.simple()),
            failure_reason: None,
            paid_at: None,
            refunded_at: None,
            created_at: now,
        }
    }

    fn transition_to(&mut self, next: PaymentStatus) -> Result<(), LifecycleError> {
        if self.status == PaymentStatus::Refunded && next == PaymentStatus::Refunded {
            return Err(LifecycleError::PaymentAlreadyRefunded);
        }
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::invalid_transition("payment", self.status, next));
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition_to(PaymentStatus::Completed)?;
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: &str) -> Result<(), LifecycleError> {
        self.transition_to(PaymentStatus::Failed)?;
        self.failure_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn within_refund_window(&self, now: DateTime<Utc>) -> bool {
        let paid_at = self.paid_at.unwrap_or(self.created_at);
        now - paid_at <= Duration::days(REFUND_WINDOW_DAYS)
    }

    /// Refunds a completed payment. Cancellation refunds pass
    /// `enforce_window = false` since the organizer called off the event.
    pub fn refund(&mut self, now: DateTime<Utc>, enforce_window: bool) -> Result<(), LifecycleError> {
        if self.status == PaymentStatus::Completed
            && enforce_window
            && !self.within_refund_window(now)
        {
            return Err(LifecycleError::RefundWindowExpired);
        }
        self.transition_to(PaymentStatus::Refunded)?;
        self.refunded_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment(amount: Decimal, rate: Decimal) -> Payment {
        Payment::new_entry(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            amount,
            rate,
            Utc::now(),
        )
    }

    #[test]
    fn test_commission_split_rounds_half_up() {
        let split = CommissionSplit::compute(dec!(5000), dec!(10));
        assert_eq!(split.commission_amount, dec!(500.00));
        assert_eq!(split.organizer_amount, dec!(4500.00));

        // 0.125 rounds up to 0.13
        let split = CommissionSplit::compute(dec!(1.25), dec!(10));
        assert_eq!(split.commission_amount, dec!(0.13));
        assert_eq!(split.organizer_amount, dec!(1.12));
    }

    #[test]
    fn test_split_always_sums_to_amount() {
        for (amount, rate) in [(dec!(99.99), dec!(7.5)), (dec!(0.01), dec!(33.33)), (dec!(123), dec!(0))] {
            let split = CommissionSplit::compute(amount, rate);
            assert_eq!(split.commission_amount + split.organizer_amount, amount);
        }
    }

    #[test]
    fn test_transaction_ids_are_distinct() {
        let a = payment(dec!(10), dec!(10));
        let b = payment(dec!(10), dec!(10));
        assert_ne!(a.transaction_id, b.transaction_id);
        assert!(a.transaction_id.starts_with("ENTRY-"));
    }

    #[test]
    fn test_payment_lifecycle() {
        let now = Utc::now();
        let mut p = payment(dec!(50), dec!(10));
        p.mark_completed(now).unwrap();
        assert_eq!(p.paid_at, Some(now));
        assert!(p.mark_failed("late decline").is_err());

        p.refund(now, true).unwrap();
        assert_eq!(p.status, PaymentStatus::Refunded);
        assert!(matches!(
            p.refund(now, true),
            Err(LifecycleError::PaymentAlreadyRefunded)
        ));
    }

    #[test]
    fn test_refund_rejected_for_pending_and_failed() {
        let now = Utc::now();
        let mut pending = payment(dec!(50), dec!(10));
        assert!(matches!(
            pending.refund(now, true),
            Err(LifecycleError::InvalidTransition { .. })
        ));

        let mut failed = payment(dec!(50), dec!(10));
        failed.mark_failed("card declined").unwrap();
        assert!(failed.refund(now, true).is_err());
        assert!(failed.mark_completed(now).is_err());
    }

    #[test]
    fn test_refund_window_boundary() {
        let paid_at = Utc::now();

        let mut exactly = payment(dec!(50), dec!(10));
        exactly.mark_completed(paid_at).unwrap();
        exactly.refund(paid_at + Duration::days(30), true).unwrap();

        let mut late = payment(dec!(50), dec!(10));
        late.mark_completed(paid_at).unwrap();
        assert!(matches!(
            late.refund(paid_at + Duration::days(30) + Duration::seconds(1), true),
            Err(LifecycleError::RefundWindowExpired)
        ));
        assert_eq!(late.status, PaymentStatus::Completed);

        late.refund(paid_at + Duration::days(90), false).unwrap();
        assert_eq!(late.status, PaymentStatus::Refunded);
    }
}
