use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::live_events::ParticipantChange;
use super::{
    CommissionRates, EngineContext, ensure_manager, load_competition, lock_competition, lock_payment,
};
use crate::error::LifecycleError;
use crate::models::{
    Actor, CommissionSplit, Competition, CompetitionStatus, EntryPaymentStatus, Participant, Payment,
    PaymentStatus,
};
use crate::repository::LifecycleTx;

/// Entry-fee payments and their commission split.
#[derive(Clone)]
pub struct PaymentLedger {
    ctx: EngineContext,
    rates: Arc<CommissionRates>,
}

impl PaymentLedger {
    pub fn new(ctx: EngineContext, rates: Arc<CommissionRates>) -> Self {
        Self { ctx, rates }
    }

    pub async fn commission_rate(&self) -> Result<Decimal, LifecycleError> {
        self.rates.current().await
    }

    /// Split an amount at the current platform rate.
    pub async fn quote(&self, amount: Decimal) -> Result<CommissionSplit, LifecycleError> {
        if amount.is_sign_negative() {
            return Err(LifecycleError::InvalidInput(
                "Amount cannot be negative".to_string(),
            ));
        }
        let rate = self.rates.current().await?;
        Ok(CommissionSplit::compute(amount, rate))
    }

    /// Visible to the payer and to whoever manages the competition.
    pub async fn find(&self, actor: &Actor, payment_id: Uuid) -> Result<Payment, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let payment = tx
            .find_payment(payment_id)
            .await?
            .ok_or(LifecycleError::not_found("payment", payment_id))?;
        if payment.user_id != actor.user_id {
            let competition = load_competition(tx.as_mut(), payment.competition_id).await?;
            ensure_manager(actor, &competition)?;
        }
        Ok(payment)
    }

    pub async fn list_for_competition(
        &self,
        actor: &Actor,
        competition_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let competition = load_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        Ok(tx.list_payments(competition_id, status).await?)
    }

    /// Settlement callback from the payment gateway. Completing an already
    /// completed payment returns it unchanged.
    pub async fn mark_completed(&self, payment_id: Uuid) -> Result<Payment, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut payment = lock_payment(tx.as_mut(), payment_id).await?;
        if payment.status == PaymentStatus::Completed {
            return Ok(payment);
        }

        payment.mark_completed(now)?;
        tx.update_payment(&payment).await?;
        let participant =
            set_participant_payment(tx.as_mut(), &payment, EntryPaymentStatus::Paid).await?;
        tx.commit().await?;

        info!(payment_id = %payment.payment_id, amount = %payment.amount, "Entry payment completed");
        if let Some(participant) = participant {
            self.ctx
                .events
                .participant_changed(&participant, ParticipantChange::PaymentCompleted)
                .await;
        }
        Ok(payment)
    }

    pub async fn mark_failed(&self, payment_id: Uuid, reason: &str) -> Result<Payment, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let mut payment = lock_payment(tx.as_mut(), payment_id).await?;
        if payment.status == PaymentStatus::Failed {
            return Ok(payment);
        }

        payment.mark_failed(reason)?;
        tx.update_payment(&payment).await?;
        tx.commit().await?;

        info!(payment_id = %payment.payment_id, reason, "Entry payment failed");
        Ok(payment)
    }

    /// Refund requested by the payer or the organizer, inside the refund window.
    pub async fn refund(&self, actor: &Actor, payment_id: Uuid) -> Result<Payment, LifecycleError> {
        self.refund_as(Some(actor), payment_id, true).await
    }

    /// Refund issued by the engine itself, e.g. when a competition is cancelled.
    pub(crate) async fn refund_within(
        &self,
        payment_id: Uuid,
        enforce_window: bool,
    ) -> Result<Payment, LifecycleError> {
        self.refund_as(None, payment_id, enforce_window).await
    }

    async fn refund_as(
        &self,
        actor: Option<&Actor>,
        payment_id: Uuid,
        enforce_window: bool,
    ) -> Result<Payment, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let competition_id = tx
            .find_payment(payment_id)
            .await?
            .ok_or(LifecycleError::not_found("payment", payment_id))?
            .competition_id;
        // competition before payment, the order registration locks in
        let competition = lock_competition(tx.as_mut(), competition_id).await?;
        let mut payment = lock_payment(tx.as_mut(), payment_id).await?;
        if let Some(actor) = actor {
            if payment.user_id != actor.user_id {
                ensure_manager(actor, &competition)?;
            }
            // a confirmed entrant is ranked against the full pool
            if matches!(
                competition.status,
                CompetitionStatus::Active | CompetitionStatus::Completed
            ) {
                return Err(LifecycleError::CompetitionClosed(competition.status));
            }
        }

        payment.refund(now, enforce_window)?;
        tx.update_payment(&payment).await?;
        let participant =
            set_participant_payment(tx.as_mut(), &payment, EntryPaymentStatus::Refunded).await?;
        tx.commit().await?;

        info!(payment_id = %payment.payment_id, amount = %payment.amount, "Entry payment refunded");
        if let Some(participant) = participant {
            self.ctx
                .events
                .participant_changed(&participant, ParticipantChange::PaymentRefunded)
                .await;
        }
        Ok(payment)
    }
}

/// Opens the entry payment of a fresh registration, settled immediately when
/// the fee was collected in full.
pub(crate) async fn open_entry_payment(
    tx: &mut dyn LifecycleTx,
    competition: &Competition,
    participant: &Participant,
    rate: Decimal,
    now: DateTime<Utc>,
) -> Result<Payment, LifecycleError> {
    let mut payment = Payment::new_entry(
        competition.competition_id,
        participant.participant_id,
        participant.user_id,
        competition.entry_fee,
        rate,
        now,
    );
    if participant.is_paid() {
        payment.mark_completed(now)?;
    }
    tx.insert_payment(&payment).await?;
    Ok(payment)
}

async fn set_participant_payment(
    tx: &mut dyn LifecycleTx,
    payment: &Payment,
    status: EntryPaymentStatus,
) -> Result<Option<Participant>, LifecycleError> {
    // the participant may have been removed since
    let Some(participant_id) = payment.participant_id else {
        return Ok(None);
    };
    let Some(mut participant) = tx.find_participant(participant_id).await? else {
        return Ok(None);
    };
    participant.payment_status = status;
    tx.update_participant(&participant).await?;
    Ok(Some(participant))
}
