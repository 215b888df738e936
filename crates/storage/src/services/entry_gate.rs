use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::ledger::open_entry_payment;
use super::live_events::ParticipantChange;
use super::{
    CommissionRates, EngineContext, ensure_manager, ensure_open, load_participant,
    lock_competition, performance_queue,
};
use crate::dto::entry::Registration;
use crate::error::LifecycleError;
use crate::models::{Actor, Competition, Participant, ParticipantStatus, RegistrationStatus};

/// Registration gate: capacity, deadline and entry fee.
#[derive(Clone)]
pub struct EntryGate {
    ctx: EngineContext,
    rates: Arc<CommissionRates>,
}

impl EntryGate {
    pub fn new(ctx: EngineContext, rates: Arc<CommissionRates>) -> Self {
        Self { ctx, rates }
    }

    /// Registers `user_id` under the competition row lock, so concurrent
    /// attempts for the last slot are serialized.
    pub async fn register_participant(
        &self,
        competition_id: Uuid,
        user_id: Uuid,
        fee_paid: Decimal,
    ) -> Result<Registration, LifecycleError> {
        if fee_paid.is_sign_negative() {
            return Err(LifecycleError::InvalidInput(
                "Paid amount cannot be negative".to_string(),
            ));
        }
        // resolved before the transaction; the lookup may open its own
        let rate = self.rates.current().await?;
        let now = self.ctx.now();

        let mut tx = self.ctx.begin().await?;
        let mut competition = lock_competition(tx.as_mut(), competition_id).await?;
        match competition.registration_status(now) {
            RegistrationStatus::Open => {}
            RegistrationStatus::Full => return Err(LifecycleError::CompetitionFull),
            status => return Err(LifecycleError::RegistrationClosed(status)),
        }

        let paid = fee_paid >= competition.entry_fee;
        let participant = Participant::new(competition_id, user_id, paid, now);
        if let Err(e) = tx.insert_participant(&participant).await {
            if e.is_unique_violation() {
                return Err(LifecycleError::AlreadyRegistered);
            }
            return Err(e.into());
        }

        competition.add_participant(now)?;
        tx.update_competition(&competition).await?;

        let payment = if competition.entry_fee > Decimal::ZERO {
            Some(open_entry_payment(tx.as_mut(), &competition, &participant, rate, now).await?)
        } else {
            None
        };
        tx.commit().await?;

        info!(
            %competition_id,
            %user_id,
            participants = competition.current_participants,
            prize_pool = %competition.total_prize_pool,
            "Participant registered"
        );
        self.ctx
            .events
            .participant_changed(&participant, ParticipantChange::Registered)
            .await;

        Ok(Registration {
            participant,
            payment,
        })
    }

    /// Withdraws a participant (themselves, or by the organizer). The entry
    /// payment stays on the ledger with its participant link cleared.
    pub async fn remove_participant(
        &self,
        actor: &Actor,
        participant_id: Uuid,
    ) -> Result<Competition, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let participant = load_participant(tx.as_mut(), participant_id).await?;
        let mut competition = lock_competition(tx.as_mut(), participant.competition_id).await?;
        if participant.user_id != actor.user_id {
            ensure_manager(actor, &competition)?;
        }
        ensure_open(&competition)?;

        // re-read under the lock, a concurrent removal may have won
        let participant = load_participant(tx.as_mut(), participant_id).await?;
        tx.delete_participant(participant.participant_id).await?;
        let renumbered =
            performance_queue::compact_in_tx(tx.as_mut(), competition.competition_id).await?;
        competition.remove_participant(now);
        tx.update_competition(&competition).await?;
        tx.commit().await?;

        info!(
            competition_id = %competition.competition_id,
            %participant_id,
            participants = competition.current_participants,
            "Participant removed"
        );
        self.ctx
            .events
            .participant_changed(&participant, ParticipantChange::Removed)
            .await;
        for performance in &renumbered {
            self.ctx.events.performance_updated(performance).await;
        }
        Ok(competition)
    }

    /// Organizer confirmation ahead of the start. Only paid entries qualify.
    pub async fn confirm_participant(
        &self,
        actor: &Actor,
        participant_id: Uuid,
    ) -> Result<Participant, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let mut participant = load_participant(tx.as_mut(), participant_id).await?;
        let competition = lock_competition(tx.as_mut(), participant.competition_id).await?;
        ensure_manager(actor, &competition)?;
        ensure_open(&competition)?;
        if !participant.is_paid() {
            return Err(LifecycleError::InvalidInput(
                "Entry fee has not been paid".to_string(),
            ));
        }

        participant.transition_to(ParticipantStatus::Confirmed)?;
        tx.update_participant(&participant).await?;
        tx.commit().await?;

        info!(%participant_id, "Participant confirmed");
        self.ctx
            .events
            .participant_changed(&participant, ParticipantChange::Confirmed)
            .await;
        Ok(participant)
    }

    pub async fn disqualify(
        &self,
        actor: &Actor,
        participant_id: Uuid,
        reason: &str,
    ) -> Result<Participant, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let mut participant = load_participant(tx.as_mut(), participant_id).await?;
        let competition = lock_competition(tx.as_mut(), participant.competition_id).await?;
        ensure_manager(actor, &competition)?;
        ensure_open(&competition)?;

        participant.transition_to(ParticipantStatus::Disqualified)?;
        participant.disqualified_reason = Some(reason.to_string());
        participant.position = None;
        participant.prize_amount = None;
        tx.update_participant(&participant).await?;
        tx.commit().await?;

        warn!(%participant_id, reason, "Participant disqualified");
        self.ctx
            .events
            .participant_changed(&participant, ParticipantChange::Disqualified)
            .await;
        Ok(participant)
    }

    pub async fn list_participants(
        &self,
        competition_id: Uuid,
    ) -> Result<Vec<Participant>, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        super::load_competition(tx.as_mut(), competition_id).await?;
        Ok(tx.list_participants(competition_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{EntryPaymentStatus, PaymentStatus};
    use crate::services::testing::{harness, start_instant};

    #[tokio::test]
    async fn test_register_updates_counter_pool_and_payment() {
        let h = harness();
        let competition = h.published("register-basic", dec!(5000), 16).await;
        let registration = h
            .engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), dec!(5000))
            .await
            .unwrap();

        assert_eq!(registration.participant.status, ParticipantStatus::Registered);
        assert_eq!(registration.participant.payment_status, EntryPaymentStatus::Paid);
        let payment = registration.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.commission_rate, dec!(10));
        assert_eq!(payment.commission_amount, dec!(500));
        assert_eq!(payment.organizer_amount, dec!(4500));

        let competition = h
            .engine
            .registry
            .get(competition.competition_id)
            .await
            .unwrap();
        assert_eq!(competition.current_participants, 1);
        assert_eq!(competition.total_prize_pool, dec!(5000));
        assert_eq!(h.publisher.count("participant-changed"), 1);
    }

    #[tokio::test]
    async fn test_prize_pool_tracks_twelve_entries() {
        let h = harness();
        let competition = h.published("twelve-entries", dec!(5000), 16).await;
        for _ in 0..12 {
            h.engine
                .entries
                .register_participant(competition.competition_id, Uuid::new_v4(), dec!(5000))
                .await
                .unwrap();
        }
        let competition = h
            .engine
            .registry
            .get(competition.competition_id)
            .await
            .unwrap();
        assert_eq!(competition.current_participants, 12);
        assert_eq!(competition.total_prize_pool, dec!(60000));
    }

    #[tokio::test]
    async fn test_second_registration_is_already_registered() {
        let h = harness();
        let competition = h.published("double-entry", dec!(10), 16).await;
        let user = Uuid::new_v4();
        h.engine
            .entries
            .register_participant(competition.competition_id, user, dec!(10))
            .await
            .unwrap();

        let second = h
            .engine
            .entries
            .register_participant(competition.competition_id, user, dec!(10))
            .await;
        assert!(matches!(second, Err(LifecycleError::AlreadyRegistered)));

        let participants = h
            .engine
            .entries
            .list_participants(competition.competition_id)
            .await
            .unwrap();
        assert_eq!(participants.len(), 1);
        let competition = h
            .engine
            .registry
            .get(competition.competition_id)
            .await
            .unwrap();
        assert_eq!(competition.current_participants, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_never_overfill() {
        let h = harness();
        let competition = h.published("last-slot", dec!(5000), 3).await;
        let entries = Arc::new(h.engine.entries.clone());

        let attempts: Vec<_> = (0..20)
            .map(|_| {
                let entries = entries.clone();
                let competition_id = competition.competition_id;
                tokio::spawn(async move {
                    entries
                        .register_participant(competition_id, Uuid::new_v4(), dec!(5000))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        let mut full = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(LifecycleError::CompetitionFull) => full += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(accepted, 3);
        assert_eq!(full, 17);

        let competition = h
            .engine
            .registry
            .get(competition.competition_id)
            .await
            .unwrap();
        assert_eq!(competition.current_participants, 3);
        assert_eq!(competition.total_prize_pool, dec!(15000));
    }

    #[tokio::test]
    async fn test_registration_closed_codes() {
        let h = harness();
        let draft = h
            .engine
            .registry
            .create(&h.organizer, crate::services::testing::create_request("still-draft", dec!(0), 4))
            .await
            .unwrap();
        let err = h
            .engine
            .entries
            .register_participant(draft.competition_id, Uuid::new_v4(), Decimal::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some("not_published"));

        let competition = h.published("closed-codes", dec!(0), 4).await;
        h.clock.set(start_instant() + Duration::minutes(1));
        let err = h
            .engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), Decimal::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some("already_started"));
    }

    #[tokio::test]
    async fn test_free_entry_has_no_payment() {
        let h = harness();
        let competition = h.published("free-entry", Decimal::ZERO, 4).await;
        let registration = h
            .engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), Decimal::ZERO)
            .await
            .unwrap();
        assert!(registration.payment.is_none());
        assert!(registration.participant.is_paid());
    }

    #[tokio::test]
    async fn test_remove_participant_recomputes_pool() {
        let h = harness();
        let competition = h.published("withdraw", dec!(100), 4).await;
        let user = Uuid::new_v4();
        let registration = h
            .engine
            .entries
            .register_participant(competition.competition_id, user, dec!(100))
            .await
            .unwrap();
        h.engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), dec!(100))
            .await
            .unwrap();

        let stranger = Actor::user(Uuid::new_v4());
        assert!(matches!(
            h.engine
                .entries
                .remove_participant(&stranger, registration.participant.participant_id)
                .await,
            Err(LifecycleError::Forbidden)
        ));

        let competition = h
            .engine
            .entries
            .remove_participant(&Actor::user(user), registration.participant.participant_id)
            .await
            .unwrap();
        assert_eq!(competition.current_participants, 1);
        assert_eq!(competition.total_prize_pool, dec!(100));

        let payment = h
            .engine
            .ledger
            .find(&Actor::user(user), registration.payment.unwrap().payment_id)
            .await
            .unwrap();
        assert_eq!(payment.participant_id, None);
    }

    #[tokio::test]
    async fn test_confirm_requires_payment() {
        let h = harness();
        let competition = h.published("confirm", dec!(100), 4).await;
        let unpaid = h
            .engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), Decimal::ZERO)
            .await
            .unwrap()
            .participant;
        let paid = h
            .engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), dec!(100))
            .await
            .unwrap()
            .participant;

        assert!(matches!(
            h.engine.entries.confirm_participant(&h.organizer, unpaid.participant_id).await,
            Err(LifecycleError::InvalidInput(_))
        ));
        let confirmed = h
            .engine
            .entries
            .confirm_participant(&h.organizer, paid.participant_id)
            .await
            .unwrap();
        assert_eq!(confirmed.status, ParticipantStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_disqualify_records_reason() {
        let h = harness();
        let competition = h.published("disqualify", Decimal::ZERO, 4).await;
        let participant = h
            .engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), Decimal::ZERO)
            .await
            .unwrap()
            .participant;

        let participant = h
            .engine
            .entries
            .disqualify(&h.organizer, participant.participant_id, "used a backing track")
            .await
            .unwrap();
        assert_eq!(participant.status, ParticipantStatus::Disqualified);
        assert_eq!(participant.disqualified_reason.as_deref(), Some("used a backing track"));
    }
}
