use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::live_events::ParticipantChange;
use super::{
    EngineContext, PaymentLedger, ensure_manager, load_competition, lock_competition,
    performance_queue, scoring,
};
use crate::dto::competition::{
    CancellationResponse, CreateCompetitionRequest, DueTransitions, RefundFailure, RefundReport,
    RegistrationStatusResponse, TransitionFailure, UpdateCompetitionRequest,
};
use crate::dto::scoring::{CompetitionResults, RankingEntry};
use crate::error::LifecycleError;
use crate::models::{
    Actor, Competition, CompetitionStatus, Participant, ParticipantStatus, PaymentStatus,
    PerformanceStatus,
};

/// Owner of the competition status machine.
#[derive(Clone)]
pub struct CompetitionRegistry {
    ctx: EngineContext,
    ledger: PaymentLedger,
}

impl CompetitionRegistry {
    pub fn new(ctx: EngineContext, ledger: PaymentLedger) -> Self {
        Self { ctx, ledger }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateCompetitionRequest,
    ) -> Result<Competition, LifecycleError> {
        request
            .validate()
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;
        request
            .validate_schedule()
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;

        let competition = request.into_competition(actor.user_id, self.ctx.now());
        let mut tx = self.ctx.begin().await?;
        if let Err(e) = tx.insert_competition(&competition).await {
            if e.is_unique_violation() {
                return Err(LifecycleError::Conflict(format!(
                    "Slug '{}' is already taken",
                    competition.slug
                )));
            }
            return Err(e.into());
        }
        tx.commit().await?;

        info!(competition_id = %competition.competition_id, slug = %competition.slug, "Competition created");
        Ok(competition)
    }

    /// Drafts only; published competitions are frozen for their entrants.
    pub async fn update(
        &self,
        actor: &Actor,
        competition_id: Uuid,
        request: UpdateCompetitionRequest,
    ) -> Result<Competition, LifecycleError> {
        request
            .validate()
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;

        let mut tx = self.ctx.begin().await?;
        let mut competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        if competition.status != CompetitionStatus::Draft {
            return Err(LifecycleError::NotEditable(competition.status));
        }

        request
            .apply_to(&mut competition, self.ctx.now())
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;
        if let Err(e) = tx.update_competition(&competition).await {
            if e.is_unique_violation() {
                return Err(LifecycleError::Conflict(format!(
                    "Slug '{}' is already taken",
                    competition.slug
                )));
            }
            return Err(e.into());
        }
        tx.commit().await?;

        info!(%competition_id, "Competition updated");
        Ok(competition)
    }

    pub async fn get(&self, competition_id: Uuid) -> Result<Competition, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        load_competition(tx.as_mut(), competition_id).await
    }

    pub async fn list(
        &self,
        status: Option<CompetitionStatus>,
    ) -> Result<Vec<Competition>, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.list_competitions(status).await?)
    }

    pub async fn registration_status(
        &self,
        competition_id: Uuid,
    ) -> Result<RegistrationStatusResponse, LifecycleError> {
        let competition = self.get(competition_id).await?;
        let status = competition.registration_status(self.ctx.now());
        Ok(RegistrationStatusResponse {
            competition_id,
            status,
            can_register: status == crate::models::RegistrationStatus::Open,
        })
    }

    pub async fn publish(
        &self,
        actor: &Actor,
        competition_id: Uuid,
    ) -> Result<Competition, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        let from = competition.status;
        if !from.can_transition_to(CompetitionStatus::Published) {
            return Err(LifecycleError::invalid_transition(
                "competition",
                from,
                CompetitionStatus::Published,
            ));
        }

        competition.check_publishable()?;
        competition.transition_to(CompetitionStatus::Published, now)?;
        tx.update_competition(&competition).await?;
        tx.commit().await?;

        info!(%competition_id, "Competition published");
        self.ctx.events.status_changed(&competition, from).await;
        Ok(competition)
    }

    /// Goes live once the start instant is reached (or is unknown). Paid
    /// entrants are confirmed and the running order is fixed.
    pub async fn start(
        &self,
        actor: &Actor,
        competition_id: Uuid,
    ) -> Result<Competition, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        let from = competition.status;
        if !from.can_transition_to(CompetitionStatus::Active) {
            return Err(LifecycleError::invalid_transition(
                "competition",
                from,
                CompetitionStatus::Active,
            ));
        }
        if let Some(start) = competition.start_datetime()
            && now < start
        {
            return Err(LifecycleError::NotYetDue(start));
        }

        competition.transition_to(CompetitionStatus::Active, now)?;
        tx.update_competition(&competition).await?;

        let mut confirmed: Vec<Participant> = Vec::new();
        for mut participant in tx.list_participants(competition_id).await? {
            if participant.status == ParticipantStatus::Registered && participant.is_paid() {
                participant.transition_to(ParticipantStatus::Confirmed)?;
                tx.update_participant(&participant).await?;
                confirmed.push(participant);
            }
        }
        let queued = performance_queue::ensure_assigned_in_tx(tx.as_mut(), competition_id).await?;
        tx.commit().await?;

        info!(
            %competition_id,
            confirmed = confirmed.len(),
            queued,
            "Competition started"
        );
        self.ctx.events.status_changed(&competition, from).await;
        for participant in &confirmed {
            self.ctx
                .events
                .participant_changed(participant, ParticipantChange::Confirmed)
                .await;
        }
        Ok(competition)
    }

    /// Closes an active competition and settles the ranking and prizes in
    /// the same transaction.
    pub async fn complete(
        &self,
        actor: &Actor,
        competition_id: Uuid,
    ) -> Result<CompetitionResults, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        let from = competition.status;
        if !from.can_transition_to(CompetitionStatus::Completed) {
            return Err(LifecycleError::invalid_transition(
                "competition",
                from,
                CompetitionStatus::Completed,
            ));
        }

        // whatever is still on stage is over
        for mut performance in tx.list_performances(competition_id).await? {
            if performance.status == PerformanceStatus::Playing {
                performance.transition_to(PerformanceStatus::Played, now)?;
                tx.update_performance(&performance).await?;
            }
        }

        let (standings, placed) = scoring::finalize_in_tx(tx.as_mut(), &competition).await?;
        competition.transition_to(CompetitionStatus::Completed, now)?;
        tx.update_competition(&competition).await?;
        tx.commit().await?;

        info!(
            %competition_id,
            ranked = standings.len(),
            prize_pool = %competition.total_prize_pool,
            "Competition completed"
        );
        self.ctx.events.status_changed(&competition, from).await;
        for participant in &placed {
            self.ctx
                .events
                .participant_changed(participant, ParticipantChange::Placed)
                .await;
        }

        Ok(CompetitionResults {
            competition: competition.into(),
            standings,
        })
    }

    /// Cancels the competition and refunds every completed entry payment.
    /// Each refund is its own transaction; calling cancel again on a
    /// cancelled competition retries the refunds that failed.
    pub async fn cancel(
        &self,
        actor: &Actor,
        competition_id: Uuid,
    ) -> Result<CancellationResponse, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        let from = competition.status;
        let transitioned = from != CompetitionStatus::Cancelled;
        if transitioned {
            competition.transition_to(CompetitionStatus::Cancelled, now)?;
            tx.update_competition(&competition).await?;
        }
        let payments = tx
            .list_payments(competition_id, Some(PaymentStatus::Completed))
            .await?;
        tx.commit().await?;

        if transitioned {
            info!(%competition_id, %from, "Competition cancelled");
            self.ctx.events.status_changed(&competition, from).await;
        }

        let mut refunds = RefundReport::default();
        for payment in payments {
            match self.ledger.refund_within(payment.payment_id, false).await {
                Ok(_) => refunds.refunded.push(payment.payment_id),
                Err(e) => {
                    warn!(%competition_id, payment_id = %payment.payment_id, "Refund failed: {}", e);
                    refunds.failed.push(RefundFailure {
                        payment_id: payment.payment_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(
            %competition_id,
            refunded = refunds.refunded.len(),
            failed = refunds.failed.len(),
            "Cancellation refunds processed"
        );

        Ok(CancellationResponse {
            competition: competition.into(),
            refunds,
        })
    }

    pub async fn delete(&self, actor: &Actor, competition_id: Uuid) -> Result<(), LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        if !matches!(
            competition.status,
            CompetitionStatus::Draft | CompetitionStatus::Completed | CompetitionStatus::Cancelled
        ) {
            return Err(LifecycleError::invalid_transition(
                "competition",
                competition.status,
                "deleted",
            ));
        }
        tx.delete_competition(competition_id).await?;
        tx.commit().await?;

        info!(%competition_id, "Competition deleted");
        Ok(())
    }

    /// One scheduler tick: starts published competitions whose start has
    /// passed and completes active ones whose end has passed. Competitions
    /// without a known start are left to a manual start.
    pub async fn process_due_transitions(&self) -> Result<DueTransitions, LifecycleError> {
        let now = self.ctx.now();
        let (published, active) = {
            let mut tx = self.ctx.begin().await?;
            let published = tx.list_competitions(Some(CompetitionStatus::Published)).await?;
            let active = tx.list_competitions(Some(CompetitionStatus::Active)).await?;
            (published, active)
        };

        let system = Actor::system();
        let mut report = DueTransitions::default();
        for competition in published
            .iter()
            .filter(|c| c.start_datetime().is_some() && c.is_start_due(now))
        {
            match self.start(&system, competition.competition_id).await {
                Ok(_) => report.started.push(competition.competition_id),
                Err(e) => report.failed.push(transition_failure(competition, e)),
            }
        }
        for competition in active.iter().filter(|c| c.is_end_due(now)) {
            match self.complete(&system, competition.competition_id).await {
                Ok(_) => report.completed.push(competition.competition_id),
                Err(e) => report.failed.push(transition_failure(competition, e)),
            }
        }

        if !report.started.is_empty() || !report.completed.is_empty() || !report.failed.is_empty() {
            info!(
                started = report.started.len(),
                completed = report.completed.len(),
                failed = report.failed.len(),
                "Due transitions processed"
            );
        }
        Ok(report)
    }

    pub async fn standings(&self, competition_id: Uuid) -> Result<Vec<RankingEntry>, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let competition = load_competition(tx.as_mut(), competition_id).await?;
        let participants = tx.list_participants(competition_id).await?;
        Ok(scoring::standings(&competition, &participants))
    }
}

fn transition_failure(competition: &Competition, error: LifecycleError) -> TransitionFailure {
    warn!(competition_id = %competition.competition_id, "Due transition failed: {}", error);
    TransitionFailure {
        competition_id: competition.competition_id,
        reason: error.to_string(),
    }
}
