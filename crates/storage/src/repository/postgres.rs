use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::competition::CompetitionRepository;
use super::engagement::EngagementRepository;
use super::participant::ParticipantRepository;
use super::payment::PaymentRepository;
use super::performance::PerformanceRepository;
use super::setting::SettingRepository;
use super::{LifecycleStore, LifecycleTx};
use crate::error::Result;
use crate::models::{
    ChatMessage, Competition, CompetitionStatus, Participant, Payment, PaymentStatus, Performance,
    PlatformSetting, Reaction, ReactionCount, Vote, VoteTally,
};

/// Postgres-backed store; every engine transaction is a database transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LifecycleStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn LifecycleTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LifecycleTx for PgTx {
    async fn find_competition(&mut self, id: Uuid) -> Result<Option<Competition>> {
        CompetitionRepository::new(&mut self.tx).find_by_id(id, false).await
    }

    async fn lock_competition(&mut self, id: Uuid) -> Result<Option<Competition>> {
        CompetitionRepository::new(&mut self.tx).find_by_id(id, true).await
    }

    async fn list_competitions(
        &mut self,
        status: Option<CompetitionStatus>,
    ) -> Result<Vec<Competition>> {
        CompetitionRepository::new(&mut self.tx).list(status).await
    }

    async fn insert_competition(&mut self, competition: &Competition) -> Result<()> {
        CompetitionRepository::new(&mut self.tx).create(competition).await
    }

    async fn update_competition(&mut self, competition: &Competition) -> Result<()> {
        CompetitionRepository::new(&mut self.tx).update(competition).await
    }

    async fn delete_competition(&mut self, id: Uuid) -> Result<()> {
        CompetitionRepository::new(&mut self.tx).delete(id).await
    }

    async fn find_participant(&mut self, id: Uuid) -> Result<Option<Participant>> {
        ParticipantRepository::new(&mut self.tx).find_by_id(id).await
    }

    async fn list_participants(&mut self, competition_id: Uuid) -> Result<Vec<Participant>> {
        ParticipantRepository::new(&mut self.tx)
            .list_by_competition(competition_id)
            .await
    }

    async fn insert_participant(&mut self, participant: &Participant) -> Result<()> {
        ParticipantRepository::new(&mut self.tx).create(participant).await
    }

    async fn update_participant(&mut self, participant: &Participant) -> Result<()> {
        ParticipantRepository::new(&mut self.tx).update(participant).await
    }

    async fn delete_participant(&mut self, id: Uuid) -> Result<()> {
        ParticipantRepository::new(&mut self.tx).delete(id).await
    }

    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        PaymentRepository::new(&mut self.tx).find_by_id(id, false).await
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        PaymentRepository::new(&mut self.tx).find_by_id(id, true).await
    }

    async fn list_payments(
        &mut self,
        competition_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>> {
        PaymentRepository::new(&mut self.tx)
            .list_by_competition(competition_id, status)
            .await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        PaymentRepository::new(&mut self.tx).create(payment).await
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        PaymentRepository::new(&mut self.tx).update(payment).await
    }

    async fn find_performance(&mut self, id: Uuid) -> Result<Option<Performance>> {
        PerformanceRepository::new(&mut self.tx).find_by_id(id).await
    }

    async fn list_performances(&mut self, competition_id: Uuid) -> Result<Vec<Performance>> {
        PerformanceRepository::new(&mut self.tx)
            .list_by_competition(competition_id)
            .await
    }

    async fn insert_performance(&mut self, performance: &Performance) -> Result<()> {
        PerformanceRepository::new(&mut self.tx).create(performance).await
    }

    async fn update_performance(&mut self, performance: &Performance) -> Result<()> {
        PerformanceRepository::new(&mut self.tx).update(performance).await
    }

    async fn insert_reaction(&mut self, reaction: &Reaction) -> Result<bool> {
        EngagementRepository::new(&mut self.tx).insert_reaction(reaction).await
    }

    async fn reaction_counts(&mut self, participant_id: Uuid) -> Result<Vec<ReactionCount>> {
        EngagementRepository::new(&mut self.tx)
            .reaction_counts(participant_id)
            .await
    }

    async fn upsert_vote(&mut self, vote: &Vote) -> Result<Vote> {
        EngagementRepository::new(&mut self.tx).upsert_vote(vote).await
    }

    async fn vote_tally(&mut self, participant_id: Uuid) -> Result<VoteTally> {
        EngagementRepository::new(&mut self.tx)
            .vote_tally(participant_id)
            .await
    }

    async fn insert_chat_message(&mut self, message: &ChatMessage) -> Result<()> {
        EngagementRepository::new(&mut self.tx)
            .insert_chat_message(message)
            .await
    }

    async fn find_setting(&mut self, key: &str) -> Result<Option<PlatformSetting>> {
        SettingRepository::new(&mut self.tx).find(key).await
    }

    async fn upsert_setting(&mut self, setting: &PlatformSetting) -> Result<()> {
        SettingRepository::new(&mut self.tx).upsert(setting).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
