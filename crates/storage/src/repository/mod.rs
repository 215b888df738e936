//! Persistence seam of the lifecycle engine.
//!
//! Services open a [`LifecycleTx`], read and lock what they need, apply the
//! domain rules from [`crate::models`] and commit. Dropping a transaction
//! without committing discards its writes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ChatMessage, Competition, CompetitionStatus, Participant, Payment, PaymentStatus, Performance,
    PlatformSetting, Reaction, ReactionCount, Vote, VoteTally,
};

pub mod competition;
pub mod engagement;
pub mod participant;
pub mod payment;
pub mod performance;
pub mod postgres;
pub mod setting;

#[cfg(any(test, feature = "testkit"))]
pub mod memory;

pub use postgres::PgStore;

#[cfg(any(test, feature = "testkit"))]
pub use memory::MemoryStore;

#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LifecycleTx>>;
}

#[async_trait]
pub trait LifecycleTx: Send {
    async fn find_competition(&mut self, id: Uuid) -> Result<Option<Competition>>;
    /// Row-level lock held until the transaction ends.
    async fn lock_competition(&mut self, id: Uuid) -> Result<Option<Competition>>;
    async fn list_competitions(
        &mut self,
        status: Option<CompetitionStatus>,
    ) -> Result<Vec<Competition>>;
    async fn insert_competition(&mut self, competition: &Competition) -> Result<()>;
    async fn update_competition(&mut self, competition: &Competition) -> Result<()>;
    /// Cascades to participants, payments, performances, reactions, votes and chat.
    async fn delete_competition(&mut self, id: Uuid) -> Result<()>;

    async fn find_participant(&mut self, id: Uuid) -> Result<Option<Participant>>;
    /// Ordered by registration time.
    async fn list_participants(&mut self, competition_id: Uuid) -> Result<Vec<Participant>>;
    async fn insert_participant(&mut self, participant: &Participant) -> Result<()>;
    async fn update_participant(&mut self, participant: &Participant) -> Result<()>;
    async fn delete_participant(&mut self, id: Uuid) -> Result<()>;

    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>>;
    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>>;
    async fn list_payments(
        &mut self,
        competition_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>>;
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;
    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn find_performance(&mut self, id: Uuid) -> Result<Option<Performance>>;
    /// Ordered by play order, then submission time.
    async fn list_performances(&mut self, competition_id: Uuid) -> Result<Vec<Performance>>;
    async fn insert_performance(&mut self, performance: &Performance) -> Result<()>;
    async fn update_performance(&mut self, performance: &Performance) -> Result<()>;

    /// Returns false when the same reaction already existed.
    async fn insert_reaction(&mut self, reaction: &Reaction) -> Result<bool>;
    async fn reaction_counts(&mut self, participant_id: Uuid) -> Result<Vec<ReactionCount>>;
    /// Inserts or replaces the user's vote and returns the stored row.
    async fn upsert_vote(&mut self, vote: &Vote) -> Result<Vote>;
    async fn vote_tally(&mut self, participant_id: Uuid) -> Result<VoteTally>;
    async fn insert_chat_message(&mut self, message: &ChatMessage) -> Result<()>;

    async fn find_setting(&mut self, key: &str) -> Result<Option<PlatformSetting>>;
    async fn upsert_setting(&mut self, setting: &PlatformSetting) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
