//! In-memory store for tests.
//!
//! A transaction holds the store-wide lock for its whole lifetime and works
//! on a copy of the state that replaces the shared state on commit, so
//! transactions are fully serialized.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LifecycleStore, LifecycleTx};
use crate::error::{Result, StorageError};
use crate::models::{
    ChatMessage, Competition, CompetitionStatus, Participant, Payment, PaymentStatus, Performance,
    PlatformSetting, Reaction, ReactionCount, Vote, VoteTally,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    competitions: HashMap<Uuid, Competition>,
    participants: HashMap<Uuid, Participant>,
    payments: HashMap<Uuid, Payment>,
    performances: HashMap<Uuid, Performance>,
    reactions: Vec<Reaction>,
    votes: Vec<Vote>,
    chat_messages: Vec<ChatMessage>,
    settings: HashMap<String, PlatformSetting>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failing_payments: Arc<parking_lot::Mutex<HashSet<Uuid>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write of this payment fail like a dropped connection.
    pub fn fail_payment_writes(&self, payment_id: Uuid) {
        self.failing_payments.lock().insert(payment_id);
    }

    pub fn restore_payment_writes(&self, payment_id: Uuid) {
        self.failing_payments.lock().remove(&payment_id);
    }

    pub async fn chat_message_count(&self, competition_id: Uuid) -> usize {
        let state = self.state.lock().await;
        state
            .chat_messages
            .iter()
            .filter(|m| m.competition_id == competition_id)
            .count()
    }
}

#[async_trait]
impl LifecycleStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LifecycleTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            failing_payments: self.failing_payments.clone(),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failing_payments: Arc<parking_lot::Mutex<HashSet<Uuid>>>,
}

fn replace<T>(map: &mut HashMap<Uuid, T>, id: Uuid, value: &T) -> Result<()>
where
    T: Clone,
{
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StorageError::NotFound),
    }
}

#[async_trait]
impl LifecycleTx for MemoryTx {
    async fn find_competition(&mut self, id: Uuid) -> Result<Option<Competition>> {
        Ok(self.working.competitions.get(&id).cloned())
    }

    async fn lock_competition(&mut self, id: Uuid) -> Result<Option<Competition>> {
        self.find_competition(id).await
    }

    async fn list_competitions(
        &mut self,
        status: Option<CompetitionStatus>,
    ) -> Result<Vec<Competition>> {
        let mut competitions: Vec<Competition> = self
            .working
            .competitions
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        competitions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(competitions)
    }

    async fn insert_competition(&mut self, competition: &Competition) -> Result<()> {
        if self
            .working
            .competitions
            .values()
            .any(|c| c.slug == competition.slug)
        {
            return Err(StorageError::UniqueViolation("Slug already exists".to_string()));
        }
        self.working
            .competitions
            .insert(competition.competition_id, competition.clone());
        Ok(())
    }

    async fn update_competition(&mut self, competition: &Competition) -> Result<()> {
        replace(
            &mut self.working.competitions,
            competition.competition_id,
            competition,
        )
    }

    async fn delete_competition(&mut self, id: Uuid) -> Result<()> {
        let state = &mut self.working;
        if state.competitions.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        state.participants.retain(|_, p| p.competition_id != id);
        state.payments.retain(|_, p| p.competition_id != id);
        state.performances.retain(|_, p| p.competition_id != id);
        state.reactions.retain(|r| r.competition_id != id);
        state.votes.retain(|v| v.competition_id != id);
        state.chat_messages.retain(|m| m.competition_id != id);
        Ok(())
    }

    async fn find_participant(&mut self, id: Uuid) -> Result<Option<Participant>> {
        Ok(self.working.participants.get(&id).cloned())
    }

    async fn list_participants(&mut self, competition_id: Uuid) -> Result<Vec<Participant>> {
        let mut participants: Vec<Participant> = self
            .working
            .participants
            .values()
            .filter(|p| p.competition_id == competition_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| (p.registered_at, p.participant_id));
        Ok(participants)
    }

    async fn insert_participant(&mut self, participant: &Participant) -> Result<()> {
        if self.working.participants.values().any(|p| {
            p.competition_id == participant.competition_id && p.user_id == participant.user_id
        }) {
            return Err(StorageError::UniqueViolation(
                "participants_competition_id_user_id_key".to_string(),
            ));
        }
        self.working
            .participants
            .insert(participant.participant_id, participant.clone());
        Ok(())
    }

    async fn update_participant(&mut self, participant: &Participant) -> Result<()> {
        replace(
            &mut self.working.participants,
            participant.participant_id,
            participant,
        )
    }

    async fn delete_participant(&mut self, id: Uuid) -> Result<()> {
        let state = &mut self.working;
        if state.participants.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        for payment in state.payments.values_mut() {
            if payment.participant_id == Some(id) {
                payment.participant_id = None;
            }
        }
        state.performances.retain(|_, p| p.participant_id != id);
        state.reactions.retain(|r| r.participant_id != id);
        state.votes.retain(|v| v.participant_id != id);
        Ok(())
    }

    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        self.find_payment(id).await
    }

    async fn list_payments(
        &mut self,
        competition_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .working
            .payments
            .values()
            .filter(|p| p.competition_id == competition_id)
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.created_at, p.payment_id));
        Ok(payments)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        if self
            .working
            .payments
            .values()
            .any(|p| p.transaction_id == payment.transaction_id)
        {
            return Err(StorageError::UniqueViolation(
                "Transaction id already exists".to_string(),
            ));
        }
        self.working
            .payments
            .insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        if self.failing_payments.lock().contains(&payment.payment_id) {
            return Err(StorageError::Database(sqlx::Error::PoolTimedOut));
        }
        replace(&mut self.working.payments, payment.payment_id, payment)
    }

    async fn find_performance(&mut self, id: Uuid) -> Result<Option<Performance>> {
        Ok(self.working.performances.get(&id).cloned())
    }

    async fn list_performances(&mut self, competition_id: Uuid) -> Result<Vec<Performance>> {
        let mut performances: Vec<Performance> = self
            .working
            .performances
            .values()
            .filter(|p| p.competition_id == competition_id)
            .cloned()
            .collect();
        // NULLS LAST, like the SQL ordering
        performances.sort_by_key(|p| {
            (
                p.play_order.is_none(),
                p.play_order,
                p.recorded_at,
                p.performance_id,
            )
        });
        Ok(performances)
    }

    async fn insert_performance(&mut self, performance: &Performance) -> Result<()> {
        self.working
            .performances
            .insert(performance.performance_id, performance.clone());
        Ok(())
    }

    async fn update_performance(&mut self, performance: &Performance) -> Result<()> {
        replace(
            &mut self.working.performances,
            performance.performance_id,
            performance,
        )
    }

    async fn insert_reaction(&mut self, reaction: &Reaction) -> Result<bool> {
        let exists = self.working.reactions.iter().any(|r| {
            r.competition_id == reaction.competition_id
                && r.participant_id == reaction.participant_id
                && r.user_id == reaction.user_id
                && r.reaction_type == reaction.reaction_type
        });
        if exists {
            return Ok(false);
        }
        self.working.reactions.push(reaction.clone());
        Ok(true)
    }

    async fn reaction_counts(&mut self, participant_id: Uuid) -> Result<Vec<ReactionCount>> {
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for reaction in self
            .working
            .reactions
            .iter()
            .filter(|r| r.participant_id == participant_id)
        {
            *counts.entry(reaction.reaction_type.as_str()).or_default() += 1;
        }
        let mut counts: Vec<ReactionCount> = counts
            .into_iter()
            .map(|(reaction_type, count)| ReactionCount {
                reaction_type: reaction_type.to_string(),
                count,
            })
            .collect();
        counts.sort_by(|a, b| a.reaction_type.cmp(&b.reaction_type));
        Ok(counts)
    }

    async fn upsert_vote(&mut self, vote: &Vote) -> Result<Vote> {
        let existing = self.working.votes.iter_mut().find(|v| {
            v.competition_id == vote.competition_id
                && v.participant_id == vote.participant_id
                && v.user_id == vote.user_id
        });
        match existing {
            Some(stored) => {
                stored.score = vote.score;
                stored.updated_at = vote.updated_at;
                Ok(stored.clone())
            }
            None => {
                self.working.votes.push(vote.clone());
                Ok(vote.clone())
            }
        }
    }

    async fn vote_tally(&mut self, participant_id: Uuid) -> Result<VoteTally> {
        let mut tally = VoteTally {
            participant_id,
            upvotes: 0,
            downvotes: 0,
            score: 0,
        };
        for vote in self
            .working
            .votes
            .iter()
            .filter(|v| v.participant_id == participant_id)
        {
            if vote.score > 0 {
                tally.upvotes += 1;
            } else if vote.score < 0 {
                tally.downvotes += 1;
            }
            tally.score += i64::from(vote.score);
        }
        Ok(tally)
    }

    async fn insert_chat_message(&mut self, message: &ChatMessage) -> Result<()> {
        self.working.chat_messages.push(message.clone());
        Ok(())
    }

    async fn find_setting(&mut self, key: &str) -> Result<Option<PlatformSetting>> {
        Ok(self.working.settings.get(key).cloned())
    }

    async fn upsert_setting(&mut self, setting: &PlatformSetting) -> Result<()> {
        self.working
            .settings
            .insert(setting.key.clone(), setting.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }
}
