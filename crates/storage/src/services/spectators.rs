//! Spectator interactions during the live phase.
//!
//! Reactions and votes are deduplicated by their unique keys instead of
//! locking the competition, so they never wait on the performance queue.

use tracing::{debug, info};
use uuid::Uuid;

use super::{EngineContext, ensure_manager, load_competition, load_participant, lock_competition};
use crate::dto::live::ReactionOutcome;
use crate::error::LifecycleError;
use crate::models::{
    Actor, ChatMessage, Competition, CompetitionStatus, Reaction, Vote, VoteTally,
};
use crate::repository::LifecycleTx;

pub const MAX_CHAT_LENGTH: usize = 500;

#[derive(Clone)]
pub struct Spectators {
    ctx: EngineContext,
}

async fn live_competition(
    tx: &mut dyn LifecycleTx,
    competition_id: Uuid,
) -> Result<Competition, LifecycleError> {
    let competition = load_competition(tx, competition_id).await?;
    if competition.status != CompetitionStatus::Active {
        return Err(LifecycleError::CompetitionClosed(competition.status));
    }
    Ok(competition)
}

async fn ensure_entrant(
    tx: &mut dyn LifecycleTx,
    competition_id: Uuid,
    participant_id: Uuid,
) -> Result<(), LifecycleError> {
    let participant = load_participant(tx, participant_id).await?;
    if participant.competition_id != competition_id {
        return Err(LifecycleError::not_found("participant", participant_id));
    }
    Ok(())
}

impl Spectators {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn react(
        &self,
        competition_id: Uuid,
        participant_id: Uuid,
        user_id: Uuid,
        reaction_type: &str,
    ) -> Result<ReactionOutcome, LifecycleError> {
        let reaction_type = reaction_type.trim();
        if reaction_type.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "Reaction type is required".to_string(),
            ));
        }

        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        live_competition(tx.as_mut(), competition_id).await?;
        ensure_entrant(tx.as_mut(), competition_id, participant_id).await?;

        let reaction = Reaction {
            reaction_id: Uuid::new_v4(),
            competition_id,
            participant_id,
            user_id,
            reaction_type: reaction_type.to_string(),
            created_at: now,
        };
        let inserted = tx.insert_reaction(&reaction).await?;
        let counts = tx.reaction_counts(participant_id).await?;
        tx.commit().await?;

        if inserted {
            self.ctx
                .events
                .reaction_added(competition_id, participant_id, user_id, reaction_type, &counts)
                .await;
        } else {
            debug!(%participant_id, %user_id, reaction_type, "Duplicate reaction ignored");
        }
        Ok(ReactionOutcome { inserted, counts })
    }

    /// One vote per user and participant; voting again replaces the score.
    pub async fn vote(
        &self,
        competition_id: Uuid,
        participant_id: Uuid,
        user_id: Uuid,
        score: i16,
    ) -> Result<VoteTally, LifecycleError> {
        if score != 1 && score != -1 {
            return Err(LifecycleError::InvalidVote(score));
        }

        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        live_competition(tx.as_mut(), competition_id).await?;
        ensure_entrant(tx.as_mut(), competition_id, participant_id).await?;

        let vote = Vote {
            vote_id: Uuid::new_v4(),
            competition_id,
            participant_id,
            user_id,
            score,
            created_at: now,
            updated_at: now,
        };
        tx.upsert_vote(&vote).await?;
        let tally = tx.vote_tally(participant_id).await?;
        tx.commit().await?;

        self.ctx.events.vote_cast(competition_id, user_id, &tally).await;
        Ok(tally)
    }

    pub async fn chat(
        &self,
        competition_id: Uuid,
        user_id: Uuid,
        body: &str,
    ) -> Result<ChatMessage, LifecycleError> {
        let body = body.trim();
        let length = body.chars().count();
        if length == 0 || length > MAX_CHAT_LENGTH {
            return Err(LifecycleError::InvalidInput(format!(
                "Message must be between 1 and {MAX_CHAT_LENGTH} characters"
            )));
        }

        let message = ChatMessage {
            message_id: Uuid::new_v4(),
            competition_id,
            user_id,
            body: body.to_string(),
            created_at: self.ctx.now(),
        };
        let mut tx = self.ctx.begin().await?;
        live_competition(tx.as_mut(), competition_id).await?;
        tx.insert_chat_message(&message).await?;
        tx.commit().await?;

        self.ctx.events.chat_message(&message).await;
        Ok(message)
    }

    /// Marks the live broadcast as started. Repeating the call is a no-op.
    pub async fn start_broadcast(
        &self,
        actor: &Actor,
        competition_id: Uuid,
    ) -> Result<Competition, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        if competition.status != CompetitionStatus::Active {
            return Err(LifecycleError::CompetitionClosed(competition.status));
        }
        if competition.broadcast_started_at.is_some() {
            return Ok(competition);
        }

        competition.broadcast_started_at = Some(now);
        competition.updated_at = now;
        tx.update_competition(&competition).await?;
        tx.commit().await?;

        info!(%competition_id, "Broadcast started");
        self.ctx.events.broadcasting_started(&competition).await;
        Ok(competition)
    }
}
