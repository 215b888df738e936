use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ChatMessage, Reaction, ReactionCount, Vote, VoteTally};

/// Spectator writes. None of these take locks; duplicates are absorbed by
/// the unique constraints.
pub struct EngagementRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> EngagementRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn insert_reaction(&mut self, reaction: &Reaction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reactions (
                reaction_id, competition_id, participant_id, user_id, reaction_type, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (competition_id, participant_id, user_id, reaction_type) DO NOTHING
            "#,
        )
        .bind(reaction.reaction_id)
        .bind(reaction.competition_id)
        .bind(reaction.participant_id)
        .bind(reaction.user_id)
        .bind(&reaction.reaction_type)
        .bind(reaction.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn reaction_counts(&mut self, participant_id: Uuid) -> Result<Vec<ReactionCount>> {
        let counts = sqlx::query_as::<_, ReactionCount>(
            r#"
            SELECT reaction_type, COUNT(*) AS count
            FROM reactions
            WHERE participant_id = $1
            GROUP BY reaction_type
            ORDER BY reaction_type
            "#,
        )
        .bind(participant_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(counts)
    }

    pub async fn upsert_vote(&mut self, vote: &Vote) -> Result<Vote> {
        let stored = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (
                vote_id, competition_id, participant_id, user_id, score, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (competition_id, participant_id, user_id)
            DO UPDATE SET score = EXCLUDED.score, updated_at = EXCLUDED.updated_at
            RETURNING vote_id, competition_id, participant_id, user_id, score, created_at, updated_at
            "#,
        )
        .bind(vote.vote_id)
        .bind(vote.competition_id)
        .bind(vote.participant_id)
        .bind(vote.user_id)
        .bind(vote.score)
        .bind(vote.created_at)
        .bind(vote.updated_at)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(stored)
    }

    pub async fn vote_tally(&mut self, participant_id: Uuid) -> Result<VoteTally> {
        let tally = sqlx::query_as::<_, VoteTally>(
            r#"
            SELECT
                $1::uuid AS participant_id,
                COUNT(*) FILTER (WHERE score > 0) AS upvotes,
                COUNT(*) FILTER (WHERE score < 0) AS downvotes,
                COALESCE(SUM(score), 0)::bigint AS score
            FROM votes
            WHERE participant_id = $1
            "#,
        )
        .bind(participant_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(tally)
    }

    pub async fn insert_chat_message(&mut self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (message_id, competition_id, user_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.message_id)
        .bind(message.competition_id)
        .bind(message.user_id)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }
}
