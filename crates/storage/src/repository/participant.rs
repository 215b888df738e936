use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::Participant;

const COLUMNS: &str = r#"
    participant_id, competition_id, user_id, status, payment_status, scores,
    total_score, position, prize_amount, disqualified_reason, registered_at
"#;

pub struct ParticipantRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ParticipantRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&mut self, id: Uuid) -> Result<Option<Participant>> {
        let sql = format!("SELECT {COLUMNS} FROM participants WHERE participant_id = $1");

        let participant = sqlx::query_as::<_, Participant>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(participant)
    }

    /// Participants of a competition in registration order
    pub async fn list_by_competition(&mut self, competition_id: Uuid) -> Result<Vec<Participant>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM participants
            WHERE competition_id = $1
            ORDER BY registered_at, participant_id
            "#
        );

        let participants = sqlx::query_as::<_, Participant>(&sql)
            .bind(competition_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(participants)
    }

    /// Insert a participant; a second registration of the same user
    /// surfaces as a unique violation
    pub async fn create(&mut self, participant: &Participant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO participants (
                participant_id, competition_id, user_id, status, payment_status, scores,
                total_score, position, prize_amount, disqualified_reason, registered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(participant.participant_id)
        .bind(participant.competition_id)
        .bind(participant.user_id)
        .bind(participant.status)
        .bind(participant.payment_status)
        .bind(&participant.scores)
        .bind(participant.total_score)
        .bind(participant.position)
        .bind(participant.prize_amount)
        .bind(&participant.disqualified_reason)
        .bind(participant.registered_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some("23505")
            {
                return StorageError::UniqueViolation(
                    db_err.constraint().unwrap_or("participants").to_string(),
                );
            }
            StorageError::from(e)
        })?;

        Ok(())
    }

    pub async fn update(&mut self, participant: &Participant) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE participants
            SET
                status = $2,
                payment_status = $3,
                scores = $4,
                total_score = $5,
                position = $6,
                prize_amount = $7,
                disqualified_reason = $8
            WHERE participant_id = $1
            "#,
        )
        .bind(participant.participant_id)
        .bind(participant.status)
        .bind(participant.payment_status)
        .bind(&participant.scores)
        .bind(participant.total_score)
        .bind(participant.position)
        .bind(participant.prize_amount)
        .bind(&participant.disqualified_reason)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM participants WHERE participant_id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
