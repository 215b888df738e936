use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::{Competition, CompetitionStatus};

const COLUMNS: &str = r#"
    competition_id, organizer_id, name, slug, rules, status, entry_fee,
    max_participants, current_participants, total_prize_pool, start_date,
    start_time, duration_minutes, registration_deadline, prizes,
    judging_criteria, broadcast_started_at, created_at, updated_at
"#;

/// Repository for Competition database operations
pub struct CompetitionRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> CompetitionRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Get a competition by ID, optionally taking a row lock
    pub async fn find_by_id(&mut self, id: Uuid, for_update: bool) -> Result<Option<Competition>> {
        let lock = if for_update { "FOR UPDATE" } else { "" };
        let sql = format!("SELECT {COLUMNS} FROM competitions WHERE competition_id = $1 {lock}");

        let competition = sqlx::query_as::<_, Competition>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(competition)
    }

    /// List competitions, newest first
    pub async fn list(&mut self, status: Option<CompetitionStatus>) -> Result<Vec<Competition>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM competitions
            WHERE ($1::competition_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#
        );

        let competitions = sqlx::query_as::<_, Competition>(&sql)
            .bind(status)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(competitions)
    }

    pub async fn create(&mut self, competition: &Competition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO competitions (
                competition_id, organizer_id, name, slug, rules, status, entry_fee,
                max_participants, current_participants, total_prize_pool, start_date,
                start_time, duration_minutes, registration_deadline, prizes,
                judging_criteria, broadcast_started_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(competition.competition_id)
        .bind(competition.organizer_id)
        .bind(&competition.name)
        .bind(&competition.slug)
        .bind(&competition.rules)
        .bind(competition.status)
        .bind(competition.entry_fee)
        .bind(competition.max_participants)
        .bind(competition.current_participants)
        .bind(competition.total_prize_pool)
        .bind(competition.start_date)
        .bind(competition.start_time)
        .bind(competition.duration_minutes)
        .bind(competition.registration_deadline)
        .bind(&competition.prizes)
        .bind(&competition.judging_criteria)
        .bind(competition.broadcast_started_at)
        .bind(competition.created_at)
        .bind(competition.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some("23505")
            {
                return StorageError::UniqueViolation("Slug already exists".to_string());
            }
            StorageError::from(e)
        })?;

        Ok(())
    }

    pub async fn update(&mut self, competition: &Competition) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE competitions
            SET
                name = $2,
                slug = $3,
                rules = $4,
                status = $5,
                entry_fee = $6,
                max_participants = $7,
                current_participants = $8,
                total_prize_pool = $9,
                start_date = $10,
                start_time = $11,
                duration_minutes = $12,
                registration_deadline = $13,
                prizes = $14,
                judging_criteria = $15,
                broadcast_started_at = $16,
                updated_at = $17
            WHERE competition_id = $1
            "#,
        )
        .bind(competition.competition_id)
        .bind(&competition.name)
        .bind(&competition.slug)
        .bind(&competition.rules)
        .bind(competition.status)
        .bind(competition.entry_fee)
        .bind(competition.max_participants)
        .bind(competition.current_participants)
        .bind(competition.total_prize_pool)
        .bind(competition.start_date)
        .bind(competition.start_time)
        .bind(competition.duration_minutes)
        .bind(competition.registration_deadline)
        .bind(&competition.prizes)
        .bind(&competition.judging_criteria)
        .bind(competition.broadcast_started_at)
        .bind(competition.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }

    /// Delete a competition by ID; child rows go with it
    pub async fn delete(&mut self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM competitions
            WHERE competition_id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
