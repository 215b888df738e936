use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::Performance;

const COLUMNS: &str = r#"
    performance_id, competition_id, participant_id, audio_ref, duration_seconds,
    status, play_order, rejection_reason, recorded_at, started_at, finished_at
"#;

pub struct PerformanceRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PerformanceRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&mut self, id: Uuid) -> Result<Option<Performance>> {
        let sql = format!("SELECT {COLUMNS} FROM performances WHERE performance_id = $1");

        let performance = sqlx::query_as::<_, Performance>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(performance)
    }

    /// Queue order: assigned play order first, then submission time
    pub async fn list_by_competition(&mut self, competition_id: Uuid) -> Result<Vec<Performance>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM performances
            WHERE competition_id = $1
            ORDER BY play_order NULLS LAST, recorded_at, performance_id
            "#
        );

        let performances = sqlx::query_as::<_, Performance>(&sql)
            .bind(competition_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(performances)
    }

    pub async fn create(&mut self, performance: &Performance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO performances (
                performance_id, competition_id, participant_id, audio_ref, duration_seconds,
                status, play_order, rejection_reason, recorded_at, started_at, finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(performance.performance_id)
        .bind(performance.competition_id)
        .bind(performance.participant_id)
        .bind(&performance.audio_ref)
        .bind(performance.duration_seconds)
        .bind(performance.status)
        .bind(performance.play_order)
        .bind(&performance.rejection_reason)
        .bind(performance.recorded_at)
        .bind(performance.started_at)
        .bind(performance.finished_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn update(&mut self, performance: &Performance) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE performances
            SET
                status = $2,
                play_order = $3,
                rejection_reason = $4,
                started_at = $5,
                finished_at = $6
            WHERE performance_id = $1
            "#,
        )
        .bind(performance.performance_id)
        .bind(performance.status)
        .bind(performance.play_order)
        .bind(&performance.rejection_reason)
        .bind(performance.started_at)
        .bind(performance.finished_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
