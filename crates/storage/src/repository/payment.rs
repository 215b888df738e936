use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::{Payment, PaymentStatus};

const COLUMNS: &str = r#"
    payment_id, competition_id, participant_id, user_id, amount, commission_rate,
    commission_amount, organizer_amount, status, transaction_id, failure_reason,
    paid_at, refunded_at, created_at
"#;

pub struct PaymentRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PaymentRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&mut self, id: Uuid, for_update: bool) -> Result<Option<Payment>> {
        let lock = if for_update { "FOR UPDATE" } else { "" };
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE payment_id = $1 {lock}");

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(payment)
    }

    pub async fn list_by_competition(
        &mut self,
        competition_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM payments
            WHERE competition_id = $1
              AND ($2::payment_status IS NULL OR status = $2)
            ORDER BY created_at, payment_id
            "#
        );

        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(competition_id)
            .bind(status)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(payments)
    }

    pub async fn create(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, competition_id, participant_id, user_id, amount, commission_rate,
                commission_amount, organizer_amount, status, transaction_id, failure_reason,
                paid_at, refunded_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(payment.payment_id)
        .bind(payment.competition_id)
        .bind(payment.participant_id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(payment.commission_rate)
        .bind(payment.commission_amount)
        .bind(payment.organizer_amount)
        .bind(payment.status)
        .bind(&payment.transaction_id)
        .bind(&payment.failure_reason)
        .bind(payment.paid_at)
        .bind(payment.refunded_at)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some("23505")
            {
                return StorageError::UniqueViolation("Transaction id already exists".to_string());
            }
            StorageError::from(e)
        })?;

        Ok(())
    }

    /// Only the mutable part of a payment: its status and timestamps
    pub async fn update(&mut self, payment: &Payment) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET
                participant_id = $2,
                status = $3,
                failure_reason = $4,
                paid_at = $5,
                refunded_at = $6
            WHERE payment_id = $1
            "#,
        )
        .bind(payment.payment_id)
        .bind(payment.participant_id)
        .bind(payment.status)
        .bind(&payment.failure_reason)
        .bind(payment.paid_at)
        .bind(payment.refunded_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}
