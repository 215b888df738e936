use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod dto;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

use error::Result;
use repository::PgStore;
use services::{Clock, EventPublisher, Lifecycle};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Lifecycle engine backed by this database.
    pub fn lifecycle(
        &self,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn EventPublisher>,
        commission_ttl: Duration,
    ) -> Lifecycle {
        let store = Arc::new(PgStore::new(self.pool.clone()));
        Lifecycle::new(store, clock, publisher, commission_ttl)
    }
}
