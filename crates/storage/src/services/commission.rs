//! Commission rate lookup
//!
//! The platform setting `competition_commission_rate` is the only source of
//! the rate. Reads are served from memory for `ttl`; every write through
//! [`CommissionRates::update`] drops the cached value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{EngineContext, ensure_admin};
use crate::error::LifecycleError;
use crate::models::{Actor, COMPETITION_COMMISSION_RATE, PlatformSetting};

/// How long a loaded rate is trusted (1 hour)
pub const COMMISSION_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Rate used until an admin writes the setting (10%)
pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::TEN;

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    loaded_at: Instant,
}

pub struct CommissionRates {
    ctx: EngineContext,
    ttl: Duration,
    cached: RwLock<Option<CachedRate>>,
    /// Bumped by every invalidation; a load that straddles one is not cached.
    generation: AtomicU64,
}

impl CommissionRates {
    pub fn new(ctx: EngineContext, ttl: Duration) -> Self {
        Self {
            ctx,
            ttl,
            cached: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn fresh(&self) -> Option<Decimal> {
        let cached = self.cached.read();
        (*cached)
            .filter(|c| c.loaded_at.elapsed() < self.ttl)
            .map(|c| c.rate)
    }

    /// Current rate as a percentage.
    pub async fn current(&self) -> Result<Decimal, LifecycleError> {
        if let Some(rate) = self.fresh() {
            debug!(%rate, "Commission rate served from cache");
            return Ok(rate);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let mut tx = self.ctx.begin().await?;
        let rate = tx
            .find_setting(COMPETITION_COMMISSION_RATE)
            .await?
            .map(|setting| setting.value)
            .unwrap_or(DEFAULT_COMMISSION_RATE);
        drop(tx);

        let mut cached = self.cached.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *cached = Some(CachedRate {
                rate,
                loaded_at: Instant::now(),
            });
            debug!(%rate, "Commission rate loaded");
        } else {
            debug!(%rate, "Commission rate changed during load, not cached");
        }
        Ok(rate)
    }

    pub async fn update(&self, actor: &Actor, rate: Decimal) -> Result<Decimal, LifecycleError> {
        ensure_admin(actor)?;
        if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
            return Err(LifecycleError::InvalidInput(
                "Commission rate must be between 0 and 100".to_string(),
            ));
        }

        let setting = PlatformSetting {
            key: COMPETITION_COMMISSION_RATE.to_string(),
            value: rate,
            updated_at: self.ctx.now(),
        };
        let mut tx = self.ctx.begin().await?;
        tx.upsert_setting(&setting).await?;
        tx.commit().await?;
        self.invalidate();

        info!(%rate, actor = %actor.user_id, "Commission rate updated");
        Ok(rate)
    }

    pub fn invalidate(&self) {
        let mut cached = self.cached.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *cached = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::repository::{LifecycleStore, MemoryStore};
    use crate::services::{FixedClock, RecordingPublisher};

    fn rates(store: &MemoryStore, ttl: Duration) -> CommissionRates {
        let ctx = EngineContext::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(RecordingPublisher::new()),
        );
        CommissionRates::new(ctx, ttl)
    }

    async fn write_directly(store: &MemoryStore, value: Decimal) {
        let mut tx = store.begin().await.unwrap();
        tx.upsert_setting(&PlatformSetting {
            key: COMPETITION_COMMISSION_RATE.to_string(),
            value,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_defaults_to_ten_percent() {
        let store = MemoryStore::new();
        assert_eq!(rates(&store, COMMISSION_CACHE_TTL).current().await.unwrap(), dec!(10));
    }

    #[tokio::test]
    async fn test_cached_until_invalidated() {
        let store = MemoryStore::new();
        let rates = rates(&store, COMMISSION_CACHE_TTL);
        assert_eq!(rates.current().await.unwrap(), dec!(10));

        write_directly(&store, dec!(12.5)).await;
        assert_eq!(rates.current().await.unwrap(), dec!(10));

        rates.invalidate();
        assert_eq!(rates.current().await.unwrap(), dec!(12.5));
    }

    #[tokio::test]
    async fn test_expired_entry_is_reloaded() {
        let store = MemoryStore::new();
        let rates = rates(&store, Duration::ZERO);
        assert_eq!(rates.current().await.unwrap(), dec!(10));

        write_directly(&store, dec!(7)).await;
        assert_eq!(rates.current().await.unwrap(), dec!(7));
    }

    #[tokio::test]
    async fn test_load_overtaken_by_invalidation_is_not_cached() {
        let store = MemoryStore::new();
        let rates = Arc::new(rates(&store, COMMISSION_CACHE_TTL));

        // hold the store so the lookup has to wait for it
        let blocker = store.begin().await.unwrap();
        let lookup = tokio::spawn({
            let rates = rates.clone();
            async move { rates.current().await }
        });
        tokio::task::yield_now().await;

        rates.invalidate();
        drop(blocker);
        assert_eq!(lookup.await.unwrap().unwrap(), dec!(10));

        write_directly(&store, dec!(12)).await;
        assert_eq!(rates.current().await.unwrap(), dec!(12));
    }

    #[tokio::test]
    async fn test_update_requires_admin_and_invalidates() {
        let store = MemoryStore::new();
        let rates = rates(&store, COMMISSION_CACHE_TTL);
        assert_eq!(rates.current().await.unwrap(), dec!(10));

        let user = Actor::user(Uuid::new_v4());
        assert!(matches!(
            rates.update(&user, dec!(15)).await,
            Err(LifecycleError::Forbidden)
        ));

        let admin = Actor::admin(Uuid::new_v4());
        assert!(rates.update(&admin, dec!(101)).await.is_err());
        rates.update(&admin, dec!(15)).await.unwrap();
        assert_eq!(rates.current().await.unwrap(), dec!(15));
    }
}
