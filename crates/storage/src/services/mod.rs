//! The competition lifecycle engine.
//!
//! Every operation runs in one store transaction: read and lock, apply the
//! model rules, write, commit, and only then emit live events.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LifecycleError;
use crate::models::{Actor, Competition, Participant, Payment, Performance};
use crate::repository::{LifecycleStore, LifecycleTx};

pub mod clock;
pub mod commission;
pub mod entry_gate;
pub mod ledger;
pub mod live_events;
pub mod performance_queue;
pub mod registry;
pub mod scoring;
pub mod spectators;

pub use clock::{Clock, SystemClock};
pub use commission::CommissionRates;
pub use entry_gate::EntryGate;
pub use ledger::PaymentLedger;
pub use live_events::{EventPublisher, LiveEvent, LiveEventBus, LiveEventType, PublishError};
pub use performance_queue::PerformanceQueue;
pub use registry::CompetitionRegistry;
pub use scoring::ScoringEngine;
pub use spectators::Spectators;

#[cfg(any(test, feature = "testkit"))]
pub use clock::FixedClock;
#[cfg(any(test, feature = "testkit"))]
pub use live_events::RecordingPublisher;

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn LifecycleStore>,
    pub clock: Arc<dyn Clock>,
    pub events: LiveEventBus,
}

impl EngineContext {
    pub fn new(
        store: Arc<dyn LifecycleStore>,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let events = LiveEventBus::new(publisher, clock.clone());
        Self {
            store,
            clock,
            events,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn begin(&self) -> Result<Box<dyn LifecycleTx>, LifecycleError> {
        Ok(self.store.begin().await?)
    }
}

pub(crate) async fn load_competition(
    tx: &mut dyn LifecycleTx,
    id: Uuid,
) -> Result<Competition, LifecycleError> {
    tx.find_competition(id)
        .await?
        .ok_or(LifecycleError::not_found("competition", id))
}

pub(crate) async fn lock_competition(
    tx: &mut dyn LifecycleTx,
    id: Uuid,
) -> Result<Competition, LifecycleError> {
    tx.lock_competition(id)
        .await?
        .ok_or(LifecycleError::not_found("competition", id))
}

pub(crate) async fn load_participant(
    tx: &mut dyn LifecycleTx,
    id: Uuid,
) -> Result<Participant, LifecycleError> {
    tx.find_participant(id)
        .await?
        .ok_or(LifecycleError::not_found("participant", id))
}

pub(crate) async fn lock_payment(
    tx: &mut dyn LifecycleTx,
    id: Uuid,
) -> Result<Payment, LifecycleError> {
    tx.lock_payment(id)
        .await?
        .ok_or(LifecycleError::not_found("payment", id))
}

pub(crate) async fn load_performance(
    tx: &mut dyn LifecycleTx,
    id: Uuid,
) -> Result<Performance, LifecycleError> {
    tx.find_performance(id)
        .await?
        .ok_or(LifecycleError::not_found("performance", id))
}

pub(crate) fn ensure_manager(actor: &Actor, competition: &Competition) -> Result<(), LifecycleError> {
    if actor.can_manage(competition) {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden)
    }
}

pub(crate) fn ensure_admin(actor: &Actor) -> Result<(), LifecycleError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden)
    }
}

pub(crate) fn ensure_open(competition: &Competition) -> Result<(), LifecycleError> {
    if competition.status.is_terminal() {
        Err(LifecycleError::CompetitionClosed(competition.status))
    } else {
        Ok(())
    }
}

/// All engine services wired to one store, clock and publisher.
#[derive(Clone)]
pub struct Lifecycle {
    pub registry: CompetitionRegistry,
    pub entries: EntryGate,
    pub ledger: PaymentLedger,
    pub performances: PerformanceQueue,
    pub scoring: ScoringEngine,
    pub spectators: Spectators,
    pub commission: Arc<CommissionRates>,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn LifecycleStore>,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn EventPublisher>,
        commission_ttl: Duration,
    ) -> Self {
        let ctx = EngineContext::new(store, clock, publisher);
        let commission = Arc::new(CommissionRates::new(ctx.clone(), commission_ttl));
        let ledger = PaymentLedger::new(ctx.clone(), commission.clone());
        let performances = PerformanceQueue::new(ctx.clone());
        let scoring = ScoringEngine::new(ctx.clone());

        Self {
            registry: CompetitionRegistry::new(ctx.clone(), ledger.clone()),
            entries: EntryGate::new(ctx.clone(), commission.clone()),
            spectators: Spectators::new(ctx),
            ledger,
            performances,
            scoring,
            commission,
        }
    }
}
