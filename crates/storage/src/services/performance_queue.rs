//! Live performance queue
//!
//! Approved performances are numbered 1..N when the competition starts and
//! played in that order. At most one performance of a competition is
//! `playing` at a time; advancing closes it and puts the next one on stage.

use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use super::{
    EngineContext, ensure_manager, load_competition, load_participant, load_performance,
    lock_competition,
};
use crate::dto::performance::AdvanceOutcome;
use crate::error::LifecycleError;
use crate::models::{
    Actor, CompetitionStatus, ParticipantStatus, Performance, PerformanceStatus,
};
use crate::repository::LifecycleTx;

#[derive(Clone)]
pub struct PerformanceQueue {
    ctx: EngineContext,
}

impl PerformanceQueue {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn submit(
        &self,
        actor: &Actor,
        participant_id: Uuid,
        audio_ref: &str,
        duration_seconds: i32,
    ) -> Result<Performance, LifecycleError> {
        if duration_seconds <= 0 {
            return Err(LifecycleError::InvalidInput(
                "Duration must be positive".to_string(),
            ));
        }
        if audio_ref.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "Audio reference is required".to_string(),
            ));
        }

        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let participant = load_participant(tx.as_mut(), participant_id).await?;
        let competition = load_competition(tx.as_mut(), participant.competition_id).await?;
        if participant.user_id != actor.user_id {
            ensure_manager(actor, &competition)?;
        }
        if !matches!(
            competition.status,
            CompetitionStatus::Published | CompetitionStatus::Active
        ) {
            return Err(LifecycleError::CompetitionClosed(competition.status));
        }
        if participant.status == ParticipantStatus::Disqualified {
            return Err(LifecycleError::InvalidInput(
                "Disqualified participants cannot submit performances".to_string(),
            ));
        }

        let performance = Performance::new(
            competition.competition_id,
            participant_id,
            audio_ref.trim(),
            duration_seconds,
            now,
        );
        tx.insert_performance(&performance).await?;
        tx.commit().await?;

        info!(performance_id = %performance.performance_id, %participant_id, "Performance submitted");
        self.ctx.events.performance_updated(&performance).await;
        Ok(performance)
    }

    /// Approves a pending performance. Once the running order exists or the
    /// competition is live, late approvals join the end of it.
    pub async fn approve(
        &self,
        actor: &Actor,
        performance_id: Uuid,
    ) -> Result<Performance, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut performance = load_performance(tx.as_mut(), performance_id).await?;
        let competition = lock_competition(tx.as_mut(), performance.competition_id).await?;
        ensure_manager(actor, &competition)?;
        super::ensure_open(&competition)?;

        performance.transition_to(PerformanceStatus::Approved, now)?;
        let queue = tx.list_performances(competition.competition_id).await?;
        let last = queue.iter().filter_map(|p| p.play_order).max();
        if last.is_some() || competition.status == CompetitionStatus::Active {
            performance.play_order = Some(last.unwrap_or(0) + 1);
        }
        tx.update_performance(&performance).await?;
        tx.commit().await?;

        info!(%performance_id, play_order = ?performance.play_order, "Performance approved");
        self.ctx.events.performance_updated(&performance).await;
        Ok(performance)
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        performance_id: Uuid,
        reason: &str,
    ) -> Result<Performance, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let mut performance = load_performance(tx.as_mut(), performance_id).await?;
        let competition = lock_competition(tx.as_mut(), performance.competition_id).await?;
        ensure_manager(actor, &competition)?;

        performance.transition_to(PerformanceStatus::Rejected, now)?;
        performance.rejection_reason = Some(reason.to_string());
        tx.update_performance(&performance).await?;
        tx.commit().await?;

        info!(%performance_id, reason, "Performance rejected");
        self.ctx.events.performance_updated(&performance).await;
        Ok(performance)
    }

    /// Numbers the approved performances 1..N, by submission time or in the
    /// organizer's explicit order.
    pub async fn assign_play_order(
        &self,
        actor: &Actor,
        competition_id: Uuid,
        explicit: Option<Vec<Uuid>>,
    ) -> Result<Vec<Performance>, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        if !matches!(
            competition.status,
            CompetitionStatus::Published | CompetitionStatus::Active
        ) {
            return Err(LifecycleError::CompetitionClosed(competition.status));
        }

        let ordered = assign_in_tx(tx.as_mut(), competition_id, explicit.as_deref()).await?;
        tx.commit().await?;

        info!(%competition_id, performances = ordered.len(), "Play order assigned");
        for performance in &ordered {
            self.ctx.events.performance_updated(performance).await;
        }
        Ok(ordered)
    }

    pub async fn advance(
        &self,
        actor: &Actor,
        competition_id: Uuid,
    ) -> Result<AdvanceOutcome, LifecycleError> {
        let now = self.ctx.now();
        let mut tx = self.ctx.begin().await?;
        let competition = lock_competition(tx.as_mut(), competition_id).await?;
        ensure_manager(actor, &competition)?;
        if competition.status != CompetitionStatus::Active {
            return Err(LifecycleError::CompetitionClosed(competition.status));
        }

        let queue = tx.list_performances(competition_id).await?;
        let mut finished = queue
            .iter()
            .find(|p| p.status == PerformanceStatus::Playing)
            .cloned();
        let mut upcoming = next_in_line(&queue);

        // the current item leaves the stage before the next one enters
        if let Some(current) = finished.as_mut() {
            current.transition_to(PerformanceStatus::Played, now)?;
            tx.update_performance(current).await?;
        }
        let mut now_playing = upcoming.next().cloned();
        if let Some(next) = now_playing.as_mut() {
            next.transition_to(PerformanceStatus::Playing, now)?;
            tx.update_performance(next).await?;
        }
        let remaining = upcoming.count();
        tx.commit().await?;

        let outcome = AdvanceOutcome {
            finished,
            now_playing,
            remaining,
        };
        info!(
            %competition_id,
            now_playing = ?outcome.now_playing.as_ref().map(|p| p.performance_id),
            remaining,
            "Performance queue advanced"
        );
        self.ctx
            .events
            .performance_advanced(competition_id, &outcome)
            .await;
        Ok(outcome)
    }

    pub async fn list(&self, competition_id: Uuid) -> Result<Vec<Performance>, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        load_competition(tx.as_mut(), competition_id).await?;
        Ok(tx.list_performances(competition_id).await?)
    }
}

/// Approved, numbered performances still waiting, in play order.
fn next_in_line(queue: &[Performance]) -> impl Iterator<Item = &Performance> {
    let mut waiting: Vec<&Performance> = queue
        .iter()
        .filter(|p| p.status == PerformanceStatus::Approved && p.play_order.is_some())
        .collect();
    waiting.sort_by_key(|p| p.play_order);
    waiting.into_iter()
}

/// Running order for the approved performances of `queue`. An explicit order
/// must list every approved performance exactly once.
pub fn play_sequence(
    queue: &[Performance],
    explicit: Option<&[Uuid]>,
) -> Result<Vec<Uuid>, LifecycleError> {
    if queue.iter().any(Performance::has_started) {
        return Err(LifecycleError::PlayOrderLocked);
    }

    let mut approved: Vec<&Performance> = queue
        .iter()
        .filter(|p| p.status == PerformanceStatus::Approved)
        .collect();
    approved.sort_by_key(|p| (p.recorded_at, p.performance_id));

    let Some(explicit) = explicit else {
        return Ok(approved.iter().map(|p| p.performance_id).collect());
    };

    let approved_ids: HashSet<Uuid> = approved.iter().map(|p| p.performance_id).collect();
    let mut seen = HashSet::new();
    for id in explicit {
        if !approved_ids.contains(id) {
            return Err(LifecycleError::PerformanceNotApproved(*id));
        }
        if !seen.insert(*id) {
            return Err(LifecycleError::InvalidPlayOrder(format!(
                "performance {id} is listed twice"
            )));
        }
    }
    if seen.len() != approved_ids.len() {
        return Err(LifecycleError::InvalidPlayOrder(
            "every approved performance must be listed".to_string(),
        ));
    }
    Ok(explicit.to_vec())
}

pub(crate) async fn assign_in_tx(
    tx: &mut dyn LifecycleTx,
    competition_id: Uuid,
    explicit: Option<&[Uuid]>,
) -> Result<Vec<Performance>, LifecycleError> {
    let queue = tx.list_performances(competition_id).await?;
    let sequence = play_sequence(&queue, explicit)?;

    let mut ordered = Vec::with_capacity(sequence.len());
    for (index, id) in sequence.iter().enumerate() {
        let Some(performance) = queue.iter().find(|p| p.performance_id == *id) else {
            continue;
        };
        let mut performance = performance.clone();
        performance.play_order = Some(index as i32 + 1);
        tx.update_performance(&performance).await?;
        ordered.push(performance);
    }
    Ok(ordered)
}

/// Closes the gaps a removed entrant leaves in the running order, keeping
/// the relative order. Returns the performances that were renumbered.
pub(crate) async fn compact_in_tx(
    tx: &mut dyn LifecycleTx,
    competition_id: Uuid,
) -> Result<Vec<Performance>, LifecycleError> {
    let mut numbered: Vec<Performance> = tx
        .list_performances(competition_id)
        .await?
        .into_iter()
        .filter(|p| p.play_order.is_some())
        .collect();
    numbered.sort_by_key(|p| p.play_order);

    let mut moved = Vec::new();
    // ascending, so every target slot is already free
    for (index, mut performance) in numbered.into_iter().enumerate() {
        let order = Some(index as i32 + 1);
        if performance.play_order != order {
            performance.play_order = order;
            tx.update_performance(&performance).await?;
            moved.push(performance);
        }
    }
    Ok(moved)
}

/// Called on start: keeps an order the organizer already set, otherwise
/// numbers the approved performances by submission time.
pub(crate) async fn ensure_assigned_in_tx(
    tx: &mut dyn LifecycleTx,
    competition_id: Uuid,
) -> Result<usize, LifecycleError> {
    let queue = tx.list_performances(competition_id).await?;
    let numbered = queue.iter().filter(|p| p.play_order.is_some()).count();
    if numbered > 0 {
        return Ok(numbered);
    }
    Ok(assign_in_tx(tx, competition_id, None).await?.len())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::Participant;
    use crate::services::testing::{Harness, harness};

    fn approved(offset_secs: i64) -> Performance {
        let mut performance = Performance::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "audio/take.mp3",
            90,
            Utc::now() + Duration::seconds(offset_secs),
        );
        performance.status = PerformanceStatus::Approved;
        performance
    }

    #[test]
    fn test_sequence_follows_submission_time() {
        let late = approved(30);
        let early = approved(0);
        let mut pending = approved(10);
        pending.status = PerformanceStatus::Pending;

        let sequence = play_sequence(&[late.clone(), pending, early.clone()], None).unwrap();
        assert_eq!(sequence, vec![early.performance_id, late.performance_id]);
    }

    #[test]
    fn test_explicit_order_must_be_permutation() {
        let a = approved(0);
        let b = approved(1);
        let mut rejected = approved(2);
        rejected.status = PerformanceStatus::Rejected;
        let queue = vec![a.clone(), b.clone(), rejected.clone()];

        let order = [b.performance_id, a.performance_id];
        assert_eq!(play_sequence(&queue, Some(&order)).unwrap(), order.to_vec());

        assert!(matches!(
            play_sequence(&queue, Some(&[a.performance_id, rejected.performance_id])),
            Err(LifecycleError::PerformanceNotApproved(id)) if id == rejected.performance_id
        ));
        assert!(matches!(
            play_sequence(&queue, Some(&[a.performance_id, a.performance_id])),
            Err(LifecycleError::InvalidPlayOrder(_))
        ));
        assert!(matches!(
            play_sequence(&queue, Some(&[a.performance_id])),
            Err(LifecycleError::InvalidPlayOrder(_))
        ));
    }

    #[test]
    fn test_order_locked_after_playback() {
        let mut playing = approved(0);
        playing.status = PerformanceStatus::Playing;
        assert!(matches!(
            play_sequence(&[playing, approved(1)], None),
            Err(LifecycleError::PlayOrderLocked)
        ));
    }

    async fn entrants(h: &Harness, slug: &str, count: usize) -> (Uuid, Vec<Participant>) {
        let competition = h.published(slug, Decimal::ZERO, 16).await;
        let mut participants = Vec::new();
        for _ in 0..count {
            participants.push(
                h.engine
                    .entries
                    .register_participant(competition.competition_id, Uuid::new_v4(), Decimal::ZERO)
                    .await
                    .unwrap()
                    .participant,
            );
        }
        (competition.competition_id, participants)
    }

    async fn submit_and_approve(h: &Harness, participant: &Participant) -> Performance {
        let performance = h
            .engine
            .performances
            .submit(&crate::models::Actor::user(participant.user_id), participant.participant_id, "audio/take.mp3", 120)
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(1));
        h.engine
            .performances
            .approve(&h.organizer, performance.performance_id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_queue_plays_each_item_once_in_order() {
        let h = harness();
        let (competition_id, participants) = entrants(&h, "queue-order", 3).await;
        let mut submitted = Vec::new();
        for participant in &participants {
            submitted.push(submit_and_approve(&h, participant).await);
        }
        h.start(competition_id).await;

        let queue = h.engine.performances.list(competition_id).await.unwrap();
        let mut orders: Vec<i32> = queue.iter().filter_map(|p| p.play_order).collect();
        orders.sort();
        assert_eq!(orders, vec![1, 2, 3]);

        let first = h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();
        assert!(first.finished.is_none());
        assert_eq!(
            first.now_playing.as_ref().unwrap().performance_id,
            submitted[0].performance_id
        );
        assert_eq!(first.remaining, 2);

        let second = h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();
        assert_eq!(
            second.finished.as_ref().unwrap().status,
            PerformanceStatus::Played
        );
        assert_eq!(
            second.now_playing.as_ref().unwrap().performance_id,
            submitted[1].performance_id
        );

        let queue = h.engine.performances.list(competition_id).await.unwrap();
        let playing = queue
            .iter()
            .filter(|p| p.status == PerformanceStatus::Playing)
            .count();
        assert_eq!(playing, 1);

        h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();
        let last = h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();
        assert!(last.now_playing.is_none());
        assert_eq!(last.remaining, 0);
        assert_eq!(h.publisher.count("performance-advanced"), 4);

        assert!(matches!(
            h.engine
                .performances
                .assign_play_order(&h.organizer, competition_id, None)
                .await,
            Err(LifecycleError::PlayOrderLocked)
        ));
    }

    #[tokio::test]
    async fn test_late_approval_is_appended() {
        let h = harness();
        let (competition_id, participants) = entrants(&h, "late-approval", 3).await;
        submit_and_approve(&h, &participants[0]).await;
        submit_and_approve(&h, &participants[1]).await;
        h.start(competition_id).await;

        let late = submit_and_approve(&h, &participants[2]).await;
        assert_eq!(late.play_order, Some(3));
    }

    #[tokio::test]
    async fn test_approval_after_empty_start_joins_queue() {
        let h = harness();
        let (competition_id, participants) = entrants(&h, "empty-start", 2).await;
        h.start(competition_id).await;

        let first = submit_and_approve(&h, &participants[0]).await;
        let second = submit_and_approve(&h, &participants[1]).await;
        assert_eq!(first.play_order, Some(1));
        assert_eq!(second.play_order, Some(2));

        let outcome = h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();
        assert_eq!(
            outcome.now_playing.unwrap().performance_id,
            first.performance_id
        );
        assert_eq!(outcome.remaining, 1);
    }

    #[tokio::test]
    async fn test_removal_keeps_order_contiguous() {
        let h = harness();
        let (competition_id, participants) = entrants(&h, "removal-gap", 3).await;
        let mut submitted = Vec::new();
        for participant in &participants {
            submitted.push(submit_and_approve(&h, participant).await);
        }
        h.start(competition_id).await;
        h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();

        h.engine
            .entries
            .remove_participant(&h.organizer, participants[1].participant_id)
            .await
            .unwrap();

        let queue = h.engine.performances.list(competition_id).await.unwrap();
        let mut orders: Vec<i32> = queue.iter().filter_map(|p| p.play_order).collect();
        orders.sort();
        assert_eq!(orders, vec![1, 2]);
        let last = queue
            .iter()
            .find(|p| p.performance_id == submitted[2].performance_id)
            .unwrap();
        assert_eq!(last.play_order, Some(2));

        let next = h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();
        assert_eq!(
            next.now_playing.unwrap().performance_id,
            submitted[2].performance_id
        );
        assert_eq!(next.remaining, 0);
    }

    #[tokio::test]
    async fn test_explicit_order_before_start() {
        let h = harness();
        let (competition_id, participants) = entrants(&h, "explicit-order", 2).await;
        let a = submit_and_approve(&h, &participants[0]).await;
        let b = submit_and_approve(&h, &participants[1]).await;

        let ordered = h
            .engine
            .performances
            .assign_play_order(&h.organizer, competition_id, Some(vec![b.performance_id, a.performance_id]))
            .await
            .unwrap();
        assert_eq!(ordered[0].performance_id, b.performance_id);
        assert_eq!(ordered[0].play_order, Some(1));
        assert_eq!(ordered[1].play_order, Some(2));

        // starting keeps the organizer's order
        h.start(competition_id).await;
        let first = h.engine.performances.advance(&h.organizer, competition_id).await.unwrap();
        assert_eq!(first.now_playing.unwrap().performance_id, b.performance_id);
    }

    #[tokio::test]
    async fn test_submit_rules() {
        let h = harness();
        let (_, participants) = entrants(&h, "submit-rules", 1).await;
        let owner = crate::models::Actor::user(participants[0].user_id);
        assert!(matches!(
            h.engine
                .performances
                .submit(&owner, participants[0].participant_id, "audio/a.mp3", 0)
                .await,
            Err(LifecycleError::InvalidInput(_))
        ));

        let stranger = crate::models::Actor::user(Uuid::new_v4());
        assert!(matches!(
            h.engine
                .performances
                .submit(&stranger, participants[0].participant_id, "audio/a.mp3", 60)
                .await,
            Err(LifecycleError::Forbidden)
        ));

        h.engine
            .entries
            .disqualify(&h.organizer, participants[0].participant_id, "no show")
            .await
            .unwrap();
        assert!(
            h.engine
                .performances
                .submit(&owner, participants[0].participant_id, "audio/a.mp3", 60)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_reject_pending_only() {
        let h = harness();
        let (_, participants) = entrants(&h, "reject", 1).await;
        let performance = submit_and_approve(&h, &participants[0]).await;
        assert!(matches!(
            h.engine
                .performances
                .reject(&h.organizer, performance.performance_id, "too long")
                .await,
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }
}
