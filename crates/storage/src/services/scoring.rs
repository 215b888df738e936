//! Weighted scoring, ranking and prize assignment
//!
//! total = Σ score[c] × weight[c] / 100 over the competition's judging
//! criteria, rounded to 2 decimals. Ranking orders confirmed participants by
//! total descending, then earliest registration, then participant id.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::{EngineContext, ensure_manager, load_competition, load_participant, lock_competition};
use crate::dto::scoring::RankingEntry;
use crate::error::LifecycleError;
use crate::models::{
    Actor, Competition, CompetitionStatus, JudgingCriterion, Participant, ParticipantStatus,
    Prize, round_money,
};
use crate::repository::LifecycleTx;

pub fn validate_scores(
    criteria: &[JudgingCriterion],
    scores: &BTreeMap<String, Decimal>,
) -> Result<(), LifecycleError> {
    for (name, value) in scores {
        if !criteria.iter().any(|c| &c.name == name) {
            return Err(LifecycleError::InvalidScoreCriterion(name.clone()));
        }
        if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
            return Err(LifecycleError::InvalidScoreValue {
                criterion: name.clone(),
                value: *value,
            });
        }
    }
    Ok(())
}

/// A criterion without a score contributes nothing.
pub fn compute_total_score(
    competition_id: Uuid,
    criteria: &[JudgingCriterion],
    scores: &BTreeMap<String, Decimal>,
) -> Result<Decimal, LifecycleError> {
    if criteria.is_empty() {
        return Err(LifecycleError::MissingJudgingCriteria(competition_id));
    }
    let weighted: Decimal = criteria
        .iter()
        .filter_map(|c| scores.get(&c.name).map(|score| *score * c.weight))
        .sum();
    Ok(round_money(weighted / Decimal::ONE_HUNDRED))
}

/// Confirmed participants (and already awarded winners) in ranking order.
pub fn rank(participants: &[Participant]) -> Vec<&Participant> {
    let mut ranked: Vec<&Participant> = participants
        .iter()
        .filter(|p| p.status.is_ranked())
        .collect();
    ranked.sort_by(|a, b| {
        let a_total = a.total_score.unwrap_or_default();
        let b_total = b.total_score.unwrap_or_default();
        b_total
            .cmp(&a_total)
            .then(a.registered_at.cmp(&b.registered_at))
            .then(a.participant_id.cmp(&b.participant_id))
    });
    ranked
}

/// Amount paid to `position`, matched on the prize's own position field.
pub fn prize_for(prizes: &[Prize], position: i32, pool: Decimal) -> Option<Decimal> {
    prizes
        .iter()
        .find(|p| p.position == position)
        .map(|p| round_money(pool * p.percentage / Decimal::ONE_HUNDRED))
}

pub fn standings(competition: &Competition, participants: &[Participant]) -> Vec<RankingEntry> {
    rank(participants)
        .into_iter()
        .enumerate()
        .map(|(index, participant)| {
            let position = index as i32 + 1;
            RankingEntry {
                position,
                participant_id: participant.participant_id,
                user_id: participant.user_id,
                status: participant.status,
                total_score: participant.total_score.unwrap_or_default(),
                prize_amount: prize_for(&competition.prizes, position, competition.total_prize_pool),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct ScoringEngine {
    ctx: EngineContext,
}

impl ScoringEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Merges judge scores into the participant and stores the new total.
    pub async fn record_scores(
        &self,
        actor: &Actor,
        participant_id: Uuid,
        scores: BTreeMap<String, Decimal>,
    ) -> Result<Participant, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let participant = load_participant(tx.as_mut(), participant_id).await?;
        let competition = lock_competition(tx.as_mut(), participant.competition_id).await?;
        ensure_manager(actor, &competition)?;
        if competition.status != CompetitionStatus::Active {
            return Err(LifecycleError::CompetitionClosed(competition.status));
        }

        let mut participant = load_participant(tx.as_mut(), participant_id).await?;
        if participant.status == ParticipantStatus::Disqualified {
            return Err(LifecycleError::InvalidInput(
                "Disqualified participants cannot be scored".to_string(),
            ));
        }
        validate_scores(&competition.judging_criteria, &scores)?;
        participant.scores.0.extend(scores);
        participant.total_score = Some(compute_total_score(
            competition.competition_id,
            &competition.judging_criteria,
            &participant.scores,
        )?);
        tx.update_participant(&participant).await?;
        tx.commit().await?;

        info!(%participant_id, total = ?participant.total_score, "Scores recorded");
        self.ctx.events.scores_updated(&participant).await;
        Ok(participant)
    }

    /// Current leaderboard with the prize each position would pay.
    pub async fn compute_ranking(
        &self,
        competition_id: Uuid,
    ) -> Result<Vec<RankingEntry>, LifecycleError> {
        let mut tx = self.ctx.begin().await?;
        let competition = load_competition(tx.as_mut(), competition_id).await?;
        let participants = tx.list_participants(competition_id).await?;
        Ok(standings(&competition, &participants))
    }
}

/// Final ranking inside the completing transaction: totals are recomputed
/// from the stored scores, every ranked participant gets its position and
/// the prize positions become winners.
pub(crate) async fn finalize_in_tx(
    tx: &mut dyn LifecycleTx,
    competition: &Competition,
) -> Result<(Vec<RankingEntry>, Vec<Participant>), LifecycleError> {
    let criteria = &competition.judging_criteria;
    if criteria.is_empty() {
        return Err(LifecycleError::MissingJudgingCriteria(competition.competition_id));
    }

    let mut participants = tx.list_participants(competition.competition_id).await?;
    for participant in participants.iter_mut().filter(|p| p.status.is_ranked()) {
        participant.total_score = Some(compute_total_score(
            competition.competition_id,
            criteria,
            &participant.scores,
        )?);
    }

    let positions: HashMap<Uuid, i32> = rank(&participants)
        .into_iter()
        .enumerate()
        .map(|(index, p)| (p.participant_id, index as i32 + 1))
        .collect();

    let mut placed = Vec::with_capacity(positions.len());
    for participant in participants.iter_mut() {
        let Some(&position) = positions.get(&participant.participant_id) else {
            continue;
        };
        participant.position = Some(position);
        participant.prize_amount =
            prize_for(&competition.prizes, position, competition.total_prize_pool);
        if participant.prize_amount.is_some() && participant.status == ParticipantStatus::Confirmed {
            participant.transition_to(ParticipantStatus::Winner)?;
        }
        tx.update_participant(participant).await?;
        placed.push(participant.clone());
    }
    placed.sort_by_key(|p| p.position);

    Ok((standings(competition, &participants), placed))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use sqlx::types::Json;

    use super::*;
    use crate::models::competition::tests::sample_competition;
    use crate::services::testing::{Harness, harness};

    fn criteria() -> Vec<JudgingCriterion> {
        vec![
            JudgingCriterion { name: "flow".to_string(), weight: dec!(30) },
            JudgingCriterion { name: "technique".to_string(), weight: dec!(70) },
        ]
    }

    fn scores(pairs: &[(&str, Decimal)]) -> BTreeMap<String, Decimal> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_weighted_total() {
        let total = compute_total_score(
            Uuid::new_v4(),
            &criteria(),
            &scores(&[("flow", dec!(80)), ("technique", dec!(50))]),
        )
        .unwrap();
        assert_eq!(total, dec!(59.00));
    }

    #[test]
    fn test_missing_score_contributes_nothing() {
        let total =
            compute_total_score(Uuid::new_v4(), &criteria(), &scores(&[("flow", dec!(80))])).unwrap();
        assert_eq!(total, dec!(24));
    }

    #[test]
    fn test_missing_criteria_is_an_error() {
        let id = Uuid::new_v4();
        assert!(matches!(
            compute_total_score(id, &[], &BTreeMap::new()),
            Err(LifecycleError::MissingJudgingCriteria(missing)) if missing == id
        ));
    }

    #[test]
    fn test_score_validation() {
        assert!(matches!(
            validate_scores(&criteria(), &scores(&[("style", dec!(50))])),
            Err(LifecycleError::InvalidScoreCriterion(name)) if name == "style"
        ));
        assert!(matches!(
            validate_scores(&criteria(), &scores(&[("flow", dec!(100.5))])),
            Err(LifecycleError::InvalidScoreValue { .. })
        ));
        assert!(validate_scores(&criteria(), &scores(&[("flow", dec!(0)), ("technique", dec!(100))])).is_ok());
    }

    #[test]
    fn test_tie_break_by_registration_time() {
        let competition_id = Uuid::new_v4();
        let now = Utc::now();
        let mut early = Participant::new(competition_id, Uuid::new_v4(), true, now);
        let mut late = Participant::new(competition_id, Uuid::new_v4(), true, now + Duration::seconds(5));
        let mut best = Participant::new(competition_id, Uuid::new_v4(), true, now + Duration::seconds(9));
        let mut unconfirmed = Participant::new(competition_id, Uuid::new_v4(), true, now);
        for (p, total) in [(&mut early, dec!(70)), (&mut late, dec!(70)), (&mut best, dec!(90))] {
            p.status = ParticipantStatus::Confirmed;
            p.total_score = Some(total);
        }
        unconfirmed.total_score = Some(dec!(99));

        let participants = vec![late.clone(), unconfirmed, best.clone(), early.clone()];
        let order: Vec<Uuid> = rank(&participants).iter().map(|p| p.participant_id).collect();
        assert_eq!(order, vec![best.participant_id, early.participant_id, late.participant_id]);
    }

    #[test]
    fn test_prize_split_of_sixty_thousand() {
        let mut competition = sample_competition();
        competition.current_participants = 12;
        competition.recompute_prize_pool();
        assert_eq!(competition.total_prize_pool, dec!(60000));

        let amounts: Vec<Option<Decimal>> = (1..=4)
            .map(|position| prize_for(&competition.prizes, position, competition.total_prize_pool))
            .collect();
        assert_eq!(
            amounts,
            vec![Some(dec!(30000)), Some(dec!(18000)), Some(dec!(12000)), None]
        );
    }

    #[test]
    fn test_prizes_matched_on_position_field() {
        let mut competition = sample_competition();
        competition.prizes = Json(vec![
            Prize { position: 2, percentage: dec!(40) },
            Prize { position: 1, percentage: dec!(60) },
        ]);
        assert_eq!(prize_for(&competition.prizes, 1, dec!(1000)), Some(dec!(600)));
        assert_eq!(prize_for(&competition.prizes, 2, dec!(1000)), Some(dec!(400)));
    }

    async fn active_with(h: &Harness, slug: &str, count: usize) -> (Uuid, Vec<Participant>) {
        let competition = h.published(slug, dec!(5000), 16).await;
        let mut participants = Vec::new();
        for _ in 0..count {
            participants.push(
                h.engine
                    .entries
                    .register_participant(competition.competition_id, Uuid::new_v4(), dec!(5000))
                    .await
                    .unwrap()
                    .participant,
            );
        }
        h.start(competition.competition_id).await;
        (competition.competition_id, participants)
    }

    #[tokio::test]
    async fn test_record_scores_merges_and_totals() {
        let h = harness();
        let (_, participants) = active_with(&h, "record-scores", 1).await;
        let id = participants[0].participant_id;

        let first = h
            .engine
            .scoring
            .record_scores(&h.organizer, id, scores(&[("flow", dec!(80))]))
            .await
            .unwrap();
        assert_eq!(first.total_score, Some(dec!(24)));

        let second = h
            .engine
            .scoring
            .record_scores(&h.organizer, id, scores(&[("technique", dec!(50))]))
            .await
            .unwrap();
        assert_eq!(second.scores.len(), 2);
        assert_eq!(second.total_score, Some(dec!(59.00)));
        assert_eq!(h.publisher.count("scores-updated"), 2);

        assert!(matches!(
            h.engine
                .scoring
                .record_scores(&Actor::user(Uuid::new_v4()), id, scores(&[("flow", dec!(1))]))
                .await,
            Err(LifecycleError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_scores_rejected_outside_active_phase() {
        let h = harness();
        let competition = h.published("not-live", Decimal::ZERO, 4).await;
        let participant = h
            .engine
            .entries
            .register_participant(competition.competition_id, Uuid::new_v4(), Decimal::ZERO)
            .await
            .unwrap()
            .participant;
        assert!(matches!(
            h.engine
                .scoring
                .record_scores(&h.organizer, participant.participant_id, scores(&[("flow", dec!(10))]))
                .await,
            Err(LifecycleError::CompetitionClosed(CompetitionStatus::Published))
        ));
    }

    #[tokio::test]
    async fn test_ranking_projects_prizes() {
        let h = harness();
        let (competition_id, participants) = active_with(&h, "ranking", 12).await;
        for (index, participant) in participants.iter().enumerate() {
            let value = Decimal::from(40 + index as i64);
            h.engine
                .scoring
                .record_scores(
                    &h.organizer,
                    participant.participant_id,
                    scores(&[("flow", value), ("technique", value)]),
                )
                .await
                .unwrap();
        }

        let ranking = h.engine.scoring.compute_ranking(competition_id).await.unwrap();
        assert_eq!(ranking.len(), 12);
        assert_eq!(ranking[0].participant_id, participants[11].participant_id);
        assert_eq!(ranking[0].prize_amount, Some(dec!(30000)));
        assert_eq!(ranking[1].prize_amount, Some(dec!(18000)));
        assert_eq!(ranking[2].prize_amount, Some(dec!(12000)));
        assert_eq!(ranking[3].prize_amount, None);
    }
}
