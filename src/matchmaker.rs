use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::balancer::balance_teams;
use crate::error::SelectionError;
use crate::optimizer::{
    build_candidate_pools, calculate_skill_band, check_searchable, search_combinations, SkipReason,
};
use crate::priority::PriorityFn;
use crate::providers::ResultSink;
use crate::selector::select_base_roster;
use crate::types::*;

/// How a selection was reached
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub strategy: SelectionStrategy,
    /// Whether the combination search produced the teams
    pub optimized: bool,
    pub skip_reason: Option<SkipReason>,
    pub combinations_evaluated: usize,
    /// Whether the skill band had to be widened to fill the pools
    pub expanded_band: bool,
    pub band: Option<SkillBand>,
    /// Cost of the winning combination
    pub metrics: Option<CostMetrics>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub teams: BalancedTeams,
    pub report: SelectionReport,
}

/// Picks ten players out of a lobby and splits them into two teams
pub struct Matchmaker {
    config: OptimizerConfig,
}

impl Matchmaker {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run the full selection pipeline.
    ///
    /// The priority-only base roster is always built first; it decides the
    /// user-facing errors (too few players, missing roles). Anything that
    /// goes wrong after that falls back to balancing the base roster.
    pub fn select<P, R>(
        &self,
        candidates: &[PlayerCandidate],
        priority: &P,
        rng: &mut R,
    ) -> Result<SelectionOutcome, SelectionError>
    where
        P: PriorityFn + ?Sized,
        R: Rng + ?Sized,
    {
        self.config.validate()?;
        let base = select_base_roster(candidates, priority, self.config.tie_break, rng)?;

        if self.config.strategy == SelectionStrategy::PriorityOnly {
            return self.fallback(base, SkipReason::PriorityOnly, None);
        }
        if candidates.len() == MATCH_SIZE {
            return self.fallback(base, SkipReason::NoAlternatives, None);
        }

        let band = calculate_skill_band(&base, &self.config);
        let pools = build_candidate_pools(candidates, &band, priority, &self.config, rng);
        if let Err(reason) = check_searchable(&pools) {
            return self.fallback(base, reason, Some(&pools));
        }

        match search_combinations(&pools, &self.config) {
            Ok(result) => Ok(SelectionOutcome {
                teams: result.teams,
                report: SelectionReport {
                    strategy: self.config.strategy,
                    optimized: true,
                    skip_reason: None,
                    combinations_evaluated: result.evaluated,
                    expanded_band: pools.expanded_band,
                    band: Some(pools.band),
                    metrics: Some(result.metrics),
                },
            }),
            Err(SelectionError::InsufficientRoleComposition { .. }) => {
                self.fallback(base, SkipReason::NoValidCombination, Some(&pools))
            }
            Err(e) => Err(e),
        }
    }

    /// Select teams and hand them to `sink`
    pub fn select_and_submit<P, R, S>(
        &self,
        candidates: &[PlayerCandidate],
        priority: &P,
        rng: &mut R,
        sink: &mut S,
    ) -> Result<SelectionOutcome, SelectionError>
    where
        P: PriorityFn + ?Sized,
        R: Rng + ?Sized,
        S: ResultSink + ?Sized,
    {
        let outcome = self.select(candidates, priority, rng)?;
        sink.submit(&outcome.teams);
        Ok(outcome)
    }

    fn fallback(
        &self,
        base: Vec<SelectedPlayer>,
        reason: SkipReason,
        pools: Option<&CandidatePools>,
    ) -> Result<SelectionOutcome, SelectionError> {
        log::debug!("combination search skipped: {:?}", reason);
        let teams = balance_teams(base)?;
        Ok(SelectionOutcome {
            teams,
            report: SelectionReport {
                strategy: self.config.strategy,
                optimized: false,
                skip_reason: Some(reason),
                combinations_evaluated: 0,
                expanded_band: pools.map_or(false, |p| p.expanded_band),
                band: pools.map(|p| p.band),
                metrics: None,
            },
        })
    }
}

/// Select and balance with an entropy-seeded RNG
pub fn select_and_balance<P>(
    candidates: &[PlayerCandidate],
    priority: &P,
    config: &OptimizerConfig,
) -> Result<BalancedTeams, SelectionError>
where
    P: PriorityFn + ?Sized,
{
    let mut rng = StdRng::from_entropy();
    select_and_balance_with_rng(candidates, priority, config, &mut rng)
}

pub fn select_and_balance_with_rng<P, R>(
    candidates: &[PlayerCandidate],
    priority: &P,
    config: &OptimizerConfig,
    rng: &mut R,
) -> Result<BalancedTeams, SelectionError>
where
    P: PriorityFn + ?Sized,
    R: Rng + ?Sized,
{
    let matchmaker = Matchmaker::new(config.clone());
    matchmaker
        .select(candidates, priority, rng)
        .map(|outcome| outcome.teams)
}
