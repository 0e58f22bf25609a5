use itertools::{iproduct, Itertools};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::balancer::{assign_teams, materialize, TeamAssignment};
use crate::error::SelectionError;
use crate::priority::{rank_by_priority, PriorityFn};
use crate::types::*;

/// Buffer used when every roster player has the same rating
pub const DEFAULT_BAND_BUFFER: f64 = 5.0;

/// Skill band around the base roster: `[min - buffer, max + buffer]`
pub fn calculate_skill_band(roster: &[SelectedPlayer], config: &OptimizerConfig) -> SkillBand {
    let (lowest, highest) = roster
        .iter()
        .map(SelectedPlayer::mu)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), mu| {
            (lo.min(mu), hi.max(mu))
        });
    let (lowest, highest) = if roster.is_empty() {
        (0.0, 0.0)
    } else {
        (lowest, highest)
    };

    let spread = highest - lowest;
    let buffer = if spread == 0.0 {
        DEFAULT_BAND_BUFFER
    } else {
        spread * config.skill_band_buffer
    };

    SkillBand {
        min: lowest - buffer,
        max: highest + buffer,
        spread,
        buffer,
    }
}

/// Largest pools the search accepts: C(4,2) x C(6,4) x C(6,4) = 1,350 combinations
pub const MAX_POOL_TARGETS: RoleCounts = RoleCounts::new(4, 6, 6);

/// Per-role pool targets. Small lobbies get fewer alternatives per role.
///
/// The multiplier only moves targets between the per-match quota and
/// [`MAX_POOL_TARGETS`].
pub fn pool_targets(population: usize, config: &OptimizerConfig) -> RoleCounts {
    let base = if population <= 15 {
        RoleCounts::new(3, 5, 5)
    } else {
        MAX_POOL_TARGETS
    };

    let mut targets = RoleCounts::default();
    for role in Role::ALL {
        let scaled = (base.get(role) as f64 * config.pool_size_multiplier).round() as usize;
        targets.set(role, scaled.clamp(role.per_match(), MAX_POOL_TARGETS.get(role)));
    }
    targets
}

/// Band-filtered, priority-sorted pools with a single band-expansion retry.
///
/// Never fails: if the widened band still cannot fill the targets, the
/// under-filled pools are returned and the caller decides.
pub fn build_candidate_pools<P, R>(
    population: &[PlayerCandidate],
    band: &SkillBand,
    priority: &P,
    config: &OptimizerConfig,
    rng: &mut R,
) -> CandidatePools
where
    P: PriorityFn + ?Sized,
    R: Rng + ?Sized,
{
    let targets = pool_targets(population.len(), config);
    let pools = fill_pools(population, band, targets, priority, config.tie_break, rng);
    if pools.sizes().covers(&targets) {
        return pools;
    }

    let widened = band.widened(config.band_expansion_factor);
    log::debug!(
        "pools {} below targets {}; widening band [{:.2}, {:.2}] to [{:.2}, {:.2}]",
        pools.sizes(),
        targets,
        band.min,
        band.max,
        widened.min,
        widened.max
    );
    let mut pools = fill_pools(population, &widened, targets, priority, config.tie_break, rng);
    pools.expanded_band = true;
    pools
}

fn fill_pools<P, R>(
    population: &[PlayerCandidate],
    band: &SkillBand,
    targets: RoleCounts,
    priority: &P,
    tie_break: TieBreak,
    rng: &mut R,
) -> CandidatePools
where
    P: PriorityFn + ?Sized,
    R: Rng + ?Sized,
{
    let mut pool_for = |role: Role| -> Vec<SelectedPlayer> {
        let mut pool: Vec<SelectedPlayer> = population
            .iter()
            .filter(|c| c.can_play(role) && band.contains(c.mu()))
            .map(|c| SelectedPlayer::new(c.clone(), role, priority.priority(&c.id, role)))
            .collect();
        rank_by_priority(&mut pool, tie_break, &mut *rng);
        pool.truncate(targets.get(role));
        pool
    };

    let tanks = pool_for(Role::Tank);
    let damage = pool_for(Role::Damage);
    let support = pool_for(Role::Support);
    CandidatePools {
        tanks,
        damage,
        support,
        band: *band,
        expanded_band: false,
    }
}

/// Why the combination search did not run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Configured for priority-only selection
    PriorityOnly,
    /// Exactly ten candidates: there is nobody to swap in
    NoAlternatives,
    /// Some pool is below the per-match minimum
    PoolsUnderfilled,
    /// Pools hold fewer than ten distinct players
    TooFewUniquePlayers,
    /// Every pool is at the minimum, so only one combination exists
    SingleCombination,
    /// Every combination reused a flex player
    NoValidCombination,
}

/// Decide whether searching `pools` can improve on the base roster
pub fn check_searchable(pools: &CandidatePools) -> Result<(), SkipReason> {
    let sizes = pools.sizes();
    if !sizes.covers(&RoleCounts::MATCH_QUOTA) {
        return Err(SkipReason::PoolsUnderfilled);
    }
    if pools.unique_player_count() < MATCH_SIZE {
        return Err(SkipReason::TooFewUniquePlayers);
    }
    if Role::ALL.iter().all(|&role| sizes.get(role) == role.per_match()) {
        return Err(SkipReason::SingleCombination);
    }
    Ok(())
}

/// Every 2-tank / 4-damage / 4-support choice from the pools, including ones
/// that reuse a flex player (see [`RoleSelection::is_disjoint`])
pub fn enumerate_combinations(pools: &CandidatePools) -> impl Iterator<Item = RoleSelection<'_>> {
    let tanks = role_choices(&pools.tanks, Role::Tank);
    let damage = role_choices(&pools.damage, Role::Damage);
    let support = role_choices(&pools.support, Role::Support);

    iproduct!(tanks, damage, support).map(|(tanks, damage, support)| RoleSelection {
        tanks,
        damage,
        support,
    })
}

fn role_choices(pool: &[SelectedPlayer], role: Role) -> Vec<Vec<&SelectedPlayer>> {
    pool.iter().combinations(role.per_match()).collect()
}

/// Pooled players with the priority they carry into the cost function.
/// A flex player pooled for several roles counts once, at its highest priority.
pub fn pooled_priorities(pools: &CandidatePools) -> Vec<(&str, PriorityScore)> {
    let mut unique: Vec<(&str, PriorityScore)> = Vec::new();
    for entry in pools.entries() {
        match unique.iter_mut().find(|(id, _)| *id == entry.id()) {
            Some((_, priority)) => {
                if entry.priority.compare(priority).is_gt() {
                    *priority = entry.priority;
                }
            }
            None => unique.push((entry.id(), entry.priority)),
        }
    }
    unique
}

/// Weighted fairness/priority cost with normalization fixed per pool set
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Largest plausible team-sum difference
    pub fairness_max: f64,
    /// Priority cost of skipping every pooled player
    pub priority_max: f64,
    pub fairness_weight: f64,
    pub priority_weight: f64,
}

impl CostModel {
    /// A zero (or non-finite) normalization constant becomes 1
    pub fn new(fairness_max: f64, priority_max: f64, config: &OptimizerConfig) -> Self {
        Self {
            fairness_max: floor_to_one(fairness_max),
            priority_max: floor_to_one(priority_max),
            fairness_weight: config.fairness_weight,
            priority_weight: config.priority_weight,
        }
    }

    pub fn from_pools(pools: &CandidatePools, config: &OptimizerConfig) -> Self {
        let (lowest, highest) = pools
            .entries()
            .map(SelectedPlayer::mu)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), mu| {
                (lo.min(mu), hi.max(mu))
            });
        let fairness_max = if lowest.is_finite() && highest.is_finite() {
            (highest - lowest) * TEAM_SIZE as f64
        } else {
            0.0
        };
        let priority_max = pooled_priorities(pools)
            .iter()
            .map(|(_, priority)| priority.weight())
            .sum();
        Self::new(fairness_max, priority_max, config)
    }

    /// `fairness_weight * (F / F_max)^2 + priority_weight * (P / P_max)^1.5`
    pub fn score(&self, fairness_cost: f64, priority_cost: f64) -> CostMetrics {
        let normalized_fairness = fairness_cost / self.fairness_max;
        let normalized_priority = priority_cost / self.priority_max;
        let total_cost = self.fairness_weight * normalized_fairness.powi(2)
            + self.priority_weight * normalized_priority.powf(1.5);
        CostMetrics {
            fairness_cost,
            priority_cost,
            normalized_fairness,
            normalized_priority,
            total_cost,
        }
    }
}

fn floor_to_one(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

/// Best combination found by [`search_combinations`]
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub teams: BalancedTeams,
    pub metrics: CostMetrics,
    /// Valid (disjoint) combinations scored
    pub evaluated: usize,
}

/// Score every valid combination and keep the cheapest (first one wins ties)
pub fn search_combinations(
    pools: &CandidatePools,
    config: &OptimizerConfig,
) -> Result<SearchResult, SelectionError> {
    let model = CostModel::from_pools(pools, config);
    let priorities = pooled_priorities(pools);

    let mut best: Option<(Vec<&SelectedPlayer>, TeamAssignment, CostMetrics)> = None;
    let mut evaluated = 0;

    for selection in enumerate_combinations(pools) {
        if !selection.is_disjoint() {
            continue;
        }
        let roster: Vec<&SelectedPlayer> = selection.players().collect();
        let assignment = assign_teams(&roster)?;

        let selected: HashSet<&str> = roster.iter().copied().map(SelectedPlayer::id).collect();
        let priority_cost: f64 = priorities
            .iter()
            .filter(|(id, _)| !selected.contains(id))
            .map(|(_, priority)| priority.weight())
            .sum();
        let metrics = model.score(assignment.rating_difference(), priority_cost);
        evaluated += 1;

        let improves = best
            .as_ref()
            .map_or(true, |(_, _, current)| metrics.total_cost < current.total_cost);
        if improves {
            best = Some((roster, assignment, metrics));
        }
    }

    let (roster, assignment, metrics) =
        best.ok_or(SelectionError::InsufficientRoleComposition {
            required: RoleCounts::MATCH_QUOTA,
            found: pools.sizes(),
        })?;

    log::debug!(
        "best of {} combinations: total {:.4} (fairness {:.2}, priority {:.2})",
        evaluated,
        metrics.total_cost,
        metrics.fairness_cost,
        metrics.priority_cost
    );

    let owned: Vec<SelectedPlayer> = roster.into_iter().cloned().collect();
    Ok(SearchResult {
        teams: materialize(owned, &assignment),
        metrics,
        evaluated,
    })
}
