use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::SelectionError;

/// Opaque user identifier handed over by the roster provider
pub type UserId = String;

/// Players per team
pub const TEAM_SIZE: usize = 5;
/// Players per match (two teams)
pub const MATCH_SIZE: usize = 2 * TEAM_SIZE;
/// Upper bound for raw priority before it enters cost arithmetic (ten years of days)
pub const PRIORITY_CAP: f64 = 3650.0;

/// Player roles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tank,
    Damage,
    Support,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Tank, Role::Damage, Role::Support];

    /// Order used by base selection: scarcest roles first
    pub const SELECTION_ORDER: [Role; 3] = [Role::Tank, Role::Support, Role::Damage];

    pub fn per_team(&self) -> usize {
        RoleCounts::TEAM_QUOTA.get(*self)
    }

    pub fn per_match(&self) -> usize {
        RoleCounts::MATCH_QUOTA.get(*self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Tank => "tank",
            Role::Damage => "damage",
            Role::Support => "support",
        };
        f.write_str(name)
    }
}

/// Per-role player counts. Used both for quotas and for reporting shortfalls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub tank: usize,
    pub damage: usize,
    pub support: usize,
}

impl RoleCounts {
    /// Composition of a single team
    pub const TEAM_QUOTA: RoleCounts = RoleCounts::new(1, 2, 2);
    /// Composition of a whole match
    pub const MATCH_QUOTA: RoleCounts = RoleCounts::new(2, 4, 4);

    pub const fn new(tank: usize, damage: usize, support: usize) -> Self {
        Self { tank, damage, support }
    }

    pub fn get(&self, role: Role) -> usize {
        match role {
            Role::Tank => self.tank,
            Role::Damage => self.damage,
            Role::Support => self.support,
        }
    }

    pub fn set(&mut self, role: Role, count: usize) {
        match role {
            Role::Tank => self.tank = count,
            Role::Damage => self.damage = count,
            Role::Support => self.support = count,
        }
    }

    pub fn increment(&mut self, role: Role) {
        self.set(role, self.get(role) + 1);
    }

    pub fn total(&self) -> usize {
        self.tank + self.damage + self.support
    }

    /// True if every role count is at least the one in `quota`
    pub fn covers(&self, quota: &RoleCounts) -> bool {
        Role::ALL.iter().all(|&role| self.get(role) >= quota.get(role))
    }

    /// Count assigned roles of a roster
    pub fn of_roster<'a>(players: impl IntoIterator<Item = &'a SelectedPlayer>) -> Self {
        let mut counts = RoleCounts::default();
        for player in players {
            counts.increment(player.role);
        }
        counts
    }
}

impl fmt::Display for RoleCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tank {}, damage {}, support {}",
            self.tank, self.damage, self.support
        )
    }
}

/// Skill estimate: mean and uncertainty
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub mu: f64,
    pub sigma: f64,
}

impl Rating {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    /// Conservative skill estimate shown to users: `max(0, round((mu - 3 sigma) * 100))`
    pub fn display_rating(&self) -> u32 {
        ((self.mu - 3.0 * self.sigma) * 100.0).round().max(0.0) as u32
    }
}

/// A registered player eligible for selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerCandidate {
    pub id: UserId,
    /// Display tag (battle tag or nickname)
    pub tag: String,
    /// Roles this player signed up for, never empty
    pub roles: BTreeSet<Role>,
    pub rating: Rating,
    /// Self-reported rank tier, only used to seed a rating
    #[serde(default)]
    pub rank: Option<String>,
}

impl PlayerCandidate {
    pub fn new(
        id: impl Into<UserId>,
        tag: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
        rating: Rating,
    ) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            roles: roles.into_iter().collect(),
            rating,
            rank: None,
        }
    }

    pub fn with_rank(mut self, rank: impl Into<String>) -> Self {
        self.rank = Some(rank.into());
        self
    }

    pub fn can_play(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn mu(&self) -> f64 {
        self.rating.mu
    }
}

/// Staleness of a (player, role) pair, in days since the last completed match
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityScore {
    Days(f64),
    /// Never played
    Unbounded,
}

impl PriorityScore {
    /// Non-negative days; negative and NaN inputs collapse to zero
    pub fn days(days: f64) -> Self {
        if days.is_nan() || days <= 0.0 {
            PriorityScore::Days(0.0)
        } else if days.is_infinite() {
            PriorityScore::Unbounded
        } else {
            PriorityScore::Days(days)
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, PriorityScore::Unbounded)
    }

    /// Same score with the [`PriorityScore::days`] rules applied, for values
    /// built directly or deserialized
    pub fn normalized(&self) -> PriorityScore {
        match *self {
            PriorityScore::Days(days) => PriorityScore::days(days),
            PriorityScore::Unbounded => PriorityScore::Unbounded,
        }
    }

    /// Finite value used in cost arithmetic
    pub fn capped(&self) -> f64 {
        match self.normalized() {
            PriorityScore::Days(days) => days.min(PRIORITY_CAP),
            PriorityScore::Unbounded => PRIORITY_CAP,
        }
    }

    /// Contribution of this score to priority cost: `capped^1.5`
    pub fn weight(&self) -> f64 {
        self.capped().powf(1.5)
    }

    /// Total order: unbounded above every finite score
    pub fn compare(&self, other: &PriorityScore) -> Ordering {
        match (self.normalized(), other.normalized()) {
            (PriorityScore::Unbounded, PriorityScore::Unbounded) => Ordering::Equal,
            (PriorityScore::Unbounded, PriorityScore::Days(_)) => Ordering::Greater,
            (PriorityScore::Days(_), PriorityScore::Unbounded) => Ordering::Less,
            (PriorityScore::Days(a), PriorityScore::Days(b)) => a.total_cmp(&b),
        }
    }
}

impl fmt::Display for PriorityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityScore::Days(days) => write!(f, "{:.1}d", days),
            PriorityScore::Unbounded => f.write_str("never played"),
        }
    }
}

/// A candidate with exactly one assigned role
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedPlayer {
    pub player: PlayerCandidate,
    pub role: Role,
    /// Priority the player was selected with for this role
    pub priority: PriorityScore,
}

impl SelectedPlayer {
    pub fn new(player: PlayerCandidate, role: Role, priority: PriorityScore) -> Self {
        Self { player, role, priority }
    }

    pub fn id(&self) -> &str {
        &self.player.id
    }

    pub fn mu(&self) -> f64 {
        self.player.rating.mu
    }
}

/// Two teams of five, each 1 tank / 2 damage / 2 support
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalancedTeams {
    pub team_one: Vec<SelectedPlayer>,
    pub team_two: Vec<SelectedPlayer>,
}

impl BalancedTeams {
    pub fn team_one_mu(&self) -> f64 {
        self.team_one.iter().map(SelectedPlayer::mu).sum()
    }

    pub fn team_two_mu(&self) -> f64 {
        self.team_two.iter().map(SelectedPlayer::mu).sum()
    }

    /// Absolute difference of team rating sums
    pub fn rating_difference(&self) -> f64 {
        (self.team_one_mu() - self.team_two_mu()).abs()
    }

    pub fn players(&self) -> impl Iterator<Item = &SelectedPlayer> {
        self.team_one.iter().chain(self.team_two.iter())
    }

    pub fn player_ids(&self) -> HashSet<&str> {
        self.players().map(SelectedPlayer::id).collect()
    }
}

/// Acceptable rating range for optimization candidates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillBand {
    /// Lower bound of the band (inclusive)
    pub min: f64,
    /// Upper bound of the band (inclusive)
    pub max: f64,
    /// Rating spread of the roster the band was derived from
    pub spread: f64,
    /// Distance between the roster extremes and the band bounds
    pub buffer: f64,
}

impl SkillBand {
    pub fn contains(&self, mu: f64) -> bool {
        mu >= self.min && mu <= self.max
    }

    /// Band with the buffer scaled by `factor`, measured from the roster extremes
    pub fn widened(&self, factor: f64) -> SkillBand {
        let buffer = self.buffer * factor;
        let roster_min = self.min + self.buffer;
        let roster_max = self.max - self.buffer;
        SkillBand {
            min: roster_min - buffer,
            max: roster_max + buffer,
            spread: self.spread,
            buffer,
        }
    }
}

/// Per-role optimization candidates. A flex player may appear in several pools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidatePools {
    pub tanks: Vec<SelectedPlayer>,
    pub damage: Vec<SelectedPlayer>,
    pub support: Vec<SelectedPlayer>,
    /// Band the pools were filtered with
    pub band: SkillBand,
    /// Whether the band had to be widened to fill the pools
    pub expanded_band: bool,
}

impl CandidatePools {
    pub fn pool(&self, role: Role) -> &[SelectedPlayer] {
        match role {
            Role::Tank => &self.tanks,
            Role::Damage => &self.damage,
            Role::Support => &self.support,
        }
    }

    pub fn sizes(&self) -> RoleCounts {
        RoleCounts::new(self.tanks.len(), self.damage.len(), self.support.len())
    }

    /// Every pooled entry across all roles
    pub fn entries(&self) -> impl Iterator<Item = &SelectedPlayer> {
        self.tanks.iter().chain(self.damage.iter()).chain(self.support.iter())
    }

    pub fn unique_player_count(&self) -> usize {
        self.entries().map(SelectedPlayer::id).collect::<HashSet<_>>().len()
    }
}

/// One candidate combination: 2 tanks, 4 damage, 4 support
#[derive(Clone, Debug, PartialEq)]
pub struct RoleSelection<'a> {
    pub tanks: Vec<&'a SelectedPlayer>,
    pub damage: Vec<&'a SelectedPlayer>,
    pub support: Vec<&'a SelectedPlayer>,
}

impl<'a> RoleSelection<'a> {
    pub fn players(&self) -> impl Iterator<Item = &'a SelectedPlayer> + '_ {
        self.tanks
            .iter()
            .chain(self.damage.iter())
            .chain(self.support.iter())
            .copied()
    }

    /// False when a flex player was drawn from more than one pool
    pub fn is_disjoint(&self) -> bool {
        let mut seen = HashSet::new();
        self.players().all(|p| seen.insert(p.id()))
    }
}

/// Scores of one combination
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostMetrics {
    /// Absolute team rating-sum difference
    pub fairness_cost: f64,
    /// Staleness penalty of pooled candidates left out
    pub priority_cost: f64,
    pub normalized_fairness: f64,
    pub normalized_priority: f64,
    pub total_cost: f64,
}

/// How the ten players are chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Base roster by priority only, then balanced
    PriorityOnly,
    /// Base roster refined by the skill-band combination search
    SkillOptimized,
}

/// Tie-break among equal priorities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Shuffle with the caller's RNG before the stable sort
    Shuffle,
    /// Ascending user id, fully reproducible
    PlayerId,
}

/// Optimizer configuration, usually stored per guild
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Scales the population-based pool targets
    pub pool_size_multiplier: f64,
    /// Skill band buffer as a fraction of the base roster spread
    pub skill_band_buffer: f64,
    /// Weight of the normalized fairness term
    pub fairness_weight: f64,
    /// Weight of the normalized priority term
    pub priority_weight: f64,
    /// Buffer growth for the single band expansion
    pub band_expansion_factor: f64,
    pub strategy: SelectionStrategy,
    pub tie_break: TieBreak,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            pool_size_multiplier: 1.0,
            skill_band_buffer: 0.5,
            fairness_weight: 0.2,
            priority_weight: 0.8,
            band_expansion_factor: 1.25,
            strategy: SelectionStrategy::SkillOptimized,
            tie_break: TieBreak::Shuffle,
        }
    }
}

impl OptimizerConfig {
    /// Reject values that would make the cost function or band arithmetic meaningless
    pub fn validate(&self) -> Result<(), SelectionError> {
        let finite_non_negative = [
            ("pool_size_multiplier", self.pool_size_multiplier),
            ("skill_band_buffer", self.skill_band_buffer),
            ("fairness_weight", self.fairness_weight),
            ("priority_weight", self.priority_weight),
        ];
        for (name, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SelectionError::InvalidConfig(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if !self.band_expansion_factor.is_finite() || self.band_expansion_factor < 1.0 {
            return Err(SelectionError::InvalidConfig(format!(
                "band_expansion_factor must be at least 1.0, got {}",
                self.band_expansion_factor
            )));
        }
        if self.fairness_weight + self.priority_weight <= 0.0 {
            return Err(SelectionError::InvalidConfig(
                "fairness_weight and priority_weight cannot both be zero".to_string(),
            ));
        }
        Ok(())
    }
}
