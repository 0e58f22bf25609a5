use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::providers::HistoryProvider;
use crate::types::*;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Staleness lookup for a (player, role) pair
pub trait PriorityFn {
    fn priority(&self, user_id: &str, role: Role) -> PriorityScore;
}

impl<F> PriorityFn for F
where
    F: Fn(&str, Role) -> PriorityScore,
{
    fn priority(&self, user_id: &str, role: Role) -> PriorityScore {
        self(user_id, role)
    }
}

/// Priority derived from match history: days between `now` and the last
/// completed match. Players without history are unbounded.
pub struct HistoryPriority<'a, H: HistoryProvider + ?Sized> {
    history: &'a H,
    now: DateTime<Utc>,
}

impl<'a, H: HistoryProvider + ?Sized> HistoryPriority<'a, H> {
    pub fn new(history: &'a H, now: DateTime<Utc>) -> Self {
        Self { history, now }
    }
}

impl<H: HistoryProvider + ?Sized> PriorityFn for HistoryPriority<'_, H> {
    fn priority(&self, user_id: &str, role: Role) -> PriorityScore {
        match self.history.last_completed_match(user_id, role) {
            Some(played_at) => days_between(played_at, self.now),
            None => PriorityScore::Unbounded,
        }
    }
}

/// Days elapsed from `from` to `to`; clock skew into the future counts as zero
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> PriorityScore {
    let elapsed = to.signed_duration_since(from).num_milliseconds() as f64;
    PriorityScore::days(elapsed / MILLIS_PER_DAY)
}

/// Sort entries by priority, highest first.
///
/// The sort is stable, so whatever order the tie-break leaves equal scores in
/// survives: a shuffle for [`TieBreak::Shuffle`], ascending id for
/// [`TieBreak::PlayerId`].
pub fn rank_by_priority<R: Rng + ?Sized>(
    entries: &mut [SelectedPlayer],
    tie_break: TieBreak,
    rng: &mut R,
) {
    match tie_break {
        TieBreak::Shuffle => entries.shuffle(rng),
        TieBreak::PlayerId => entries.sort_by(|a, b| a.id().cmp(b.id())),
    }
    entries.sort_by(|a, b| b.priority.compare(&a.priority));
}
