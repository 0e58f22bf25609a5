//! Contracts of the collaborators surrounding the selection core, plus
//! in-memory implementations for embedding and tests.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::*;

/// Resolves user ids to registered players
pub trait RosterProvider {
    /// Unregistered users are omitted, not reported
    fn resolve(&self, user_ids: &[UserId]) -> Vec<PlayerCandidate>;
}

/// Match history lookup
pub trait HistoryProvider {
    /// Time of the user's last completed match in `role`. Implementations
    /// without per-role history may ignore `role` and answer for any role.
    fn last_completed_match(&self, user_id: &str, role: Role) -> Option<DateTime<Utc>>;
}

/// Persistent skill ratings
pub trait RatingStore {
    fn get(&self, user_id: &str) -> Option<Rating>;
    fn put(&mut self, user_id: &str, rating: Rating);
}

/// Consumes finished team selections (creates the match record)
pub trait ResultSink {
    fn submit(&mut self, teams: &BalancedTeams);
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryRoster {
    players: HashMap<UserId, PlayerCandidate>,
}

impl InMemoryRoster {
    pub fn register(&mut self, player: PlayerCandidate) {
        self.players.insert(player.id.clone(), player);
    }
}

impl FromIterator<PlayerCandidate> for InMemoryRoster {
    fn from_iter<I: IntoIterator<Item = PlayerCandidate>>(iter: I) -> Self {
        let mut roster = InMemoryRoster::default();
        for player in iter {
            roster.register(player);
        }
        roster
    }
}

impl RosterProvider for InMemoryRoster {
    fn resolve(&self, user_ids: &[UserId]) -> Vec<PlayerCandidate> {
        user_ids
            .iter()
            .filter_map(|id| self.players.get(id).cloned())
            .collect()
    }
}

/// Last match per (user, role)
#[derive(Clone, Debug, Default)]
pub struct InMemoryHistory {
    last_played: HashMap<(UserId, Role), DateTime<Utc>>,
}

impl InMemoryHistory {
    /// Keeps the most recent timestamp per (user, role)
    pub fn record(&mut self, user_id: &str, role: Role, played_at: DateTime<Utc>) {
        let entry = self
            .last_played
            .entry((user_id.to_string(), role))
            .or_insert(played_at);
        if played_at > *entry {
            *entry = played_at;
        }
    }

    /// Record a finished match for every selected player in their assigned role
    pub fn record_teams(&mut self, teams: &BalancedTeams, played_at: DateTime<Utc>) {
        for player in teams.players() {
            self.record(player.id(), player.role, played_at);
        }
    }
}

impl HistoryProvider for InMemoryHistory {
    fn last_completed_match(&self, user_id: &str, role: Role) -> Option<DateTime<Utc>> {
        self.last_played.get(&(user_id.to_string(), role)).copied()
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryRatings {
    ratings: HashMap<UserId, Rating>,
}

impl RatingStore for InMemoryRatings {
    fn get(&self, user_id: &str) -> Option<Rating> {
        self.ratings.get(user_id).copied()
    }

    fn put(&mut self, user_id: &str, rating: Rating) {
        self.ratings.insert(user_id.to_string(), rating);
    }
}

/// Sink that keeps every submitted selection
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    pub matches: Vec<BalancedTeams>,
}

impl ResultSink for CollectingSink {
    fn submit(&mut self, teams: &BalancedTeams) {
        self.matches.push(teams.clone());
    }
}
