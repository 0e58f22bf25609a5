use rand::Rng;
use std::collections::HashSet;

use crate::error::SelectionError;
use crate::priority::{rank_by_priority, PriorityFn};
use crate::types::*;

/// Players already taken by earlier role passes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Exclusions<'a>(HashSet<&'a str>);

impl<'a> Exclusions<'a> {
    pub fn contains(&self, user_id: &str) -> bool {
        self.0.contains(user_id)
    }

    /// New set with `ids` added; `self` is left untouched
    pub fn with<I>(&self, ids: I) -> Exclusions<'a>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut next = self.0.clone();
        next.extend(ids);
        Exclusions(next)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Priority-only roster: 2 tanks, 4 damage, 4 support.
///
/// Roles are filled scarcest first (tank, support, damage). A flex player
/// taken in an earlier pass is not available to later ones.
pub fn select_base_roster<P, R>(
    candidates: &[PlayerCandidate],
    priority: &P,
    tie_break: TieBreak,
    rng: &mut R,
) -> Result<Vec<SelectedPlayer>, SelectionError>
where
    P: PriorityFn + ?Sized,
    R: Rng + ?Sized,
{
    if candidates.len() < MATCH_SIZE {
        return Err(SelectionError::InsufficientPlayers {
            required: MATCH_SIZE,
            found: candidates.len(),
        });
    }

    let mut roster: Vec<SelectedPlayer> = Vec::with_capacity(MATCH_SIZE);
    let mut excluded = Exclusions::default();

    for role in Role::SELECTION_ORDER {
        let picked = select_role(candidates, role, &excluded, priority, tie_break, rng)?;
        excluded = excluded.with(
            candidates
                .iter()
                .filter(|c| picked.iter().any(|p| p.id() == c.id))
                .map(|c| c.id.as_str()),
        );
        roster.extend(picked);
    }

    log::debug!(
        "base roster: {}",
        roster
            .iter()
            .map(|p| format!("{}={} ({})", p.role, p.player.tag, p.priority))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(roster)
}

/// Pick `role.per_match()` highest-priority eligible candidates not in `excluded`
pub fn select_role<P, R>(
    candidates: &[PlayerCandidate],
    role: Role,
    excluded: &Exclusions<'_>,
    priority: &P,
    tie_break: TieBreak,
    rng: &mut R,
) -> Result<Vec<SelectedPlayer>, SelectionError>
where
    P: PriorityFn + ?Sized,
    R: Rng + ?Sized,
{
    let count = role.per_match();
    let mut available: Vec<SelectedPlayer> = candidates
        .iter()
        .filter(|c| c.can_play(role) && !excluded.contains(&c.id))
        .map(|c| SelectedPlayer::new(c.clone(), role, priority.priority(&c.id, role)))
        .collect();

    if available.len() < count {
        let found = available_by_role(candidates, excluded);
        log::warn!(
            "cannot fill {} slots: need {}, found {}",
            role,
            RoleCounts::MATCH_QUOTA,
            found
        );
        return Err(SelectionError::InsufficientRoleComposition {
            required: RoleCounts::MATCH_QUOTA,
            found,
        });
    }

    rank_by_priority(&mut available, tie_break, rng);
    available.truncate(count);
    Ok(available)
}

/// Eligible, not yet excluded candidates per role
pub fn available_by_role(candidates: &[PlayerCandidate], excluded: &Exclusions<'_>) -> RoleCounts {
    let mut counts = RoleCounts::default();
    for candidate in candidates.iter().filter(|c| !excluded.contains(&c.id)) {
        for &role in &candidate.roles {
            counts.increment(role);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn player(id: &str, roles: &[Role], mu: f64) -> PlayerCandidate {
        PlayerCandidate::new(id, format!("tag{}", id), roles.iter().copied(), Rating::new(mu, 5.0))
    }

    /// 2 tanks, 4 damage, 4 support plus `extra` flex players
    fn lobby(extra: usize) -> Vec<PlayerCandidate> {
        let mut players = vec![
            player("t1", &[Role::Tank], 25.0),
            player("t2", &[Role::Tank], 26.0),
            player("d1", &[Role::Damage], 24.0),
            player("d2", &[Role::Damage], 27.0),
            player("d3", &[Role::Damage], 23.0),
            player("d4", &[Role::Damage], 28.0),
            player("s1", &[Role::Support], 22.0),
            player("s2", &[Role::Support], 29.0),
            player("s3", &[Role::Support], 25.5),
            player("s4", &[Role::Support], 24.5),
        ];
        for i in 0..extra {
            players.push(player(&format!("f{}", i), &Role::ALL, 25.0));
        }
        players
    }

    fn days_by_id(id: &str, _role: Role) -> PriorityScore {
        PriorityScore::days(id.bytes().map(f64::from).sum())
    }

    #[test]
    fn test_fewer_than_ten_players_is_reported_with_count() {
        let mut players = lobby(0);
        players.truncate(7);
        let mut rng = StdRng::seed_from_u64(1);
        let err =
            select_base_roster(&players, &days_by_id, TieBreak::PlayerId, &mut rng).unwrap_err();
        assert_eq!(
            err,
            SelectionError::InsufficientPlayers {
                required: 10,
                found: 7,
            }
        );
    }

    #[test]
    fn test_single_tank_reports_role_shortfall() {
        let mut players = lobby(2);
        players.retain(|p| p.id != "t2");
        for p in players.iter_mut().filter(|p| p.id.starts_with('f')) {
            p.roles.remove(&Role::Tank);
        }
        let mut rng = StdRng::seed_from_u64(1);
        match select_base_roster(&players, &days_by_id, TieBreak::PlayerId, &mut rng) {
            Err(SelectionError::InsufficientRoleComposition { required, found }) => {
                assert_eq!(required, RoleCounts::MATCH_QUOTA);
                assert_eq!(found.tank, 1);
            }
            other => panic!("expected role shortfall, got {:?}", other),
        }
    }

    #[test]
    fn test_flex_player_taken_as_tank_is_not_reused() {
        // Only one pure tank; the flex player must tank and cannot also fill support.
        let mut players = lobby(0);
        players.retain(|p| p.id != "t2");
        players.push(player("flex", &[Role::Tank, Role::Support], 25.0));
        let priority = |_: &str, _: Role| PriorityScore::Unbounded;
        let mut rng = StdRng::seed_from_u64(3);

        let roster = select_base_roster(&players, &priority, TieBreak::Shuffle, &mut rng).unwrap();
        assert_eq!(RoleCounts::of_roster(&roster), RoleCounts::MATCH_QUOTA);
        let flex: Vec<&SelectedPlayer> = roster.iter().filter(|p| p.id() == "flex").collect();
        assert_eq!(flex.len(), 1);
        assert_eq!(flex[0].role, Role::Tank);
    }

    #[test]
    fn test_highest_priority_players_win_their_role() {
        let mut players = lobby(0);
        players.push(player("d5", &[Role::Damage], 25.0));
        let priority = |id: &str, _: Role| match id {
            "d5" => PriorityScore::Unbounded,
            "d3" => PriorityScore::days(0.5),
            _ => PriorityScore::days(10.0),
        };
        let mut rng = StdRng::seed_from_u64(11);

        let roster = select_base_roster(&players, &priority, TieBreak::Shuffle, &mut rng).unwrap();
        let ids: HashSet<&str> = roster.iter().map(SelectedPlayer::id).collect();
        assert!(ids.contains("d5"));
        assert!(!ids.contains("d3"));
        assert_eq!(roster.len(), MATCH_SIZE);
    }

    #[test]
    fn test_player_id_tie_break_is_repeatable() {
        let players = lobby(6);
        let priority = |_: &str, _: Role| PriorityScore::days(1.0);
        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            select_base_roster(&players, &priority, TieBreak::PlayerId, &mut rng).unwrap()
        };
        let first = run(1);
        let second = run(99);
        assert_eq!(first, second);
    }

    #[test]
    fn test_exclusions_are_values() {
        let players = lobby(0);
        let empty = Exclusions::default();
        let one = empty.with(players[..1].iter().map(|p| p.id.as_str()));
        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert!(one.contains("t1"));
        assert_eq!(available_by_role(&players, &one).tank, 1);
    }
}
