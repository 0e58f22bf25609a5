use std::collections::HashSet;

use crate::error::SelectionError;
use crate::types::*;

/// Team membership as indices into the roster that was balanced
#[derive(Clone, Debug, PartialEq)]
pub struct TeamAssignment {
    pub team_one: Vec<usize>,
    pub team_two: Vec<usize>,
    pub team_one_mu: f64,
    pub team_two_mu: f64,
}

impl TeamAssignment {
    pub fn rating_difference(&self) -> f64 {
        (self.team_one_mu - self.team_two_mu).abs()
    }
}

/// Check that a roster is exactly ten distinct players with roles 2/4/4
pub fn validate_roster<'a>(
    roster: impl IntoIterator<Item = &'a SelectedPlayer> + Clone,
) -> Result<(), SelectionError> {
    let found = roster.clone().into_iter().count();
    if found != MATCH_SIZE {
        return Err(SelectionError::RosterSize {
            required: MATCH_SIZE,
            found,
        });
    }

    let composition = RoleCounts::of_roster(roster.clone());
    if composition != RoleCounts::MATCH_QUOTA {
        return Err(SelectionError::RosterComposition {
            required: RoleCounts::MATCH_QUOTA,
            found: composition,
        });
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = roster.into_iter().find(|p| !seen.insert(p.id())) {
        return Err(SelectionError::Invariant(format!(
            "player {} appears twice in roster",
            duplicate.id()
        )));
    }
    Ok(())
}

/// Greedy high-to-low split of a role-assigned roster into two 1/2/2 teams.
///
/// Players are visited by rating, highest first (equal ratings keep roster
/// order). Each goes to the team with an open slot for its role, preferring
/// the team with the lower running sum; team one wins ties.
pub fn assign_teams(roster: &[&SelectedPlayer]) -> Result<TeamAssignment, SelectionError> {
    validate_roster(roster.iter().copied())?;

    let mut order: Vec<usize> = (0..roster.len()).collect();
    order.sort_by(|&a, &b| roster[b].mu().total_cmp(&roster[a].mu()));

    let mut open = [RoleCounts::TEAM_QUOTA; 2];
    let mut sums = [0.0_f64; 2];
    let mut teams: [Vec<usize>; 2] = [Vec::with_capacity(TEAM_SIZE), Vec::with_capacity(TEAM_SIZE)];

    for idx in order {
        let player = roster[idx];
        let role = player.role;
        let team = match (open[0].get(role) > 0, open[1].get(role) > 0) {
            (true, true) => {
                if sums[1] < sums[0] {
                    1
                } else {
                    0
                }
            }
            (true, false) => 0,
            (false, true) => 1,
            (false, false) => {
                log::error!(
                    "no open {} slot for {} (team one open: {}, team two open: {})",
                    role,
                    player.id(),
                    open[0],
                    open[1]
                );
                return Err(SelectionError::Invariant(format!(
                    "no open {} slot for player {}",
                    role,
                    player.id()
                )));
            }
        };
        open[team].set(role, open[team].get(role) - 1);
        sums[team] += player.mu();
        teams[team].push(idx);
    }

    let [team_one, team_two] = teams;
    Ok(TeamAssignment {
        team_one,
        team_two,
        team_one_mu: sums[0],
        team_two_mu: sums[1],
    })
}

/// Balance an owned roster into [`BalancedTeams`]
pub fn balance_teams(roster: Vec<SelectedPlayer>) -> Result<BalancedTeams, SelectionError> {
    let assignment = {
        let refs: Vec<&SelectedPlayer> = roster.iter().collect();
        assign_teams(&refs)?
    };
    Ok(materialize(roster, &assignment))
}

/// Move roster players into the teams described by `assignment`
pub fn materialize(roster: Vec<SelectedPlayer>, assignment: &TeamAssignment) -> BalancedTeams {
    let mut slots: Vec<Option<SelectedPlayer>> = roster.into_iter().map(Some).collect();
    let mut take = |indices: &[usize]| -> Vec<SelectedPlayer> {
        indices.iter().filter_map(|&i| slots.get_mut(i).and_then(Option::take)).collect()
    };
    let team_one = take(&assignment.team_one);
    let team_two = take(&assignment.team_two);
    BalancedTeams { team_one, team_two }
}
