use thiserror::Error;

use crate::types::RoleCounts;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    #[error("Not enough players: need {required}, found {found}")]
    InsufficientPlayers { required: usize, found: usize },

    #[error("Not enough players per role: need {required}, found {found}")]
    InsufficientRoleComposition {
        required: RoleCounts,
        found: RoleCounts,
    },

    #[error("Roster must contain exactly {required} players, got {found}")]
    RosterSize { required: usize, found: usize },

    #[error("Roster roles must be {required}, got {found}")]
    RosterComposition {
        required: RoleCounts,
        found: RoleCounts,
    },

    /// Upstream role-quota enforcement is broken
    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl SelectionError {
    /// Errors the end user can act on (invite more players, switch roles)
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            SelectionError::InsufficientPlayers { .. }
                | SelectionError::InsufficientRoleComposition { .. }
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RatingError {
    #[error("A match needs at least two teams, got {0}")]
    TooFewTeams(usize),

    #[error("Got {ranks} ranks for {teams} teams")]
    RankCountMismatch { teams: usize, ranks: usize },

    #[error("Team {0} has no players")]
    EmptyTeam(usize),
}
