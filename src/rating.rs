use serde::{Deserialize, Serialize};

use crate::error::RatingError;
use crate::providers::RatingStore;
use crate::types::{PlayerCandidate, Rating};

/// Rank tiers with a known skill level. Anything else (including "gold")
/// starts from the system default.
pub const RANK_SEEDS: [(&str, f64); 7] = [
    ("bronze", 15.0),
    ("silver", 20.0),
    ("platinum", 30.0),
    ("diamond", 35.0),
    ("master", 40.0),
    ("grandmaster", 45.0),
    ("champion", 50.0),
];

/// Plackett-Luce model parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Mean of an unrated player
    pub mu: f64,
    /// Uncertainty of an unrated player
    pub sigma: f64,
    /// Rating difference that corresponds to a meaningful win-probability edge
    pub beta: f64,
    /// Uncertainty added before every update so ratings keep moving
    pub tau: f64,
    /// Chance of a draw between evenly matched teams
    pub draw_probability: f64,
    /// Lower bound on the sigma shrink factor
    pub kappa: f64,
    /// Uncertainty of a player seeded from a known rank
    pub seed_sigma: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        let mu = 25.0;
        let sigma = mu / 3.0;
        Self {
            mu,
            sigma,
            beta: sigma / 2.0,
            tau: mu / 300.0,
            draw_probability: 0.1,
            kappa: 0.0001,
            seed_sigma: 5.0,
        }
    }
}

/// Result of a two-team match, from the first team's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

impl MatchOutcome {
    /// Plackett-Luce ranks of (first team, second team); lower is better
    pub fn ranks(&self) -> [usize; 2] {
        match self {
            MatchOutcome::Win => [0, 1],
            MatchOutcome::Loss => [1, 0],
            MatchOutcome::Draw => [0, 0],
        }
    }
}

/// Outcome probabilities for two teams; the three fields sum to one
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchPrediction {
    pub team_one_win: f64,
    pub draw: f64,
    pub team_two_win: f64,
}

pub struct RatingModel {
    config: RatingConfig,
}

impl Default for RatingModel {
    fn default() -> Self {
        Self::new(RatingConfig::default())
    }
}

impl RatingModel {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn default_rating(&self) -> Rating {
        Rating::new(self.config.mu, self.config.sigma)
    }

    /// Initial rating for a new player from their self-reported rank
    pub fn seed_rating(&self, rank: Option<&str>) -> Rating {
        let rank = rank.map(|r| r.trim().to_ascii_lowercase());
        RANK_SEEDS
            .iter()
            .find(|(name, _)| rank.as_deref() == Some(*name))
            .map(|&(_, mu)| Rating::new(mu, self.config.seed_sigma))
            .unwrap_or_else(|| self.default_rating())
    }

    /// Update every player of every team. `ranks[i]` is team i's finishing
    /// place (0 is first); equal ranks are a draw between those teams.
    pub fn rate(
        &self,
        teams: &[Vec<Rating>],
        ranks: &[usize],
    ) -> Result<Vec<Vec<Rating>>, RatingError> {
        if teams.len() < 2 {
            return Err(RatingError::TooFewTeams(teams.len()));
        }
        if teams.len() != ranks.len() {
            return Err(RatingError::RankCountMismatch {
                teams: teams.len(),
                ranks: ranks.len(),
            });
        }
        if let Some(index) = teams.iter().position(Vec::is_empty) {
            return Err(RatingError::EmptyTeam(index));
        }

        let tau_sq = self.config.tau.powi(2);
        let beta_sq = self.config.beta.powi(2);

        // Uncertainty grows by tau between matches
        let teams: Vec<Vec<Rating>> = teams
            .iter()
            .map(|team| {
                team.iter()
                    .map(|r| Rating::new(r.mu, (r.sigma.powi(2) + tau_sq).sqrt()))
                    .collect()
            })
            .collect();

        let team_mu: Vec<f64> = teams.iter().map(|t| t.iter().map(|r| r.mu).sum()).collect();
        let team_sigma_sq: Vec<f64> = teams
            .iter()
            .map(|t| t.iter().map(|r| r.sigma.powi(2)).sum())
            .collect();

        let c = team_sigma_sq.iter().map(|s| s + beta_sq).sum::<f64>().sqrt();
        // Shifted by the largest exponent; only strength ratios are used
        let peak = team_mu.iter().map(|mu| mu / c).fold(f64::NEG_INFINITY, f64::max);
        let strength: Vec<f64> = team_mu.iter().map(|mu| (mu / c - peak).exp()).collect();

        // Sum of strengths of teams placing at or below q, and size of each tie group
        let tail_strength: Vec<f64> = ranks
            .iter()
            .map(|&rank_q| {
                ranks
                    .iter()
                    .zip(&strength)
                    .filter(|&(&rank_i, _)| rank_i >= rank_q)
                    .map(|(_, s)| s)
                    .sum()
            })
            .collect();
        let tied: Vec<f64> = ranks
            .iter()
            .map(|&rank_q| ranks.iter().filter(|&&r| r == rank_q).count() as f64)
            .collect();

        let updated = teams
            .iter()
            .enumerate()
            .map(|(i, team)| {
                let mut omega = 0.0;
                let mut delta = 0.0;
                for q in (0..teams.len()).filter(|&q| ranks[q] <= ranks[i]) {
                    let quotient = strength[i] / tail_strength[q];
                    if q == i {
                        omega += (1.0 - quotient) / tied[q];
                    } else {
                        omega -= quotient / tied[q];
                    }
                    delta += quotient * (1.0 - quotient) / tied[q];
                }

                let sigma_sq = team_sigma_sq[i];
                let gamma = sigma_sq.sqrt() / c;
                let omega = omega * sigma_sq / c;
                let delta = delta * gamma * sigma_sq / c.powi(2);

                team.iter()
                    .map(|player| {
                        let share = player.sigma.powi(2) / sigma_sq;
                        let mu = player.mu + share * omega;
                        let shrink = (1.0 - share * delta).max(self.config.kappa);
                        Rating::new(mu, player.sigma * shrink.sqrt())
                    })
                    .collect()
            })
            .collect();

        Ok(updated)
    }

    /// Two-team update; `outcome` is from `team_one`'s point of view
    pub fn rate_match(
        &self,
        team_one: &[Rating],
        team_two: &[Rating],
        outcome: MatchOutcome,
    ) -> Result<(Vec<Rating>, Vec<Rating>), RatingError> {
        let mut rated = self
            .rate(&[team_one.to_vec(), team_two.to_vec()], &outcome.ranks())?
            .into_iter();
        match (rated.next(), rated.next()) {
            (Some(one), Some(two)) => Ok((one, two)),
            _ => Err(RatingError::TooFewTeams(0)),
        }
    }

    /// Win and draw chances. Win odds follow the same strength ratio the
    /// update uses; the configured draw chance is scaled down as the match
    /// gets more one-sided.
    pub fn predict(&self, team_one: &[Rating], team_two: &[Rating]) -> MatchPrediction {
        let beta_sq = self.config.beta.powi(2);
        let spread = |team: &[Rating]| -> f64 {
            team.iter().map(|r| r.sigma.powi(2) + beta_sq).sum()
        };
        let c = (spread(team_one) + spread(team_two)).sqrt().max(f64::EPSILON);
        let mu_one: f64 = team_one.iter().map(|r| r.mu).sum();
        let mu_two: f64 = team_two.iter().map(|r| r.mu).sum();

        let p_one = 1.0 / (1.0 + ((mu_two - mu_one) / c).exp());
        let p_two = 1.0 - p_one;
        let draw = self.config.draw_probability.clamp(0.0, 1.0) * (1.0 - (p_one - p_two).abs());

        MatchPrediction {
            team_one_win: p_one * (1.0 - draw),
            draw,
            team_two_win: p_two * (1.0 - draw),
        }
    }
}

/// Apply a finished match to stored ratings. Players without a stored rating
/// are seeded from their rank first.
pub fn record_match<S: RatingStore + ?Sized>(
    store: &mut S,
    model: &RatingModel,
    team_one: &[PlayerCandidate],
    team_two: &[PlayerCandidate],
    outcome: MatchOutcome,
) -> Result<(), RatingError> {
    let current = |team: &[PlayerCandidate], store: &S| -> Vec<Rating> {
        team.iter()
            .map(|p| {
                store
                    .get(&p.id)
                    .unwrap_or_else(|| model.seed_rating(p.rank.as_deref()))
            })
            .collect()
    };
    let before_one = current(team_one, &*store);
    let before_two = current(team_two, &*store);

    let (after_one, after_two) = model.rate_match(&before_one, &before_two, outcome)?;
    for (player, rating) in team_one.iter().zip(after_one).chain(team_two.iter().zip(after_two)) {
        log::debug!(
            "{} rating {:.2}/{:.2} (display {})",
            player.tag,
            rating.mu,
            rating.sigma,
            rating.display_rating()
        );
        store.put(&player.id, rating);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InMemoryRatings;
    use crate::types::Role;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_rank_seeds() {
        let model = RatingModel::default();
        let gold = model.seed_rating(Some("gold"));
        assert_eq!(gold.mu, 25.0);
        assert!(approx(gold.sigma, 8.333));

        let bronze = model.seed_rating(Some("Bronze "));
        assert_eq!(bronze, Rating::new(15.0, 5.0));
        assert_eq!(model.seed_rating(Some("champion")).mu, 50.0);
        assert_eq!(model.seed_rating(None), model.default_rating());
    }

    #[test]
    fn test_one_on_one_win_moves_ratings_apart() {
        let model = RatingModel::default();
        let winner = model.seed_rating(Some("gold"));
        let loser = model.seed_rating(Some("bronze"));

        let (won, lost) = model.rate_match(&[winner], &[loser], MatchOutcome::Win).unwrap();
        assert!(won[0].mu > winner.mu);
        assert!(lost[0].mu < loser.mu);
        assert!(won[0].sigma <= winner.sigma);
        assert!(lost[0].sigma <= loser.sigma);
    }

    #[test]
    fn test_loss_mirrors_win() {
        let model = RatingModel::default();
        let a = model.default_rating();
        let b = model.default_rating();
        let (a_win, b_loss) = model.rate_match(&[a], &[b], MatchOutcome::Win).unwrap();
        let (b_win, a_loss) = model.rate_match(&[b], &[a], MatchOutcome::Loss).unwrap();
        assert!(approx(a_win[0].mu, a_loss[0].mu));
        assert!(approx(b_loss[0].mu, b_win[0].mu));
        assert!(a_win[0].mu > 25.0);
    }

    #[test]
    fn test_draw_between_equals_keeps_means() {
        let model = RatingModel::default();
        let team = vec![model.default_rating(); 5];
        let (one, two) = model.rate_match(&team, &team, MatchOutcome::Draw).unwrap();
        for rating in one.iter().chain(two.iter()) {
            assert!(approx(rating.mu, 25.0));
            assert!(rating.sigma < model.default_rating().sigma);
        }
    }

    #[test]
    fn test_upset_moves_more_than_expected_result() {
        let model = RatingModel::default();
        let strong = Rating::new(35.0, 4.0);
        let weak = Rating::new(15.0, 4.0);
        let (expected, _) = model.rate_match(&[strong], &[weak], MatchOutcome::Win).unwrap();
        let (_, upset) = model.rate_match(&[weak], &[strong], MatchOutcome::Win).unwrap();
        let expected_gain = expected[0].mu - strong.mu;
        let upset_gain = upset[0].mu - strong.mu;
        assert!(expected_gain > 0.0);
        assert!(upset_gain < 0.0);
        assert!(upset_gain.abs() > expected_gain);
    }

    #[test]
    fn test_extreme_ratings_stay_finite() {
        let model = RatingModel::default();
        let giant = Rating::new(5.0e4, 1.0);
        let tiny = Rating::new(-5.0e4, 1.0);

        let (giant_after, tiny_after) =
            model.rate_match(&[giant], &[tiny], MatchOutcome::Loss).unwrap();
        for rating in giant_after.iter().chain(tiny_after.iter()) {
            assert!(rating.mu.is_finite());
            assert!(rating.sigma.is_finite());
        }
        assert!(giant_after[0].mu < giant.mu);
        assert!(tiny_after[0].mu > tiny.mu);

        let (one, two) = model.rate_match(&[giant], &[giant], MatchOutcome::Draw).unwrap();
        assert!(approx(one[0].mu, giant.mu));
        assert!(approx(two[0].mu, giant.mu));
    }

    #[test]
    fn test_bad_input_is_rejected() {
        let model = RatingModel::default();
        let rating = model.default_rating();
        assert_eq!(
            model.rate(&[vec![rating]], &[0]).unwrap_err(),
            RatingError::TooFewTeams(1)
        );
        assert_eq!(
            model.rate(&[vec![rating], vec![rating]], &[0]).unwrap_err(),
            RatingError::RankCountMismatch { teams: 2, ranks: 1 }
        );
        assert_eq!(
            model.rate(&[vec![rating], vec![]], &[0, 1]).unwrap_err(),
            RatingError::EmptyTeam(1)
        );
    }

    #[test]
    fn test_prediction_sums_to_one_and_favors_stronger_team() {
        let model = RatingModel::default();
        let strong = vec![Rating::new(30.0, 3.0); 5];
        let weak = vec![Rating::new(20.0, 3.0); 5];
        let p = model.predict(&strong, &weak);
        assert!(approx(p.team_one_win + p.draw + p.team_two_win, 1.0));
        assert!(p.team_one_win > p.team_two_win);

        let even = model.predict(&weak, &weak);
        assert!(approx(even.team_one_win, even.team_two_win));
        assert!(approx(even.draw, 0.1));
    }

    #[test]
    fn test_record_match_seeds_and_stores() {
        let model = RatingModel::default();
        let mut store = InMemoryRatings::default();
        let winner = PlayerCandidate::new("w", "winner", [Role::Tank], Rating::new(0.0, 0.0))
            .with_rank("bronze");
        let loser = PlayerCandidate::new("l", "loser", [Role::Tank], Rating::new(0.0, 0.0));
        store.put("l", Rating::new(30.0, 6.0));

        record_match(&mut store, &model, &[winner], &[loser], MatchOutcome::Win).unwrap();

        let w = store.get("w").unwrap();
        let l = store.get("l").unwrap();
        assert!(w.mu > 15.0);
        assert!(l.mu < 30.0);
        assert!(w.sigma <= 5.0);
    }
}
