pub mod balancer;
pub mod error;
pub mod logging;
pub mod matchmaker;
pub mod optimizer;
pub mod priority;
pub mod providers;
pub mod rating;
pub mod selector;
pub mod types;

pub use error::{RatingError, SelectionError};
pub use matchmaker::{
    select_and_balance, select_and_balance_with_rng, Matchmaker, SelectionOutcome, SelectionReport,
};
pub use optimizer::SkipReason;
pub use priority::{HistoryPriority, PriorityFn};
pub use providers::{HistoryProvider, RatingStore, ResultSink, RosterProvider};
pub use rating::{record_match, MatchOutcome, MatchPrediction, RatingConfig, RatingModel};
pub use types::*;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

use providers::InMemoryHistory;

/// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init_logger();
}

/// WASM-exposed selection and rating wrapper
#[wasm_bindgen]
pub struct TeamBuilder {
    matchmaker: Matchmaker,
    ratings: RatingModel,
    rng: StdRng,
}

#[wasm_bindgen]
impl TeamBuilder {
    /// Create a builder with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> TeamBuilder {
        TeamBuilder {
            matchmaker: Matchmaker::new(OptimizerConfig::default()),
            ratings: RatingModel::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with custom optimizer config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<TeamBuilder, JsValue> {
        let config = parse_config(config_json)?;
        Ok(TeamBuilder {
            matchmaker: Matchmaker::new(config),
            ratings: RatingModel::default(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Replace the optimizer config
    pub fn update_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        self.matchmaker = Matchmaker::new(parse_config(config_json)?);
        Ok(())
    }

    /// Replace the rating model parameters
    pub fn update_rating_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config: RatingConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Rating config parse error: {}", e)))?;
        self.ratings = RatingModel::new(config);
        Ok(())
    }

    /// Get default optimizer config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&OptimizerConfig::default()).unwrap_or_default()
    }

    /// Get default rating config as JSON
    pub fn get_default_rating_config() -> String {
        serde_json::to_string(&RatingConfig::default()).unwrap_or_default()
    }

    /// Pick and balance ten players.
    ///
    /// `last_played_json` maps user id to the epoch millis of their last
    /// completed match, or null for players who never played.
    pub fn select_and_balance(
        &mut self,
        candidates_json: &str,
        last_played_json: &str,
    ) -> Result<String, JsValue> {
        let candidates: Vec<PlayerCandidate> = serde_json::from_str(candidates_json)
            .map_err(|e| JsValue::from_str(&format!("Candidates parse error: {}", e)))?;
        let last_played: HashMap<UserId, Option<f64>> = serde_json::from_str(last_played_json)
            .map_err(|e| JsValue::from_str(&format!("Last played parse error: {}", e)))?;

        let history = history_from_millis(&last_played);
        let now = timestamp(js_sys::Date::now())
            .ok_or_else(|| JsValue::from_str("Clock unavailable"))?;
        let priority = HistoryPriority::new(&history, now);

        let outcome = self
            .matchmaker
            .select(&candidates, &priority, &mut self.rng)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serde_json::to_string(&outcome)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Update both teams' ratings; `outcome` is "win", "loss" or "draw" for team one
    pub fn rate_match(
        &self,
        team_one_json: &str,
        team_two_json: &str,
        outcome: &str,
    ) -> Result<String, JsValue> {
        let team_one = parse_ratings(team_one_json)?;
        let team_two = parse_ratings(team_two_json)?;
        let outcome = parse_outcome(outcome)?;

        let (team_one, team_two) = self
            .ratings
            .rate_match(&team_one, &team_two, outcome)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(serde_json::json!({
            "team_one": team_one,
            "team_two": team_two,
        })
        .to_string())
    }

    /// Win and draw probabilities as JSON
    pub fn predict(&self, team_one_json: &str, team_two_json: &str) -> Result<String, JsValue> {
        let team_one = parse_ratings(team_one_json)?;
        let team_two = parse_ratings(team_two_json)?;
        serde_json::to_string(&self.ratings.predict(&team_one, &team_two))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Starting rating for a self-reported rank
    pub fn seed_rating(&self, rank: Option<String>) -> String {
        serde_json::to_string(&self.ratings.seed_rating(rank.as_deref())).unwrap_or_default()
    }
}

/// Conservative rating shown to users
#[wasm_bindgen]
pub fn display_rating(mu: f64, sigma: f64) -> u32 {
    Rating::new(mu, sigma).display_rating()
}

fn parse_config(config_json: &str) -> Result<OptimizerConfig, JsValue> {
    let config: OptimizerConfig = serde_json::from_str(config_json)
        .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
    config
        .validate()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(config)
}

fn parse_ratings(json: &str) -> Result<Vec<Rating>, JsValue> {
    serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("Ratings parse error: {}", e)))
}

fn parse_outcome(outcome: &str) -> Result<MatchOutcome, JsValue> {
    match outcome.to_ascii_lowercase().as_str() {
        "win" => Ok(MatchOutcome::Win),
        "loss" => Ok(MatchOutcome::Loss),
        "draw" => Ok(MatchOutcome::Draw),
        other => Err(JsValue::from_str(&format!("Unknown outcome: {}", other))),
    }
}

fn timestamp(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// History without per-role detail: a player's last match counts for every role
fn history_from_millis(last_played: &HashMap<UserId, Option<f64>>) -> InMemoryHistory {
    let mut history = InMemoryHistory::default();
    for (user_id, played_at) in last_played {
        if let Some(played_at) = played_at.and_then(timestamp) {
            for role in Role::ALL {
                history.record(user_id, role, played_at);
            }
        }
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_from_millis() {
        let mut last_played = HashMap::new();
        last_played.insert("a".to_string(), Some(1_700_000_000_000.0));
        last_played.insert("b".to_string(), None);
        let history = history_from_millis(&last_played);

        let expected = DateTime::from_timestamp_millis(1_700_000_000_000);
        assert_eq!(history.last_completed_match("a", Role::Support), expected);
        assert_eq!(history.last_completed_match("a", Role::Tank), expected);
        assert_eq!(history.last_completed_match("b", Role::Tank), None);
        assert_eq!(history.last_completed_match("c", Role::Tank), None);
    }

    #[test]
    fn test_non_finite_timestamp_is_ignored() {
        assert_eq!(timestamp(f64::NAN), None);
        assert_eq!(timestamp(f64::INFINITY), None);
        assert!(timestamp(0.0).is_some());
    }

    #[test]
    fn test_default_configs_round_trip() {
        let config: OptimizerConfig =
            serde_json::from_str(&TeamBuilder::get_default_config()).unwrap();
        assert_eq!(config, OptimizerConfig::default());
        let partial: OptimizerConfig = serde_json::from_str(r#"{"fairness_weight": 0.5}"#).unwrap();
        assert_eq!(partial.fairness_weight, 0.5);
        assert_eq!(partial.priority_weight, 0.8);

        let rating: RatingConfig =
            serde_json::from_str(&TeamBuilder::get_default_rating_config()).unwrap();
        assert_eq!(rating, RatingConfig::default());
    }

    #[test]
    fn test_display_rating() {
        assert_eq!(display_rating(25.0, 25.0 / 3.0), 0);
        assert_eq!(display_rating(30.0, 5.0), 1500);
    }
}
