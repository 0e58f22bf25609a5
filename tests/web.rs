#![cfg(target_arch = "wasm32")]

use pug_matchmaker::{display_rating, TeamBuilder};
use wasm_bindgen_test::*;

fn candidates_json() -> String {
    let roles = [
        "tank", "tank", "damage", "damage", "damage", "damage", "support", "support", "support",
        "support", "damage",
    ];
    let players: Vec<String> = roles
        .iter()
        .enumerate()
        .map(|(i, role)| {
            let rating = format!(r#"{{"mu":{},"sigma":5.0}}"#, 20.0 + i as f64);
            format!(
                r#"{{"id":"p{i}","tag":"P{i}","roles":["{role}"],"rating":{rating}}}"#,
                i = i,
                role = role,
                rating = rating
            )
        })
        .collect();
    format!("[{}]", players.join(","))
}

#[wasm_bindgen_test]
fn select_and_balance_returns_report() {
    let mut builder = TeamBuilder::new(7);
    let json = builder
        .select_and_balance(&candidates_json(), r#"{"p0": 1700000000000, "p1": null}"#)
        .unwrap();
    let outcome: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(outcome["teams"]["team_one"].as_array().unwrap().len(), 5);
    assert_eq!(outcome["teams"]["team_two"].as_array().unwrap().len(), 5);
    assert!(outcome["report"]["strategy"].is_string());
}

#[wasm_bindgen_test]
fn rate_match_moves_ratings() {
    let builder = TeamBuilder::new(1);
    let team = r#"[{"mu":25.0,"sigma":8.333}]"#;
    let json = builder.rate_match(team, team, "win").unwrap();
    let rated: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(rated["team_one"][0]["mu"].as_f64().unwrap() > 25.0);
    assert!(builder.rate_match(team, team, "forfeit").is_err());
}

#[wasm_bindgen_test]
fn bad_config_is_rejected() {
    assert!(TeamBuilder::new_with_config(1, r#"{"band_expansion_factor": 0.5}"#).is_err());
    assert!(TeamBuilder::new_with_config(1, "not json").is_err());
    assert_eq!(display_rating(30.0, 5.0), 1500);
}
