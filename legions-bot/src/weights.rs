//! Tunable scoring constants
//!
//! The defaults are empirically tuned values with no documented derivation.
//! They are kept as plain configurable weights.

use serde::{Deserialize, Serialize};

/// Weights used by the strategic and tactical heuristics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    // Master board
    /// An enemy below this fraction of our combat value is prey
    pub squash: f64,
    /// An enemy at or above this fraction of our combat value is a threat
    pub be_squashed: f64,
    /// Flee when our combat value is below this fraction of the attacker's
    pub flee_ratio: f64,

    // Battle
    pub attacker_aggression_bonus: f64,
    pub attacker_distance_penalty: f64,
    pub hit_bonus: f64,
    pub kill_bonus: f64,
    pub damage_penalty: f64,
    pub death_penalty: f64,
    pub elevation_bonus: f64,
    pub native_bramble_bonus: f64,
    pub non_native_bramble_penalty: f64,
    pub tower_bonus: f64,
    pub non_native_drift_penalty: f64,
    pub native_volcano_bonus: f64,
    pub adjacent_ally_bonus: f64,
    pub rangestrike_bonus: f64,
    pub titan_forward_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            squash: 0.6,
            be_squashed: 1.0,
            flee_ratio: 0.6,
            attacker_aggression_bonus: 1.0,
            attacker_distance_penalty: 1.0,
            hit_bonus: 1.0,
            kill_bonus: 3.0,
            damage_penalty: 1.0,
            death_penalty: 3.0,
            elevation_bonus: 0.5,
            native_bramble_bonus: 0.3,
            non_native_bramble_penalty: 0.5,
            tower_bonus: 0.5,
            non_native_drift_penalty: 2.0,
            native_volcano_bonus: 1.0,
            adjacent_ally_bonus: 0.5,
            rangestrike_bonus: 2.0,
            titan_forward_penalty: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let weights: ScoringWeights = serde_json::from_str(r#"{"kill_bonus": 5.0}"#).unwrap();
        assert_eq!(weights.kill_bonus, 5.0);
        assert_eq!(weights.squash, 0.6);
        assert_eq!(weights.death_penalty, 3.0);
    }
}
