//! Bot configuration

use crate::weights::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decision engine settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Wall-clock budget for one maneuver search, in milliseconds
    pub time_limit_ms: u64,
    /// Random seed for tie-breaks (None = from entropy)
    pub seed: Option<u64>,
    /// Candidate hexes kept per creature before combining
    pub max_candidates: usize,
    pub weights: ScoringWeights,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 10_000,
            seed: None,
            max_candidates: 7,
            weights: ScoringWeights::default(),
        }
    }
}

impl BotConfig {
    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = BotConfig::default().with_seed(7).with_time_limit_ms(250);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.time_limit(), Duration::from_millis(250));
        assert_eq!(config.max_candidates, 7);
    }

    #[test]
    fn test_load_from_json() {
        let config: BotConfig =
            serde_json::from_str(r#"{"time_limit_ms": 500, "weights": {"flee_ratio": 0.4}}"#).unwrap();
        assert_eq!(config.time_limit_ms, 500);
        assert_eq!(config.weights.flee_ratio, 0.4);
        assert_eq!(config.weights.kill_bonus, 3.0);
        assert_eq!(config.seed, None);
    }
}
