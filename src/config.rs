//! Tunable parameters for simulation, blending and training.
//!
//! Every struct deserializes with `#[serde(default)]`, so a TOML file only has to
//! name the values it changes.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ENSEMBLE_WEIGHTS, ENSEMBLE_WEIGHTS_WITHOUT_NEURAL, INTERVAL_CONFIDENCE, INTERVAL_SAMPLES,
    PLAYOFF_GATE_MARGIN, SEASON_GAMES,
};
use crate::error::ConfigError;

/// Monte Carlo run parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of full tournaments to simulate
    pub trials: usize,

    /// Master seed; trial `i` draws from stream `i` of this seed
    pub seed: u64,

    /// Regular season length used for pace projections
    pub season_games: u32,

    /// Season noise standard deviation per square root of remaining games
    pub noise_scale: f64,

    /// Spread trials across the rayon thread pool
    pub parallel: bool,

    /// Minimum frequency for a first-round matchup to appear in the projected bracket
    pub projected_matchup_threshold: f64,

    /// Minimum frequency for second-round and conference-final matchups
    pub deep_round_threshold: f64,

    /// Minimum frequency for championship-final pairings
    pub final_matchup_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            trials: 10_000,
            seed: 42,
            season_games: SEASON_GAMES,
            noise_scale: 0.5,
            parallel: true,
            projected_matchup_threshold: 0.5,
            deep_round_threshold: 0.05,
            final_matchup_threshold: 0.01,
        }
    }
}

impl SimulationConfig {
    /// Parse a TOML document, filling unspecified fields with defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::ZeroTrials);
        }
        if self.season_games == 0 {
            return Err(ConfigError::ZeroSeasonLength);
        }
        if !(self.noise_scale >= 0.0 && self.noise_scale.is_finite()) {
            return Err(ConfigError::NotPositive {
                name: "noise_scale",
                value: self.noise_scale,
            });
        }
        check_unit("projected_matchup_threshold", self.projected_matchup_threshold)?;
        check_unit("deep_round_threshold", self.deep_round_threshold)?;
        check_unit("final_matchup_threshold", self.final_matchup_threshold)?;
        Ok(())
    }
}

/// Weights and calibration settings for the championship ensemble.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub tree_weight: f64,
    pub neural_weight: f64,
    pub monte_carlo_weight: f64,

    /// When false the neural estimator is ignored and the fallback weights apply
    pub use_neural: bool,

    /// Tree and Monte Carlo weights used without the neural estimator
    pub tree_weight_without_neural: f64,
    pub monte_carlo_weight_without_neural: f64,

    /// Gate factor is `min(1, playoff_probability + margin)`
    pub playoff_gate_margin: f64,

    /// Pseudo sample size behind the Beta confidence interval
    pub interval_samples: f64,

    /// Two-sided coverage of the confidence interval
    pub confidence: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        EnsembleConfig {
            tree_weight: ENSEMBLE_WEIGHTS[0],
            neural_weight: ENSEMBLE_WEIGHTS[1],
            monte_carlo_weight: ENSEMBLE_WEIGHTS[2],
            use_neural: true,
            tree_weight_without_neural: ENSEMBLE_WEIGHTS_WITHOUT_NEURAL[0],
            monte_carlo_weight_without_neural: ENSEMBLE_WEIGHTS_WITHOUT_NEURAL[1],
            playoff_gate_margin: PLAYOFF_GATE_MARGIN,
            interval_samples: INTERVAL_SAMPLES,
            confidence: INTERVAL_CONFIDENCE,
        }
    }
}

impl EnsembleConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EnsembleConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("tree_weight", self.tree_weight),
            ("neural_weight", self.neural_weight),
            ("monte_carlo_weight", self.monte_carlo_weight),
            ("tree_weight_without_neural", self.tree_weight_without_neural),
            ("monte_carlo_weight_without_neural", self.monte_carlo_weight_without_neural),
            ("playoff_gate_margin", self.playoff_gate_margin),
        ] {
            check_unit(name, value)?;
        }
        let with_neural = self.tree_weight + self.neural_weight + self.monte_carlo_weight;
        if (with_neural - 1.0).abs() > 1e-9 {
            return Err(ConfigError::WeightSum(with_neural));
        }
        let without = self.tree_weight_without_neural + self.monte_carlo_weight_without_neural;
        if (without - 1.0).abs() > 1e-9 {
            return Err(ConfigError::WeightSum(without));
        }
        if !(self.interval_samples > 0.0 && self.interval_samples.is_finite()) {
            return Err(ConfigError::NotPositive {
                name: "interval_samples",
                value: self.interval_samples,
            });
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ConfigError::OutOfUnitRange {
                name: "confidence",
                value: self.confidence,
            });
        }
        Ok(())
    }
}

/// Hyperparameters for the sub-models trained on historical seasons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Exponential decay per season of age
    pub recency_decay: f64,

    /// Weight multiplier for championship-winning seasons
    pub champion_boost: f64,

    pub trees: usize,
    pub tree_depth: usize,
    pub tree_learning_rate: f64,
    pub tree_subsample: f64,
    pub tree_min_positives: usize,

    /// Widths of the network's hidden layers, input side first
    pub hidden_layers: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub network_learning_rate: f64,
    pub network_l2: f64,
    pub network_min_positives: usize,

    pub logistic_l2: f64,
    pub logistic_iterations: usize,
    pub logistic_learning_rate: f64,

    /// Ridge penalty for the made-playoffs classifier
    pub playoff_l2: f64,
    pub playoff_iterations: usize,

    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            recency_decay: 0.15,
            champion_boost: 2.0,
            trees: 50,
            tree_depth: 3,
            tree_learning_rate: 0.1,
            tree_subsample: 0.8,
            tree_min_positives: 2,
            hidden_layers: vec![64, 32, 16],
            epochs: 200,
            batch_size: 32,
            network_learning_rate: 0.001,
            network_l2: 0.01,
            network_min_positives: 3,
            logistic_l2: 1.0,
            logistic_iterations: 500,
            logistic_learning_rate: 0.1,
            playoff_l2: 2.0,
            playoff_iterations: 1_000,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: TrainingConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("tree_subsample", self.tree_subsample)?;
        if self.tree_subsample == 0.0 {
            return Err(ConfigError::NotPositive {
                name: "tree_subsample",
                value: self.tree_subsample,
            });
        }
        for (name, value) in [
            ("tree_learning_rate", self.tree_learning_rate),
            ("network_learning_rate", self.network_learning_rate),
            ("logistic_learning_rate", self.logistic_learning_rate),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        if self.batch_size == 0 {
            return Err(ConfigError::NotPositive {
                name: "batch_size",
                value: 0.0,
            });
        }
        if self.hidden_layers.contains(&0) {
            return Err(ConfigError::NotPositive {
                name: "hidden_layers",
                value: 0.0,
            });
        }
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(EnsembleConfig::default().validate().is_ok());
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str("trials = 500\nseed = 7\n").unwrap();
        assert_eq!(config.trials, 500);
        assert_eq!(config.seed, 7);
        assert_eq!(config.season_games, 82);
        assert!(config.parallel);
    }

    #[test]
    fn test_zero_trials_rejected() {
        let err = SimulationConfig::from_toml_str("trials = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTrials));
    }

    #[test]
    fn test_bad_weights_rejected() {
        let config = EnsembleConfig {
            tree_weight: 0.5,
            ..EnsembleConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::WeightSum(_))));
    }

    #[test]
    fn test_network_shape_from_toml() {
        let config =
            TrainingConfig::from_toml_str("hidden_layers = [32, 8]\nbatch_size = 16\n").unwrap();
        assert_eq!(config.hidden_layers, vec![32, 8]);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.epochs, TrainingConfig::default().epochs);

        let err = TrainingConfig::from_toml_str("hidden_layers = [32, 0]").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotPositive {
                name: "hidden_layers",
                ..
            }
        ));
        assert!(TrainingConfig::from_toml_str("batch_size = 0").is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = EnsembleConfig::from_toml_str("tree_weight = \"high\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
