//! Sub-models fit on past seasons before any simulation runs.
//!
//! Training is sequential and seeded. A model that cannot be trained is simply
//! left out; callers substitute the uniform default.

mod boosting;
mod logistic;
mod neural;
mod scaler;
mod series_model;

pub use boosting::GradientBoostedTrees;
pub use logistic::{sigmoid, LogisticRegression};
pub use neural::CalibratedNeuralNet;
pub use scaler::StandardScaler;
pub use series_model::{HistoricalSeries, SeriesModel, SERIES_FEATURE_COUNT};

use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::team::TeamCompetitive;

/// One team's regular season and how its playoffs ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeason {
    /// Season end year
    pub season: i32,
    pub team: TeamCompetitive,
    pub made_playoffs: bool,
    pub won_championship: bool,
}

/// Sample weights favoring recent seasons and champions.
///
/// Each weight is `exp(-decay * years_ago)`, multiplied by `champion_boost` for
/// champions, then scaled so the weights average 1.
pub fn recency_weights(history: &[HistoricalSeason], decay: f64, champion_boost: f64) -> Vec<f64> {
    let Some(latest) = history.iter().map(|h| h.season).max() else {
        return Vec::new();
    };

    let raw: Vec<f64> = history
        .iter()
        .map(|h| {
            let years_ago = f64::from(latest - h.season);
            let weight = (-decay * years_ago).exp();
            if h.won_championship {
                weight * champion_boost
            } else {
                weight
            }
        })
        .collect();

    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    raw.into_iter().map(|w| w / mean).collect()
}

/// Shared shape checks for a labelled training set.
pub(crate) fn check_training_set(
    rows: &[Vec<f64>],
    labels: &[bool],
    weights: Option<&[f64]>,
    features: usize,
) -> Result<(), TrainingError> {
    if rows.is_empty() {
        return Err(TrainingError::Empty);
    }
    if let Some(weights) = weights {
        if weights.len() != rows.len() {
            return Err(TrainingError::WeightCount(weights.len(), rows.len()));
        }
    }
    if labels.len() != rows.len() {
        return Err(TrainingError::LabelCount(labels.len(), rows.len()));
    }
    if let Some(row) = rows.iter().find(|r| r.len() != features) {
        return Err(TrainingError::FeatureCount {
            expected: features,
            found: row.len(),
        });
    }
    if labels.iter().all(|&l| l) || labels.iter().all(|&l| !l) {
        return Err(TrainingError::SingleClass);
    }
    Ok(())
}

/// Fail with `InsufficientPositives` when fewer than `needed` labels are set.
pub(crate) fn require_positives(labels: &[bool], needed: usize) -> Result<(), TrainingError> {
    let found = labels.iter().filter(|&&l| l).count();
    if found < needed {
        return Err(TrainingError::InsufficientPositives { needed, found });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn season(year: i32, champion: bool) -> HistoricalSeason {
        HistoricalSeason {
            season: year,
            team: TeamCompetitive::new("A", "East", "North", 90.0, 82, 50.0, 0.0),
            made_playoffs: true,
            won_championship: champion,
        }
    }

    #[test]
    fn test_recency_weights_decay_and_boost() {
        let history = vec![season(2020, false), season(2024, false), season(2024, true)];
        let w = recency_weights(&history, 0.15, 2.0);

        assert!((w.iter().sum::<f64>() / 3.0 - 1.0).abs() < 1e-12);
        assert!((w[2] / w[1] - 2.0).abs() < 1e-12);
        assert!((w[0] / w[1] - (-0.6f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_recency_weights_empty() {
        assert!(recency_weights(&[], 0.15, 2.0).is_empty());
    }

    #[test]
    fn test_training_set_checks() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(check_training_set(&rows, &[true, false], None, 2), Ok(()));
        assert_eq!(
            check_training_set(&rows, &[true, true], None, 2),
            Err(TrainingError::SingleClass)
        );
        assert_eq!(
            check_training_set(&rows, &[true, false], None, 3),
            Err(TrainingError::FeatureCount { expected: 3, found: 2 })
        );
        assert_eq!(
            check_training_set(&rows, &[true, false], Some(&[1.0]), 2),
            Err(TrainingError::WeightCount(1, 2))
        );
        assert_eq!(
            check_training_set(&rows, &[true, false, true], None, 2),
            Err(TrainingError::LabelCount(3, 2))
        );
        assert_eq!(check_training_set(&[], &[], None, 2), Err(TrainingError::Empty));
    }

    #[test]
    fn test_require_positives() {
        assert_eq!(
            require_positives(&[true, false, false], 2),
            Err(TrainingError::InsufficientPositives { needed: 2, found: 1 })
        );
        assert!(require_positives(&[true, true], 2).is_ok());
    }
}
