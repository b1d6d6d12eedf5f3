use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, TrainingError};
use crate::training::check_training_set;

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// L2-regularized logistic regression fit by full-batch gradient descent on
/// the weighted log loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    /// # Arguments
    ///
    /// * `rows` - feature rows, already scaled
    /// * `labels` - positive class flags
    /// * `weights` - optional per-row sample weights
    /// * `l2` - penalty on the coefficients (not the intercept)
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[bool],
        weights: Option<&[f64]>,
        l2: f64,
        iterations: usize,
        learning_rate: f64,
    ) -> Result<Self, TrainingError> {
        let width = rows.first().map_or(0, Vec::len);
        check_training_set(rows, labels, weights, width)?;

        let sample_weight = |i: usize| weights.map_or(1.0, |w| w[i]);
        let total: f64 = (0..rows.len()).map(sample_weight).sum();
        let n = rows.len() as f64;

        let mut model = LogisticRegression {
            coefficients: vec![0.0; width],
            intercept: 0.0,
        };

        for _ in 0..iterations {
            let mut grad = vec![0.0; width];
            let mut grad_intercept = 0.0;
            for (i, (row, &label)) in rows.iter().zip(labels).enumerate() {
                let residual = model.score(row) - if label { 1.0 } else { 0.0 };
                let scaled = sample_weight(i) * residual / total;
                for (g, x) in grad.iter_mut().zip(row) {
                    *g += scaled * x;
                }
                grad_intercept += scaled;
            }
            for (c, g) in model.coefficients.iter_mut().zip(&grad) {
                *c -= learning_rate * (g + l2 * *c / n);
            }
            model.intercept -= learning_rate * grad_intercept;
        }

        Ok(model)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn score(&self, row: &[f64]) -> f64 {
        let z: f64 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.intercept;
        sigmoid(z)
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, EstimatorError> {
        if row.len() != self.coefficients.len() {
            return Err(EstimatorError::FeatureCount {
                expected: self.coefficients.len(),
                found: row.len(),
            });
        }
        Ok(self.score(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0 && sigmoid(-800.0) < 1e-300);
        assert!((sigmoid(800.0) - 1.0).abs() < 1e-12);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_learns_direction() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 10.0 - 2.0]).collect();
        let labels: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        let model = LogisticRegression::fit(&rows, &labels, None, 1.0, 500, 0.5).unwrap();

        assert!(model.coefficients()[0] > 0.0);
        assert!(model.predict_proba(&[1.5]).unwrap() > 0.8);
        assert!(model.predict_proba(&[-1.5]).unwrap() < 0.2);
    }

    #[test]
    fn test_weights_shift_the_intercept() {
        let rows = vec![vec![0.0]; 4];
        let labels = [true, false, false, false];
        let plain = LogisticRegression::fit(&rows, &labels, None, 0.0, 2000, 0.5).unwrap();
        let boosted =
            LogisticRegression::fit(&rows, &labels, Some(&[3.0, 1.0, 1.0, 1.0]), 0.0, 2000, 0.5).unwrap();

        assert!((plain.predict_proba(&[0.0]).unwrap() - 0.25).abs() < 1e-3);
        assert!((boosted.predict_proba(&[0.0]).unwrap() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_single_class_rejected() {
        let rows = vec![vec![1.0], vec![2.0]];
        assert_eq!(
            LogisticRegression::fit(&rows, &[true, true], None, 1.0, 10, 0.1),
            Err(TrainingError::SingleClass)
        );
    }
}
