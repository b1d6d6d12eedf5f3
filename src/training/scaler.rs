use serde::{Deserialize, Serialize};

use crate::error::EstimatorError;

/// Variance below which a feature is treated as constant.
const MIN_VARIANCE: f64 = 1e-10;

/// Centers each feature and scales it to unit variance.
///
/// Constant features carry no information and are mapped to zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
    active: Vec<bool>,
}

impl StandardScaler {
    /// Fit on `rows`, which must be non-empty and share one width.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x / n;
            }
        }

        let mut variances = vec![0.0; width];
        for row in rows {
            for ((v, x), m) in variances.iter_mut().zip(row).zip(&means) {
                *v += (x - m).powi(2) / n;
            }
        }

        let active: Vec<bool> = variances.iter().map(|&v| v > MIN_VARIANCE).collect();
        let scales = variances
            .iter()
            .zip(&active)
            .map(|(&v, &a)| if a { v.sqrt() } else { 1.0 })
            .collect();

        StandardScaler {
            means,
            scales,
            active,
        }
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Number of features with non-zero variance.
    pub fn active_features(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, EstimatorError> {
        if row.len() != self.width() {
            return Err(EstimatorError::FeatureCount {
                expected: self.width(),
                found: row.len(),
            });
        }
        Ok(row
            .iter()
            .enumerate()
            .map(|(i, x)| {
                if self.active[i] {
                    (x - self.means[i]) / self.scales[i]
                } else {
                    0.0
                }
            })
            .collect())
    }

    /// Transform rows that were checked at training time.
    pub(crate) fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EstimatorError> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
