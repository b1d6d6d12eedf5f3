use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::{EstimatorError, TrainingError};
use crate::training::{check_training_set, require_positives, sigmoid};

/// Smallest hessian mass a leaf or split side may carry.
const MIN_HESSIAN: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf(value) => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// Gradient and hessian of the log loss for one row, already weighted.
#[derive(Clone, Copy)]
struct Moments {
    gradient: f64,
    hessian: f64,
}

/// Boosted regression trees on the log loss.
///
/// Each tree is grown on a random subsample to a fixed depth; splits maximise
/// the second-order gain and leaves take Newton steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_score: f64,
    learning_rate: f64,
    width: usize,
    trees: Vec<Node>,
}

impl GradientBoostedTrees {
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[bool],
        weights: Option<&[f64]>,
        config: &TrainingConfig,
    ) -> Result<Self, TrainingError> {
        let width = rows.first().map_or(0, Vec::len);
        check_training_set(rows, labels, weights, width)?;
        require_positives(labels, config.tree_min_positives)?;

        let sample_weight: Vec<f64> = match weights {
            Some(w) => w.to_vec(),
            None => vec![1.0; rows.len()],
        };
        let targets: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();

        let total: f64 = sample_weight.iter().sum();
        let positive: f64 = sample_weight.iter().zip(&targets).map(|(w, y)| w * y).sum();
        let prior = (positive / total).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let sample_size = ((rows.len() as f64 * config.tree_subsample).round() as usize).clamp(1, rows.len());
        let mut scores = vec![base_score; rows.len()];
        let mut trees = Vec::with_capacity(config.trees);

        for _ in 0..config.trees {
            let moments: Vec<Moments> = scores
                .iter()
                .zip(&targets)
                .zip(&sample_weight)
                .map(|((&s, &y), &w)| {
                    let p = sigmoid(s);
                    Moments {
                        gradient: w * (y - p),
                        hessian: w * p * (1.0 - p),
                    }
                })
                .collect();

            let mut subset = sample(&mut rng, rows.len(), sample_size).into_vec();
            subset.sort_unstable();

            let tree = grow(rows, &moments, subset, config.tree_depth);
            for (score, row) in scores.iter_mut().zip(rows) {
                *score += config.tree_learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(GradientBoostedTrees {
            base_score,
            learning_rate: config.tree_learning_rate,
            width,
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, EstimatorError> {
        if row.len() != self.width {
            return Err(EstimatorError::FeatureCount {
                expected: self.width,
                found: row.len(),
            });
        }
        let raw = self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>();
        Ok(sigmoid(raw))
    }
}

fn leaf(moments: &[Moments], rows: &[usize]) -> Node {
    let (g, h) = totals(moments, rows);
    Node::Leaf(g / h.max(MIN_HESSIAN))
}

fn totals(moments: &[Moments], rows: &[usize]) -> (f64, f64) {
    rows.iter().fold((0.0, 0.0), |(g, h), &i| {
        (g + moments[i].gradient, h + moments[i].hessian)
    })
}

fn grow(data: &[Vec<f64>], moments: &[Moments], rows: Vec<usize>, depth: usize) -> Node {
    if depth == 0 || rows.len() < 2 {
        return leaf(moments, &rows);
    }

    let (g_all, h_all) = totals(moments, &rows);
    let parent = g_all * g_all / h_all.max(MIN_HESSIAN);
    let width = data[rows[0]].len();

    // (gain, feature, threshold)
    let mut best: Option<(f64, usize, f64)> = None;
    for feature in 0..width {
        let mut order = rows.clone();
        order.sort_by(|&a, &b| data[a][feature].total_cmp(&data[b][feature]));

        let (mut g_left, mut h_left) = (0.0, 0.0);
        for pair in order.windows(2) {
            let (here, next) = (pair[0], pair[1]);
            g_left += moments[here].gradient;
            h_left += moments[here].hessian;

            let (x, x_next) = (data[here][feature], data[next][feature]);
            if x == x_next {
                continue;
            }
            let (g_right, h_right) = (g_all - g_left, h_all - h_left);
            if h_left < MIN_HESSIAN || h_right < MIN_HESSIAN {
                continue;
            }
            let gain = g_left * g_left / h_left + g_right * g_right / h_right - parent;
            if best.map_or(true, |(b, _, _)| gain > b) {
                best = Some((gain, feature, 0.5 * (x + x_next)));
            }
        }
    }

    match best {
        Some((gain, feature, threshold)) if gain > 0.0 => {
            let (left, right): (Vec<usize>, Vec<usize>) =
                rows.into_iter().partition(|&i| data[i][feature] <= threshold);
            Node::Split {
                feature,
                threshold,
                left: Box::new(grow(data, moments, left, depth - 1)),
                right: Box::new(grow(data, moments, right, depth - 1)),
            }
        }
        _ => leaf(moments, &rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<bool>) {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![i as f64, (i % 7) as f64])
            .collect();
        let labels = (0..60).map(|i| i >= 50).collect();
        (rows, labels)
    }

    #[test]
    fn test_ranks_positives_higher() {
        let (rows, labels) = separable();
        let model = GradientBoostedTrees::fit(&rows, &labels, None, &TrainingConfig::default()).unwrap();
        assert_eq!(model.tree_count(), 50);

        let high = model.predict_proba(&[55.0, 3.0]).unwrap();
        let low = model.predict_proba(&[10.0, 3.0]).unwrap();
        assert!(high > 0.5, "high {}", high);
        assert!(low < 0.1, "low {}", low);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (rows, labels) = separable();
        let config = TrainingConfig::default();
        let a = GradientBoostedTrees::fit(&rows, &labels, None, &config).unwrap();
        let b = GradientBoostedTrees::fit(&rows, &labels, None, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_needs_enough_positives() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels: Vec<bool> = (0..10).map(|i| i == 9).collect();
        assert_eq!(
            GradientBoostedTrees::fit(&rows, &labels, None, &TrainingConfig::default()),
            Err(TrainingError::InsufficientPositives { needed: 2, found: 1 })
        );
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (rows, labels) = separable();
        let model = GradientBoostedTrees::fit(&rows, &labels, None, &TrainingConfig::default()).unwrap();
        assert!(matches!(
            model.predict_proba(&[1.0]),
            Err(EstimatorError::FeatureCount { expected: 2, found: 1 })
        ));
    }
}
