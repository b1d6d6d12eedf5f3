use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module, Param};
use burn::nn::Linear;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;
use tracing::debug;

use crate::config::TrainingConfig;
use crate::error::{EstimatorError, TrainingError};
use crate::training::{check_training_set, require_positives, LogisticRegression};

type InferenceBackend = NdArray<f32>;
type TrainingBackend = Autodiff<InferenceBackend>;

/// Iterations used for the one-feature sigmoid calibration fit.
const CALIBRATION_ITERATIONS: usize = 1_000;

/// Stack of ReLU layers ending in a single log-odds unit.
#[derive(Module, Debug)]
struct Network<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
}

impl<B: Backend> Network<B> {
    fn new(inputs: usize, layers: &[usize], rng: &mut ChaCha8Rng, device: &B::Device) -> Self {
        let mut width = inputs;
        let mut hidden = Vec::with_capacity(layers.len());
        for &units in layers {
            hidden.push(xavier_linear(width, units, rng, device));
            width = units;
        }
        Network {
            hidden,
            output: xavier_linear(width, 1, rng, device),
        }
    }

    /// Log-odds for each row of a `[rows, features]` input.
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 1> {
        let x = self
            .hidden
            .iter()
            .fold(input, |x, layer| relu(layer.forward(x)));
        self.output.forward(x).squeeze(1)
    }
}

/// Linear layer with Xavier-uniform weights drawn from the training rng.
fn xavier_linear<B: Backend>(
    inputs: usize,
    outputs: usize,
    rng: &mut ChaCha8Rng,
    device: &B::Device,
) -> Linear<B> {
    let limit = (6.0 / (inputs + outputs) as f64).sqrt();
    let weights: Vec<f32> = (0..inputs * outputs)
        .map(|_| rng.gen_range(-limit..limit) as f32)
        .collect();
    Linear {
        weight: Param::from_tensor(Tensor::from_data(
            TensorData::new(weights, [inputs, outputs]),
            device,
        )),
        bias: Some(Param::from_tensor(Tensor::zeros([outputs], device))),
    }
}

fn matrix<B: Backend>(rows: &[&[f64]], width: usize, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = rows
        .iter()
        .flat_map(|r| r.iter().map(|&x| x as f32))
        .collect();
    Tensor::from_data(TensorData::new(values, [rows.len(), width]), device)
}

fn vector<B: Backend>(values: impl Iterator<Item = f64>, device: &B::Device) -> Tensor<B, 1> {
    let values: Vec<f32> = values.map(|x| x as f32).collect();
    let len = values.len();
    Tensor::from_data(TensorData::new(values, [len]), device)
}

/// Weighted binary cross-entropy on log-odds, summed over the batch.
fn weighted_log_loss<B: Backend>(
    logits: Tensor<B, 1>,
    targets: Tensor<B, 1>,
    weights: Tensor<B, 1>,
) -> Tensor<B, 1> {
    // softplus(z) - y * z, finite for large |z|
    let softplus =
        logits.clone().clamp_min(0.0) + logits.clone().abs().neg().exp().add_scalar(1.0).log();
    ((softplus - targets * logits) * weights).sum()
}

/// Feed-forward ReLU network followed by Platt scaling.
///
/// The network is trained with AdamW on shuffled mini-batches of the weighted
/// log loss. Its raw log-odds are then mapped through a fitted one-feature
/// logistic curve so rare positives get calibrated probabilities.
#[derive(Debug)]
pub struct CalibratedNeuralNet {
    // burn modules are Send but not Sync
    network: Mutex<Network<InferenceBackend>>,
    width: usize,
    calibration: LogisticRegression,
}

impl CalibratedNeuralNet {
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[bool],
        weights: Option<&[f64]>,
        config: &TrainingConfig,
    ) -> Result<Self, TrainingError> {
        let width = rows.first().map_or(0, Vec::len);
        check_training_set(rows, labels, weights, width)?;
        require_positives(labels, config.network_min_positives)?;

        let device: <InferenceBackend as Backend>::Device = Default::default();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut network: Network<TrainingBackend> =
            Network::new(width, &config.hidden_layers, &mut rng, &device);
        let mut optimizer = AdamWConfig::new()
            .with_weight_decay(config.network_l2 as f32)
            .init();

        let sample_weight: Vec<f64> = match weights {
            Some(w) => w.to_vec(),
            None => vec![1.0; rows.len()],
        };
        let mut order: Vec<usize> = (0..rows.len()).collect();

        for _ in 0..config.epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(config.batch_size.max(1)) {
                let batch_rows: Vec<&[f64]> = batch.iter().map(|&i| rows[i].as_slice()).collect();
                let inputs = matrix(&batch_rows, width, &device);
                let targets = vector(
                    batch.iter().map(|&i| if labels[i] { 1.0 } else { 0.0 }),
                    &device,
                );
                let batch_weights = vector(batch.iter().map(|&i| sample_weight[i]), &device);
                let total: f64 = batch.iter().map(|&i| sample_weight[i]).sum();

                let loss = weighted_log_loss(network.forward(inputs), targets, batch_weights)
                    .div_scalar(total.max(f64::EPSILON));
                let grads = GradientsParams::from_grads(loss.backward(), &network);
                network = optimizer.step(config.network_learning_rate, network, grads);
            }
        }

        let network = network.valid();
        let scores = log_odds(&network, rows, width)
            .map_err(|err| TrainingError::Backend(err.to_string()))?;
        let score_rows: Vec<Vec<f64>> = scores.into_iter().map(|s| vec![s]).collect();
        let calibration = LogisticRegression::fit(
            &score_rows,
            labels,
            Some(&sample_weight),
            0.0,
            CALIBRATION_ITERATIONS,
            0.5,
        )?;
        debug!(
            layers = ?config.hidden_layers,
            epochs = config.epochs,
            rows = rows.len(),
            "network trained"
        );

        Ok(CalibratedNeuralNet {
            network: Mutex::new(network),
            width,
            calibration,
        })
    }

    /// Uncalibrated log-odds, one per row.
    pub fn raw_scores(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.width) {
            return Err(EstimatorError::FeatureCount {
                expected: self.width,
                found: row.len(),
            });
        }
        let network = self
            .network
            .lock()
            .map_err(|_| EstimatorError::Backend("network lock poisoned".to_string()))?;
        log_odds(&network, rows, self.width)
    }

    /// Calibrated probability, one per row.
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        self.raw_scores(rows)?
            .into_iter()
            .map(|score| self.calibration.predict_proba(&[score]))
            .collect()
    }
}

fn log_odds(
    network: &Network<InferenceBackend>,
    rows: &[Vec<f64>],
    width: usize,
) -> Result<Vec<f64>, EstimatorError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let device: <InferenceBackend as Backend>::Device = Default::default();
    let slices: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
    let output = network.forward(matrix(&slices, width, &device));
    output
        .into_data()
        .to_vec::<f32>()
        .map(|values| values.into_iter().map(f64::from).collect())
        .map_err(|err| EstimatorError::Backend(format!("{:?}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<Vec<f64>>, Vec<bool>) {
        // Positives sit in the top-right corner
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                rows.push(vec![i as f64 / 4.0 - 1.0, j as f64 / 4.0 - 1.0]);
                labels.push(i >= 6 && j >= 5);
            }
        }
        (rows, labels)
    }

    fn quick() -> TrainingConfig {
        TrainingConfig {
            hidden_layers: vec![16, 8],
            epochs: 150,
            network_learning_rate: 0.01,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_scores_positive_region_higher() {
        let (rows, labels) = data();
        let model = CalibratedNeuralNet::fit(&rows, &labels, None, &quick()).unwrap();
        let p = model
            .predict_proba(&[vec![0.75, 0.5], vec![-1.0, -1.0]])
            .unwrap();
        assert!(p[0] > p[1], "inside {} outside {}", p[0], p[1]);
        assert!(p.iter().all(|x| (0.0..=1.0).contains(x)));
    }

    #[test]
    fn test_default_layers_train() {
        let (rows, labels) = data();
        let config = TrainingConfig {
            epochs: 20,
            ..TrainingConfig::default()
        };
        assert_eq!(config.hidden_layers, vec![64, 32, 16]);
        let model = CalibratedNeuralNet::fit(&rows, &labels, None, &config).unwrap();
        assert_eq!(model.raw_scores(&rows).unwrap().len(), rows.len());
    }

    #[test]
    fn test_needs_three_positives() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels: Vec<bool> = (0..10).map(|i| i >= 8).collect();
        assert_eq!(
            CalibratedNeuralNet::fit(&rows, &labels, None, &quick()).unwrap_err(),
            TrainingError::InsufficientPositives { needed: 3, found: 2 }
        );
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (rows, labels) = data();
        let model = CalibratedNeuralNet::fit(&rows, &labels, None, &quick()).unwrap();
        assert_eq!(
            model.raw_scores(&[vec![1.0, 2.0, 3.0]]),
            Err(EstimatorError::FeatureCount { expected: 2, found: 3 })
        );
        assert!(model.raw_scores(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (rows, labels) = data();
        let config = TrainingConfig {
            epochs: 30,
            ..quick()
        };
        let a = CalibratedNeuralNet::fit(&rows, &labels, None, &config).unwrap();
        let b = CalibratedNeuralNet::fit(&rows, &labels, None, &config).unwrap();
        assert_eq!(a.raw_scores(&rows).unwrap(), b.raw_scores(&rows).unwrap());
    }
}
