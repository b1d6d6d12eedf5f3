use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TrainingConfig;
use crate::constants::{round_parity, TRAINED_SERIES_BOUNDS};
use crate::error::{EstimatorError, TrainingError};
use crate::team::TeamCompetitive;
use crate::training::{LogisticRegression, StandardScaler};
use crate::win_prob::{SeriesContext, SeriesEstimate, SeriesProbability};

/// Inputs: strength difference, seed gap, round, experience difference
pub const SERIES_FEATURE_COUNT: usize = 4;

/// A past playoff series, seen from the favorite's side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub round: u8,
    pub strength_diff: f64,
    pub seed_gap: f64,
    pub experience_diff: f64,
    pub favorite_won: bool,
}

impl HistoricalSeries {
    fn features(&self) -> Vec<f64> {
        vec![
            self.strength_diff,
            self.seed_gap,
            f64::from(self.round),
            self.experience_diff,
        ]
    }
}

/// Logistic model of the favorite's series win probability.
///
/// Predictions are pulled toward 0.5 by the round's parity share, clipped to
/// [0.25, 0.75] and decide a series in one draw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesModel {
    scaler: StandardScaler,
    model: LogisticRegression,
}

impl SeriesModel {
    pub fn fit(history: &[HistoricalSeries], config: &TrainingConfig) -> Result<Self, TrainingError> {
        let rows: Vec<Vec<f64>> = history.iter().map(HistoricalSeries::features).collect();
        let labels: Vec<bool> = history.iter().map(|s| s.favorite_won).collect();
        if rows.is_empty() {
            return Err(TrainingError::Empty);
        }

        let scaler = StandardScaler::fit(&rows);
        let scaled = scaler
            .transform_all(&rows)
            .map_err(|_| TrainingError::FeatureCount {
                expected: SERIES_FEATURE_COUNT,
                found: rows[0].len(),
            })?;

        let model = LogisticRegression::fit(
            &scaled,
            &labels,
            None,
            config.logistic_l2,
            config.logistic_iterations,
            config.logistic_learning_rate,
        )?;
        info!(
            series = history.len(),
            active_features = ?scaler.active_features(),
            coefficients = ?model.coefficients(),
            intercept = model.intercept(),
            "series model trained"
        );

        Ok(SeriesModel { scaler, model })
    }

    /// Favorite win probability for a matchup described by raw features.
    pub fn predict(
        &self,
        strength_diff: f64,
        seed_gap: f64,
        round: u8,
        experience_diff: f64,
    ) -> Result<f64, EstimatorError> {
        let row = self
            .scaler
            .transform(&[strength_diff, seed_gap, f64::from(round), experience_diff])?;
        let p = self.model.predict_proba(&row)?;
        if !p.is_finite() {
            return Err(EstimatorError::NonFinite);
        }
        Ok(toward_even(p, round).clamp(TRAINED_SERIES_BOUNDS.0, TRAINED_SERIES_BOUNDS.1))
    }
}

/// Later rounds are closer contests than the regression alone suggests.
fn toward_even(p: f64, round: u8) -> f64 {
    let parity = round_parity(round);
    p * (1.0 - parity) + 0.5 * parity
}

impl SeriesProbability for SeriesModel {
    fn name(&self) -> &'static str {
        "trained_series"
    }

    fn win_probability(
        &self,
        favorite: &TeamCompetitive,
        underdog: &TeamCompetitive,
        context: &SeriesContext,
    ) -> Result<SeriesEstimate, EstimatorError> {
        let p = self.predict(
            favorite.strength - underdog.strength,
            context.seed_gap(),
            context.round,
            favorite.experience - underdog.experience,
        )?;
        Ok(SeriesEstimate::SingleDraw(p))
    }
}
