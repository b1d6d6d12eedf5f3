//! Python bindings. Results cross the boundary as JSON for the report generator.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::config::{EnsembleConfig, SimulationConfig, TrainingConfig};
use crate::constants::{ROUND_BASE_RATES, SEASON_GAMES};
use crate::ensemble::{EnsembleCombiner, FitSummary};
use crate::error::{ConfigError, SimulationError};
use crate::monte_carlo::MonteCarloEngine;
use crate::team::TeamCompetitive;
use crate::training::{HistoricalSeason, HistoricalSeries};
use crate::win_prob::closed_form_probability;

impl From<SimulationError> for PyErr {
    fn from(err: SimulationError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<ConfigError> for PyErr {
    fn from(err: ConfigError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

fn simulation_config(config_toml: Option<&str>) -> Result<SimulationConfig, ConfigError> {
    match config_toml {
        Some(text) => SimulationConfig::from_toml_str(text),
        None => Ok(SimulationConfig::default()),
    }
}

fn combiner(config_toml: Option<&str>, ensemble_toml: Option<&str>) -> PyResult<EnsembleCombiner> {
    let ensemble = match ensemble_toml {
        Some(text) => EnsembleConfig::from_toml_str(text)?,
        None => EnsembleConfig::default(),
    };
    Ok(EnsembleCombiner::new(ensemble, simulation_config(config_toml)?)?)
}

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, text: &str) -> PyResult<T> {
    serde_json::from_str(text).map_err(|err| PyValueError::new_err(format!("invalid {} JSON: {}", what, err)))
}

fn fit_history(
    combiner: &mut EnsembleCombiner,
    seasons_json: &str,
    series_json: Option<&str>,
    training_toml: Option<&str>,
) -> PyResult<FitSummary> {
    let seasons: Vec<HistoricalSeason> = parse_json("seasons", seasons_json)?;
    let series: Vec<HistoricalSeries> = match series_json {
        Some(text) => parse_json("series", text)?,
        None => Vec::new(),
    };
    let training = match training_toml {
        Some(text) => TrainingConfig::from_toml_str(text)?,
        None => TrainingConfig::default(),
    };
    Ok(combiner.fit(&seasons, &series, &training))
}

fn forecast_json(combiner: &EnsembleCombiner, teams: &[TeamCompetitive]) -> PyResult<String> {
    let outputs = combiner.predict(teams)?;
    serde_json::to_string_pretty(&outputs).map_err(|err| SimulationError::from(err).into())
}

/// Ensemble that keeps its trained sub-models between predictions.
#[pyclass]
pub struct Forecaster {
    combiner: EnsembleCombiner,
}

#[pymethods]
impl Forecaster {
    #[new]
    #[pyo3(signature = (config_toml = None, ensemble_toml = None))]
    fn new(config_toml: Option<&str>, ensemble_toml: Option<&str>) -> PyResult<Self> {
        Ok(Forecaster {
            combiner: combiner(config_toml, ensemble_toml)?,
        })
    }

    /// Train on past team seasons and playoff series given as JSON lists.
    ///
    /// Returns a JSON object naming which sub-models trained.
    #[pyo3(signature = (seasons_json, series_json = None, training_toml = None))]
    fn fit(&mut self, seasons_json: &str, series_json: Option<&str>, training_toml: Option<&str>) -> PyResult<String> {
        let summary = fit_history(&mut self.combiner, seasons_json, series_json, training_toml)?;
        serde_json::to_string(&summary).map_err(|err| SimulationError::from(err).into())
    }

    fn predict(&self, teams: Vec<TeamCompetitive>) -> PyResult<String> {
        forecast_json(&self.combiner, &teams)
    }
}

/// Run the playoff simulation and return the aggregate as JSON.
#[pyfunction]
#[pyo3(signature = (teams, strength_scores, experience_scores = None, config_toml = None))]
fn simulate(
    teams: Vec<TeamCompetitive>,
    strength_scores: HashMap<String, f64>,
    experience_scores: Option<HashMap<String, f64>>,
    config_toml: Option<&str>,
) -> PyResult<String> {
    let engine = MonteCarloEngine::new(simulation_config(config_toml)?)?;
    let result = engine.simulate(&teams, &strength_scores, experience_scores.as_ref())?;
    result.to_json().map_err(|err| SimulationError::from(err).into())
}

/// Blend the simulation with the estimators and return per-team forecasts as JSON.
///
/// When `seasons_json` is given the estimators are trained on it first;
/// otherwise they fall back to uniform defaults.
#[pyfunction]
#[pyo3(signature = (teams, config_toml = None, ensemble_toml = None, seasons_json = None, series_json = None))]
fn predict(
    teams: Vec<TeamCompetitive>,
    config_toml: Option<&str>,
    ensemble_toml: Option<&str>,
    seasons_json: Option<&str>,
    series_json: Option<&str>,
) -> PyResult<String> {
    let mut combiner = combiner(config_toml, ensemble_toml)?;
    if let Some(seasons) = seasons_json {
        fit_history(&mut combiner, seasons, series_json, None)?;
    }
    forecast_json(&combiner, &teams)
}

/// Closed-form series win probability for a favorite `strength_diff` points stronger.
#[pyfunction]
#[pyo3(name = "closed_form_probability")]
fn py_closed_form_probability(strength_diff: f64, round: u8) -> f64 {
    closed_form_probability(strength_diff, round)
}

#[pymodule]
fn playoff_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<TeamCompetitive>()?;
    m.add_class::<Forecaster>()?;

    m.add_function(wrap_pyfunction!(simulate, m)?)?;
    m.add_function(wrap_pyfunction!(predict, m)?)?;
    m.add_function(wrap_pyfunction!(py_closed_form_probability, m)?)?;

    m.add("SEASON_GAMES", SEASON_GAMES)?;
    m.add("ROUND_BASE_RATES", ROUND_BASE_RATES.to_vec())?;

    Ok(())
}
