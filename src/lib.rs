//! Playoff Core - Monte Carlo playoff forecasting for a two-conference league.
//!
//! Seeds each conference under divisional rules, plays every best-of-seven
//! series, repeats the whole playoff thousands of times and blends the result
//! with trained championship estimators. Python bindings are available behind
//! the `python` feature.

pub mod aggregate;
pub mod bracket;
pub mod config;
pub mod constants;
pub mod ensemble;
pub mod error;
pub mod matchup;
pub mod monte_carlo;
pub mod seeding;
pub mod series;
pub mod team;
pub mod training;
pub mod win_prob;

#[cfg(feature = "python")]
mod python;

pub use aggregate::{AggregateResult, ConferenceMatchups, MatchupProbability, ProjectedMatchup, RoundAdvancement};
pub use bracket::{BracketSimulator, ConferenceTrace, TournamentTrace};
pub use config::{EnsembleConfig, SimulationConfig, TrainingConfig};
pub use ensemble::{ChampionshipEstimator, EnsembleCombiner, EnsembleOutput, FitSummary, PlayoffClassifier, Tier};
pub use error::{ConfigError, EstimatorError, LeagueError, SeedingError, SimulationError, TrainingError};
pub use matchup::{MatchupKey, MatchupTally};
pub use monte_carlo::MonteCarloEngine;
pub use seeding::{Bracket, Matchup, SeedingEngine, SeedingStrategy, SubBracket};
pub use series::{Entrant, GameRates, SeriesOutcome, SeriesSimulator};
pub use team::{Conference, League, TeamCompetitive, TeamIndex};
pub use training::{HistoricalSeason, HistoricalSeries, SeriesModel};
pub use win_prob::{closed_form_probability, ClosedFormModel, SeriesContext, SeriesEstimate, SeriesModelChain, SeriesProbability};
