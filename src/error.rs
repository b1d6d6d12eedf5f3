use thiserror::Error;

/// Problems with the league handed to the simulator.
///
/// These are checked once, before any trial runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LeagueError {
    #[error("league has no teams")]
    Empty,
    #[error("team {0} appears more than once")]
    DuplicateTeam(String),
    #[error("expected 2 conferences, found {0}")]
    ConferenceCount(usize),
    #[error("conference {conference} has {teams} teams, need at least {needed}")]
    ConferenceTooSmall {
        conference: String,
        teams: usize,
        needed: usize,
    },
    #[error("team {team} has a non-finite {field}")]
    NonFinite { team: String, field: &'static str },
}

/// Why a seeding strategy could not build a bracket. Never fatal: the next
/// strategy in the chain takes over.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeedingError {
    #[error("expected 2 divisions, found {0}")]
    DivisionCount(usize),
    #[error("division {division} has {teams} teams, need {needed}")]
    ShortDivision {
        division: String,
        teams: usize,
        needed: usize,
    },
    #[error("{found} teams available, need {needed}")]
    NotEnoughTeams { found: usize, needed: usize },
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("trial count must be positive")]
    ZeroTrials,
    #[error("season length must be positive")]
    ZeroSeasonLength,
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("ensemble weights must sum to 1, got {0}")]
    WeightSum(f64),
    #[error("invalid distribution parameters: {0}")]
    Distribution(String),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures from a probability estimator at prediction time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("estimator {0} has not been trained")]
    NotTrained(&'static str),
    #[error("expected {expected} features, got {found}")]
    FeatureCount { expected: usize, found: usize },
    #[error("estimator returned {found} probabilities for {expected} teams")]
    LengthMismatch { expected: usize, found: usize },
    #[error("estimator produced a non-finite probability")]
    NonFinite,
    #[error("network backend failed: {0}")]
    Backend(String),
}

/// Reasons a sub-model could not be trained.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainingError {
    #[error("no training examples")]
    Empty,
    #[error("need at least {needed} positive examples, found {found}")]
    InsufficientPositives { needed: usize, found: usize },
    #[error("training target has a single class")]
    SingleClass,
    #[error("expected {expected} features, got {found}")]
    FeatureCount { expected: usize, found: usize },
    #[error("{0} sample weights for {1} examples")]
    WeightCount(usize, usize),
    #[error("{0} labels for {1} examples")]
    LabelCount(usize, usize),
    #[error("network backend failed: {0}")]
    Backend(String),
}

/// Errors surfaced by the public `simulate` and `predict` entry points.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    League(#[from] LeagueError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}
