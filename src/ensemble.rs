//! Championship probabilities from several estimators blended into one
//! normalized distribution per league.

use serde::{Deserialize, Serialize};
use statrs::distribution::Beta;
use statrs::function::beta::inv_beta_reg;
use std::fmt;
use tracing::{info, warn};

use crate::aggregate::{AggregateResult, RoundAdvancement};
use crate::config::{EnsembleConfig, SimulationConfig, TrainingConfig};
use crate::constants::TIER_SIZES;
use crate::error::{ConfigError, EstimatorError, SimulationError, TrainingError};
use crate::monte_carlo::MonteCarloEngine;
use crate::team::{League, TeamCompetitive};
use crate::training::{
    recency_weights, CalibratedNeuralNet, GradientBoostedTrees, HistoricalSeason, HistoricalSeries,
    LogisticRegression, SeriesModel, StandardScaler,
};
use crate::win_prob::SeriesProbability;

/// A model giving each team's probability of winning the championship.
pub trait ChampionshipEstimator: Send + Sync {
    fn name(&self) -> &'static str;

    /// One probability per team, in input order.
    fn predict_proba(&self, teams: &[TeamCompetitive]) -> Result<Vec<f64>, EstimatorError>;
}

/// Strength tier by rank: 4 Elite, 8 Contender, 8 Bubble, the rest Longshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Elite,
    Contender,
    Bubble,
    Longshot,
}

impl Tier {
    /// Tier for a 1-based strength rank.
    pub fn from_rank(rank: usize) -> Tier {
        let mut cutoff = 0;
        for (size, tier) in TIER_SIZES.iter().zip([Tier::Elite, Tier::Contender, Tier::Bubble]) {
            cutoff += size;
            if rank <= cutoff {
                return tier;
            }
        }
        Tier::Longshot
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Elite => "Elite",
            Tier::Contender => "Contender",
            Tier::Bubble => "Bubble",
            Tier::Longshot => "Longshot",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecast for one team.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnsembleOutput {
    pub team: String,
    pub conference: String,
    pub composite_strength: f64,
    /// 1 for the strongest team
    pub strength_rank: usize,
    pub playoff_probability: f64,
    pub conference_final_probability: f64,
    pub final_probability: f64,
    /// Normalized across the league
    pub championship_probability: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub tier: Tier,
}

/// Which sub-models `fit` managed to train.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitSummary {
    pub tree_trained: bool,
    pub neural_trained: bool,
    pub series_trained: bool,
    pub playoff_trained: bool,
}

/// Boosted-tree championship estimator on standardized team features.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeEnsembleEstimator {
    scaler: StandardScaler,
    model: GradientBoostedTrees,
}

impl TreeEnsembleEstimator {
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[bool],
        weights: &[f64],
        config: &TrainingConfig,
    ) -> Result<Self, TrainingError> {
        let (scaler, scaled) = standardize(rows)?;
        let model = GradientBoostedTrees::fit(&scaled, labels, Some(weights), config)?;
        Ok(TreeEnsembleEstimator { scaler, model })
    }
}

impl ChampionshipEstimator for TreeEnsembleEstimator {
    fn name(&self) -> &'static str {
        "tree_ensemble"
    }

    fn predict_proba(&self, teams: &[TeamCompetitive]) -> Result<Vec<f64>, EstimatorError> {
        teams
            .iter()
            .map(|t| self.model.predict_proba(&self.scaler.transform(&t.feature_row())?))
            .collect()
    }
}

/// Calibrated neural championship estimator on standardized team features.
#[derive(Debug)]
pub struct NeuralEstimator {
    scaler: StandardScaler,
    model: CalibratedNeuralNet,
}

impl NeuralEstimator {
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[bool],
        weights: &[f64],
        config: &TrainingConfig,
    ) -> Result<Self, TrainingError> {
        let (scaler, scaled) = standardize(rows)?;
        let model = CalibratedNeuralNet::fit(&scaled, labels, Some(weights), config)?;
        Ok(NeuralEstimator { scaler, model })
    }
}

impl ChampionshipEstimator for NeuralEstimator {
    fn name(&self) -> &'static str {
        "neural"
    }

    fn predict_proba(&self, teams: &[TeamCompetitive]) -> Result<Vec<f64>, EstimatorError> {
        let rows = teams
            .iter()
            .map(|t| self.scaler.transform(&t.feature_row()))
            .collect::<Result<Vec<_>, _>>()?;
        self.model.predict_proba(&rows)
    }
}

/// Probability that a team reaches the playoffs, learned from past
/// qualification outcomes.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayoffClassifier {
    scaler: StandardScaler,
    model: LogisticRegression,
}

impl PlayoffClassifier {
    pub fn fit(seasons: &[HistoricalSeason], config: &TrainingConfig) -> Result<Self, TrainingError> {
        let rows: Vec<Vec<f64>> = seasons.iter().map(|s| s.team.feature_row().to_vec()).collect();
        let labels: Vec<bool> = seasons.iter().map(|s| s.made_playoffs).collect();
        let (scaler, scaled) = standardize(&rows)?;
        let model = LogisticRegression::fit(
            &scaled,
            &labels,
            None,
            config.playoff_l2,
            config.playoff_iterations,
            config.logistic_learning_rate,
        )?;
        Ok(PlayoffClassifier { scaler, model })
    }

    pub fn predict_proba(&self, teams: &[TeamCompetitive]) -> Result<Vec<f64>, EstimatorError> {
        teams
            .iter()
            .map(|t| self.model.predict_proba(&self.scaler.transform(&t.feature_row())?))
            .collect()
    }
}

fn standardize(rows: &[Vec<f64>]) -> Result<(StandardScaler, Vec<Vec<f64>>), TrainingError> {
    if rows.is_empty() {
        return Err(TrainingError::Empty);
    }
    let scaler = StandardScaler::fit(rows);
    let scaled = scaler
        .transform_all(rows)
        .map_err(|_| TrainingError::FeatureCount {
            expected: scaler.width(),
            found: rows.iter().map(Vec::len).find(|&w| w != scaler.width()).unwrap_or(0),
        })?;
    Ok((scaler, scaled))
}

/// Two-sided Beta interval around `p` treating it as `samples` Bernoulli trials.
///
/// Quantiles come from the inverse regularized incomplete beta function. The
/// interval is widened to contain `p`, which only matters at the boundaries.
pub fn confidence_interval(p: f64, samples: f64, confidence: f64) -> (f64, f64) {
    let tail = (1.0 - confidence) / 2.0;
    let (a, b) = (p * samples + 1.0, (1.0 - p) * samples + 1.0);
    if let Err(err) = Beta::new(a, b) {
        warn!(probability = p, error = %err, "invalid beta parameters, using a point interval");
        return (p, p);
    }
    let lower = inv_beta_reg(a, b, tail);
    let upper = inv_beta_reg(a, b, 1.0 - tail);
    (
        if lower.is_finite() { lower.min(p) } else { p },
        if upper.is_finite() { upper.max(p) } else { p },
    )
}

/// Blends tree, neural and Monte Carlo championship estimates.
pub struct EnsembleCombiner {
    config: EnsembleConfig,
    engine: MonteCarloEngine,
    tree: Option<Box<dyn ChampionshipEstimator>>,
    neural: Option<Box<dyn ChampionshipEstimator>>,
    playoff: Option<PlayoffClassifier>,
}

impl EnsembleCombiner {
    pub fn new(config: EnsembleConfig, simulation: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(EnsembleCombiner {
            config,
            engine: MonteCarloEngine::new(simulation)?,
            tree: None,
            neural: None,
            playoff: None,
        })
    }

    pub fn with_tree_estimator(mut self, estimator: Box<dyn ChampionshipEstimator>) -> Self {
        self.tree = Some(estimator);
        self
    }

    pub fn with_neural_estimator(mut self, estimator: Box<dyn ChampionshipEstimator>) -> Self {
        self.neural = Some(estimator);
        self
    }

    pub fn with_series_model(mut self, model: Box<dyn SeriesProbability>) -> Self {
        self.engine.set_series_model(model);
        self
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn engine(&self) -> &MonteCarloEngine {
        &self.engine
    }

    /// Train the sub-models on past seasons and series.
    ///
    /// A model that cannot be trained is left out with a warning; its share of
    /// the blend falls back to the uniform default.
    pub fn fit(
        &mut self,
        seasons: &[HistoricalSeason],
        series: &[HistoricalSeries],
        training: &TrainingConfig,
    ) -> FitSummary {
        let mut summary = FitSummary::default();
        let rows: Vec<Vec<f64>> = seasons.iter().map(|s| s.team.feature_row().to_vec()).collect();
        let labels: Vec<bool> = seasons.iter().map(|s| s.won_championship).collect();
        let weights = recency_weights(seasons, training.recency_decay, training.champion_boost);

        self.tree = match TreeEnsembleEstimator::fit(&rows, &labels, &weights, training) {
            Ok(estimator) => {
                summary.tree_trained = true;
                Some(Box::new(estimator))
            }
            Err(err) => {
                warn!(estimator = "tree_ensemble", error = %err, "training skipped");
                None
            }
        };

        if self.config.use_neural {
            self.neural = match NeuralEstimator::fit(&rows, &labels, &weights, training) {
                Ok(estimator) => {
                    summary.neural_trained = true;
                    Some(Box::new(estimator))
                }
                Err(err) => {
                    warn!(estimator = "neural", error = %err, "training skipped");
                    None
                }
            };
        }

        self.playoff = match PlayoffClassifier::fit(seasons, training) {
            Ok(classifier) => {
                summary.playoff_trained = true;
                Some(classifier)
            }
            Err(err) => {
                warn!(estimator = "playoff", error = %err, "training skipped, simulated qualification in use");
                None
            }
        };

        match SeriesModel::fit(series, training) {
            Ok(model) => {
                self.engine.set_series_model(Box::new(model));
                summary.series_trained = true;
            }
            Err(err) => warn!(
                estimator = "trained_series",
                error = %err,
                "training skipped, closed-form series model in use"
            ),
        }

        info!(
            seasons = seasons.len(),
            champions = labels.iter().filter(|&&l| l).count(),
            series = series.len(),
            tree = summary.tree_trained,
            neural = summary.neural_trained,
            series_model = summary.series_trained,
            playoff = summary.playoff_trained,
            "ensemble fit complete"
        );
        summary
    }

    /// Simulate the playoffs for `teams` and blend the result with the
    /// trained estimators.
    ///
    /// Output is sorted by championship probability, highest first.
    pub fn predict(&self, teams: &[TeamCompetitive]) -> Result<Vec<EnsembleOutput>, SimulationError> {
        let league = League::new(teams.to_vec())?;
        let aggregate = self.engine.simulate_league(&league);
        Ok(self.blend(&league, &aggregate))
    }

    /// Combine a finished Monte Carlo run with the estimators.
    pub fn blend(&self, league: &League, aggregate: &AggregateResult) -> Vec<EnsembleOutput> {
        let n = league.len();
        let uniform = 1.0 / n as f64;
        let teams = league.teams();

        let tree = estimates(self.tree.as_deref(), "tree_ensemble", teams, uniform);
        let (weights, neural) = if self.config.use_neural {
            (
                [self.config.tree_weight, self.config.neural_weight, self.config.monte_carlo_weight],
                estimates(self.neural.as_deref(), "neural", teams, uniform),
            )
        } else {
            (
                [
                    self.config.tree_weight_without_neural,
                    0.0,
                    self.config.monte_carlo_weight_without_neural,
                ],
                vec![0.0; n],
            )
        };

        let rounds: Vec<_> = teams
            .iter()
            .map(|t| aggregate.team(&t.id).copied().unwrap_or_default())
            .collect();
        let playoff = self.playoff_probabilities(teams, &rounds);

        let gated: Vec<f64> = (0..n)
            .map(|i| {
                let blended = weights[0] * tree[i] + weights[1] * neural[i] + weights[2] * rounds[i].champion;
                let gate = (playoff[i] + self.config.playoff_gate_margin).min(1.0);
                blended * gate
            })
            .collect();

        let total: f64 = gated.iter().sum();
        let championship: Vec<f64> = if total > 0.0 && total.is_finite() {
            gated.iter().map(|p| p / total).collect()
        } else {
            warn!(total, "no championship probability mass, using uniform distribution");
            vec![uniform; n]
        };

        let mut by_strength: Vec<usize> = (0..n).collect();
        by_strength.sort_by(|&a, &b| {
            teams[b]
                .strength
                .total_cmp(&teams[a].strength)
                .then(a.cmp(&b))
        });
        let mut strength_rank = vec![0; n];
        for (rank, &idx) in by_strength.iter().enumerate() {
            strength_rank[idx] = rank + 1;
        }

        let mut outputs: Vec<EnsembleOutput> = (0..n)
            .map(|i| {
                let p = championship[i];
                let (ci_lower, ci_upper) =
                    confidence_interval(p, self.config.interval_samples, self.config.confidence);
                EnsembleOutput {
                    team: teams[i].id.clone(),
                    conference: teams[i].conference.clone(),
                    composite_strength: teams[i].strength,
                    strength_rank: strength_rank[i],
                    playoff_probability: playoff[i],
                    conference_final_probability: rounds[i].round3,
                    final_probability: rounds[i].round4,
                    championship_probability: p,
                    ci_lower,
                    ci_upper,
                    tier: Tier::from_rank(strength_rank[i]),
                }
            })
            .collect();

        outputs.sort_by(|a, b| {
            b.championship_probability
                .total_cmp(&a.championship_probability)
                .then_with(|| a.team.cmp(&b.team))
        });
        outputs
    }

    /// Classifier qualification odds, or the simulated P(round 1) when the
    /// classifier is absent or unusable.
    fn playoff_probabilities(&self, teams: &[TeamCompetitive], rounds: &[RoundAdvancement]) -> Vec<f64> {
        let simulated = || rounds.iter().map(|r| r.round1).collect();
        let Some(classifier) = &self.playoff else {
            return simulated();
        };
        match classifier
            .predict_proba(teams)
            .and_then(|p| check_probabilities(p, teams.len()))
        {
            Ok(p) => p,
            Err(err) => {
                warn!(estimator = "playoff", error = %err, "classifier failed, using simulated qualification");
                simulated()
            }
        }
    }
}

/// Estimator output, or the uniform default when it is absent or unusable.
fn estimates(
    estimator: Option<&dyn ChampionshipEstimator>,
    label: &'static str,
    teams: &[TeamCompetitive],
    uniform: f64,
) -> Vec<f64> {
    let Some(estimator) = estimator else {
        warn!(estimator = label, "estimator not trained, using uniform default");
        return vec![uniform; teams.len()];
    };
    match estimator.predict_proba(teams).and_then(|p| check_probabilities(p, teams.len())) {
        Ok(p) => p,
        Err(err) => {
            warn!(estimator = estimator.name(), error = %err, "estimator failed, using uniform default");
            vec![uniform; teams.len()]
        }
    }
}

fn check_probabilities(p: Vec<f64>, expected: usize) -> Result<Vec<f64>, EstimatorError> {
    if p.len() != expected {
        return Err(EstimatorError::LengthMismatch {
            expected,
            found: p.len(),
        });
    }
    if p.iter().any(|x| !x.is_finite() || !(0.0..=1.0).contains(x)) {
        return Err(EstimatorError::NonFinite);
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::fixtures::league_teams;
    use crate::training::fixtures::history;
    use std::collections::BTreeMap;

    struct Fixed(Vec<f64>);

    impl ChampionshipEstimator for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn predict_proba(&self, _: &[TeamCompetitive]) -> Result<Vec<f64>, EstimatorError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl ChampionshipEstimator for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn predict_proba(&self, _: &[TeamCompetitive]) -> Result<Vec<f64>, EstimatorError> {
            Err(EstimatorError::NotTrained("failing"))
        }
    }

    fn combiner(config: EnsembleConfig) -> EnsembleCombiner {
        EnsembleCombiner::new(
            config,
            SimulationConfig {
                trials: 400,
                ..SimulationConfig::default()
            },
        )
        .unwrap()
    }

    fn aggregate_with(league: &League, f: impl Fn(usize) -> RoundAdvancement) -> AggregateResult {
        let advancement: BTreeMap<String, RoundAdvancement> = (0..league.len())
            .map(|i| (league.id(i).to_string(), f(i)))
            .collect();
        AggregateResult {
            advancement,
            conferences: Vec::new(),
            final_matchups: Vec::new(),
        }
    }

    #[test]
    fn test_tier_sizes() {
        let tiers: Vec<Tier> = (1..=32).map(Tier::from_rank).collect();
        let count = |t| tiers.iter().filter(|&&x| x == t).count();
        assert_eq!(count(Tier::Elite), 4);
        assert_eq!(count(Tier::Contender), 8);
        assert_eq!(count(Tier::Bubble), 8);
        assert_eq!(count(Tier::Longshot), 12);
        assert_eq!(Tier::from_rank(4), Tier::Elite);
        assert_eq!(Tier::from_rank(5), Tier::Contender);
        assert_eq!(Tier::from_rank(21).to_string(), "Longshot");
    }

    #[test]
    fn test_interval_contains_estimate() {
        for p in [0.0, 1e-5, 0.03125, 0.2, 0.5, 0.99, 1.0] {
            let (lo, hi) = confidence_interval(p, 10_000.0, 0.9);
            assert!(lo <= p && p <= hi, "p {} -> ({}, {})", p, lo, hi);
            assert!(hi - lo < 0.05);
        }
    }

    #[test]
    fn test_interval_hits_both_tails() {
        use statrs::distribution::ContinuousCDF;

        for p in [0.0005, 0.002, 0.03125, 0.2, 0.5] {
            let (lo, hi) = confidence_interval(p, 10_000.0, 0.9);
            let beta = Beta::new(p * 10_000.0 + 1.0, (1.0 - p) * 10_000.0 + 1.0).unwrap();
            assert!((beta.cdf(lo) - 0.05).abs() < 1e-4, "p {} cdf(lower) {}", p, beta.cdf(lo));
            assert!((beta.cdf(hi) - 0.95).abs() < 1e-4, "p {} cdf(upper) {}", p, beta.cdf(hi));
        }
        // A zero estimate still gets a non-degenerate upper bound
        let (lo, hi) = confidence_interval(0.0, 10_000.0, 0.9);
        assert_eq!(lo, 0.0);
        assert!((hi - 2.995e-4).abs() < 1e-6, "upper {}", hi);
    }

    #[test]
    fn test_blend_weights_and_gate() {
        let league = League::new(league_teams()).unwrap();
        let n = league.len();
        let combiner = combiner(EnsembleConfig::default())
            .with_tree_estimator(Box::new(Fixed(vec![0.1; n])))
            .with_neural_estimator(Box::new(Fixed(vec![0.2; n])));

        // Team 0 certain to qualify, team 1 never qualifies, rest even
        let aggregate = aggregate_with(&league, |i| RoundAdvancement {
            round1: match i {
                0 => 1.0,
                1 => 0.0,
                _ => 0.5,
            },
            champion: 1.0 / n as f64,
            ..RoundAdvancement::default()
        });
        let outputs = combiner.blend(&league, &aggregate);

        let mc = 1.0 / n as f64;
        let blended = 0.3 * 0.1 + 0.3 * 0.2 + 0.4 * mc;
        let raw = |gate: f64| blended * gate;
        let total = raw(1.0) + raw(0.1) + (n - 2) as f64 * raw(0.6);

        let find = |id: &str| outputs.iter().find(|o| o.team == id).unwrap();
        assert!((find(league.id(0)).championship_probability - raw(1.0) / total).abs() < 1e-12);
        assert!((find(league.id(1)).championship_probability - raw(0.1) / total).abs() < 1e-12);
        let sum: f64 = outputs.iter().map(|o| o.championship_probability).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_and_failing_estimators_use_uniform() {
        let league = League::new(league_teams()).unwrap();
        let aggregate = aggregate_with(&league, |i| RoundAdvancement {
            round1: 1.0,
            champion: if i == 0 { 1.0 } else { 0.0 },
            ..RoundAdvancement::default()
        });
        let combiner = combiner(EnsembleConfig::default()).with_tree_estimator(Box::new(Failing));
        let outputs = combiner.blend(&league, &aggregate);

        let u = 1.0 / 32.0;
        let top = 0.6 * u + 0.4;
        let rest = 0.6 * u;
        let total = top + 31.0 * rest;
        assert_eq!(outputs[0].team, league.id(0));
        assert!((outputs[0].championship_probability - top / total).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_length_estimator_is_ignored() {
        let league = League::new(league_teams()).unwrap();
        let aggregate = aggregate_with(&league, |_| RoundAdvancement {
            round1: 1.0,
            champion: 1.0 / 32.0,
            ..RoundAdvancement::default()
        });
        let combiner = combiner(EnsembleConfig::default())
            .with_tree_estimator(Box::new(Fixed(vec![0.9; 3])))
            .with_neural_estimator(Box::new(Fixed(vec![0.9; 32])));
        let outputs = combiner.blend(&league, &aggregate);
        // Every team gets the same blend, so the distribution stays uniform
        for o in &outputs {
            assert!((o.championship_probability - 1.0 / 32.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_without_neural_reweights() {
        let league = League::new(league_teams()).unwrap();
        let n = league.len();
        let config = EnsembleConfig {
            use_neural: false,
            ..EnsembleConfig::default()
        };
        let mut tree = vec![0.0; n];
        tree[5] = 1.0;
        let combiner = combiner(config)
            .with_tree_estimator(Box::new(Fixed(tree)))
            .with_neural_estimator(Box::new(Fixed(vec![1.0; n])));
        let aggregate = aggregate_with(&league, |i| RoundAdvancement {
            round1: 1.0,
            champion: if i == 7 { 1.0 } else { 0.0 },
            ..RoundAdvancement::default()
        });
        let outputs = combiner.blend(&league, &aggregate);
        assert_eq!(outputs[0].team, league.id(7));
        assert!((outputs[0].championship_probability - 0.6).abs() < 1e-12);
        assert_eq!(outputs[1].team, league.id(5));
        assert!((outputs[1].championship_probability - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_zero_mass_falls_back_to_uniform() {
        let league = League::new(league_teams()).unwrap();
        let n = league.len();
        let combiner = combiner(EnsembleConfig::default())
            .with_tree_estimator(Box::new(Fixed(vec![0.0; n])))
            .with_neural_estimator(Box::new(Fixed(vec![0.0; n])));
        let aggregate = aggregate_with(&league, |_| RoundAdvancement::default());
        let outputs = combiner.blend(&league, &aggregate);
        for o in &outputs {
            assert!((o.championship_probability - 1.0 / 32.0).abs() < 1e-12);
        }
        // Equal probabilities keep id order
        assert!(outputs.windows(2).all(|w| w[0].team < w[1].team));
    }

    #[test]
    fn test_predict_ranks_and_tiers() {
        let teams = league_teams();
        let outputs = combiner(EnsembleConfig::default()).predict(&teams).unwrap();
        assert_eq!(outputs.len(), 32);

        let sum: f64 = outputs.iter().map(|o| o.championship_probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(outputs
            .windows(2)
            .all(|w| w[0].championship_probability >= w[1].championship_probability));

        let mut ranks: Vec<usize> = outputs.iter().map(|o| o.strength_rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=32).collect::<Vec<_>>());

        let strongest = outputs.iter().find(|o| o.strength_rank == 1).unwrap();
        assert_eq!(strongest.team, "PAC0");
        assert_eq!(strongest.tier, Tier::Elite);
        for o in &outputs {
            assert!(o.ci_lower <= o.championship_probability && o.championship_probability <= o.ci_upper);
            assert!(o.playoff_probability >= o.conference_final_probability);
            assert!(o.conference_final_probability >= o.final_probability);
        }
    }

    #[test]
    fn test_fit_trains_all_models() {
        let seasons = history(8);
        let series: Vec<HistoricalSeries> = (0..60)
            .map(|i| HistoricalSeries {
                round: (i % 4) as u8 + 1,
                strength_diff: (i % 10) as f64,
                seed_gap: (i % 7) as f64,
                experience_diff: 0.0,
                favorite_won: i % 3 != 0,
            })
            .collect();
        let mut combiner = combiner(EnsembleConfig::default());
        let summary = combiner.fit(&seasons, &series, &TrainingConfig::default());
        assert_eq!(
            summary,
            FitSummary {
                tree_trained: true,
                neural_trained: true,
                series_trained: true,
                playoff_trained: true,
            }
        );
        assert_eq!(combiner.engine().series_model().strategy_names(), vec!["trained_series", "closed_form"]);

        let outputs = combiner.predict(&league_teams()).unwrap();
        let sum: f64 = outputs.iter().map(|o| o.championship_probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_skips_without_champions() {
        let mut seasons = history(1);
        for s in seasons.iter_mut() {
            s.won_championship = false;
        }
        seasons[0].won_championship = true;
        let mut combiner = combiner(EnsembleConfig::default());
        let summary = combiner.fit(&seasons, &[], &TrainingConfig::default());
        // Qualification labels are still two-class
        assert_eq!(
            summary,
            FitSummary {
                playoff_trained: true,
                ..FitSummary::default()
            }
        );
        assert_eq!(combiner.engine().series_model().strategy_names(), vec!["closed_form"]);
    }

    #[test]
    fn test_playoff_classifier_drives_gate() {
        let league = League::new(league_teams()).unwrap();
        let n = league.len();
        let mut fitted = combiner(EnsembleConfig::default());
        let summary = fitted.fit(&history(4), &[], &TrainingConfig::default());
        assert!(summary.playoff_trained);

        // Simulation says nobody qualifies; the classifier disagrees
        let aggregate = aggregate_with(&league, |_| RoundAdvancement {
            champion: 1.0 / n as f64,
            ..RoundAdvancement::default()
        });
        let outputs = fitted.blend(&league, &aggregate);
        let strongest = outputs.iter().find(|o| o.strength_rank == 1).unwrap();
        let weakest = outputs.iter().find(|o| o.strength_rank == n).unwrap();
        assert!(strongest.playoff_probability > 0.5, "{}", strongest.playoff_probability);
        assert!(strongest.playoff_probability > weakest.playoff_probability);
        // Gate follows the classifier, so the strongest team outranks the weakest
        assert!(strongest.championship_probability > weakest.championship_probability);

        // Without the classifier the simulated zero comes through
        let untrained = combiner(EnsembleConfig::default()).blend(&league, &aggregate);
        assert!(untrained.iter().all(|o| o.playoff_probability == 0.0));
    }

    #[test]
    fn test_playoff_classifier_orders_by_strength() {
        let seasons = history(6);
        let classifier = PlayoffClassifier::fit(&seasons, &TrainingConfig::default()).unwrap();
        let teams = league_teams();
        let p = classifier.predict_proba(&teams).unwrap();
        assert_eq!(p.len(), teams.len());
        let strongest = (0..teams.len()).max_by(|&a, &b| teams[a].strength.total_cmp(&teams[b].strength)).unwrap();
        let weakest = (0..teams.len()).min_by(|&a, &b| teams[a].strength.total_cmp(&teams[b].strength)).unwrap();
        assert!(p[strongest] > p[weakest]);

        let mut no_playoffs = seasons;
        for s in no_playoffs.iter_mut() {
            s.made_playoffs = false;
        }
        assert_eq!(
            PlayoffClassifier::fit(&no_playoffs, &TrainingConfig::default()).unwrap_err(),
            TrainingError::SingleClass
        );
    }
}
