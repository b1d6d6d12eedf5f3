use tracing::debug;

use crate::constants::{round_base_rate, LOGISTIC_BLEND, LOGISTIC_SLOPE};
use crate::error::EstimatorError;
use crate::team::TeamCompetitive;

/// Matchup facts that are not part of either team's record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesContext {
    /// Playoff round, 1 (first round) through 4 (championship final)
    pub round: u8,
    /// Conference seed (1-8) of the favorite
    pub favorite_seed: u8,
    /// Conference seed (1-8) of the underdog
    pub underdog_seed: u8,
}

impl SeriesContext {
    pub fn new(round: u8, favorite_seed: u8, underdog_seed: u8) -> Self {
        SeriesContext {
            round,
            favorite_seed,
            underdog_seed,
        }
    }

    pub fn seed_gap(&self) -> f64 {
        f64::from(self.favorite_seed.abs_diff(self.underdog_seed))
    }
}

/// The favorite's chance of winning a series, and how the series is decided.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SeriesEstimate {
    /// Series probability realised by playing up to seven games with home ice
    GameByGame(f64),
    /// Series probability decided by a single draw
    SingleDraw(f64),
}

impl SeriesEstimate {
    pub fn probability(&self) -> f64 {
        match *self {
            SeriesEstimate::GameByGame(p) | SeriesEstimate::SingleDraw(p) => p,
        }
    }
}

/// Source of series win probabilities.
///
/// Implementations must be shareable across simulation threads.
pub trait SeriesProbability: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Probability that `favorite` beats `underdog`.
    fn win_probability(
        &self,
        favorite: &TeamCompetitive,
        underdog: &TeamCompetitive,
        context: &SeriesContext,
    ) -> Result<SeriesEstimate, EstimatorError>;
}

/// Closed-form series probability for a favorite `strength_diff` points stronger.
///
/// A logistic curve on the strength gap, blended toward the round's historical
/// favorite win rate. Later rounds carry more parity.
pub fn closed_form_probability(strength_diff: f64, round: u8) -> f64 {
    let logistic = 1.0 / (1.0 + (-LOGISTIC_SLOPE * strength_diff).exp());
    logistic * LOGISTIC_BLEND + round_base_rate(round) * (1.0 - LOGISTIC_BLEND)
}

/// Default series model: [`closed_form_probability`] played out game by game.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClosedFormModel;

impl ClosedFormModel {
    pub fn estimate(
        &self,
        favorite: &TeamCompetitive,
        underdog: &TeamCompetitive,
        context: &SeriesContext,
    ) -> SeriesEstimate {
        let diff = favorite.strength - underdog.strength;
        SeriesEstimate::GameByGame(closed_form_probability(diff, context.round))
    }
}

impl SeriesProbability for ClosedFormModel {
    fn name(&self) -> &'static str {
        "closed_form"
    }

    fn win_probability(
        &self,
        favorite: &TeamCompetitive,
        underdog: &TeamCompetitive,
        context: &SeriesContext,
    ) -> Result<SeriesEstimate, EstimatorError> {
        Ok(self.estimate(favorite, underdog, context))
    }
}

/// Ordered series models tried until one answers, ending in the closed form.
///
/// A trained model goes in front of the closed form; when it fails for a
/// matchup the next strategy in line is used and the failure is logged.
#[derive(Default)]
pub struct SeriesModelChain {
    strategies: Vec<Box<dyn SeriesProbability>>,
    fallback: ClosedFormModel,
}

impl SeriesModelChain {
    /// Chain with only the closed-form model.
    pub fn closed_form() -> Self {
        SeriesModelChain::default()
    }

    /// Chain that prefers `model` and falls back to the closed form.
    pub fn with_model(model: Box<dyn SeriesProbability>) -> Self {
        Self::with_models(vec![model])
    }

    /// Strategies tried in the given order, then the closed form.
    pub fn with_models(strategies: Vec<Box<dyn SeriesProbability>>) -> Self {
        SeriesModelChain {
            strategies,
            fallback: ClosedFormModel,
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// Ask each strategy in order; never fails.
    pub fn estimate(
        &self,
        favorite: &TeamCompetitive,
        underdog: &TeamCompetitive,
        context: &SeriesContext,
    ) -> SeriesEstimate {
        for strategy in &self.strategies {
            match strategy.win_probability(favorite, underdog, context) {
                Ok(estimate) if valid_probability(estimate.probability()) => return estimate,
                Ok(estimate) => debug!(
                    strategy = strategy.name(),
                    probability = estimate.probability(),
                    "series model returned an invalid probability, trying next"
                ),
                Err(err) => debug!(
                    strategy = strategy.name(),
                    error = %err,
                    "series model failed, trying next"
                ),
            }
        }
        self.fallback.estimate(favorite, underdog, context)
    }
}

impl SeriesProbability for SeriesModelChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn win_probability(
        &self,
        favorite: &TeamCompetitive,
        underdog: &TeamCompetitive,
        context: &SeriesContext,
    ) -> Result<SeriesEstimate, EstimatorError> {
        Ok(self.estimate(favorite, underdog, context))
    }
}

fn valid_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: &str, strength: f64) -> TeamCompetitive {
        TeamCompetitive::new(id, "East", "Atlantic", 80.0, 70, strength, 0.0)
    }

    struct Broken;

    impl SeriesProbability for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn win_probability(
            &self,
            _: &TeamCompetitive,
            _: &TeamCompetitive,
            _: &SeriesContext,
        ) -> Result<SeriesEstimate, EstimatorError> {
            Err(EstimatorError::NotTrained("broken"))
        }
    }

    struct Fixed(f64);

    impl SeriesProbability for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn win_probability(
            &self,
            _: &TeamCompetitive,
            _: &TeamCompetitive,
            _: &SeriesContext,
        ) -> Result<SeriesEstimate, EstimatorError> {
            Ok(SeriesEstimate::SingleDraw(self.0))
        }
    }

    #[test]
    fn test_closed_form_scenario() {
        // 60 vs 40 in round 1: logistic 0.6457 blended with 0.59
        let p = closed_form_probability(20.0, 1);
        assert!((p - 0.62896).abs() < 1e-4, "got {}", p);
    }

    #[test]
    fn test_equal_teams_take_round_parity() {
        for round in 1..=4 {
            let expected = 0.5 * 0.7 + round_base_rate(round) * 0.3;
            assert!((closed_form_probability(0.0, round) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_later_rounds_have_more_parity() {
        let r1 = closed_form_probability(15.0, 1);
        let r3 = closed_form_probability(15.0, 3);
        assert!(r1 > r3);
    }

    #[test]
    fn test_probability_bounds() {
        for diff in [-500.0, -10.0, 0.0, 10.0, 500.0] {
            let p = closed_form_probability(diff, 2);
            assert!(p > 0.0 && p < 1.0);
        }
    }

    #[test]
    fn test_chain_falls_back_to_closed_form() {
        let chain = SeriesModelChain::with_model(Box::new(Broken));
        let ctx = SeriesContext::new(1, 1, 8);
        let estimate = chain.estimate(&team("A", 60.0), &team("B", 40.0), &ctx);
        assert_eq!(estimate, SeriesEstimate::GameByGame(closed_form_probability(20.0, 1)));
    }

    #[test]
    fn test_chain_prefers_trained_model() {
        let chain = SeriesModelChain::with_models(vec![Box::new(Broken), Box::new(Fixed(0.7))]);
        let ctx = SeriesContext::new(2, 1, 4);
        let estimate = chain.estimate(&team("A", 60.0), &team("B", 40.0), &ctx);
        assert_eq!(estimate, SeriesEstimate::SingleDraw(0.7));
        assert_eq!(chain.strategy_names(), vec!["broken", "fixed", "closed_form"]);
    }

    #[test]
    fn test_chain_rejects_invalid_probability() {
        let chain = SeriesModelChain::with_model(Box::new(Fixed(f64::NAN)));
        let ctx = SeriesContext::new(3, 2, 3);
        let estimate = chain.estimate(&team("A", 55.0), &team("B", 50.0), &ctx);
        assert!(matches!(estimate, SeriesEstimate::GameByGame(_)));
    }

    #[test]
    fn test_seed_gap() {
        assert_eq!(SeriesContext::new(1, 2, 7).seed_gap(), 5.0);
        assert_eq!(SeriesContext::new(1, 7, 2).seed_gap(), 5.0);
    }
}
