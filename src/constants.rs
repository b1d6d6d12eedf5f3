/// Slope of the logistic curve mapping strength difference to series win probability
pub const LOGISTIC_SLOPE: f64 = 0.03;

/// Weight of the logistic estimate when blending toward the round base rate
pub const LOGISTIC_BLEND: f64 = 0.7;

/// Favorite series win rate by round (first round, second round, conference final, final)
pub const ROUND_BASE_RATES: [f64; 4] = [0.59, 0.53, 0.50, 0.53];

/// Per-game probability boost for the favorite at home
pub const HOME_GAME_BOOST: f64 = 0.04;

/// Per-game probability penalty for the favorite on the road
pub const AWAY_GAME_PENALTY: f64 = 0.02;

/// Games hosted by the favorite (games 1, 2, 5 and 7)
pub const FAVORITE_HOME_GAMES: [bool; 7] = [true, true, false, false, true, false, true];

/// Bounds applied to each game's win probability
pub const GAME_PROB_BOUNDS: (f64, f64) = (0.15, 0.85);

/// Bounds applied to the trained series model's output
pub const TRAINED_SERIES_BOUNDS: (f64, f64) = (0.25, 0.75);

/// Wins needed to take a series
pub const WINS_TO_CLINCH: u8 = 4;

/// Maximum games in a series
pub const MAX_SERIES_GAMES: usize = 7;

/// Cumulative distribution of the loser's wins (0..=3) in a best-of-seven played at even odds
pub const EVEN_SERIES_LOSER_WINS_CDF: [f64; 4] = [0.125, 0.375, 0.6875, 1.0];

/// Playoff teams per conference
pub const PLAYOFF_TEAMS_PER_CONFERENCE: usize = 8;

/// Direct qualifiers per division
pub const DIVISION_QUALIFIERS: usize = 3;

/// Wildcard entrants per conference
pub const WILDCARDS_PER_CONFERENCE: usize = 2;

/// Default regular season length in games
pub const SEASON_GAMES: u32 = 82;

/// League average points per game, used when a team has not played yet
pub const LEAGUE_AVERAGE_PACE: f64 = 1.1;

/// Default ensemble weights (tree ensemble, neural network, Monte Carlo)
pub const ENSEMBLE_WEIGHTS: [f64; 3] = [0.30, 0.30, 0.40];

/// Ensemble weights when the neural estimator is disabled (tree ensemble, Monte Carlo)
pub const ENSEMBLE_WEIGHTS_WITHOUT_NEURAL: [f64; 2] = [0.40, 0.60];

/// Added to the playoff probability before gating championship estimates
pub const PLAYOFF_GATE_MARGIN: f64 = 0.1;

/// Pseudo sample size behind the Beta confidence interval
pub const INTERVAL_SAMPLES: f64 = 10_000.0;

/// Coverage of the championship confidence interval
pub const INTERVAL_CONFIDENCE: f64 = 0.90;

/// Teams per tier, best first; the last tier takes everyone left
pub const TIER_SIZES: [usize; 3] = [4, 8, 8];

/// Get the favorite's base series win rate for a round (1-4)
/// Share of a trained series probability pulled toward 0.5, by round
pub const ROUND_PARITY: [f64; 4] = [0.0, 0.05, 0.10, 0.08];

/// Parity share for `round`; rounds outside 1-4 get none.
pub fn round_parity(round: u8) -> f64 {
    match round {
        1..=4 => ROUND_PARITY[usize::from(round) - 1],
        _ => 0.0,
    }
}

pub fn round_base_rate(round: u8) -> f64 {
    match round {
        1..=4 => ROUND_BASE_RATES[usize::from(round) - 1],
        _ => 0.55,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_base_rates() {
        assert_eq!(round_base_rate(1), 0.59);
        assert_eq!(round_base_rate(3), 0.50);
        assert_eq!(round_base_rate(4), 0.53);
        assert_eq!(round_base_rate(9), 0.55);
    }

    #[test]
    fn test_loser_wins_cdf_is_complete() {
        assert!((EVEN_SERIES_LOSER_WINS_CDF[3] - 1.0).abs() < 1e-12);
        assert!(EVEN_SERIES_LOSER_WINS_CDF.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ensemble_weights_sum_to_one() {
        assert!((ENSEMBLE_WEIGHTS.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((ENSEMBLE_WEIGHTS_WITHOUT_NEURAL.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
