use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{
    AWAY_GAME_PENALTY, EVEN_SERIES_LOSER_WINS_CDF, FAVORITE_HOME_GAMES, GAME_PROB_BOUNDS,
    HOME_GAME_BOOST, MAX_SERIES_GAMES, WINS_TO_CLINCH,
};
use crate::team::{League, TeamCompetitive, TeamIndex};
use crate::win_prob::{closed_form_probability, SeriesContext, SeriesEstimate, SeriesModelChain};

/// A team entering a series.
#[derive(Clone, Copy, Debug)]
pub struct Entrant<'a> {
    pub index: TeamIndex,
    pub team: &'a TeamCompetitive,
    /// Conference seed, 1-8
    pub seed: u8,
}

/// Result of one best-of-seven series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOutcome {
    pub favorite: TeamIndex,
    pub underdog: TeamIndex,
    pub winner: TeamIndex,
    pub favorite_wins: u8,
    pub underdog_wins: u8,
}

impl SeriesOutcome {
    pub fn loser(&self) -> TeamIndex {
        if self.winner == self.favorite {
            self.underdog
        } else {
            self.favorite
        }
    }

    pub fn games(&self) -> u8 {
        self.favorite_wins + self.underdog_wins
    }

    pub fn winner_wins(&self) -> u8 {
        self.favorite_wins.max(self.underdog_wins)
    }

    pub fn loser_wins(&self) -> u8 {
        self.favorite_wins.min(self.underdog_wins)
    }

    /// Winner has exactly four wins, loser at most three.
    pub fn is_valid(&self) -> bool {
        let winner_wins = if self.winner == self.favorite {
            self.favorite_wins
        } else {
            self.underdog_wins
        };
        let loser_wins = self.games() - winner_wins;
        (self.winner == self.favorite || self.winner == self.underdog)
            && winner_wins == WINS_TO_CLINCH
            && loser_wins < WINS_TO_CLINCH
            && (4..=7).contains(&self.games())
    }
}

/// Per-game base rates solved once for the closed-form probability of every
/// pairing in a league, keyed by the series probability's bits.
#[derive(Clone, Debug, Default)]
pub struct GameRates {
    rates: HashMap<u64, f64>,
}

impl GameRates {
    pub fn for_league(league: &League) -> Self {
        let teams = league.teams();
        let mut rates = HashMap::new();
        for (i, a) in teams.iter().enumerate() {
            for b in &teams[i + 1..] {
                let diff = (a.strength - b.strength).abs();
                for round in 1..=4 {
                    let target = closed_form_probability(diff, round);
                    rates
                        .entry(target.to_bits())
                        .or_insert_with(|| per_game_rate(target));
                }
            }
        }
        GameRates { rates }
    }

    pub(crate) fn len(&self) -> usize {
        self.rates.len()
    }

    /// Stored rate for `target`, solved on the spot when it was not precomputed.
    pub fn rate(&self, target: f64) -> f64 {
        match self.rates.get(&target.to_bits()) {
            Some(&rate) => rate,
            None => per_game_rate(target),
        }
    }
}

/// Plays single series with a series probability model.
#[derive(Clone, Copy)]
pub struct SeriesSimulator<'m> {
    model: &'m SeriesModelChain,
    rates: Option<&'m GameRates>,
}

impl<'m> SeriesSimulator<'m> {
    pub fn new(model: &'m SeriesModelChain) -> Self {
        SeriesSimulator { model, rates: None }
    }

    /// Look up per-game rates in `rates` instead of solving for each series.
    pub fn with_rates(mut self, rates: &'m GameRates) -> Self {
        self.rates = Some(rates);
        self
    }

    /// Simulate a series in `round` between two entrants.
    ///
    /// The stronger team is the favorite and hosts games 1, 2, 5 and 7.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        a: Entrant<'_>,
        b: Entrant<'_>,
        round: u8,
        rng: &mut R,
    ) -> SeriesOutcome {
        let (favorite, underdog) = order_favorite(a, b);
        let context = SeriesContext::new(round, favorite.seed, underdog.seed);

        let (favorite_wins, underdog_wins) =
            match self.model.estimate(favorite.team, underdog.team, &context) {
                SeriesEstimate::GameByGame(p) => play_games(self.base_rate(p), rng),
                SeriesEstimate::SingleDraw(p) => single_draw(p, rng),
            };

        let winner = if favorite_wins == WINS_TO_CLINCH {
            favorite.index
        } else {
            underdog.index
        };

        SeriesOutcome {
            favorite: favorite.index,
            underdog: underdog.index,
            winner,
            favorite_wins,
            underdog_wins,
        }
    }
}

impl SeriesSimulator<'_> {
    fn base_rate(&self, target: f64) -> f64 {
        match self.rates {
            Some(rates) => rates.rate(target),
            None => per_game_rate(target),
        }
    }
}

/// Favorite by strength, then better seed, then team index.
fn order_favorite<'a>(a: Entrant<'a>, b: Entrant<'a>) -> (Entrant<'a>, Entrant<'a>) {
    let a_first = b
        .team
        .strength
        .total_cmp(&a.team.strength)
        .then(a.seed.cmp(&b.seed))
        .then(a.index.cmp(&b.index))
        .is_le();
    if a_first {
        (a, b)
    } else {
        (b, a)
    }
}

/// Favorite's win probability in game `game` (0-based) given its base rate.
pub fn game_probability(base: f64, game: usize) -> f64 {
    let adjusted = if FAVORITE_HOME_GAMES[game] {
        base + HOME_GAME_BOOST
    } else {
        base - AWAY_GAME_PENALTY
    };
    adjusted.clamp(GAME_PROB_BOUNDS.0, GAME_PROB_BOUNDS.1)
}

/// Probability the favorite wins a series when its per-game base rate is `base`.
pub fn series_win_probability(base: f64) -> f64 {
    let clinch = usize::from(WINS_TO_CLINCH);
    // reach[f][u]: probability of standing at f favorite wins, u underdog wins
    let mut reach = [[0.0f64; 4]; 4];
    reach[0][0] = 1.0;
    let mut win = 0.0;

    for game in 0..MAX_SERIES_GAMES {
        let p = game_probability(base, game);
        for f in 0..clinch {
            let Some(u) = game.checked_sub(f) else { break };
            if u >= clinch {
                continue;
            }
            let r = reach[f][u];
            if r == 0.0 {
                continue;
            }
            if f + 1 == clinch {
                win += r * p;
            } else {
                reach[f + 1][u] += r * p;
            }
            if u + 1 < clinch {
                reach[f][u + 1] += r * (1.0 - p);
            }
        }
    }
    win
}

/// Per-game base rate at which the favorite wins the series with probability `target`.
///
/// Home-ice adjustments and per-game clipping are included, so playing the
/// games at this rate realises `target` as the series win rate.
pub fn per_game_rate(target: f64) -> f64 {
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    for _ in 0..48 {
        let mid = 0.5 * (lo + hi);
        if series_win_probability(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

fn play_games<R: Rng + ?Sized>(base: f64, rng: &mut R) -> (u8, u8) {
    let (mut favorite_wins, mut underdog_wins) = (0u8, 0u8);
    let mut game = 0;
    while favorite_wins < WINS_TO_CLINCH && underdog_wins < WINS_TO_CLINCH {
        if rng.gen::<f64>() < game_probability(base, game) {
            favorite_wins += 1;
        } else {
            underdog_wins += 1;
        }
        game += 1;
    }
    (favorite_wins, underdog_wins)
}

/// One draw picks the winner; the loser's wins follow an even-odds series length.
fn single_draw<R: Rng + ?Sized>(p: f64, rng: &mut R) -> (u8, u8) {
    let favorite_won = rng.gen::<f64>() < p;
    let u = rng.gen::<f64>();
    let loser_wins = EVEN_SERIES_LOSER_WINS_CDF
        .iter()
        .position(|&c| u < c)
        .unwrap_or(EVEN_SERIES_LOSER_WINS_CDF.len() - 1) as u8;
    if favorite_won {
        (WINS_TO_CLINCH, loser_wins)
    } else {
        (loser_wins, WINS_TO_CLINCH)
    }
}
