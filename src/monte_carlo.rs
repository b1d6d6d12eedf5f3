//! Repeated full-playoff simulation under noisy season-end projections.
//!
//! Each trial draws from its own ChaCha stream `(seed, trial)` and counts into a
//! trial-local [`TrialTally`]. Tallies are summed with rayon's fold/reduce, so a
//! run gives the same integers whether trials ran in parallel or not.

use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use statrs::distribution::Normal;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::aggregate::AggregateResult;
use crate::bracket::{BracketSimulator, TournamentTrace};
use crate::config::SimulationConfig;
use crate::error::{ConfigError, SimulationError};
use crate::matchup::{MatchupKey, MatchupTally};
use crate::seeding::{Bracket, SeedingEngine};
use crate::series::{GameRates, SeriesOutcome, SeriesSimulator};
use crate::team::{League, TeamCompetitive};
use crate::win_prob::{SeriesModelChain, SeriesProbability};

pub(crate) type MatchupCounts = BTreeMap<MatchupKey, MatchupTally>;

/// Integer counters for a batch of trials.
///
/// `rounds[team]` counts playoff berths, second-round, conference-final and
/// final appearances, then titles.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TrialTally {
    pub rounds: Vec<[u32; 5]>,
    pub round1: [MatchupCounts; 2],
    pub round2: [MatchupCounts; 2],
    pub conference_final: [MatchupCounts; 2],
    pub finals: MatchupCounts,
}

impl TrialTally {
    pub fn new(teams: usize) -> Self {
        TrialTally {
            rounds: vec![[0; 5]; teams],
            ..TrialTally::default()
        }
    }

    pub fn record(&mut self, trace: &TournamentTrace) {
        for (c, conference) in trace.conferences.iter().enumerate() {
            for team in conference.bracket.teams() {
                self.rounds[team][0] += 1;
            }
            for series in &conference.round1 {
                count_series(&mut self.round1[c], series);
                self.rounds[series.winner][1] += 1;
            }
            for series in &conference.round2 {
                count_series(&mut self.round2[c], series);
                self.rounds[series.winner][2] += 1;
            }
            count_series(&mut self.conference_final[c], &conference.conference_final);
            self.rounds[conference.champion()][3] += 1;
        }
        count_series(&mut self.finals, &trace.final_series);
        self.rounds[trace.champion()][4] += 1;
    }

    pub fn merge(mut self, other: TrialTally) -> TrialTally {
        for (mine, theirs) in self.rounds.iter_mut().zip(&other.rounds) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += b;
            }
        }
        for c in 0..2 {
            merge_counts(&mut self.round1[c], &other.round1[c]);
            merge_counts(&mut self.round2[c], &other.round2[c]);
            merge_counts(&mut self.conference_final[c], &other.conference_final[c]);
        }
        merge_counts(&mut self.finals, &other.finals);
        self
    }
}

fn count_series(counts: &mut MatchupCounts, series: &SeriesOutcome) {
    let key = MatchupKey::new(series.favorite, series.underdog);
    counts.entry(key).or_default().record(&key, series.winner);
}

fn merge_counts(into: &mut MatchupCounts, from: &MatchupCounts) {
    for (key, tally) in from {
        into.entry(*key).or_default().merge(tally);
    }
}

/// Season-end projection and its noise scale for one team.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Projection {
    points: f64,
    sigma: f64,
}

pub struct MonteCarloEngine {
    config: SimulationConfig,
    series_model: SeriesModelChain,
    seeding: SeedingEngine,
    noise: Normal,
}

impl MonteCarloEngine {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let noise =
            Normal::new(0.0, 1.0).map_err(|err| ConfigError::Distribution(err.to_string()))?;
        Ok(MonteCarloEngine {
            config,
            series_model: SeriesModelChain::closed_form(),
            seeding: SeedingEngine::default(),
            noise,
        })
    }

    /// Prefer `model` for series probabilities, falling back to the closed form.
    pub fn with_series_model(mut self, model: Box<dyn SeriesProbability>) -> Self {
        self.set_series_model(model);
        self
    }

    pub fn set_series_model(&mut self, model: Box<dyn SeriesProbability>) {
        self.series_model = SeriesModelChain::with_model(model);
    }

    pub fn with_seeding(mut self, seeding: SeedingEngine) -> Self {
        self.seeding = seeding;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn series_model(&self) -> &SeriesModelChain {
        &self.series_model
    }

    /// Simulate the playoffs for `teams`.
    ///
    /// Entries in `strength_scores` and `experience_scores` replace the
    /// records' own scores; teams without an entry keep theirs.
    pub fn simulate(
        &self,
        teams: &[TeamCompetitive],
        strength_scores: &HashMap<String, f64>,
        experience_scores: Option<&HashMap<String, f64>>,
    ) -> Result<AggregateResult, SimulationError> {
        let teams: Vec<TeamCompetitive> = teams
            .iter()
            .cloned()
            .map(|mut team| {
                if let Some(&strength) = strength_scores.get(&team.id) {
                    team.strength = strength;
                }
                if let Some(&experience) = experience_scores.and_then(|e| e.get(&team.id)) {
                    team.experience = experience;
                }
                team
            })
            .collect();
        let league = League::new(teams)?;
        Ok(self.simulate_league(&league))
    }

    /// Simulate the playoffs for an already validated league.
    pub fn simulate_league(&self, league: &League) -> AggregateResult {
        let trials = self.config.trials;
        info!(
            trials,
            seed = self.config.seed,
            teams = league.len(),
            parallel = self.config.parallel,
            series_models = ?self.series_model.strategy_names(),
            "starting playoff simulation"
        );

        let projections: Vec<Projection> = league
            .teams()
            .iter()
            .map(|team| Projection {
                points: team.projected_points(self.config.season_games),
                sigma: self.config.noise_scale
                    * f64::from(team.remaining_games(self.config.season_games)).sqrt(),
            })
            .collect();

        let expected: Vec<f64> = projections.iter().map(|p| p.points).collect();
        for conference in league.conferences() {
            let strategy = self.seeding.select_strategy(league, conference, &expected);
            debug!(conference = conference.name(), strategy = ?strategy, "projected seeding");
        }

        let rates = GameRates::for_league(league);
        debug!(rates = rates.len(), "solved per-game rates");
        let bracket_sim =
            BracketSimulator::new(SeriesSimulator::new(&self.series_model).with_rates(&rates));
        let play = |mut tally: TrialTally, trial: usize| {
            let trace = self.run_trial(league, &projections, &bracket_sim, trial);
            tally.record(&trace);
            tally
        };

        let tally = if self.config.parallel {
            (0..trials)
                .into_par_iter()
                .fold(|| TrialTally::new(league.len()), play)
                .reduce(|| TrialTally::new(league.len()), TrialTally::merge)
        } else {
            (0..trials).fold(TrialTally::new(league.len()), play)
        };

        info!(trials, "playoff simulation complete");
        AggregateResult::from_tally(league, &tally, trials, &self.config)
    }

    fn run_trial(
        &self,
        league: &League,
        projections: &[Projection],
        bracket_sim: &BracketSimulator<'_>,
        trial: usize,
    ) -> TournamentTrace {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(trial as u64);

        let points: Vec<f64> = projections
            .iter()
            .map(|p| {
                if p.sigma > 0.0 {
                    p.points + p.sigma * self.noise.sample(&mut rng)
                } else {
                    p.points
                }
            })
            .collect();

        let conferences = league.conferences();
        let brackets: [Bracket; 2] = [
            self.seeding.seed(league, &conferences[0], &points),
            self.seeding.seed(league, &conferences[1], &points),
        ];
        bracket_sim.simulate_tournament(league, &brackets, &mut rng)
    }
}
