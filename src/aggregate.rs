//! Final probabilities of a Monte Carlo run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::config::SimulationConfig;
use crate::matchup::{MatchupKey, MatchupTally};
use crate::monte_carlo::{MatchupCounts, TrialTally};
use crate::team::{League, TeamIndex};

/// Probability of reaching each stage.
///
/// `round1` is playoff qualification and `round4` an appearance in the
/// championship final.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundAdvancement {
    pub round1: f64,
    pub round2: f64,
    pub round3: f64,
    pub round4: f64,
    pub champion: f64,
}

impl RoundAdvancement {
    fn from_counts(counts: &[u32; 5], trials: f64) -> Self {
        let p = |i: usize| f64::from(counts[i]) / trials;
        RoundAdvancement {
            round1: p(0),
            round2: p(1),
            round3: p(2),
            round4: p(3),
            champion: p(4),
        }
    }
}

/// How often two teams met in a round and how the meetings went.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchupProbability {
    pub team1: String,
    pub team2: String,
    /// Share of trials in which the pairing happened
    pub frequency: f64,
    /// Share of those meetings won by `team1`
    pub team1_win_probability: f64,
}

/// A first-round pairing in the most likely bracket, likelier winner first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedMatchup {
    pub favorite: String,
    pub underdog: String,
    pub frequency: f64,
    pub favorite_win_probability: f64,
}

/// Matchup tables for one conference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConferenceMatchups {
    pub conference: String,
    /// Each team appears at most once
    pub projected_bracket: Vec<ProjectedMatchup>,
    pub round1: Vec<MatchupProbability>,
    pub round2: Vec<MatchupProbability>,
    pub conference_final: Vec<MatchupProbability>,
}

/// Probabilities from every trial, keyed by team id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub advancement: BTreeMap<String, RoundAdvancement>,
    pub conferences: Vec<ConferenceMatchups>,
    pub final_matchups: Vec<MatchupProbability>,
}

impl AggregateResult {
    /// Convert summed trial counts into probabilities and filtered matchup tables.
    pub(crate) fn from_tally(
        league: &League,
        tally: &TrialTally,
        trials: usize,
        config: &SimulationConfig,
    ) -> Self {
        let n = trials.max(1) as f64;

        let advancement = tally
            .rounds
            .iter()
            .enumerate()
            .map(|(idx, counts)| (league.id(idx).to_string(), RoundAdvancement::from_counts(counts, n)))
            .collect();

        let conferences = league
            .conferences()
            .iter()
            .enumerate()
            .map(|(c, conference)| ConferenceMatchups {
                conference: conference.name().to_string(),
                projected_bracket: projected_bracket(
                    league,
                    &tally.round1[c],
                    n,
                    config.projected_matchup_threshold,
                ),
                round1: matchup_table(league, &tally.round1[c], n, config.deep_round_threshold),
                round2: matchup_table(league, &tally.round2[c], n, config.deep_round_threshold),
                conference_final: matchup_table(
                    league,
                    &tally.conference_final[c],
                    n,
                    config.deep_round_threshold,
                ),
            })
            .collect();

        AggregateResult {
            advancement,
            conferences,
            final_matchups: matchup_table(league, &tally.finals, n, config.final_matchup_threshold),
        }
    }

    pub fn team(&self, id: &str) -> Option<&RoundAdvancement> {
        self.advancement.get(id)
    }

    /// Championship probability for every team, by id.
    pub fn championship(&self) -> BTreeMap<&str, f64> {
        self.advancement
            .iter()
            .map(|(id, adv)| (id.as_str(), adv.champion))
            .collect()
    }

    pub fn championship_probability(&self, id: &str) -> f64 {
        self.advancement.get(id).map_or(0.0, |a| a.champion)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Pairings at or above `threshold`, most frequent first.
fn sorted_pairings(
    counts: &MatchupCounts,
    trials: f64,
    threshold: f64,
) -> Vec<(MatchupKey, MatchupTally, f64)> {
    let mut rows: Vec<_> = counts
        .iter()
        .map(|(key, tally)| (*key, *tally, f64::from(tally.occurrences) / trials))
        .filter(|(_, _, freq)| *freq >= threshold)
        .collect();
    // Keys are unique, so ties on count fall back to key order
    rows.sort_by(|a, b| b.1.occurrences.cmp(&a.1.occurrences).then(a.0.cmp(&b.0)));
    rows
}

fn matchup_table(
    league: &League,
    counts: &MatchupCounts,
    trials: f64,
    threshold: f64,
) -> Vec<MatchupProbability> {
    sorted_pairings(counts, trials, threshold)
        .into_iter()
        .map(|(key, tally, frequency)| MatchupProbability {
            team1: league.id(key.first()).to_string(),
            team2: league.id(key.second()).to_string(),
            frequency,
            team1_win_probability: tally.first_win_rate(),
        })
        .collect()
}

/// Most likely first-round bracket: frequent pairings taken greedily so no
/// team is listed twice.
fn projected_bracket(
    league: &League,
    counts: &MatchupCounts,
    trials: f64,
    threshold: f64,
) -> Vec<ProjectedMatchup> {
    let mut used: HashSet<TeamIndex> = HashSet::new();
    let mut bracket = Vec::new();

    for (key, tally, frequency) in sorted_pairings(counts, trials, threshold) {
        if used.contains(&key.first()) || used.contains(&key.second()) {
            continue;
        }
        used.insert(key.first());
        used.insert(key.second());

        let (favorite, underdog) = if tally.first_win_rate() >= 0.5 {
            (key.first(), key.second())
        } else {
            (key.second(), key.first())
        };
        bracket.push(ProjectedMatchup {
            favorite: league.id(favorite).to_string(),
            underdog: league.id(underdog).to_string(),
            frequency,
            favorite_win_probability: tally.win_rate_for(&key, favorite),
        });
    }
    bracket
}
