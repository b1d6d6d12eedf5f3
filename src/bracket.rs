use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::PLAYOFF_TEAMS_PER_CONFERENCE;
use crate::seeding::Bracket;
use crate::series::{Entrant, SeriesOutcome, SeriesSimulator};
use crate::team::{League, TeamIndex};

/// Every series one conference played in a single trial.
///
/// `round1[0..2]` and `round2[0]` belong to sub-bracket A, `round1[2..4]` and
/// `round2[1]` to sub-bracket B.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceTrace {
    pub bracket: Bracket,
    pub round1: [SeriesOutcome; 4],
    pub round2: [SeriesOutcome; 2],
    pub conference_final: SeriesOutcome,
}

impl ConferenceTrace {
    pub fn round1_matchups(&self) -> [(TeamIndex, TeamIndex); 4] {
        self.round1.map(|s| (s.favorite, s.underdog))
    }

    pub fn round1_winners(&self) -> [TeamIndex; 4] {
        self.round1.map(|s| s.winner)
    }

    pub fn round2_matchups(&self) -> [(TeamIndex, TeamIndex); 2] {
        self.round2.map(|s| (s.favorite, s.underdog))
    }

    pub fn round2_winners(&self) -> [TeamIndex; 2] {
        self.round2.map(|s| s.winner)
    }

    pub fn conference_final_matchup(&self) -> (TeamIndex, TeamIndex) {
        (self.conference_final.favorite, self.conference_final.underdog)
    }

    pub fn champion(&self) -> TeamIndex {
        self.conference_final.winner
    }

    /// Round-ordered list of every series in the trace.
    pub fn series(&self) -> impl Iterator<Item = (u8, &SeriesOutcome)> {
        self.round1
            .iter()
            .map(|s| (1, s))
            .chain(self.round2.iter().map(|s| (2, s)))
            .chain(std::iter::once((3, &self.conference_final)))
    }
}

/// A full playoff: both conference traces and the championship final.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentTrace {
    pub conferences: [ConferenceTrace; 2],
    pub final_series: SeriesOutcome,
}

impl TournamentTrace {
    pub fn champion(&self) -> TeamIndex {
        self.final_series.winner
    }
}

/// Walks seeded brackets through every round.
pub struct BracketSimulator<'m> {
    series: SeriesSimulator<'m>,
}

impl<'m> BracketSimulator<'m> {
    pub fn new(series: SeriesSimulator<'m>) -> Self {
        BracketSimulator { series }
    }

    /// Play rounds 1 to 3 of one conference.
    ///
    /// Round 2 keeps each sub-bracket apart, so the two sides only meet in the
    /// conference final.
    pub fn simulate_conference<R: Rng + ?Sized>(
        &self,
        league: &League,
        bracket: &Bracket,
        rng: &mut R,
    ) -> ConferenceTrace {
        let entrant = |index: TeamIndex| Entrant {
            index,
            team: league.team(index),
            seed: bracket
                .seed_of(index)
                .unwrap_or(PLAYOFF_TEAMS_PER_CONFERENCE as u8),
        };

        let round1 = bracket
            .matchups
            .map(|m| self.series.simulate(entrant(m.higher), entrant(m.lower), 1, rng));

        let round2 = [
            self.series
                .simulate(entrant(round1[0].winner), entrant(round1[1].winner), 2, rng),
            self.series
                .simulate(entrant(round1[2].winner), entrant(round1[3].winner), 2, rng),
        ];

        let conference_final =
            self.series
                .simulate(entrant(round2[0].winner), entrant(round2[1].winner), 3, rng);

        ConferenceTrace {
            bracket: *bracket,
            round1,
            round2,
            conference_final,
        }
    }

    /// Championship final between two conference champions.
    pub fn simulate_final<R: Rng + ?Sized>(
        &self,
        league: &League,
        first: &ConferenceTrace,
        second: &ConferenceTrace,
        rng: &mut R,
    ) -> SeriesOutcome {
        let entrant = |trace: &ConferenceTrace| {
            let index = trace.champion();
            Entrant {
                index,
                team: league.team(index),
                seed: trace
                    .bracket
                    .seed_of(index)
                    .unwrap_or(PLAYOFF_TEAMS_PER_CONFERENCE as u8),
            }
        };
        self.series.simulate(entrant(first), entrant(second), 4, rng)
    }

    /// Both conferences followed by the final.
    pub fn simulate_tournament<R: Rng + ?Sized>(
        &self,
        league: &League,
        brackets: &[Bracket; 2],
        rng: &mut R,
    ) -> TournamentTrace {
        let first = self.simulate_conference(league, &brackets[0], rng);
        let second = self.simulate_conference(league, &brackets[1], rng);
        let final_series = self.simulate_final(league, &first, &second, rng);
        TournamentTrace {
            conferences: [first, second],
            final_series,
        }
    }
}
