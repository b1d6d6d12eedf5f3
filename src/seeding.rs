//! Playoff field selection and first-round pairing for one conference.
//!
//! The divisional format takes the top three of each division plus the two best
//! remaining teams as wildcards. The better division leader (seed 1) meets the
//! weaker wildcard and the other leader (seed 2) meets the stronger one; inside
//! each division second place plays third. That splits the conference into two
//! sub-brackets that only meet in the conference final.
//!
//! When the division data cannot support that format the engine falls back to
//! straight ranking by points (1v8, 4v5 | 2v7, 3v6).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::constants::{DIVISION_QUALIFIERS, PLAYOFF_TEAMS_PER_CONFERENCE, WILDCARDS_PER_CONFERENCE};
use crate::error::SeedingError;
use crate::team::{Conference, League, TeamIndex};

/// Ways of building a conference bracket, tried in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedingStrategy {
    /// Division top three plus two wildcards
    Divisional,
    /// Top eight by points, 1v8/2v7/3v6/4v5
    Ranked,
}

/// Half of a conference bracket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubBracket {
    /// Anchored by seed 1
    A,
    /// Anchored by seed 2
    B,
}

/// A first-round pairing; `higher` holds the better seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub higher: TeamIndex,
    pub lower: TeamIndex,
    pub higher_seed: u8,
    pub lower_seed: u8,
}

/// Four first-round matchups; `matchups[0..2]` form sub-bracket A and
/// `matchups[2..4]` sub-bracket B.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub matchups: [Matchup; 4],
    pub strategy: SeedingStrategy,
}

impl Bracket {
    pub fn sub_bracket(&self, side: SubBracket) -> &[Matchup] {
        match side {
            SubBracket::A => &self.matchups[..2],
            SubBracket::B => &self.matchups[2..],
        }
    }

    /// The eight playoff teams.
    pub fn teams(&self) -> [TeamIndex; PLAYOFF_TEAMS_PER_CONFERENCE] {
        let mut teams = [0; PLAYOFF_TEAMS_PER_CONFERENCE];
        for (i, m) in self.matchups.iter().enumerate() {
            teams[2 * i] = m.higher;
            teams[2 * i + 1] = m.lower;
        }
        teams
    }

    pub fn seed_of(&self, team: TeamIndex) -> Option<u8> {
        self.matchups.iter().find_map(|m| {
            if m.higher == team {
                Some(m.higher_seed)
            } else if m.lower == team {
                Some(m.lower_seed)
            } else {
                None
            }
        })
    }
}

/// Builds conference brackets from (possibly randomized) point totals.
#[derive(Clone, Debug)]
pub struct SeedingEngine {
    strategies: Vec<SeedingStrategy>,
}

impl Default for SeedingEngine {
    fn default() -> Self {
        SeedingEngine {
            strategies: vec![SeedingStrategy::Divisional, SeedingStrategy::Ranked],
        }
    }
}

impl SeedingEngine {
    pub fn new(strategies: Vec<SeedingStrategy>) -> Self {
        SeedingEngine { strategies }
    }

    pub fn strategies(&self) -> &[SeedingStrategy] {
        &self.strategies
    }

    /// Seed a conference. `points` is indexed by league team index.
    ///
    /// Strategies are tried in order; ranked seeding always succeeds for a
    /// validated conference and closes the chain.
    pub fn seed(&self, league: &League, conference: &Conference, points: &[f64]) -> Bracket {
        for &strategy in &self.strategies {
            match self.try_strategy(strategy, league, conference, points) {
                Ok(bracket) => return bracket,
                Err(err) => debug!(
                    conference = conference.name(),
                    strategy = ?strategy,
                    error = %err,
                    "seeding strategy failed"
                ),
            }
        }
        ranked(conference, points)
    }

    /// Strategy that seeds `conference` for these points, warning about every
    /// strategy ahead of it that could not be used.
    pub fn select_strategy(&self, league: &League, conference: &Conference, points: &[f64]) -> SeedingStrategy {
        for &strategy in &self.strategies {
            match self.try_strategy(strategy, league, conference, points) {
                Ok(_) => return strategy,
                Err(err) => warn!(
                    conference = conference.name(),
                    strategy = ?strategy,
                    error = %err,
                    "seeding strategy unavailable, falling back"
                ),
            }
        }
        SeedingStrategy::Ranked
    }

    /// Run one strategy, reporting why it could not seed the conference.
    pub fn try_strategy(
        &self,
        strategy: SeedingStrategy,
        league: &League,
        conference: &Conference,
        points: &[f64],
    ) -> Result<Bracket, SeedingError> {
        match strategy {
            SeedingStrategy::Divisional => divisional(league, conference, points),
            SeedingStrategy::Ranked => {
                let found = conference.members().len();
                if found < PLAYOFF_TEAMS_PER_CONFERENCE {
                    return Err(SeedingError::NotEnoughTeams {
                        found,
                        needed: PLAYOFF_TEAMS_PER_CONFERENCE,
                    });
                }
                Ok(ranked(conference, points))
            }
        }
    }
}

/// Descending points; equal points keep index (team id) order.
fn by_points(points: &[f64]) -> impl Fn(&TeamIndex, &TeamIndex) -> Ordering + '_ {
    move |&a, &b| points[b].total_cmp(&points[a]).then(a.cmp(&b))
}

fn divisional(
    league: &League,
    conference: &Conference,
    points: &[f64],
) -> Result<Bracket, SeedingError> {
    let mut divisions: BTreeMap<&str, Vec<TeamIndex>> = BTreeMap::new();
    for &idx in conference.members() {
        divisions
            .entry(league.team(idx).division.as_str())
            .or_default()
            .push(idx);
    }
    if divisions.len() != 2 {
        return Err(SeedingError::DivisionCount(divisions.len()));
    }

    let mut groups: Vec<Vec<TeamIndex>> = Vec::with_capacity(2);
    for (name, mut members) in divisions {
        if members.len() < DIVISION_QUALIFIERS {
            return Err(SeedingError::ShortDivision {
                division: name.to_string(),
                teams: members.len(),
                needed: DIVISION_QUALIFIERS,
            });
        }
        members.sort_by(by_points(points));
        groups.push(members);
    }

    let mut pool: Vec<TeamIndex> = groups
        .iter()
        .flat_map(|g| g[DIVISION_QUALIFIERS..].iter().copied())
        .collect();
    pool.sort_by(by_points(points));
    let [wildcard1, wildcard2, ..] = pool[..] else {
        return Err(SeedingError::NotEnoughTeams {
            found: pool.len() + 2 * DIVISION_QUALIFIERS,
            needed: 2 * DIVISION_QUALIFIERS + WILDCARDS_PER_CONFERENCE,
        });
    };

    // Ties between leaders go to the alphabetically first division
    let (top, other) = if points[groups[0][0]] >= points[groups[1][0]] {
        (&groups[0], &groups[1])
    } else {
        (&groups[1], &groups[0])
    };

    // Seeds: leaders 1 and 2, the other six by points
    let mut rest: Vec<TeamIndex> = vec![top[1], top[2], other[1], other[2], wildcard1, wildcard2];
    rest.sort_by(by_points(points));
    let seed = |team: TeamIndex| -> u8 {
        if team == top[0] {
            1
        } else if team == other[0] {
            2
        } else {
            rest.iter().position(|&t| t == team).map_or(8, |p| p as u8 + 3)
        }
    };
    let pair = |a: TeamIndex, b: TeamIndex| -> Matchup {
        let (sa, sb) = (seed(a), seed(b));
        if sa <= sb {
            Matchup { higher: a, lower: b, higher_seed: sa, lower_seed: sb }
        } else {
            Matchup { higher: b, lower: a, higher_seed: sb, lower_seed: sa }
        }
    };

    Ok(Bracket {
        matchups: [
            pair(top[0], wildcard2),
            pair(top[1], top[2]),
            pair(other[0], wildcard1),
            pair(other[1], other[2]),
        ],
        strategy: SeedingStrategy::Divisional,
    })
}

fn ranked(conference: &Conference, points: &[f64]) -> Bracket {
    let mut order: Vec<TeamIndex> = conference.members().to_vec();
    order.sort_by(by_points(points));

    let pair = |hi: usize, lo: usize| Matchup {
        higher: order[hi - 1],
        lower: order[lo - 1],
        higher_seed: hi as u8,
        lower_seed: lo as u8,
    };

    Bracket {
        matchups: [pair(1, 8), pair(4, 5), pair(2, 7), pair(3, 6)],
        strategy: SeedingStrategy::Ranked,
    }
}
