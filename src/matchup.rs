use serde::{Deserialize, Serialize};

use crate::team::TeamIndex;

/// Unordered pair of teams.
///
/// The pair is stored with the lower index first. League indices follow team id
/// order, so the first team is the alphabetically earlier one. Lookups taken
/// from the other side are flipped automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchupKey {
    first: TeamIndex,
    second: TeamIndex,
}

impl MatchupKey {
    /// Build the key for two teams, returning whether `team1` ended up second.
    pub fn oriented(team1: TeamIndex, team2: TeamIndex) -> (Self, bool) {
        if team1 <= team2 {
            (MatchupKey { first: team1, second: team2 }, false)
        } else {
            (MatchupKey { first: team2, second: team1 }, true)
        }
    }

    pub fn new(team1: TeamIndex, team2: TeamIndex) -> Self {
        Self::oriented(team1, team2).0
    }

    pub fn first(&self) -> TeamIndex {
        self.first
    }

    pub fn second(&self) -> TeamIndex {
        self.second
    }
}

/// How often a pairing happened and how often the key's first team won it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchupTally {
    pub occurrences: u32,
    pub first_wins: u32,
}

impl MatchupTally {
    /// Record one series between the key's teams.
    pub fn record(&mut self, key: &MatchupKey, winner: TeamIndex) {
        self.occurrences += 1;
        if winner == key.first {
            self.first_wins += 1;
        }
    }

    pub fn merge(&mut self, other: &MatchupTally) {
        self.occurrences += other.occurrences;
        self.first_wins += other.first_wins;
    }

    /// Share of the series won by the key's first team.
    pub fn first_win_rate(&self) -> f64 {
        if self.occurrences == 0 {
            0.5
        } else {
            f64::from(self.first_wins) / f64::from(self.occurrences)
        }
    }

    /// Share of the series won by `team`, which must be one side of `key`.
    pub fn win_rate_for(&self, key: &MatchupKey, team: TeamIndex) -> f64 {
        let rate = self.first_win_rate();
        if team == key.first {
            rate
        } else {
            1.0 - rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation() {
        let (key, flipped) = MatchupKey::oriented(5, 2);
        assert!(flipped);
        assert_eq!((key.first(), key.second()), (2, 5));
        assert_eq!(key, MatchupKey::new(2, 5));
    }

    #[test]
    fn test_tally_flips_for_second_team() {
        let key = MatchupKey::new(1, 4);
        let mut tally = MatchupTally::default();
        tally.record(&key, 1);
        tally.record(&key, 1);
        tally.record(&key, 4);
        tally.record(&key, 1);

        assert_eq!(tally.occurrences, 4);
        assert!((tally.win_rate_for(&key, 1) - 0.75).abs() < 1e-12);
        assert!((tally.win_rate_for(&key, 4) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_merge_adds_counts() {
        let key = MatchupKey::new(0, 3);
        let mut a = MatchupTally::default();
        let mut b = MatchupTally::default();
        a.record(&key, 0);
        b.record(&key, 3);
        b.record(&key, 0);
        a.merge(&b);
        assert_eq!(a, MatchupTally { occurrences: 3, first_wins: 2 });
    }

    #[test]
    fn test_empty_tally_is_even() {
        assert_eq!(MatchupTally::default().first_win_rate(), 0.5);
    }
}
