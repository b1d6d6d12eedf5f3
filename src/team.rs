#[cfg(feature = "python")]
use pyo3::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{LEAGUE_AVERAGE_PACE, PLAYOFF_TEAMS_PER_CONFERENCE};
use crate::error::LeagueError;

/// Position of a team inside a [`League`]. Teams are stored sorted by id, so
/// comparing indices compares ids.
pub type TeamIndex = usize;

/// Number of values in [`TeamCompetitive::feature_row`]
pub const FEATURE_COUNT: usize = 3;

/// A team's competitive state for the season being forecast.
///
/// `strength` and `experience` come from the upstream feature pipeline and are
/// treated as opaque scores.
#[cfg_attr(feature = "python", pyclass(get_all, set_all))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamCompetitive {
    pub id: String,
    pub conference: String,
    pub division: String,

    /// Standings points earned so far
    pub points: f64,

    pub games_played: u32,

    /// Composite strength score
    pub strength: f64,

    /// Playoff experience score
    pub experience: f64,
}

#[cfg(feature = "python")]
#[pymethods]
impl TeamCompetitive {
    #[new]
    #[pyo3(signature = (id, conference, division, points, games_played, strength, experience = 0.0))]
    fn py_new(
        id: String,
        conference: String,
        division: String,
        points: f64,
        games_played: u32,
        strength: f64,
        experience: f64,
    ) -> Self {
        TeamCompetitive::new(id, conference, division, points, games_played, strength, experience)
    }

    #[pyo3(name = "projected_points")]
    fn py_projected_points(&self, season_games: u32) -> f64 {
        self.projected_points(season_games)
    }

    fn __repr__(&self) -> String {
        format!(
            "TeamCompetitive({:?}, {}/{}, {} pts in {} gp, strength={})",
            self.id, self.conference, self.division, self.points, self.games_played, self.strength
        )
    }
}

impl TeamCompetitive {
    pub fn new(
        id: impl Into<String>,
        conference: impl Into<String>,
        division: impl Into<String>,
        points: f64,
        games_played: u32,
        strength: f64,
        experience: f64,
    ) -> Self {
        TeamCompetitive {
            id: id.into(),
            conference: conference.into(),
            division: division.into(),
            points,
            games_played,
            strength,
            experience,
        }
    }

    /// Points per game so far, or the league average before the first game.
    pub fn pace(&self) -> f64 {
        if self.games_played == 0 {
            LEAGUE_AVERAGE_PACE
        } else {
            self.points / f64::from(self.games_played)
        }
    }

    pub fn remaining_games(&self, season_games: u32) -> u32 {
        season_games.saturating_sub(self.games_played)
    }

    /// End-of-season points if the team keeps its current pace.
    pub fn projected_points(&self, season_games: u32) -> f64 {
        self.points + self.pace() * f64::from(self.remaining_games(season_games))
    }

    /// Share of available standings points earned (two per game).
    pub fn points_percentage(&self) -> f64 {
        if self.games_played == 0 {
            0.5
        } else {
            self.points / (2.0 * f64::from(self.games_played))
        }
    }

    /// Inputs for the championship estimators: strength, experience, points share.
    pub fn feature_row(&self) -> [f64; FEATURE_COUNT] {
        [self.strength, self.experience, self.points_percentage()]
    }
}

/// A conference and the indices of its member teams.
///
/// Only built by [`League::new`], so it always holds at least eight teams.
#[derive(Clone, Debug, PartialEq)]
pub struct Conference {
    name: String,
    members: Vec<TeamIndex>,
}

impl Conference {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[TeamIndex] {
        &self.members
    }
}

/// A validated set of teams split into exactly two conferences.
#[derive(Clone, Debug, PartialEq)]
pub struct League {
    teams: Vec<TeamCompetitive>,
    conferences: Vec<Conference>,
}

impl League {
    /// Validate and index the teams.
    ///
    /// Teams are sorted by id and conferences by name, so the same input always
    /// yields the same indices.
    pub fn new(mut teams: Vec<TeamCompetitive>) -> Result<Self, LeagueError> {
        if teams.is_empty() {
            return Err(LeagueError::Empty);
        }
        teams.sort_by(|a, b| a.id.cmp(&b.id));

        for pair in teams.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(LeagueError::DuplicateTeam(pair[0].id.clone()));
            }
        }

        for team in &teams {
            for (field, value) in [
                ("points", team.points),
                ("strength", team.strength),
                ("experience", team.experience),
            ] {
                if !value.is_finite() {
                    return Err(LeagueError::NonFinite {
                        team: team.id.clone(),
                        field,
                    });
                }
            }
        }

        let mut grouped: BTreeMap<&str, Vec<TeamIndex>> = BTreeMap::new();
        for (idx, team) in teams.iter().enumerate() {
            grouped.entry(team.conference.as_str()).or_default().push(idx);
        }
        if grouped.len() != 2 {
            return Err(LeagueError::ConferenceCount(grouped.len()));
        }

        let conferences: Vec<Conference> = grouped
            .into_iter()
            .map(|(name, members)| Conference {
                name: name.to_string(),
                members,
            })
            .collect();

        for conference in &conferences {
            if conference.members.len() < PLAYOFF_TEAMS_PER_CONFERENCE {
                return Err(LeagueError::ConferenceTooSmall {
                    conference: conference.name.clone(),
                    teams: conference.members.len(),
                    needed: PLAYOFF_TEAMS_PER_CONFERENCE,
                });
            }
        }

        Ok(League { teams, conferences })
    }

    pub fn teams(&self) -> &[TeamCompetitive] {
        &self.teams
    }

    pub fn team(&self, idx: TeamIndex) -> &TeamCompetitive {
        &self.teams[idx]
    }

    pub fn id(&self, idx: TeamIndex) -> &str {
        &self.teams[idx].id
    }

    pub fn conferences(&self) -> &[Conference] {
        &self.conferences
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<TeamIndex> {
        self.teams.binary_search_by(|t| t.id.as_str().cmp(id)).ok()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::TeamCompetitive;

    const DIVISIONS: [(&str, &str); 4] = [
        ("East", "Atlantic"),
        ("East", "Metropolitan"),
        ("West", "Central"),
        ("West", "Pacific"),
    ];

    /// 32 teams, 8 per division, with strength falling off inside each division.
    pub fn league_teams() -> Vec<TeamCompetitive> {
        let mut teams = Vec::new();
        for (d, (conference, division)) in DIVISIONS.iter().enumerate() {
            for i in 0..8 {
                let games = 60;
                let points = 85.0 - 4.0 * i as f64 + d as f64;
                let strength = 70.0 - 4.0 * i as f64 + d as f64 * 0.5;
                teams.push(TeamCompetitive::new(
                    format!("{}{}", &division[..3].to_uppercase(), i),
                    *conference,
                    *division,
                    points,
                    games,
                    strength,
                    (8 - i) as f64 / 8.0,
                ));
            }
        }
        teams
    }
}
