pub mod client;
pub mod schema;
pub mod session;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Domain types, independent of the stats.nba.com wire format
// ---------------------------------------------------------------------------

/// A box-score endpoint on stats.nba.com together with the file name its
/// response is persisted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Advanced,
    Summary,
    FourFactors,
    Misc,
    Scoring,
    Tracking,
    Traditional,
}

impl Endpoint {
    /// Every endpoint, in the order the fetcher requests them.
    pub const ALL: [Endpoint; 7] = [
        Endpoint::Advanced,
        Endpoint::Summary,
        Endpoint::FourFactors,
        Endpoint::Misc,
        Endpoint::Scoring,
        Endpoint::Tracking,
        Endpoint::Traditional,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Advanced => "/boxscoreadvancedv2",
            Endpoint::Summary => "/boxscoresummaryv2",
            Endpoint::FourFactors => "/boxscorefourfactorsv2",
            Endpoint::Misc => "/boxscoremiscv2",
            Endpoint::Scoring => "/boxscorescoringv2",
            Endpoint::Tracking => "/boxscoreplayertrackv2",
            Endpoint::Traditional => "/boxscoretraditionalv2",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Endpoint::Advanced => "advanced.json",
            Endpoint::Summary => "boxscore-summary.json",
            Endpoint::FourFactors => "four-factors.json",
            Endpoint::Misc => "misc.json",
            Endpoint::Scoring => "scoring.json",
            Endpoint::Tracking => "tracking.json",
            Endpoint::Traditional => "traditional.json",
        }
    }

    /// The summary endpoint takes only `GameID`; all others are also filtered
    /// by period/range and season.
    pub fn takes_range_params(&self) -> bool {
        !matches!(self, Endpoint::Summary)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.file_name();
        f.write_str(name.strip_suffix(".json").unwrap_or(name))
    }
}

/// Which side of a game a team row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamSide {
    Away,
    Home,
}

impl TeamSide {
    /// Output order: away values always precede home values.
    pub const BOTH: [TeamSide; 2] = [TeamSide::Away, TeamSide::Home];

    /// Column prefix used in the flat season table.
    pub fn prefix(&self) -> &'static str {
        match self {
            TeamSide::Away => "A_",
            TeamSide::Home => "H_",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            TeamSide::Away => TeamSide::Home,
            TeamSide::Home => TeamSide::Away,
        }
    }

    /// Split a prefixed column name (`A_PTS`) into its side and bare name.
    pub fn split_column(column: &str) -> Option<(TeamSide, &str)> {
        TeamSide::BOTH.into_iter().find_map(|side| {
            column
                .strip_prefix(side.prefix())
                .map(|bare| (side, bare))
        })
    }
}

/// A season code as used by stats.nba.com: one season-type digit followed by
/// the starting year, e.g. `22013` for the 2013-14 regular season. Only
/// regular-season codes (type digit `2`) are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Season {
    code: String,
    start_year: u16,
}

impl Season {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn start_year(&self) -> u16 {
        self.start_year
    }

    /// Display season expected by the `Season` query parameter: `2013-14`.
    pub fn display_name(&self) -> String {
        format!("{}-{:02}", self.start_year, (self.start_year + 1) % 100)
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let code = code.trim();
        if code.len() != 5 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid season code {code:?} (expected e.g. 22013)"));
        }
        // requests are sent with SeasonType=Regular Season
        if !code.starts_with('2') {
            return Err(format!(
                "season {code:?} is not a regular season (codes start with 2, e.g. 22013)"
            ));
        }
        let start_year: u16 = code[1..]
            .parse()
            .map_err(|e| format!("invalid season year in {code:?}: {e}"))?;
        if start_year < 1946 {
            return Err(format!("season {code:?} predates the league"));
        }
        Ok(Season { code: code.to_owned(), start_year })
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// One row of a season index: the season a game belongs to and its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameKey {
    pub season_id: String,
    pub game_id: String,
}
