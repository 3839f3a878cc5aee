//! One game's seven box-score documents → one flat, side-aligned record.
//!
//! The team rows of every document come back in no particular order, so each
//! document is matched against the summary's away/home ids on its own. A
//! document that does not hold exactly those two teams aborts the game; a row
//! is never guessed into a side.

use nba_stats_api::schema::{self, FLAT_GROUPS, Schema, SUMMARY, TEAM_ID};
use nba_stats_api::stats::{StatsResponse, id_value, text_value};
use nba_stats_api::{Endpoint, TeamSide};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::layout::missing_documents;

/// Leading metadata columns of a flat record.
pub const META_COLUMNS: [&str; 5] = ["GAME_ID", "DATE", "SEASON", "A_ID", "H_ID"];
pub const HOME_WIN: &str = "HOME_WIN";

#[derive(Debug)]
pub enum FlattenError {
    /// Some documents were never fetched.
    Incomplete { missing: Vec<Endpoint> },
    Io { path: PathBuf, source: io::Error },
    Malformed { endpoint: Endpoint, source: serde_json::Error },
    Integrity { endpoint: Endpoint, message: String },
}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenError::Incomplete { missing } => {
                let names: Vec<String> = missing.iter().map(|e| e.to_string()).collect();
                write!(f, "incomplete game, missing {}", names.join(", "))
            }
            FlattenError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            FlattenError::Malformed { endpoint, source } => {
                write!(f, "{endpoint}: not a stats document: {source}")
            }
            FlattenError::Integrity { endpoint, message } => write!(f, "{endpoint}: {message}"),
        }
    }
}

impl std::error::Error for FlattenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlattenError::Io { source, .. } => Some(source),
            FlattenError::Malformed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The parsed documents of one game, keyed by endpoint.
#[derive(Debug, Clone, Default)]
pub struct GameDocumentSet {
    documents: HashMap<Endpoint, StatsResponse>,
}

impl GameDocumentSet {
    /// Read every document of a game directory. All seven must be present.
    pub fn load(dir: &Path) -> Result<Self, FlattenError> {
        let missing = missing_documents(dir);
        if !missing.is_empty() {
            return Err(FlattenError::Incomplete { missing });
        }

        let mut documents = HashMap::with_capacity(Endpoint::ALL.len());
        for endpoint in Endpoint::ALL {
            let path = dir.join(endpoint.file_name());
            let raw = fs::read_to_string(&path).map_err(|source| FlattenError::Io {
                path: path.clone(),
                source,
            })?;
            let document = serde_json::from_str(&raw)
                .map_err(|source| FlattenError::Malformed { endpoint, source })?;
            documents.insert(endpoint, document);
        }
        Ok(Self { documents })
    }

    pub fn get(&self, endpoint: Endpoint) -> Result<&StatsResponse, FlattenError> {
        self.documents
            .get(&endpoint)
            .ok_or_else(|| FlattenError::Incomplete { missing: vec![endpoint] })
    }
}

impl FromIterator<(Endpoint, StatsResponse)> for GameDocumentSet {
    fn from_iter<T: IntoIterator<Item = (Endpoint, StatsResponse)>>(iter: T) -> Self {
        Self { documents: iter.into_iter().collect() }
    }
}

/// Column names of a flat season table, generated from the same schemas the
/// values are read with.
pub fn flat_header() -> Vec<String> {
    let mut header: Vec<String> = META_COLUMNS.iter().map(|c| c.to_string()).collect();
    for endpoint in FLAT_GROUPS {
        let schema = schema::schema_for(endpoint);
        for side in TeamSide::BOTH {
            header.extend(schema.columns().map(|c| format!("{}{c}", side.prefix())));
        }
    }
    header.push(HOME_WIN.to_owned());
    header
}

/// One game, one row.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGameRecord {
    values: Vec<String>,
}

impl FlatGameRecord {
    /// Value of a named column, e.g. `A_PTS`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let index = flat_header().iter().position(|c| c == column)?;
        self.values.get(index).map(String::as_str)
    }

    /// Cells in [`flat_header`] order, game id first.
    pub fn to_csv_row(&self) -> &[String] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct GameSummary {
    date: String,
    season: String,
    away_id: i64,
    home_id: i64,
}

impl GameSummary {
    fn read(document: &StatsResponse) -> Result<Self, FlattenError> {
        let integrity = |message: String| FlattenError::Integrity {
            endpoint: Endpoint::Summary,
            message,
        };
        let set = document
            .result_set(SUMMARY.result_set)
            .ok_or_else(|| integrity("no game summary result set".into()))?;
        SUMMARY.check_headers(set).map_err(integrity)?;
        let row = set
            .row_set
            .first()
            .ok_or_else(|| integrity("game summary has no rows".into()))?;

        let cell = |column: &str| {
            SUMMARY
                .field(column)
                .and_then(|f| row.get(f.index))
                .ok_or_else(|| integrity(format!("summary row has no {column}")))
        };
        let id = |column: &str| {
            let value = cell(column)?;
            id_value(value).ok_or_else(|| integrity(format!("{column} is not a team id: {value}")))
        };

        let summary = GameSummary {
            date: text_value(cell("DATE")?).unwrap_or_default(),
            season: text_value(cell("SEASON")?).unwrap_or_default(),
            away_id: id("A_ID")?,
            home_id: id("H_ID")?,
        };
        if summary.away_id == summary.home_id {
            return Err(integrity(format!(
                "away and home are the same team ({})",
                summary.away_id
            )));
        }
        Ok(summary)
    }
}

/// The two team rows of one document, resolved to their sides.
struct TeamRows<'a> {
    endpoint: Endpoint,
    schema: &'static Schema,
    away: &'a [Value],
    home: &'a [Value],
}

impl<'a> TeamRows<'a> {
    fn resolve(
        endpoint: Endpoint,
        document: &'a StatsResponse,
        game: &GameSummary,
    ) -> Result<Self, FlattenError> {
        let schema = schema::schema_for(endpoint);
        let integrity = |message: String| FlattenError::Integrity { endpoint, message };

        let set = document
            .result_set(schema.result_set)
            .ok_or_else(|| integrity(format!("no result set at position {}", schema.result_set)))?;
        schema.check_headers(set).map_err(integrity)?;

        let [first, second] = set.row_set.as_slice() else {
            return Err(integrity(format!(
                "expected 2 team rows, found {}",
                set.row_set.len()
            )));
        };
        let (first, second) = (first.as_slice(), second.as_slice());
        let key = schema.key.unwrap_or(TEAM_ID);
        let team = |row: &[Value]| row.get(key.index).and_then(id_value);

        let (away, home) = match (team(first), team(second)) {
            (Some(a), Some(h)) if a == game.away_id && h == game.home_id => (first, second),
            (Some(h), Some(a)) if a == game.away_id && h == game.home_id => (second, first),
            (a, b) => {
                let show = |id: Option<i64>| id.map_or_else(|| "?".to_owned(), |id| id.to_string());
                return Err(integrity(format!(
                    "team rows {} and {} do not match away {} / home {}",
                    show(a),
                    show(b),
                    game.away_id,
                    game.home_id
                )));
            }
        };

        Ok(Self { endpoint, schema, away, home })
    }

    fn row(&self, side: TeamSide) -> &'a [Value] {
        match side {
            TeamSide::Away => self.away,
            TeamSide::Home => self.home,
        }
    }

    fn cell(&self, side: TeamSide, column: &str) -> Result<&'a Value, FlattenError> {
        self.schema
            .field(column)
            .and_then(|f| self.row(side).get(f.index))
            .ok_or_else(|| FlattenError::Integrity {
                endpoint: self.endpoint,
                message: format!("{side:?} row has no {column}"),
            })
    }

    /// Away values then home values, in schema order.
    fn append_to(&self, values: &mut Vec<String>) -> Result<(), FlattenError> {
        for side in TeamSide::BOTH {
            for field in self.schema.fields {
                values.push(csv_cell(self.cell(side, field.column)?));
            }
        }
        Ok(())
    }

    fn points(&self, side: TeamSide) -> Result<f64, FlattenError> {
        let value = self.cell(side, "PTS")?;
        number_value(value).ok_or_else(|| FlattenError::Integrity {
            endpoint: self.endpoint,
            message: format!("{side:?} PTS is not a number: {value}"),
        })
    }
}

fn number_value(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn csv_cell(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::Bool(b) => u8::from(*b).to_string(),
        other => text_value(other).unwrap_or_else(|| other.to_string()),
    }
}

/// Flatten one game. Away values precede home values in every group and the
/// record ends with `HOME_WIN`, 1 only when the home side scored more.
pub fn flatten_game(game_id: &str, documents: &GameDocumentSet) -> Result<FlatGameRecord, FlattenError> {
    let game = GameSummary::read(documents.get(Endpoint::Summary)?)?;

    let traditional = TeamRows::resolve(
        Endpoint::Traditional,
        documents.get(Endpoint::Traditional)?,
        &game,
    )?;
    let home_win = traditional.points(TeamSide::Home)? > traditional.points(TeamSide::Away)?;

    // no columns, but it must agree on the two teams like the rest
    TeamRows::resolve(Endpoint::Scoring, documents.get(Endpoint::Scoring)?, &game)?;

    let mut values = vec![
        game_id.to_owned(),
        game.date.clone(),
        game.season.clone(),
        game.away_id.to_string(),
        game.home_id.to_string(),
    ];
    for endpoint in FLAT_GROUPS {
        TeamRows::resolve(endpoint, documents.get(endpoint)?, &game)?.append_to(&mut values)?;
    }
    values.push(u8::from(home_win).to_string());

    Ok(FlatGameRecord { values })
}

/// Load and flatten the game stored in `dir`, named after the directory.
pub fn flatten_game_dir(game_id: &str, dir: &Path) -> Result<FlatGameRecord, FlattenError> {
    flatten_game(game_id, &GameDocumentSet::load(dir)?)
}
