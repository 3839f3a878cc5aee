//! Season tables → one table per team, every game seen from that team's side.

use chrono::{NaiveDate, NaiveDateTime};
use log::info;
use nba_stats_api::TeamSide;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::flatten::HOME_WIN;
use crate::layout::DataLayout;

/// Opponent stats carried into every team row, named `<STAT>_A`.
pub const OPPONENT_STATS: [&str; 5] = ["PTS", "REB", "AST", "STL", "BLK"];

const LEAD_COLUMNS: [&str; 7] = ["GAME_ID", "DATE", "SEASON", "TEAM", "OPPONENT", "HOME", "WON"];

#[derive(Debug)]
pub enum ReshapeError {
    Io(io::Error, PathBuf),
    Csv(csv::Error, PathBuf),
    HeaderMismatch(PathBuf),
    MissingColumn(String),
    BadValue { game_id: String, column: String, value: String },
}

impl fmt::Display for ReshapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReshapeError::Io(e, path) => write!(f, "{}: {e}", path.display()),
            ReshapeError::Csv(e, path) => write!(f, "{}: {e}", path.display()),
            ReshapeError::HeaderMismatch(path) => {
                write!(f, "{}: header differs from the other season tables", path.display())
            }
            ReshapeError::MissingColumn(column) => write!(f, "season table has no {column} column"),
            ReshapeError::BadValue { game_id, column, value } => {
                write!(f, "game {game_id}: bad {column} value {value:?}")
            }
        }
    }
}

impl std::error::Error for ReshapeError {}

/// One or more season tables with identical headers, concatenated.
#[derive(Debug, Clone, Default)]
pub struct SeasonRows {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SeasonRows {
    pub fn read(paths: &[PathBuf]) -> Result<Self, ReshapeError> {
        let mut table = SeasonRows::default();
        for path in paths {
            let csv_err = |e| ReshapeError::Csv(e, path.clone());
            let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
            let header: Vec<String> = reader
                .headers()
                .map_err(csv_err)?
                .iter()
                .map(str::to_owned)
                .collect();
            if table.header.is_empty() {
                table.header = header;
            } else if table.header != header {
                return Err(ReshapeError::HeaderMismatch(path.clone()));
            }
            for record in reader.records() {
                let record = record.map_err(csv_err)?;
                table.rows.push(record.iter().map(str::to_owned).collect());
            }
        }
        Ok(table)
    }

    fn column(&self, name: &str) -> Result<usize, ReshapeError> {
        self.header
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ReshapeError::MissingColumn(name.to_owned()))
    }
}

/// All games of one team.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamTable {
    pub team_id: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Column positions resolved once per season table.
struct Columns {
    game_id: usize,
    date: usize,
    season: usize,
    home_win: usize,
    /// `A_<stat>` / `H_<stat>` positions of each own stat, `ID` first.
    stats: Vec<(String, [usize; 2])>,
}

impl Columns {
    fn resolve(table: &SeasonRows) -> Result<Self, ReshapeError> {
        let mut stats = Vec::new();
        for column in &table.header {
            if let Some((TeamSide::Away, bare)) = TeamSide::split_column(column) {
                let away = table.column(column)?;
                let home = table.column(&format!("{}{bare}", TeamSide::Home.prefix()))?;
                stats.push((bare.to_owned(), [away, home]));
            }
        }
        if stats.first().map(|(name, _)| name.as_str()) != Some("ID") {
            return Err(ReshapeError::MissingColumn("A_ID".into()));
        }
        for stat in OPPONENT_STATS {
            if !stats.iter().any(|(name, _)| name == stat) {
                return Err(ReshapeError::MissingColumn(format!("A_{stat}")));
            }
        }
        Ok(Self {
            game_id: table.column("GAME_ID")?,
            date: table.column("DATE")?,
            season: table.column("SEASON")?,
            home_win: table.column(HOME_WIN)?,
            stats,
        })
    }

    fn side(side: TeamSide) -> usize {
        match side {
            TeamSide::Away => 0,
            TeamSide::Home => 1,
        }
    }

    fn stat<'r>(&self, row: &'r [String], name: &str, side: TeamSide) -> &'r str {
        self.stats
            .iter()
            .find(|(stat, _)| stat == name)
            .and_then(|(_, at)| row.get(at[Self::side(side)]))
            .map_or("", String::as_str)
    }

    fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = LEAD_COLUMNS.iter().map(|c| c.to_string()).collect();
        header.extend(self.stats.iter().skip(1).map(|(name, _)| name.clone()));
        header.extend(OPPONENT_STATS.iter().map(|s| format!("{s}_A")));
        header
    }
}

fn cell<'r>(row: &'r [String], index: usize) -> &'r str {
    row.get(index).map_or("", String::as_str)
}

/// Decimal cells are rounded to three places; everything else passes through.
fn round_cell(value: &str) -> String {
    if !value.contains('.') {
        return value.to_owned();
    }
    let Ok(v) = value.parse::<f64>() else {
        return value.to_owned();
    };
    let rounded = (v * 1000.0).round() / 1000.0;
    if !v.is_finite() || rounded == v {
        value.to_owned()
    } else if rounded == 0.0 {
        "0".to_owned()
    } else {
        format!("{rounded}")
    }
}

/// Calendar day of a `DATE` cell, with or without a time part.
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

/// Split every game into its two team rows and group them by team.
pub fn reshape(table: &SeasonRows) -> Result<Vec<TeamTable>, ReshapeError> {
    let columns = Columns::resolve(table)?;
    let header = columns.header();
    let mut teams: BTreeMap<String, Vec<(NaiveDate, Vec<String>)>> = BTreeMap::new();

    for row in &table.rows {
        let game_id = cell(row, columns.game_id);
        let bad = |column: &str, value: &str| ReshapeError::BadValue {
            game_id: game_id.to_owned(),
            column: column.to_owned(),
            value: value.to_owned(),
        };

        let raw_date = cell(row, columns.date);
        let date = parse_date(raw_date).ok_or_else(|| bad("DATE", raw_date))?;
        let home_win = match cell(row, columns.home_win) {
            "1" => 1,
            "0" => 0,
            other => return Err(bad(HOME_WIN, other)),
        };

        for side in TeamSide::BOTH {
            let opponent = side.opposite();
            let won = match side {
                TeamSide::Away => 1 - home_win,
                TeamSide::Home => home_win,
            };
            let team = columns.stat(row, "ID", side).to_owned();

            let mut out = vec![
                game_id.to_owned(),
                date.format("%Y-%m-%d").to_string(),
                cell(row, columns.season).to_owned(),
                team.clone(),
                columns.stat(row, "ID", opponent).to_owned(),
                u8::from(side == TeamSide::Home).to_string(),
                won.to_string(),
            ];
            out.extend(
                columns
                    .stats
                    .iter()
                    .skip(1)
                    .map(|(name, _)| round_cell(columns.stat(row, name, side))),
            );
            out.extend(
                OPPONENT_STATS
                    .iter()
                    .map(|stat| round_cell(columns.stat(row, stat, opponent))),
            );

            teams.entry(team).or_default().push((date, out));
        }
    }

    Ok(teams
        .into_iter()
        .map(|(team_id, mut rows)| {
            rows.sort_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a[0].cmp(&b[0])));
            TeamTable {
                team_id,
                header: header.clone(),
                rows: rows.into_iter().map(|(_, row)| row).collect(),
            }
        })
        .collect())
}

/// Season tables to reshape: the named seasons, or every table on disk.
pub fn season_tables(layout: &DataLayout, seasons: &[String]) -> Result<Vec<PathBuf>, ReshapeError> {
    if !seasons.is_empty() {
        return Ok(seasons.iter().map(|s| layout.flat_games_csv(s)).collect());
    }
    let dir = layout.flat_games_dir();
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .map_err(|e| ReshapeError::Io(e, dir.clone()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();
    Ok(paths)
}

pub fn write_team_tables(layout: &DataLayout, tables: &[TeamTable]) -> Result<Vec<PathBuf>, ReshapeError> {
    let dir = layout.teams_dir();
    fs::create_dir_all(&dir).map_err(|e| ReshapeError::Io(e, dir.clone()))?;

    let mut written = Vec::with_capacity(tables.len());
    for table in tables {
        let path = layout.team_csv(&table.team_id);
        write_table(&path, table)?;
        written.push(path);
    }
    info!("wrote {} team tables to {}", written.len(), dir.display());
    Ok(written)
}

fn write_table(path: &Path, table: &TeamTable) -> Result<(), ReshapeError> {
    let csv_err = |e| ReshapeError::Csv(e, path.to_owned());
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(&table.header).map_err(csv_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| ReshapeError::Io(e, path.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::fixtures::{AWAY, HOME, document_set, game_documents};
    use crate::flatten::{flat_header, flatten_game};

    fn season_rows(games: &[(&str, i64, i64)]) -> SeasonRows {
        SeasonRows {
            header: flat_header(),
            rows: games
                .iter()
                .map(|(id, away_pts, home_pts)| {
                    let docs = document_set(&game_documents(*away_pts, *home_pts));
                    flatten_game(id, &docs).unwrap().to_csv_row().to_vec()
                })
                .collect(),
        }
    }

    fn value<'t>(table: &'t TeamTable, row: usize, column: &str) -> &'t str {
        let at = table.header.iter().position(|c| c == column).unwrap();
        &table.rows[row][at]
    }

    #[test]
    fn every_game_lands_in_both_team_tables_with_complementary_won() {
        let teams = reshape(&season_rows(&[("0021800001", 118, 107), ("0021800002", 95, 101)])).unwrap();
        assert_eq!(teams.len(), 2);
        let away = teams.iter().find(|t| t.team_id == AWAY.to_string()).unwrap();
        let home = teams.iter().find(|t| t.team_id == HOME.to_string()).unwrap();

        for row in 0..2 {
            assert_eq!(value(away, row, "GAME_ID"), value(home, row, "GAME_ID"));
            let won: u8 = value(away, row, "WON").parse::<u8>().unwrap()
                + value(home, row, "WON").parse::<u8>().unwrap();
            assert_eq!(won, 1);
            assert_eq!(value(away, row, "TEAM"), value(home, row, "OPPONENT"));
            assert_eq!(value(away, row, "OPPONENT"), value(home, row, "TEAM"));
            assert_eq!(value(away, row, "HOME"), "0");
            assert_eq!(value(home, row, "HOME"), "1");
        }
        assert_eq!(value(away, 0, "WON"), "1");
        assert_eq!(value(home, 1, "WON"), "1");
    }

    #[test]
    fn own_and_opponent_stats_come_from_the_right_side() {
        let teams = reshape(&season_rows(&[("0021800001", 118, 107)])).unwrap();
        let away = teams.iter().find(|t| t.team_id == AWAY.to_string()).unwrap();
        let home = teams.iter().find(|t| t.team_id == HOME.to_string()).unwrap();

        assert_eq!(value(away, 0, "PTS"), "118");
        assert_eq!(value(away, 0, "PTS_A"), "107");
        assert_eq!(value(away, 0, "REB"), "17");
        assert_eq!(value(away, 0, "REB_A"), "117");
        assert_eq!(value(home, 0, "PTS"), "107");
        assert_eq!(value(home, 0, "AST_A"), "18");
        assert_eq!(value(home, 0, "FG_PCT"), "100.457");
        assert_eq!(value(away, 0, "DATE"), "2018-10-16");
    }

    #[test]
    fn header_follows_lead_own_opponent_order() {
        let teams = reshape(&season_rows(&[("0021800001", 118, 107)])).unwrap();
        let header = &teams[0].header;
        assert_eq!(&header[..7], &LEAD_COLUMNS.map(String::from));
        assert_eq!(header[7], "FGM");
        assert_eq!(&header[header.len() - 5..], &["PTS_A", "REB_A", "AST_A", "STL_A", "BLK_A"].map(String::from));
        assert!(!header.iter().any(|c| c == HOME_WIN || c.starts_with("A_") || c.starts_with("H_")));
        // 7 lead + 41 own stats + 5 opponent
        assert_eq!(header.len(), 53);
    }

    #[test]
    fn rows_are_sorted_by_date_then_game() {
        let mut rows = season_rows(&[("0021800009", 100, 90), ("0021800003", 100, 90), ("0021800005", 100, 90)]);
        let date = rows.header.iter().position(|c| c == "DATE").unwrap();
        rows.rows[0][date] = "2018-10-01T00:00:00".into();
        let teams = reshape(&rows).unwrap();
        let ids: Vec<&str> = teams[0].rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["0021800009", "0021800003", "0021800005"]);
    }

    #[test]
    fn bad_home_win_is_rejected() {
        let mut rows = season_rows(&[("0021800001", 118, 107)]);
        let last = rows.header.len() - 1;
        rows.rows[0][last] = "2".into();
        assert!(matches!(reshape(&rows), Err(ReshapeError::BadValue { .. })));
    }

    #[test]
    fn rounding_only_touches_decimals() {
        assert_eq!(round_cell("0.45678"), "0.457");
        assert_eq!(round_cell("105.3"), "105.3");
        assert_eq!(round_cell("118"), "118");
        assert_eq!(round_cell("1610612737"), "1610612737");
        assert_eq!(round_cell(""), "");
    }

    #[test]
    fn rounding_keeps_exact_cells_and_drops_negative_zero() {
        assert_eq!(round_cell("1.0"), "1.0");
        assert_eq!(round_cell("0.101"), "0.101");
        assert_eq!(round_cell("-0.0001"), "0");
        assert_eq!(round_cell("-0.0004"), "0");
        assert_eq!(round_cell("-2.34567"), "-2.346");
    }

    #[test]
    fn season_files_must_share_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "GAME_ID,DATE\n1,2018-10-16\n").unwrap();
        fs::write(&b, "GAME_ID,SEASON\n2,2018\n").unwrap();
        assert!(matches!(SeasonRows::read(&[a.clone(), a.clone()]), Ok(t) if t.rows.len() == 2));
        assert!(matches!(SeasonRows::read(&[a, b]), Err(ReshapeError::HeaderMismatch(_))));
    }

    #[test]
    fn flattened_season_reshapes_back_to_flat_values() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let season: nba_stats_api::Season = "22018".parse().unwrap();
        let errors = crate::error_log::ErrorLog::for_season(dir.path(), "22018");
        crate::flatten::fixtures::write_game(
            &layout.game_dir(&season, "0021800001"),
            &game_documents(118, 107),
        );
        crate::aggregate::flatten_season(&layout, &season, &errors).unwrap();

        let paths = season_tables(&layout, &[]).unwrap();
        assert_eq!(paths, vec![layout.flat_games_csv("22018")]);
        let teams = reshape(&SeasonRows::read(&paths).unwrap()).unwrap();
        let written = write_team_tables(&layout, &teams).unwrap();
        assert_eq!(written.len(), 2);

        let flat = SeasonRows::read(&paths).unwrap();
        let flat_value = |column: &str| {
            let at = flat.header.iter().position(|c| c == column).unwrap();
            flat.rows[0][at].clone()
        };
        let mut reader = csv::Reader::from_path(layout.team_csv(&HOME.to_string())).unwrap();
        let header = reader.headers().unwrap().clone();
        let row = reader.records().next().unwrap().unwrap();
        let team_value = |column: &str| {
            let at = header.iter().position(|c| c == column).unwrap();
            row[at].to_owned()
        };
        for stat in ["PTS", "REB", "AST"] {
            assert_eq!(team_value(stat), flat_value(&format!("H_{stat}")));
            assert_eq!(team_value(&format!("{stat}_A")), flat_value(&format!("A_{stat}")));
        }
    }
}
