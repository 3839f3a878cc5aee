//! Season game log → `(season_id, game_id)` table.
//!
//! Season logs hold one row per team per game and run to several megabytes, so
//! the document is walked with serde seeds: only `resultSets[*].rowSet[*]` is
//! visited, one row at a time, and everything else is skipped unparsed.

use log::{error, info};
use nba_stats_api::GameKey;
use nba_stats_api::schema::{GAME_ID, SEASON_ID};
use nba_stats_api::stats::text_value;
use serde::Deserializer;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::layout::DataLayout;

#[derive(Debug)]
pub enum IndexError {
    Io(std::io::Error, PathBuf),
    Malformed(serde_json::Error, PathBuf),
    Empty(PathBuf),
    Csv(csv::Error, PathBuf),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Io(e, path) => write!(f, "{}: {e}", path.display()),
            IndexError::Malformed(e, path) => {
                write!(f, "{}: malformed season document: {e}", path.display())
            }
            IndexError::Empty(path) => write!(f, "{}: no games found", path.display()),
            IndexError::Csv(e, path) => write!(f, "{}: {e}", path.display()),
        }
    }
}

impl std::error::Error for IndexError {}

/// Result of indexing one raw season file.
#[derive(Debug, Clone)]
pub struct IndexedSeason {
    pub season_id: String,
    pub path: PathBuf,
    pub games: usize,
}

#[derive(Debug, Default)]
pub struct IndexSummary {
    pub indexed: Vec<IndexedSeason>,
    pub failed: Vec<(PathBuf, IndexError)>,
}

// ---------------------------------------------------------------------------
// Streaming extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Collector {
    seen: HashSet<String>,
    games: Vec<GameKey>,
}

impl Collector {
    fn push_row(&mut self, row: &[Value]) -> Result<(), String> {
        let cell = |index: usize, name: &str| {
            row.get(index)
                .and_then(text_value)
                .ok_or_else(|| format!("row without {name} at position {index}"))
        };
        let season_id = cell(SEASON_ID.index, SEASON_ID.header)?;
        let game_id = cell(GAME_ID.index, GAME_ID.header)?;
        // two rows per game, one per team
        if self.seen.insert(game_id.clone()) {
            self.games.push(GameKey { season_id, game_id });
        }
        Ok(())
    }
}

struct Document<'a>(&'a mut Collector);
struct ResultSets<'a>(&'a mut Collector);
struct ResultSetEntry<'a>(&'a mut Collector);
struct RowSet<'a>(&'a mut Collector);

impl<'de> DeserializeSeed<'de> for Document<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for Document<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a stats document object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let collector = self.0;
        let mut found = false;
        while let Some(key) = map.next_key::<String>()? {
            if key == "resultSets" {
                map.next_value_seed(ResultSets(&mut *collector))?;
                found = true;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        if !found {
            return Err(de::Error::missing_field("resultSets"));
        }
        Ok(())
    }
}

impl<'de> DeserializeSeed<'de> for ResultSets<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ResultSets<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of result sets")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let collector = self.0;
        while seq.next_element_seed(ResultSetEntry(&mut *collector))?.is_some() {}
        Ok(())
    }
}

impl<'de> DeserializeSeed<'de> for ResultSetEntry<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ResultSetEntry<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a result set object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let collector = self.0;
        while let Some(key) = map.next_key::<String>()? {
            if key == "rowSet" {
                map.next_value_seed(RowSet(&mut *collector))?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

impl<'de> DeserializeSeed<'de> for RowSet<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for RowSet<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of rows")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let collector = self.0;
        while let Some(row) = seq.next_element::<Vec<Value>>()? {
            collector.push_row(&row).map_err(de::Error::custom)?;
        }
        Ok(())
    }
}

/// Unique games of a season document, in order of first appearance.
pub fn extract_games<R: Read>(reader: R) -> Result<Vec<GameKey>, serde_json::Error> {
    let mut collector = Collector::default();
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    Document(&mut collector).deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(collector.games)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Index one raw season file. The output is named after the season id of the
/// first game and only written once the whole document has parsed.
pub fn index_season_file(layout: &DataLayout, src: &Path) -> Result<IndexedSeason, IndexError> {
    let file = File::open(src).map_err(|e| IndexError::Io(e, src.to_owned()))?;
    let games = extract_games(BufReader::new(file))
        .map_err(|e| IndexError::Malformed(e, src.to_owned()))?;
    let Some(first) = games.first() else {
        return Err(IndexError::Empty(src.to_owned()));
    };
    let season_id = first.season_id.clone();

    let out_dir = layout.season_index_dir();
    fs::create_dir_all(&out_dir).map_err(|e| IndexError::Io(e, out_dir.clone()))?;
    let path = layout.season_index_csv(&season_id);
    write_index(&path, &games)?;

    Ok(IndexedSeason { season_id, path, games: games.len() })
}

/// Index every file under `raw/season`, in name order. A bad file is logged
/// and skipped; the others are still indexed.
pub fn index_all(layout: &DataLayout) -> Result<IndexSummary, IndexError> {
    let dir = layout.raw_seasons_dir();
    let mut files: Vec<PathBuf> = fs::read_dir(&dir)
        .map_err(|e| IndexError::Io(e, dir.clone()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut summary = IndexSummary::default();
    for src in files {
        match index_season_file(layout, &src) {
            Ok(indexed) => {
                info!(
                    "indexed {} games for season {} from {}",
                    indexed.games,
                    indexed.season_id,
                    src.display()
                );
                summary.indexed.push(indexed);
            }
            Err(e) => {
                error!("{e}");
                summary.failed.push((src, e));
            }
        }
    }
    Ok(summary)
}

fn write_index(path: &Path, games: &[GameKey]) -> Result<(), IndexError> {
    let csv_err = |e| IndexError::Csv(e, path.to_owned());
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for game in games {
        writer.serialize(game).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| IndexError::Io(e, path.to_owned()))
}

/// Load a season index written by [`index_season_file`].
pub fn read_index(path: &Path) -> Result<Vec<GameKey>, IndexError> {
    let csv_err = |e| IndexError::Csv(e, path.to_owned());
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    reader
        .deserialize::<GameKey>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_row(season: &str, team: i64, game: &str) -> Value {
        json!([season, team, "ATL", "Atlanta Hawks", game, "2018-10-17", "ATL @ NYK", "L"])
    }

    fn season_doc() -> Value {
        json!({
            "resource": "leaguegamelog",
            "parameters": {"Season": "2018-19", "Nested": {"rowSet": [["not", "rows"]]}},
            "resultSets": [{
                "name": "LeagueGameLog",
                "headers": ["SEASON_ID", "TEAM_ID", "TEAM_ABBREVIATION", "TEAM_NAME", "GAME_ID"],
                "rowSet": [
                    log_row("22018", 1610612737, "0021800001"),
                    log_row("22018", 1610612752, "0021800001"),
                    log_row("22018", 1610612738, "0021800002"),
                    log_row("22018", 1610612755, "0021800002"),
                    log_row("22018", 1610612737, "0021800003"),
                ]
            }]
        })
    }

    #[test]
    fn extracts_unique_games_in_first_seen_order() {
        let raw = serde_json::to_vec(&season_doc()).unwrap();
        let games = extract_games(raw.as_slice()).unwrap();
        let ids: Vec<&str> = games.iter().map(|g| g.game_id.as_str()).collect();
        assert_eq!(ids, vec!["0021800001", "0021800002", "0021800003"]);
        assert!(games.iter().all(|g| g.season_id == "22018"));
    }

    #[test]
    fn truncated_document_is_an_error() {
        let raw = serde_json::to_string(&season_doc()).unwrap();
        let truncated = &raw[..raw.len() / 2];
        assert!(extract_games(truncated.as_bytes()).is_err());
    }

    #[test]
    fn short_row_is_an_error() {
        let doc = json!({"resultSets": [{"rowSet": [["22018", 1610612737]]}]});
        let err = extract_games(doc.to_string().as_bytes()).unwrap_err();
        assert!(err.to_string().contains("GAME_ID"), "{err}");
    }

    #[test]
    fn missing_result_sets_is_an_error() {
        assert!(extract_games(r#"{"resource": "x"}"#.as_bytes()).is_err());
    }

    #[test]
    fn index_file_is_named_after_season_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        fs::create_dir_all(layout.raw_seasons_dir()).unwrap();
        let src = layout.raw_seasons_dir().join("2018-19.json");
        fs::write(&src, season_doc().to_string()).unwrap();

        let indexed = index_season_file(&layout, &src).unwrap();
        assert_eq!(indexed.season_id, "22018");
        assert_eq!(indexed.games, 3);
        assert_eq!(indexed.path, layout.season_index_csv("22018"));

        let text = fs::read_to_string(&indexed.path).unwrap();
        assert!(text.starts_with("season_id,game_id\n22018,0021800001\n"), "{text}");

        let back = read_index(&indexed.path).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[2].game_id, "0021800003");
    }

    #[test]
    fn index_all_skips_bad_files_and_writes_nothing_for_them() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        fs::create_dir_all(layout.raw_seasons_dir()).unwrap();
        fs::write(layout.raw_seasons_dir().join("a.json"), "{\"resultSets\": [").unwrap();
        fs::write(layout.raw_seasons_dir().join("b.json"), season_doc().to_string()).unwrap();

        let summary = index_all(&layout).unwrap();
        assert_eq!(summary.indexed.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        let written: Vec<_> = fs::read_dir(layout.season_index_dir()).unwrap().collect();
        assert_eq!(written.len(), 1);
    }
}
