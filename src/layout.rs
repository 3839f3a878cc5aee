use nba_stats_api::{Endpoint, Season};
use std::path::{Path, PathBuf};

/// On-disk layout of the data directory.
///
/// ```text
/// <root>/raw/season/<file>.json
/// <root>/raw/games/<season>/<game_id>/<endpoint>.json
/// <root>/processed/season/<season_id>.csv
/// <root>/processed/games/<season_id>-full.csv
/// <root>/processed/teams/<team_id>.csv
/// ```
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_seasons_dir(&self) -> PathBuf {
        self.root.join("raw").join("season")
    }

    pub fn season_games_dir(&self, season: &Season) -> PathBuf {
        self.root.join("raw").join("games").join(season.code())
    }

    pub fn game_dir(&self, season: &Season, game_id: &str) -> PathBuf {
        self.season_games_dir(season).join(game_id)
    }

    pub fn document_path(&self, season: &Season, game_id: &str, endpoint: Endpoint) -> PathBuf {
        self.game_dir(season, game_id).join(endpoint.file_name())
    }

    pub fn season_index_dir(&self) -> PathBuf {
        self.root.join("processed").join("season")
    }

    pub fn season_index_csv(&self, season_id: &str) -> PathBuf {
        self.season_index_dir().join(format!("{season_id}.csv"))
    }

    pub fn flat_games_dir(&self) -> PathBuf {
        self.root.join("processed").join("games")
    }

    pub fn flat_games_csv(&self, season_id: &str) -> PathBuf {
        self.flat_games_dir().join(format!("{season_id}-full.csv"))
    }

    pub fn teams_dir(&self) -> PathBuf {
        self.root.join("processed").join("teams")
    }

    pub fn team_csv(&self, team_id: &str) -> PathBuf {
        self.teams_dir().join(format!("{team_id}.csv"))
    }
}

/// Endpoints whose documents are not yet on disk for a game directory.
pub fn missing_documents(game_dir: &Path) -> Vec<Endpoint> {
    Endpoint::ALL
        .into_iter()
        .filter(|e| !game_dir.join(e.file_name()).is_file())
        .collect()
}
