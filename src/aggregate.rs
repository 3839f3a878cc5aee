use anyhow::{Context, anyhow};
use log::{error, info, warn};
use nba_stats_api::Season;
use nba_stats_api::session::SessionSource;
use std::fs;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use crate::error_log::ErrorLog;
use crate::fetcher::{GameFetch, GameFetcher, progress_bar};
use crate::flatten::{flat_header, flatten_game_dir};
use crate::layout::{DataLayout, missing_documents};

#[derive(Debug)]
pub struct SeasonTable {
    pub path: PathBuf,
    pub written: usize,
    pub failed: Vec<String>,
}

/// Game directories of a season as `(game_id, dir)`, sorted by game id.
pub fn game_dirs(layout: &DataLayout, season: &Season) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let root = layout.season_games_dir(season);
    let mut dirs: Vec<(String, PathBuf)> = fs::read_dir(&root)
        .with_context(|| format!("no fetched games at {}", root.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let game_id = path.file_name()?.to_str()?.to_owned();
            Some((game_id, path))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Flatten every fetched game of a season into `<season>-full.csv`. A game
/// that cannot be flattened is logged and left out of the table.
pub fn flatten_season(
    layout: &DataLayout,
    season: &Season,
    errors: &ErrorLog,
) -> anyhow::Result<SeasonTable> {
    let games = game_dirs(layout, season)?;

    let out_dir = layout.flat_games_dir();
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let path = layout.flat_games_csv(season.code());
    // written beside the table and moved over it once every game is in
    let staging = NamedTempFile::new_in(&out_dir)
        .with_context(|| format!("creating a temporary file in {}", out_dir.display()))?;
    let mut writer = csv::Writer::from_writer(staging);
    writer.write_record(flat_header())?;

    let mut table = SeasonTable { path, written: 0, failed: Vec::new() };
    let bar = progress_bar(games.len() as u64);
    for (game_id, dir) in &games {
        bar.set_message(game_id.clone());
        match flatten_game_dir(game_id, dir) {
            Ok(record) => {
                writer.write_record(record.to_csv_row())?;
                table.written += 1;
            }
            Err(e) => {
                error!("{game_id}: {e}");
                errors.record_or_warn(game_id, &e.to_string());
                table.failed.push(game_id.clone());
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    let staging = writer
        .into_inner()
        .map_err(|e| anyhow!("writing {}: {}", table.path.display(), e.error()))?;
    staging
        .persist(&table.path)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", table.path.display()))?;

    info!(
        "wrote {} games to {} ({} skipped)",
        table.written,
        table.path.display(),
        table.failed.len()
    );
    Ok(table)
}

/// Fetch the missing documents of every incomplete game directory. Returns
/// how many games were completed.
pub async fn refetch_incomplete<S: SessionSource>(
    fetcher: &mut GameFetcher<S>,
    layout: &DataLayout,
    season: &Season,
    errors: &ErrorLog,
) -> anyhow::Result<usize> {
    let incomplete: Vec<String> = game_dirs(layout, season)?
        .into_iter()
        .filter(|(_, dir)| !missing_documents(dir).is_empty())
        .map(|(game_id, _)| game_id)
        .collect();
    if incomplete.is_empty() {
        return Ok(0);
    }

    info!("refetching {} incomplete games", incomplete.len());
    let mut completed = 0;
    for game_id in &incomplete {
        match fetcher.fetch_game(layout, season, game_id).await {
            Ok(GameFetch::Fetched(_)) => completed += 1,
            Ok(GameFetch::Skipped) => {}
            Err(e) => {
                warn!("{game_id}: refetch failed: {e}");
                errors.record_or_warn(game_id, &e.to_string());
            }
        }
    }
    Ok(completed)
}
