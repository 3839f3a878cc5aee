use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use nba_stats_api::client::{ApiError, StatsApi};
use nba_stats_api::session::{Session, SessionSource};
use nba_stats_api::{Endpoint, GameKey, Season};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error_log::ErrorLog;
use crate::layout::{DataLayout, missing_documents};
use crate::settings::ErrorPolicy;

#[derive(Debug)]
pub enum FetchError {
    /// No usable session could be obtained.
    Session(ApiError),
    Api { endpoint: Endpoint, source: ApiError },
    Io { path: PathBuf, source: io::Error },
}

impl FetchError {
    fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Api { source, .. } if source.is_unauthorized())
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Session(e) => write!(f, "{e}"),
            FetchError::Api { endpoint, source } => write!(f, "{endpoint}: {source}"),
            FetchError::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Session(e) => Some(e),
            FetchError::Api { source, .. } => Some(source),
            FetchError::Io { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameFetch {
    /// Every document was already on disk; nothing was requested.
    Skipped,
    /// Number of documents downloaded.
    Fetched(usize),
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    /// The season stopped early under [`ErrorPolicy::Abort`].
    pub aborted: bool,
}

/// Downloads box-score documents one game at a time, holding on to the
/// current session until it expires or the site rejects it.
pub struct GameFetcher<S> {
    api: StatsApi,
    source: S,
    session: Option<Session>,
}

impl<S: SessionSource> GameFetcher<S> {
    pub fn new(api: StatsApi, source: S) -> Self {
        Self { api, source, session: None }
    }

    fn reload_session(&mut self) -> Result<Session, FetchError> {
        let session = self.source.load().map_err(FetchError::Session)?;
        debug!("loaded session with {} cookies", session.cookies().len());
        self.session = Some(session.clone());
        Ok(session)
    }

    fn current_session(&mut self) -> Result<Session, FetchError> {
        if let Some(session) = &self.session {
            if !session.is_expired(Utc::now()) {
                return Ok(session.clone());
            }
            info!("session expired, reloading");
        }
        self.reload_session()
    }

    /// Fetch whatever documents of a game are not on disk yet. A rejected
    /// session is reloaded and the game retried once.
    pub async fn fetch_game(
        &mut self,
        layout: &DataLayout,
        season: &Season,
        game_id: &str,
    ) -> Result<GameFetch, FetchError> {
        let dir = layout.game_dir(season, game_id);
        if missing_documents(&dir).is_empty() {
            debug!("{game_id}: all documents present, skipping");
            return Ok(GameFetch::Skipped);
        }
        fs::create_dir_all(&dir).map_err(|source| FetchError::Io {
            path: dir.clone(),
            source,
        })?;

        let session = self.current_session()?;
        match self.download(layout, season, game_id, &session).await {
            Err(e) if e.is_unauthorized() => {
                warn!("{game_id}: {e}; reloading session and retrying");
                let session = self.reload_session()?;
                self.download(layout, season, game_id, &session)
                    .await
                    .map(GameFetch::Fetched)
            }
            result => result.map(GameFetch::Fetched),
        }
    }

    /// Request the missing documents in endpoint order, writing each one as
    /// soon as it has been validated. The first failure stops the game.
    async fn download(
        &self,
        layout: &DataLayout,
        season: &Season,
        game_id: &str,
        session: &Session,
    ) -> Result<usize, FetchError> {
        let missing = missing_documents(&layout.game_dir(season, game_id));
        for &endpoint in &missing {
            let body = self
                .api
                .fetch_document(endpoint, game_id, season, session)
                .await
                .map_err(|source| FetchError::Api { endpoint, source })?;
            let path = layout.document_path(season, game_id, endpoint);
            fs::write(&path, body).map_err(|source| FetchError::Io { path, source })?;
        }
        Ok(missing.len())
    }

    /// Fetch a season's games in index order.
    pub async fn fetch_season(
        &mut self,
        layout: &DataLayout,
        season: &Season,
        games: &[GameKey],
        policy: ErrorPolicy,
        errors: &ErrorLog,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        let bar = progress_bar(games.len() as u64);

        for game in games {
            bar.set_message(game.game_id.clone());
            match self.fetch_game(layout, season, &game.game_id).await {
                Ok(GameFetch::Skipped) => report.skipped += 1,
                Ok(GameFetch::Fetched(n)) => {
                    debug!("{}: fetched {n} documents", game.game_id);
                    report.fetched += 1;
                }
                Err(e) => {
                    error!("{}: {e}", game.game_id);
                    errors.record_or_warn(&game.game_id, &e.to_string());
                    report.failed.push(game.game_id.clone());
                    if policy == ErrorPolicy::Abort {
                        report.aborted = true;
                        break;
                    }
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        report
    }
}

pub fn progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{wide_bar} {pos}/{len} {msg} | elapsed: {elapsed_precise}, eta: {eta_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len).with_style(style)
}
