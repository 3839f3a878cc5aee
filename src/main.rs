mod aggregate;
mod cookies;
mod error_log;
mod fetcher;
mod flatten;
mod layout;
mod season_index;
mod settings;
mod teams;

use crate::error_log::ErrorLog;
use crate::fetcher::GameFetcher;
use crate::settings::{ErrorPolicy, Settings};
use anyhow::{Context, bail};
use log::{info, warn};
use nba_stats_api::Season;
use std::path::PathBuf;

#[derive(Debug, PartialEq)]
enum Command {
    Index(Option<PathBuf>),
    Fetch { season: Season, on_error: Option<ErrorPolicy> },
    Flatten { season: Season, refetch: bool },
    Teams(Vec<Season>),
}

#[derive(Debug, PartialEq)]
enum CliAction {
    Help,
    Version,
    Run { verbose: bool, command: Command },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (verbose, command) = handle_cli_args();

    better_panic::install();
    dotenv::dotenv().ok();

    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let settings = Settings::load();
    run(command, &settings).await
}

fn handle_cli_args() -> (bool, Command) {
    match parse_args(std::env::args().skip(1)) {
        Ok(CliAction::Help) => {
            println!("{}", usage_text());
            std::process::exit(0);
        }
        Ok(CliAction::Version) => {
            println!("nba-boxscores {}", env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }
        Ok(CliAction::Run { verbose, command }) => (verbose, command),
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliAction, String> {
    let mut verbose = false;
    let mut words = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "-v" | "--verbose" => verbose = true,
            "--on-error" => {
                let value = args.next().ok_or("--on-error needs a value")?;
                words.push(format!("--on-error={value}"));
            }
            _ => words.push(arg),
        }
    }

    let mut words = words.into_iter();
    let Some(name) = words.next() else {
        return Err("Missing command".into());
    };
    let rest: Vec<String> = words.collect();
    let (flags, positional): (Vec<String>, Vec<String>) =
        rest.into_iter().partition(|w| w.starts_with("--"));

    let command = match name.as_str() {
        "index" => {
            reject_flags(&flags, &[])?;
            if positional.len() > 1 {
                return Err("index takes at most one file".into());
            }
            Command::Index(positional.into_iter().next().map(PathBuf::from))
        }
        "fetch" => {
            reject_flags(&flags, &["--on-error"])?;
            let on_error = flags
                .iter()
                .find_map(|f| f.strip_prefix("--on-error="))
                .map(str::parse)
                .transpose()?;
            Command::Fetch { season: one_season(&name, &positional)?, on_error }
        }
        "flatten" => {
            reject_flags(&flags, &["--refetch"])?;
            Command::Flatten {
                season: one_season(&name, &positional)?,
                refetch: flags.iter().any(|f| f == "--refetch"),
            }
        }
        "teams" => {
            reject_flags(&flags, &[])?;
            Command::Teams(
                positional
                    .iter()
                    .map(|s| s.parse())
                    .collect::<Result<Vec<Season>, String>>()?,
            )
        }
        other => return Err(format!("Unknown command: {other}")),
    };
    Ok(CliAction::Run { verbose, command })
}

fn reject_flags(flags: &[String], allowed: &[&str]) -> Result<(), String> {
    for flag in flags {
        let name = flag.split_once('=').map_or(flag.as_str(), |(name, _)| name);
        if !allowed.contains(&name) {
            return Err(format!("Unknown argument: {flag}"));
        }
    }
    Ok(())
}

fn one_season(command: &str, positional: &[String]) -> Result<Season, String> {
    match positional {
        [season] => season.parse(),
        [] => Err(format!("{command} needs a season code, e.g. 22018")),
        _ => Err(format!("{command} takes a single season code")),
    }
}

fn usage_text() -> &'static str {
    "nba-boxscores - scrape stats.nba.com box scores into per-season CSV tables

Usage:
  nba-boxscores index [FILE]
  nba-boxscores fetch <SEASON> [--on-error continue|abort]
  nba-boxscores flatten <SEASON> [--refetch]
  nba-boxscores teams [SEASON...]
  nba-boxscores --help
  nba-boxscores --version

Options:
  -v, --verbose   Debug logging (RUST_LOG overrides)

SEASON is a season code such as 22018 for the 2018-19 regular season.

Environment (.env is read):
  NBA_DATA_DIR             Data directory (default data)
  NBA_LOG_DIR              Per-season error logs (default logs)
  NBA_FETCH_ON_ERROR       abort or continue after a failed game (default abort)
  STATS_COOKIE             Cookie string copied from a stats.nba.com browser session
  STATS_COOKIE_FILE        File holding the cookie string, re-read on every renewal
  STATS_SESSION_TTL_MINS   Renew the session after this many minutes
  NBA_STATS_BASE_URL       Stats API base url (default https://stats.nba.com/stats)
  NBA_STATS_TIMEOUT_SECS   Per-request timeout (default 10)"
}

async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    let layout = settings.layout();
    match command {
        Command::Index(Some(file)) => {
            let indexed = season_index::index_season_file(&layout, &file)?;
            info!(
                "indexed {} games for season {} into {}",
                indexed.games,
                indexed.season_id,
                indexed.path.display()
            );
        }
        Command::Index(None) => {
            let summary = season_index::index_all(&layout)?;
            if !summary.failed.is_empty() {
                bail!(
                    "{} of {} season files could not be indexed",
                    summary.failed.len(),
                    summary.failed.len() + summary.indexed.len()
                );
            }
        }
        Command::Fetch { season, on_error } => {
            let index = layout.season_index_csv(season.code());
            let games = season_index::read_index(&index)
                .with_context(|| format!("season {season} has not been indexed"))?;
            let policy = on_error.unwrap_or(settings.on_fetch_error);
            let errors = ErrorLog::for_season(&settings.log_dir, season.code());

            let mut fetcher = GameFetcher::new(settings.stats_api(), settings.session_source());
            let report = fetcher
                .fetch_season(&layout, &season, &games, policy, &errors)
                .await;
            info!(
                "season {season}: {} fetched, {} already complete, {} failed",
                report.fetched,
                report.skipped,
                report.failed.len()
            );
            if report.aborted {
                bail!(
                    "fetch stopped after a failed game; see {}",
                    errors.path().display()
                );
            }
            if !report.failed.is_empty() {
                warn!("failed games are listed in {}", errors.path().display());
            }
        }
        Command::Flatten { season, refetch } => {
            let errors = ErrorLog::for_season(&settings.log_dir, season.code());
            if refetch {
                let mut fetcher =
                    GameFetcher::new(settings.stats_api(), settings.session_source());
                let completed =
                    aggregate::refetch_incomplete(&mut fetcher, &layout, &season, &errors).await?;
                info!("completed {completed} games before flattening");
            }
            let table = aggregate::flatten_season(&layout, &season, &errors)?;
            if !table.failed.is_empty() {
                warn!(
                    "{} games left out; see {}",
                    table.failed.len(),
                    errors.path().display()
                );
            }
        }
        Command::Teams(seasons) => {
            let codes: Vec<String> = seasons.iter().map(|s| s.code().to_owned()).collect();
            let paths = teams::season_tables(&layout, &codes)?;
            if paths.is_empty() {
                bail!("no season tables under {}", layout.flat_games_dir().display());
            }
            let rows = teams::SeasonRows::read(&paths)?;
            let tables = teams::reshape(&rows)?;
            teams::write_team_tables(&layout, &tables)?;
        }
    }
    Ok(())
}
