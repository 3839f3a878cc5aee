use crate::cookies::CookieSource;
use log::warn;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What the fetch stage does after a game fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop the season at the first failed game; usually the session needs
    /// replacing before anything else will succeed.
    #[default]
    Abort,
    /// Record the failure and move on to the next game.
    Continue,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "stop" => Ok(ErrorPolicy::Abort),
            "continue" | "skip" => Ok(ErrorPolicy::Continue),
            other => Err(format!("unknown error policy {other:?} (use abort or continue)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub on_fetch_error: ErrorPolicy,
    /// Raw cookie string, `document.cookie` format.
    pub cookie: Option<String>,
    /// File holding the cookie string; re-read whenever the session is renewed.
    pub cookie_file: Option<PathBuf>,
    pub session_ttl: Option<chrono::Duration>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
            on_fetch_error: ErrorPolicy::default(),
            cookie: None,
            cookie_file: None,
            session_ttl: None,
            base_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Settings from the process environment (`.env` already applied).
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(dir) = get("NBA_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("NBA_LOG_DIR") {
            settings.log_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("NBA_FETCH_ON_ERROR") {
            match raw.parse() {
                Ok(policy) => settings.on_fetch_error = policy,
                Err(e) => warn!("NBA_FETCH_ON_ERROR: {e}; keeping {:?}", settings.on_fetch_error),
            }
        }
        settings.cookie = get("STATS_COOKIE");
        settings.cookie_file = get("STATS_COOKIE_FILE").map(PathBuf::from);
        if let Some(raw) = get("STATS_SESSION_TTL_MINS") {
            match raw.trim().parse::<i64>() {
                Ok(mins) if mins > 0 => settings.session_ttl = Some(chrono::Duration::minutes(mins)),
                _ => warn!("STATS_SESSION_TTL_MINS: expected a positive number, got {raw:?}"),
            }
        }
        settings.base_url = get("NBA_STATS_BASE_URL");
        if let Some(raw) = get("NBA_STATS_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => settings.timeout = Duration::from_secs(secs),
                _ => warn!("NBA_STATS_TIMEOUT_SECS: expected a positive number, got {raw:?}"),
            }
        }

        settings
    }

    pub fn layout(&self) -> crate::layout::DataLayout {
        crate::layout::DataLayout::new(&self.data_dir)
    }

    pub fn session_source(&self) -> CookieSource {
        CookieSource::new(self.cookie_file.clone(), self.cookie.clone(), self.session_ttl)
    }

    pub fn stats_api(&self) -> nba_stats_api::client::StatsApi {
        let api = nba_stats_api::client::StatsApi::new().with_timeout(self.timeout);
        match &self.base_url {
            Some(url) => api.with_base_url(url.clone()),
            None => api,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let s = settings_from(&[]);
        assert_eq!(s.data_dir, PathBuf::from("data"));
        assert_eq!(s.log_dir, PathBuf::from("logs"));
        assert_eq!(s.on_fetch_error, ErrorPolicy::Abort);
        assert_eq!(s.timeout, Duration::from_secs(10));
        assert!(s.cookie.is_none());
    }

    #[test]
    fn environment_overrides() {
        let s = settings_from(&[
            ("NBA_DATA_DIR", "/srv/nba"),
            ("NBA_FETCH_ON_ERROR", "Continue"),
            ("STATS_COOKIE", "a=b"),
            ("STATS_SESSION_TTL_MINS", "45"),
            ("NBA_STATS_TIMEOUT_SECS", "30"),
        ]);
        assert_eq!(s.data_dir, PathBuf::from("/srv/nba"));
        assert_eq!(s.on_fetch_error, ErrorPolicy::Continue);
        assert_eq!(s.cookie.as_deref(), Some("a=b"));
        assert_eq!(s.session_ttl, Some(chrono::Duration::minutes(45)));
        assert_eq!(s.timeout, Duration::from_secs(30));
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let s = settings_from(&[
            ("NBA_FETCH_ON_ERROR", "sometimes"),
            ("STATS_SESSION_TTL_MINS", "-3"),
            ("NBA_STATS_TIMEOUT_SECS", "soon"),
            ("STATS_COOKIE", "   "),
        ]);
        assert_eq!(s.on_fetch_error, ErrorPolicy::Abort);
        assert!(s.session_ttl.is_none());
        assert_eq!(s.timeout, Duration::from_secs(10));
        assert!(s.cookie.is_none());
    }
}
