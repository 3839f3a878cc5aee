use chrono::Utc;
use log::debug;
use nba_stats_api::client::{ApiError, ApiResult};
use nba_stats_api::session::{Session, SessionSource};
use std::path::PathBuf;

/// Session source backed by a cookie string copied out of a browser.
///
/// The file wins over the inline value and is re-read on every load, so an
/// external browser script can drop fresh cookies there while a fetch runs.
#[derive(Debug, Clone)]
pub struct CookieSource {
    file: Option<PathBuf>,
    inline: Option<String>,
    ttl: Option<chrono::Duration>,
}

impl CookieSource {
    pub fn new(file: Option<PathBuf>, inline: Option<String>, ttl: Option<chrono::Duration>) -> Self {
        Self { file, inline, ttl }
    }

    fn raw_cookie(&self) -> ApiResult<String> {
        if let Some(path) = &self.file {
            debug!("loading stats cookie from {}", path.display());
            return std::fs::read_to_string(path)
                .map(|s| s.trim().to_owned())
                .map_err(|e| ApiError::Session(format!("could not read {}: {e}", path.display())));
        }
        self.inline.clone().ok_or_else(|| {
            ApiError::Session("no stats cookie configured (set STATS_COOKIE or STATS_COOKIE_FILE)".into())
        })
    }
}

impl SessionSource for CookieSource {
    fn load(&mut self) -> ApiResult<Session> {
        let session = Session::from_cookie_string(&self.raw_cookie()?, Utc::now());
        if session.is_empty() {
            return Err(ApiError::Session("stats cookie is empty".into()));
        }
        Ok(match self.ttl {
            Some(ttl) => session.with_ttl(ttl),
            None => session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_is_reread_on_every_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.txt");
        std::fs::write(&path, "a=1\n").unwrap();

        let mut src = CookieSource::new(Some(path.clone()), Some("ignored=1".into()), None);
        assert_eq!(src.load().unwrap().cookie_header(), "a=1");

        std::fs::write(&path, "a=2; b=3").unwrap();
        assert_eq!(src.load().unwrap().cookie_header(), "a=2; b=3");
    }

    #[test]
    fn inline_cookie_used_without_file() {
        let mut src = CookieSource::new(None, Some("x=y".into()), Some(chrono::Duration::minutes(5)));
        let session = src.load().unwrap();
        assert_eq!(session.cookie_header(), "x=y");
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn missing_configuration_is_a_session_error() {
        let mut src = CookieSource::new(None, None, None);
        assert!(matches!(src.load(), Err(ApiError::Session(_))));

        let mut src = CookieSource::new(None, Some(";".into()), None);
        assert!(matches!(src.load(), Err(ApiError::Session(_))));
    }
}
