/// Credentials for stats.nba.com.
///
/// The site sits behind bot protection, so requests only succeed with cookies
/// taken from a real browser session. A `Session` carries those cookies and
/// knows when it should be replaced; a `SessionSource` produces fresh ones.
use chrono::{DateTime, Duration, Utc};

use crate::client::{ApiError, ApiResult};

/// Cookie attributes that can appear in a `Set-Cookie` style string but are
/// not cookies themselves.
const COOKIE_ATTRIBUTES: [&str; 9] = [
    "path", "domain", "expires", "max-age", "secure", "httponly", "samesite", "comment", "version",
];

#[derive(Debug, Clone)]
pub struct Session {
    cookies: Vec<(String, String)>,
    obtained_at: DateTime<Utc>,
    ttl: Option<Duration>,
}

impl Session {
    pub fn new(cookies: Vec<(String, String)>, obtained_at: DateTime<Utc>) -> Self {
        Self { cookies, obtained_at, ttl: None }
    }

    /// Parse a `document.cookie` style string: `name=value; other=value`.
    pub fn from_cookie_string(raw: &str, obtained_at: DateTime<Utc>) -> Self {
        let cookies = raw
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() || COOKIE_ATTRIBUTES.contains(&name.to_ascii_lowercase().as_str()) {
                    return None;
                }
                let value = value.trim().trim_matches('"');
                Some((name.to_owned(), value.to_owned()))
            })
            .collect();
        Self::new(cookies, obtained_at)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Sessions without a ttl never expire on their own; they are only
    /// replaced after the server rejects them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl
            .map(|ttl| now >= self.obtained_at + ttl)
            .unwrap_or(false)
    }
}

/// Something that can hand out a fresh session: a cookie file rewritten by a
/// browser script, an environment variable, a test fixture.
pub trait SessionSource {
    fn load(&mut self) -> ApiResult<Session>;
}

/// A fixed session, handed out unchanged on every load.
#[derive(Debug, Clone)]
pub struct StaticSession(pub Session);

impl SessionSource for StaticSession {
    fn load(&mut self) -> ApiResult<Session> {
        if self.0.is_empty() {
            return Err(ApiError::Session("session has no cookies".into()));
        }
        Ok(self.0.clone())
    }
}
