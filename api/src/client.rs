use crate::session::Session;
use crate::{Endpoint, Season};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER};
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

const STATS_BASE: &str = "https://stats.nba.com/stats";
const STATS_SITE: &str = "https://stats.nba.com";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/84.0.4147.89 Safari/537.36";
const NEW_RELIC_ID: &str = "VQECWF5UChAHUlNTBwgBVw==";

/// Range filter covering a whole game, overtimes included.
const RANGE_PARAMS: [(&str, &str); 5] = [
    ("EndPeriod", "10"),
    ("EndRange", "31800"),
    ("RangeType", "0"),
    ("StartPeriod", "1"),
    ("StartRange", "0"),
];
const SEASON_TYPE: &str = "Regular Season";

/// Box-score client for stats.nba.com.
#[derive(Debug, Clone)]
pub struct StatsApi {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Default for StatsApi {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .user_agent(BROWSER_USER_AGENT)
                .build()
                .unwrap_or_default(),
            base_url: STATS_BASE.to_owned(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    /// 401/403: the session cookies were rejected.
    Unauthorized(StatusCode, String),
    Parsing(serde_json::Error, String),
    Url(String),
    Session(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Unauthorized(status, url) => {
                write!(f, "Session rejected ({status}) for {url}")
            }
            ApiError::Parsing(e, url) => write!(f, "Invalid JSON from {url}: {e}"),
            ApiError::Url(msg) => write!(f, "Bad request url: {msg}"),
            ApiError::Session(msg) => write!(f, "Session error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(..))
    }
}

impl StatsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full request url for one box-score document.
    pub fn request_url(&self, endpoint: Endpoint, game_id: &str, season: &Season) -> ApiResult<Url> {
        let mut params: Vec<(&str, String)> = vec![("GameID", game_id.to_owned())];
        if endpoint.takes_range_params() {
            params.extend(RANGE_PARAMS.iter().map(|(k, v)| (*k, (*v).to_owned())));
            params.push(("Season", season.display_name()));
            params.push(("SeasonType", SEASON_TYPE.to_owned()));
        }
        let raw = format!("{}{}", self.base_url, endpoint.path());
        Url::parse_with_params(&raw, &params).map_err(|e| ApiError::Url(format!("{raw}: {e}")))
    }

    /// Fetch one box-score document. The body is returned verbatim, but only
    /// after it has been confirmed to parse as JSON.
    pub async fn fetch_document(
        &self,
        endpoint: Endpoint,
        game_id: &str,
        season: &Season,
        session: &Session,
    ) -> ApiResult<String> {
        let url = self.request_url(endpoint, game_id, season)?;
        let url_str = url.to_string();

        let mut request = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "en-GB,en-US;q=0.9,en;q=0.8")
            .header(REFERER, format!("{STATS_SITE}/game/{game_id}/tracking/"))
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin")
            .header("x-nba-stats-origin", "stats")
            .header("x-nba-stats-token", "true")
            .header("X-NewRelic-ID", NEW_RELIC_ID);
        if !session.is_empty() {
            request = request.header(COOKIE, session.cookie_header());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url_str.clone()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(status, url_str));
        }

        let body = response
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url_str.clone()))?
            .text()
            .await
            .map_err(|e| ApiError::Network(e, url_str.clone()))?;

        serde_json::from_str::<serde::de::IgnoredAny>(&body)
            .map_err(|e| ApiError::Parsing(e, url_str))?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockito::Matcher;

    const GAME: &str = "0021800001";

    fn season() -> Season {
        "22018".parse().unwrap()
    }

    fn session() -> Session {
        Session::from_cookie_string("ak_bmsc=abc; bm_sv=def", Utc::now())
    }

    #[test]
    fn summary_url_carries_only_game_id() {
        let api = StatsApi::new();
        let url = api.request_url(Endpoint::Summary, GAME, &season()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://stats.nba.com/stats/boxscoresummaryv2?GameID=0021800001"
        );
    }

    #[test]
    fn range_params_use_display_season() {
        let api = StatsApi::new().with_base_url("http://localhost:9/");
        let url = api.request_url(Endpoint::Tracking, GAME, &season()).unwrap();
        assert_eq!(url.path(), "/boxscoreplayertrackv2");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("Season".into(), "2018-19".into())));
        assert!(pairs.contains(&("SeasonType".into(), "Regular Season".into())));
        assert!(pairs.contains(&("EndRange".into(), "31800".into())));
        assert_eq!(pairs.len(), 8);
    }

    #[tokio::test]
    async fn fetch_sends_cookies_and_returns_body_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"resultSets": [ {"name": "TeamStats", "rowSet": []} ]}"#;
        let mock = server
            .mock("GET", "/boxscoretraditionalv2")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("GameID".into(), GAME.into()),
                Matcher::UrlEncoded("Season".into(), "2018-19".into()),
                Matcher::UrlEncoded("StartPeriod".into(), "1".into()),
            ]))
            .match_header("cookie", "ak_bmsc=abc; bm_sv=def")
            .match_header("x-nba-stats-token", "true")
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let api = StatsApi::new().with_base_url(server.url());
        let got = api
            .fetch_document(Endpoint::Traditional, GAME, &season(), &session())
            .await
            .unwrap();

        assert_eq!(got, body);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_is_reported_as_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/boxscoresummaryv2")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let api = StatsApi::new().with_base_url(server.url());
        let err = api
            .fetch_document(Endpoint::Summary, GAME, &season(), &session())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized(), "{err}");
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/boxscoremiscv2")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let api = StatsApi::new().with_base_url(server.url());
        let err = api
            .fetch_document(Endpoint::Misc, GAME, &season(), &session())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Api(..)), "{err}");
    }

    #[tokio::test]
    async fn non_json_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/boxscorescoringv2")
            .match_query(Matcher::Any)
            .with_body("<html>Access Denied</html>")
            .create_async()
            .await;

        let api = StatsApi::new().with_base_url(server.url());
        let err = api
            .fetch_document(Endpoint::Scoring, GAME, &season(), &session())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Parsing(..)), "{err}");
    }
}
