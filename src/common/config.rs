use crate::common::types::{Result, StravaError};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const API_URL: &str = "https://www.strava.com/api/v3";
pub const OAUTH_URL: &str = "https://www.strava.com/oauth/token";
pub const WEB_URL: &str = "https://www.strava.com";

const USER_AGENT: &str = concat!("strava-tools/", env!("CARGO_PKG_VERSION"));

/// Endpoints and tuning shared by the API and website clients.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub oauth_url: String,
    pub web_url: String,
    pub max_retries: u32,
    pub upload_poll_interval: Duration,
    pub upload_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            oauth_url: OAUTH_URL.to_string(),
            web_url: WEB_URL.to_string(),
            max_retries: 2,
            upload_poll_interval: Duration::from_secs(1),
            upload_timeout: Duration::from_secs(600),
        }
    }
}

impl Settings {
    /// Defaults overridden by `STRAVA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(url) = lookup("STRAVA_API_URL") {
            settings.api_url = url;
        }
        if let Some(url) = lookup("STRAVA_OAUTH_URL") {
            settings.oauth_url = url;
        }
        if let Some(url) = lookup("STRAVA_WEB_URL") {
            settings.web_url = url;
        }
        if let Some(retries) = parse_var::<u32>(&lookup, "STRAVA_MAX_RETRIES")? {
            settings.max_retries = retries;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "STRAVA_UPLOAD_POLL_SECS")? {
            settings.upload_poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "STRAVA_UPLOAD_TIMEOUT_SECS")? {
            settings.upload_timeout = Duration::from_secs(secs);
        }

        Ok(settings)
    }

    /// Point every endpoint at a single host, e.g. a local mock or proxy.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            api_url: format!("{base}/api/v3"),
            oauth_url: format!("{base}/oauth/token"),
            web_url: base.to_string(),
            ..Self::default()
        }
    }

    pub fn activity_url(&self, activity_id: u64) -> String {
        format!("{}/activities/{activity_id}", self.web_url.trim_end_matches('/'))
    }

    /// HTTP client with transient-error retries, as used for token refresh.
    pub fn retrying_http_client(&self) -> Result<ClientWithMiddleware> {
        Ok(self.retrying_client(self.http_client()?))
    }

    /// Client builder carrying the settings every client shares.
    pub(crate) fn http_client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder().user_agent(USER_AGENT)
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        Ok(self.http_client_builder().build()?)
    }

    pub(crate) fn retrying_client(&self, http: reqwest::Client) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(self.max_retries);
        ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StravaError::Configuration(format!("{key} has invalid value `{raw}`"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_override() {
        let settings = Settings::with_base_url("http://127.0.0.1:9000/");
        assert_eq!(settings.api_url, "http://127.0.0.1:9000/api/v3");
        assert_eq!(settings.oauth_url, "http://127.0.0.1:9000/oauth/token");
        assert_eq!(settings.web_url, "http://127.0.0.1:9000");
        assert_eq!(settings.max_retries, 2);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let settings = Settings::from_lookup(vars(&[
            ("STRAVA_API_URL", "http://proxy/api/v3"),
            ("STRAVA_WEB_URL", "http://proxy"),
            ("STRAVA_MAX_RETRIES", " 5 "),
            ("STRAVA_UPLOAD_POLL_SECS", "3"),
            ("STRAVA_UPLOAD_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(settings.api_url, "http://proxy/api/v3");
        assert_eq!(settings.oauth_url, OAUTH_URL);
        assert_eq!(settings.web_url, "http://proxy");
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.upload_poll_interval, Duration::from_secs(3));
        assert_eq!(settings.upload_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_unset_environment_keeps_defaults() {
        let settings = Settings::from_lookup(vars(&[])).unwrap();
        assert_eq!(settings.api_url, API_URL);
        assert_eq!(settings.upload_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_invalid_retry_count_is_configuration_error() {
        let err = Settings::from_lookup(vars(&[("STRAVA_MAX_RETRIES", "many")])).unwrap_err();
        match err {
            StravaError::Configuration(message) => {
                assert!(message.contains("STRAVA_MAX_RETRIES"));
                assert!(message.contains("many"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_activity_url() {
        let settings = Settings::default();
        assert_eq!(settings.activity_url(42), "https://www.strava.com/activities/42");
    }
}
