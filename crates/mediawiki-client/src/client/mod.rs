use base64::Engine as _;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use url::Url;

use crate::params::Params;

#[cfg(feature = "ureq")]
mod native;
#[cfg(feature = "ureq")]
pub use native::*;

pub(crate) const CLIENT_REDIRECTS: u32 = 5;

/// The placeholder in an API URL that is replaced by the configured language
pub const LANGUAGE_PLACEHOLDER: &str = "{lang}";

pub const DEFAULT_API_URL: &str = "https://{lang}.wikipedia.org/w/api.php";

pub const USER_AGENT: &str = concat!(
    std::env!("CARGO_PKG_NAME"),
    "/",
    std::env!("CARGO_PKG_VERSION"),
    " (+",
    std::env!("CARGO_PKG_REPOSITORY"),
    ")"
);

/// The errors that may occur in the HTTP layer
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    /// An unknown error with the backend
    #[error("Error with HTTP backend: {0}")]
    Backend(String),
    /// The provided URL couldn't be parsed
    #[error("Error parsing URL: {0}")]
    UrlParseError(#[from] url::ParseError),
    /// The request timed out
    #[error("Failed to get response before timeout")]
    Timeout,
    /// The site answered with a non-success status code
    #[error("Unexpected response code: '{0}'")]
    Status(u16),
}

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("{0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),
    #[error("{0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error("{0}")]
    HeaderMapMaxSizeReached(#[from] http::header::MaxSizeReached),
}

/// Sends requests to a MediaWiki API endpoint and returns the raw response body
///
/// The default implementation is [`UreqTransport`]; anything else (a different HTTP
/// stack, a recording, canned test data) can be plugged in through
/// [`crate::MediaWiki::with_transport`].
pub trait Transport: Send + Sync {
    fn get(&self, api_url: &Url, params: &Params) -> Result<String, HttpError>;

    fn post(&self, api_url: &Url, params: &Params) -> Result<String, HttpError>;

    /// Called whenever settings that affect the HTTP session change
    ///
    /// Implementations holding a session should rebuild it, which also drops any login cookies.
    fn configure(&mut self, config: &MediaWikiConfig) -> Result<(), HttpError> {
        let _ = config;
        Ok(())
    }
}

/// Settings for a [`crate::MediaWiki`] client
#[derive(Debug, Clone)]
pub struct MediaWikiConfig {
    api_url: String,
    language: String,
    category_prefix: String,
    timeout: Option<Duration>,
    // Only non defaults
    headers: HeaderMap<HeaderValue>,
    proxy: Option<String>,
    verify_ssl: bool,
    rate_limit: bool,
    rate_limit_min_wait: Duration,
    username: Option<String>,
    password: Option<String>,
    refresh_interval: Option<Duration>,
    use_cache: bool,
}

impl MediaWikiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API URL; `{lang}` is replaced by the language
    pub fn api_url(self, api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..self
        }
    }

    pub fn language(self, language: impl AsRef<str>) -> Self {
        Self {
            language: language.as_ref().to_lowercase(),
            ..self
        }
    }

    pub fn category_prefix(self, category_prefix: impl AsRef<str>) -> Self {
        Self {
            category_prefix: normalize_category_prefix(category_prefix.as_ref()),
            ..self
        }
    }

    pub fn timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    pub fn user_agent(self, user_agent: impl std::fmt::Display) -> Result<Self, HeaderError> {
        self.add_header(http::header::USER_AGENT, user_agent)
    }

    /// Authenticate every request with HTTP basic auth
    pub fn http_auth(
        self,
        username: impl std::fmt::Display,
        password: impl std::fmt::Display,
    ) -> Result<Self, HeaderError> {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));

        self.add_header(http::header::AUTHORIZATION, format!("Basic {credentials}"))
    }

    pub fn add_header(
        mut self,
        name: impl std::fmt::Display,
        value: impl std::fmt::Display,
    ) -> Result<Self, HeaderError> {
        self.headers.try_insert(
            HeaderName::from_str(name.to_string().as_str())?,
            HeaderValue::from_str(value.to_string().as_str())?,
        )?;

        Ok(self)
    }

    pub fn proxy(self, proxy: Option<String>) -> Self {
        Self { proxy, ..self }
    }

    pub fn verify_ssl(self, verify_ssl: bool) -> Self {
        Self { verify_ssl, ..self }
    }

    pub fn rate_limit(self, rate_limit: bool) -> Self {
        Self { rate_limit, ..self }
    }

    pub fn rate_limit_min_wait(self, rate_limit_min_wait: Duration) -> Self {
        Self {
            rate_limit_min_wait,
            ..self
        }
    }

    /// Log in with these credentials once the client is created
    pub fn login(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..self
        }
    }

    /// How long a memoized response stays fresh; `None` (or zero) keeps it forever
    pub fn refresh_interval(self, refresh_interval: Option<Duration>) -> Self {
        Self {
            refresh_interval: refresh_interval.filter(|interval| !interval.is_zero()),
            ..self
        }
    }

    pub fn use_cache(self, use_cache: bool) -> Self {
        Self { use_cache, ..self }
    }

    /// The API URL with the language substituted in
    pub fn resolved_api_url(&self) -> String {
        self.api_url
            .replace(LANGUAGE_PLACEHOLDER, self.language.as_str())
    }

    pub fn get_language(&self) -> &str {
        &self.language
    }

    pub fn get_category_prefix(&self) -> &str {
        &self.category_prefix
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn get_user_agent(&self) -> Option<&str> {
        self.headers
            .get(http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &self.headers
    }

    pub fn get_proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn get_verify_ssl(&self) -> bool {
        self.verify_ssl
    }

    pub fn get_rate_limit(&self) -> bool {
        self.rate_limit
    }

    pub fn get_rate_limit_min_wait(&self) -> Duration {
        self.rate_limit_min_wait
    }

    pub fn get_refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    pub fn get_use_cache(&self) -> bool {
        self.use_cache
    }

    pub(crate) fn credentials(&self) -> Option<(&str, &str)> {
        self.username.as_deref().zip(self.password.as_deref())
    }

    pub(crate) fn set_api_url(&mut self, api_url: String) {
        self.api_url = api_url;
    }

    pub(crate) fn set_language(&mut self, language: String) {
        self.language = language;
    }

    pub(crate) fn set_category_prefix(&mut self, category_prefix: &str) {
        self.category_prefix = normalize_category_prefix(category_prefix);
    }

    pub(crate) fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub(crate) fn set_rate_limit(&mut self, rate_limit: bool) {
        self.rate_limit = rate_limit;
    }

    pub(crate) fn set_rate_limit_min_wait(&mut self, min_wait: Duration) {
        self.rate_limit_min_wait = min_wait;
    }

    pub(crate) fn set_refresh_interval(&mut self, refresh_interval: Option<Duration>) {
        self.refresh_interval = refresh_interval.filter(|interval| !interval.is_zero());
    }

    pub(crate) fn set_use_cache(&mut self, use_cache: bool) {
        self.use_cache = use_cache;
    }

    pub(crate) fn set_user_agent(&mut self, user_agent: &str) -> Result<(), HeaderError> {
        self.headers
            .insert(http::header::USER_AGENT, HeaderValue::from_str(user_agent)?);
        Ok(())
    }
}

impl Default for MediaWikiConfig {
    fn default() -> Self {
        let mut headers = HeaderMap::new();

        headers.insert(
            http::header::USER_AGENT,
            HeaderValue::from_static(USER_AGENT),
        );

        Self {
            api_url: DEFAULT_API_URL.to_string(),
            language: "en".to_string(),
            category_prefix: "Category".to_string(),
            timeout: Some(Duration::from_secs(15)),
            headers,
            proxy: None,
            verify_ssl: true,
            rate_limit: false,
            rate_limit_min_wait: Duration::from_millis(50),
            username: None,
            password: None,
            refresh_interval: None,
            use_cache: true,
        }
    }
}

fn normalize_category_prefix(category_prefix: &str) -> String {
    category_prefix
        .strip_suffix(':')
        .unwrap_or(category_prefix)
        .to_string()
}
