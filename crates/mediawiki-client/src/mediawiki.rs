use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

use crate::cache::ResponseCache;
use crate::client::{MediaWikiConfig, Transport};
use crate::error::{MediaWikiError, PageError, Result};
use crate::page::{MediaWikiPage, PageQuery};
use crate::params::Params;

/// API error messages that mean the site is overloaded rather than the request being wrong
const TIMEOUT_ERRORS: [&str; 2] = ["HTTP request timed out.", "Pool queue is full"];

/// Information about the site, read once per API URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteInfo {
    /// e.g. `1.43.0`
    pub api_version: String,
    pub api_version_major_minor: Vec<u32>,
    pub extensions: BTreeSet<String>,
    /// The site's server, e.g. `https://en.wikipedia.org`
    pub base_url: String,
}

/// A client for a single MediaWiki site
///
/// Requests go through a [`Transport`]; the responses of most read operations are memoized
/// (see [`MediaWikiConfig::refresh_interval`] and [`MediaWikiConfig::use_cache`]).
pub struct MediaWiki {
    config: MediaWikiConfig,
    api_url: Url,
    transport: Box<dyn Transport>,
    site_info: SiteInfo,
    cache: ResponseCache,
    rate_limit_last_call: Mutex<Option<Instant>>,
    is_logged_in: bool,
}

impl std::fmt::Debug for MediaWiki {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWiki")
            .field("api_url", &self.api_url.as_str())
            .field("language", &self.config.get_language())
            .field("site_info", &self.site_info)
            .field("is_logged_in", &self.is_logged_in)
            .finish_non_exhaustive()
    }
}

impl MediaWiki {
    /// Connect to the site described by `config` over the default HTTP transport
    #[cfg(feature = "ureq")]
    pub fn new(config: MediaWikiConfig) -> Result<Self> {
        let transport = crate::client::UreqTransport::from_config(&config)?;

        Self::with_transport(config, Box::new(transport))
    }

    /// Connect to the site described by `config` using a custom transport
    ///
    /// Reads the site information, and logs in if the config carries credentials.
    pub fn with_transport(config: MediaWikiConfig, transport: Box<dyn Transport>) -> Result<Self> {
        let api_url = parse_api_url(&config.resolved_api_url())?;

        let mut wiki = Self {
            config,
            api_url,
            transport,
            site_info: SiteInfo::default(),
            cache: ResponseCache::new(),
            rate_limit_last_call: Mutex::new(None),
            is_logged_in: false,
        };

        let site_info = wiki.fetch_site_info().map_err(|err| {
            log::warn!("Failed to load site info from '{}': {err}", wiki.api_url);
            MediaWikiError::ApiUrl {
                api_url: wiki.api_url.to_string(),
            }
        })?;

        wiki.site_info = site_info;

        if let Some((username, password)) = wiki
            .config
            .credentials()
            .map(|(username, password)| (username.to_string(), password.to_string()))
        {
            wiki.login(&username, &password)?;
        }

        Ok(wiki)
    }

    pub fn config(&self) -> &MediaWikiConfig {
        &self.config
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn language(&self) -> &str {
        self.config.get_language()
    }

    pub fn category_prefix(&self) -> &str {
        self.config.get_category_prefix()
    }

    pub fn site_info(&self) -> &SiteInfo {
        &self.site_info
    }

    pub fn api_version(&self) -> &str {
        &self.site_info.api_version
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.site_info.extensions
    }

    pub fn base_url(&self) -> &str {
        &self.site_info.base_url
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    /// When the last request was sent, if rate limiting is on
    pub fn rate_limit_last_call(&self) -> Option<Instant> {
        *self
            .rate_limit_last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // Settings

    /// Point the client at a different site
    ///
    /// The site info is re-read; if that fails the previous URL stays active. Credentials in
    /// the config are used to log in to the new site.
    pub fn set_api_url(&mut self, api_url: &str, language: Option<&str>) -> Result<()> {
        let old_config = self.config.clone();
        let old_url = self.api_url.clone();

        if let Some(language) = language {
            self.config.set_language(language.to_lowercase());
        }

        self.config.set_api_url(api_url.to_string());

        match self.reconnect() {
            Ok(site_info) => {
                self.site_info = site_info;
                self.is_logged_in = false;
                self.clear_memoized();

                if let Some((username, password)) = self
                    .config
                    .credentials()
                    .map(|(username, password)| (username.to_string(), password.to_string()))
                {
                    self.login(&username, &password)?;
                }

                Ok(())
            }
            Err(err) => {
                log::warn!("'{api_url}' is not a usable API URL: {err}");

                let api_url = self.config.resolved_api_url();

                self.config = old_config;
                self.api_url = old_url;
                self.transport.configure(&self.config)?;

                Err(MediaWikiError::ApiUrl { api_url })
            }
        }
    }

    fn reconnect(&mut self) -> Result<SiteInfo> {
        self.api_url = parse_api_url(&self.config.resolved_api_url())?;
        self.transport.configure(&self.config)?;

        self.fetch_site_info()
    }

    /// Change the language, rewriting the API URL where it encodes one (`https://en.` -> `https://fr.`)
    ///
    /// Titles passed afterwards must be valid for the new language.
    pub fn set_language(&mut self, language: &str) -> Result<()> {
        let language = language.to_lowercase();
        let old_language = self.config.get_language().to_string();

        if old_language == language {
            return Ok(());
        }

        let api_url = self
            .api_url
            .as_str()
            .replace(&format!("/{old_language}."), &format!("/{language}."));

        self.api_url = parse_api_url(&api_url)?;
        self.config.set_api_url(api_url);
        self.config.set_language(language);
        self.clear_memoized();

        Ok(())
    }

    pub fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.config
            .set_user_agent(user_agent)
            .map_err(|err| MediaWikiError::InvalidArgument(err.to_string()))?;
        self.transport.configure(&self.config)?;
        self.is_logged_in = false;

        Ok(())
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.config.set_timeout(timeout);
        self.transport.configure(&self.config)?;
        self.is_logged_in = false;

        Ok(())
    }

    pub fn set_rate_limit(&mut self, rate_limit: bool) {
        self.config.set_rate_limit(rate_limit);
        self.reset_rate_limit_last_call();
        self.clear_memoized();
    }

    pub fn set_rate_limit_min_wait(&mut self, min_wait: Duration) {
        self.config.set_rate_limit_min_wait(min_wait);
        self.reset_rate_limit_last_call();
    }

    pub fn set_refresh_interval(&mut self, refresh_interval: Option<Duration>) {
        self.config.set_refresh_interval(refresh_interval);
    }

    pub fn set_use_cache(&mut self, use_cache: bool) {
        self.config.set_use_cache(use_cache);
    }

    pub fn set_category_prefix(&mut self, category_prefix: &str) {
        self.config.set_category_prefix(category_prefix);
    }

    fn reset_rate_limit_last_call(&self) {
        *self
            .rate_limit_last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    // Cache

    /// Drop every memoized result
    pub fn clear_memoized(&self) {
        self.cache.clear();
    }

    /// The number of memoized results
    pub fn memoized_len(&self) -> usize {
        self.cache.len()
    }

    /// When the result of `operation` for `key` was memoized
    pub fn memoized_at(&self, operation: &'static str, key: &str) -> Option<Instant> {
        self.cache.stored_at(operation, key)
    }

    /// Return the memoized result of `operation` for `key`, computing and storing it if needed
    pub(crate) fn memoized<T, F>(&self, operation: &'static str, key: String, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if !self.config.get_use_cache() {
            return compute();
        }

        if let Some(value) = self
            .cache
            .lookup(operation, &key, self.config.get_refresh_interval())
        {
            log::debug!("Using memoized '{operation}' result for '{key}'");
            return Ok(serde_json::from_value(value)?);
        }

        let result = compute()?;

        self.cache.store(operation, key, serde_json::to_value(&result)?);

        Ok(result)
    }

    // Requests

    /// Send a GET request to the API and parse the JSON response
    ///
    /// `format=json` is always added, `action=query` unless another action is given.
    pub fn wiki_request(&self, params: &Params) -> Result<Value> {
        let params = Self::complete_params(params);

        self.wait_for_rate_limit();

        let body = self.transport.get(&self.api_url, &params)?;

        Ok(serde_json::from_str(&body)?)
    }

    /// Send a POST request to the API, used for login
    pub fn post_request(&self, params: &Params) -> Result<Value> {
        let params = Self::complete_params(params);

        self.wait_for_rate_limit();

        let body = self.transport.post(&self.api_url, &params)?;

        Ok(serde_json::from_str(&body)?)
    }

    fn complete_params(params: &Params) -> Params {
        let mut params = params.clone();

        params.insert("format", "json");
        params.insert_default("action", "query");

        params
    }

    fn wait_for_rate_limit(&self) {
        if !self.config.get_rate_limit() {
            return;
        }

        let mut last_call = self
            .rate_limit_last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = *last_call {
            let next_allowed = last + self.config.get_rate_limit_min_wait();
            let now = Instant::now();

            if next_allowed > now {
                log::debug!("Rate limited, waiting {:?}", next_allowed - now);
                std::thread::sleep(next_allowed - now);
            }
        }

        *last_call = Some(Instant::now());
    }

    /// Turn an `error` object in a response into the matching error
    pub fn check_error_response(response: &Value, query: &str) -> Result<()> {
        let Some(error) = response.get("error") else {
            return Ok(());
        };

        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if TIMEOUT_ERRORS.contains(&info.as_str()) {
            return Err(MediaWikiError::HttpTimeout {
                query: query.to_string(),
            });
        }

        Err(MediaWikiError::Api { error: info })
    }

    /// Reject empty or blank user input
    pub fn check_query(value: &str, message: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(MediaWikiError::InvalidArgument(message.to_string()));
        }

        Ok(())
    }

    fn fetch_site_info(&self) -> Result<SiteInfo> {
        let response = self.wiki_request(
            &Params::new()
                .with("meta", "siteinfo")
                .with("siprop", "extensions|general"),
        )?;

        Self::check_error_response(&response, "siteinfo")?;

        let query = response
            .get("query")
            .ok_or_else(|| MediaWikiError::unexpected("siteinfo without 'query'"))?;

        let general = query
            .get("general")
            .ok_or_else(|| MediaWikiError::unexpected("siteinfo without 'general'"))?;

        let generator = general
            .get("generator")
            .and_then(Value::as_str)
            .ok_or_else(|| MediaWikiError::unexpected("siteinfo without 'generator'"))?;

        let api_version = parse_api_version(generator)
            .ok_or_else(|| MediaWikiError::unexpected(format!("generator '{generator}'")))?;

        let api_version_major_minor = api_version
            .split('.')
            .filter_map(|part| part.parse::<u32>().ok())
            .collect();

        let extensions = query
            .get("extensions")
            .and_then(Value::as_array)
            .map(|extensions| {
                extensions
                    .iter()
                    .filter_map(|ext| ext.get("name").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let server = general
            .get("server")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let base_url = if server.starts_with("//") {
            format!("{}:{server}", self.api_url.scheme())
        } else {
            server.to_string()
        };

        Ok(SiteInfo {
            api_version,
            api_version_major_minor,
            extensions,
            base_url,
        })
    }

    // Operations

    /// Log in to the site with a bot password or user account
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let token_response = self.wiki_request(
            &Params::new()
                .with("meta", "tokens")
                .with("type", "login"),
        )?;

        Self::check_error_response(&token_response, "login token")?;

        let token = token_response
            .pointer("/query/tokens/logintoken")
            .and_then(Value::as_str)
            .ok_or_else(|| MediaWikiError::unexpected("no login token"))?;

        let response = self.post_request(
            &Params::new()
                .with("action", "login")
                .with("lgname", username)
                .with("lgpassword", password)
                .with("lgtoken", token),
        )?;

        let result = response.pointer("/login/result").and_then(Value::as_str);

        if result == Some("Success") {
            log::info!("Logged in as '{username}'");
            self.is_logged_in = true;
            return Ok(());
        }

        self.is_logged_in = false;

        let reason = response
            .pointer("/login/reason")
            .and_then(Value::as_str)
            .or(result)
            .unwrap_or("unknown reason");

        Err(MediaWikiError::Login {
            error: format!("MediaWiki login failure: {reason}"),
        })
    }

    /// All languages the site supports, as `code -> local name`
    pub fn supported_languages(&self) -> Result<BTreeMap<String, String>> {
        self.memoized("supported_languages", String::new(), || {
            let response = self.wiki_request(
                &Params::new()
                    .with("meta", "siteinfo")
                    .with("siprop", "languages"),
            )?;

            Self::check_error_response(&response, "languages")?;

            let languages = response
                .pointer("/query/languages")
                .and_then(Value::as_array)
                .ok_or_else(|| MediaWikiError::unexpected("no languages"))?;

            Ok(languages
                .iter()
                .filter_map(|lang| {
                    Some((
                        lang.get("code")?.as_str()?.to_string(),
                        lang.get("*")?.as_str()?.to_string(),
                    ))
                })
                .collect())
        })
    }

    /// Titles of `pages` random articles
    pub fn random(&self, pages: usize) -> Result<Vec<String>> {
        if pages < 1 {
            return Err(MediaWikiError::InvalidArgument(
                "Number of pages must be greater than 0".to_string(),
            ));
        }

        let response = self.wiki_request(
            &Params::new()
                .with("list", "random")
                .with("rnnamespace", 0)
                .with("rnlimit", pages),
        )?;

        Self::check_error_response(&response, "random")?;

        titles_of(&response, "random")
    }

    /// Load a page
    pub fn page(&self, query: impl Into<PageQuery>) -> Result<MediaWikiPage<'_>> {
        let mut query = query.into();

        // A blank title falls back to the page id
        query.title = query.title.take().filter(|title| !title.trim().is_empty());

        if let Some(title) = query.title.as_deref() {
            if query.auto_suggest {
                let suggested = self
                    .suggest(title)?
                    .ok_or_else(|| PageError::Title(title.to_string()))?;

                query.title = Some(suggested);
            }
        } else if query.pageid.is_none() {
            return Err(MediaWikiError::InvalidArgument(
                "Either a title or a pageid must be specified".to_string(),
            ));
        }

        MediaWikiPage::load(self, &query)
    }

    /// Summarize a page: the first `sentences` sentences, the first `chars` characters, or the
    /// whole lead section if both are zero
    pub fn summary(
        &self,
        title: &str,
        sentences: usize,
        chars: usize,
        auto_suggest: bool,
        redirect: bool,
    ) -> Result<Option<String>> {
        let key = format!("{title} - {sentences} - {chars} - {auto_suggest} - {redirect}");

        self.memoized("summary", key, || {
            let page = self.page(
                PageQuery::title(title)
                    .auto_suggest(auto_suggest)
                    .redirect(redirect),
            )?;

            page.summarize(sentences, chars)
        })
    }
}

fn parse_api_url(api_url: &str) -> Result<Url> {
    Url::parse(api_url).map_err(|err| {
        log::warn!("Failed to parse API URL '{api_url}': {err}");
        MediaWikiError::ApiUrl {
            api_url: api_url.to_string(),
        }
    })
}

/// `MediaWiki 1.43.0-wmf.1` -> `1.43.0`
fn parse_api_version(generator: &str) -> Option<String> {
    generator
        .split_whitespace()
        .nth(1)
        .and_then(|version| version.split('-').next())
        .map(ToString::to_string)
}

/// The `title` of every entry of `query[key]`
pub(crate) fn titles_of(response: &Value, key: &str) -> Result<Vec<String>> {
    response
        .get("query")
        .and_then(|query| query.get(key))
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("title").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect()
        })
        .ok_or_else(|| MediaWikiError::unexpected(format!("no '{key}' list in response")))
}

pub(crate) fn cache_key<T: Display>(parts: &[T]) -> String {
    itertools::join(parts, " - ")
}
