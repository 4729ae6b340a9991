//! Title lookups: full text, prefix, geographic and opensearch
//!
//! All of these are memoized per argument set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::continuation::Continuation;
use crate::error::{MediaWikiError, Result};
use crate::mediawiki::{MediaWiki, titles_of};
use crate::params::Params;

/// The most results a single search request may ask for
const MAX_RESULTS: usize = 500;

/// GeoData errors caused by a bad location rather than a broken request
const GEO_ERRORS: [&str; 3] = [
    "Page coordinates unknown.",
    "One of the parameters gscoord, gspage, gsbbox is required",
    "Invalid coordinate provided",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub titles: Vec<String>,
    /// The "Did you mean" suggestion, if one was requested and the site had one
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSearchResult {
    pub title: String,
    pub description: String,
    pub url: String,
}

/// Parameters for [`MediaWiki::geosearch`]
///
/// Searches around either a page or a point. Requires the GeoData extension on the site.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoSearch {
    latitude: Option<f64>,
    longitude: Option<f64>,
    title: Option<String>,
    auto_suggest: bool,
    /// Meters
    radius: u32,
    results: usize,
}

impl GeoSearch {
    pub const MIN_RADIUS: u32 = 10;
    pub const MAX_RADIUS: u32 = 10_000;

    /// Search around a point
    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }

    /// Search around the coordinates of a page
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Clamped to [`Self::MIN_RADIUS`]..=[`Self::MAX_RADIUS`]
    pub fn radius(self, radius: u32) -> Self {
        Self {
            radius: radius.clamp(Self::MIN_RADIUS, Self::MAX_RADIUS),
            ..self
        }
    }

    pub fn results(self, results: usize) -> Self {
        Self {
            results: results.min(MAX_RESULTS),
            ..self
        }
    }

    pub fn auto_suggest(self, auto_suggest: bool) -> Self {
        Self {
            auto_suggest,
            ..self
        }
    }

    pub fn get_radius(&self) -> u32 {
        self.radius
    }

    pub fn get_results(&self) -> usize {
        self.results
    }
}

impl Default for GeoSearch {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            title: None,
            auto_suggest: true,
            radius: 1000,
            results: 10,
        }
    }
}

impl MediaWiki {
    /// Full text search
    ///
    /// `results` is capped at 500. With `suggestion`, the site's spelling suggestion is
    /// requested as well.
    pub fn search(&self, query: &str, results: usize, suggestion: bool) -> Result<SearchResults> {
        Self::check_query(query, "Query must be specified")?;

        let key = format!("{query} - {results} - {suggestion}");

        self.memoized("search", key, || {
            let mut params = Params::new()
                .with("list", "search")
                .with("srprop", "")
                .with("srlimit", results.min(MAX_RESULTS))
                .with("srsearch", query);

            if suggestion {
                params.insert("srinfo", "suggestion");
            }

            let response = self.wiki_request(&params)?;

            Self::check_error_response(&response, query)?;

            let suggestion = if suggestion {
                response
                    .pointer("/query/searchinfo/suggestion")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
            } else {
                None
            };

            Ok(SearchResults {
                titles: titles_of(&response, "search")?,
                suggestion,
            })
        })
    }

    /// The title that best matches `query`: the top search result, or else the suggestion
    pub fn suggest(&self, query: &str) -> Result<Option<String>> {
        let SearchResults {
            mut titles,
            suggestion,
        } = self.search(query, 1, true)?;

        if titles.is_empty() {
            return Ok(suggestion);
        }

        Ok(Some(titles.swap_remove(0)))
    }

    /// Up to `results` titles in alphabetical order, starting at `query`
    ///
    /// Follows continuations until enough titles are collected.
    pub fn allpages(&self, query: &str, results: usize) -> Result<Vec<String>> {
        let key = format!("{query} - {results}");

        self.memoized("allpages", key, || {
            let params = Params::new()
                .with("list", "allpages")
                .with("aplimit", results.min(MAX_RESULTS))
                .with("apfrom", query);

            let mut batches = Continuation::new(self, params).describing(query);
            let mut titles = Vec::new();

            while titles.len() < results {
                let Some(response) = batches.next() else {
                    break;
                };

                titles.extend(titles_of(&response?, "allpages")?);

                let remaining = results.saturating_sub(titles.len());

                if remaining == 0 {
                    break;
                }

                batches.set_param("aplimit", remaining.min(MAX_RESULTS));
            }

            titles.truncate(results);

            Ok(titles)
        })
    }

    /// Titles of pages near a point or another page
    pub fn geosearch(&self, search: &GeoSearch) -> Result<Vec<String>> {
        let key = format!("{search:?}");

        self.memoized("geosearch", key, || {
            let mut params = Params::new()
                .with("list", "geosearch")
                .with("gsradius", search.radius)
                .with("gslimit", search.results);

            let query = if let Some(title) = &search.title {
                let title = if search.auto_suggest {
                    self.suggest(title)?.unwrap_or_else(|| title.clone())
                } else {
                    title.clone()
                };

                params.insert("gspage", &title);
                title
            } else {
                let (Some(latitude), Some(longitude)) = (search.latitude, search.longitude) else {
                    return Err(MediaWikiError::InvalidArgument(
                        "Either a title or latitude and longitude must be specified".to_string(),
                    ));
                };

                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    log::warn!("Coordinates {latitude}|{longitude} are out of range");

                    return Err(MediaWikiError::GeoCoord {
                        error: "Invalid coordinate provided".to_string(),
                    });
                }

                let coordinates = format!("{latitude}|{longitude}");
                params.insert("gscoord", &coordinates);
                coordinates
            };

            let response = self.wiki_request(&params)?;

            Self::check_error_response(&response, &query).map_err(|err| match err {
                MediaWikiError::Api { error } if GEO_ERRORS.contains(&error.as_str()) => {
                    MediaWikiError::GeoCoord { error }
                }
                err => err,
            })?;

            titles_of(&response, "geosearch")
        })
    }

    /// Quick title search as used by search boxes
    ///
    /// With `redirect`, redirects are resolved to their targets.
    pub fn opensearch(
        &self,
        query: &str,
        results: usize,
        redirect: bool,
    ) -> Result<Vec<OpenSearchResult>> {
        Self::check_query(query, "Query must be specified")?;

        let key = format!("{query} - {results} - {redirect}");

        self.memoized("opensearch", key, || {
            let params = Params::new()
                .with("action", "opensearch")
                .with("search", query)
                .with("limit", results.min(MAX_RESULTS))
                .with("redirects", if redirect { "resolve" } else { "return" })
                .with("namespace", "");

            let response = self.wiki_request(&params)?;

            Self::check_error_response(&response, query)?;

            let column = |index: usize| {
                response
                    .get(index)
                    .and_then(Value::as_array)
                    .map(|values| values.iter().map(|value| value.as_str().unwrap_or_default()))
                    .ok_or_else(|| MediaWikiError::unexpected("malformed opensearch response"))
            };

            Ok(itertools::izip!(column(1)?, column(2)?, column(3)?)
                .map(|(title, description, url)| OpenSearchResult {
                    title: title.to_string(),
                    description: description.to_string(),
                    url: url.to_string(),
                })
                .collect())
        })
    }

    /// Titles starting with `prefix`
    pub fn prefixsearch(&self, prefix: &str, results: usize) -> Result<Vec<String>> {
        Self::check_query(prefix, "Prefix must be specified")?;

        let key = format!("{prefix} - {results}");

        self.memoized("prefixsearch", key, || {
            let limit = if results > MAX_RESULTS {
                "max".to_string()
            } else {
                results.to_string()
            };

            let params = Params::new()
                .with("list", "prefixsearch")
                .with("pssearch", prefix)
                .with("pslimit", limit)
                .with("psnamespace", 0)
                .with("psoffset", 0);

            let response = self.wiki_request(&params)?;

            Self::check_error_response(&response, prefix)?;

            titles_of(&response, "prefixsearch")
        })
    }
}
