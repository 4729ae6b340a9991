//! Walking paginated API results
//!
//! List and property queries return at most one batch per request together with a
//! `continue` object. Merging that object into the next request yields the next batch,
//! until the API stops sending one. Some sites keep answering with the same `continue`
//! object forever, so a batch whose continuation equals the previous one ends the walk.

use serde_json::{Map, Value};

use crate::error::{MediaWikiError, Result};
use crate::mediawiki::MediaWiki;
use crate::params::Params;

/// An iterator over the raw responses of a continued query
pub struct Continuation<'wiki> {
    wiki: &'wiki MediaWiki,
    params: Params,
    last_continue: Option<Map<String, Value>>,
    finished: bool,
    batches: usize,
    query: Option<String>,
}

impl<'wiki> Continuation<'wiki> {
    pub fn new(wiki: &'wiki MediaWiki, params: Params) -> Self {
        Self {
            wiki,
            params,
            last_continue: None,
            finished: false,
            batches: 0,
            query: None,
        }
    }

    /// Name the query in timeout errors, defaults to the `titles` parameter
    pub fn describing(self, query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..self
        }
    }

    /// The number of requests sent so far
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Replace a parameter for the following requests, e.g. to shrink a limit
    pub fn set_param(&mut self, name: &str, value: impl std::fmt::Display) {
        self.params.insert(name, value);
    }

    fn fetch(&mut self) -> Result<Option<Value>> {
        let mut params = self.params.clone();

        if let Some(last) = &self.last_continue {
            params.extend_from_json(last);
        }

        let response = self.wiki.wiki_request(&params)?;

        self.batches += 1;

        if response.get("error").is_some() {
            let query = self
                .query
                .as_deref()
                .or_else(|| self.params.get("titles"))
                .unwrap_or_default();

            MediaWiki::check_error_response(&response, query)?;
        }

        if response.get("query").is_none() {
            self.finished = true;
            return Ok(None);
        }

        match continuation_of(&response) {
            None => self.finished = true,
            Some(next) if self.last_continue.as_ref() == Some(&next) => {
                log::warn!(
                    "Continuation did not progress after {} batches, stopping",
                    self.batches
                );
                self.finished = true;
            }
            Some(next) => {
                log::debug!("Continuing query with {}", Value::Object(next.clone()));
                self.last_continue = Some(next);
            }
        }

        Ok(Some(response))
    }
}

impl Iterator for Continuation<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.fetch() {
            Ok(response) => response.map(Ok),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// The continuation object of a response, supporting the legacy `query-continue` shape
fn continuation_of(response: &Value) -> Option<Map<String, Value>> {
    if let Some(cont) = response.get("continue").and_then(Value::as_object) {
        return Some(cont.clone());
    }

    response
        .get("query-continue")
        .and_then(Value::as_object)
        .map(|modules| {
            modules
                .values()
                .filter_map(Value::as_object)
                .flat_map(|module| module.clone())
                .collect()
        })
}

/// Run a continued query and flatten the batches into their items
///
/// * generator queries yield every page of `query[key]`
/// * list queries yield the entries of the `query[key]` array
/// * property queries yield the entries of `query[key][pageid][prop]`
pub fn continued_query(
    wiki: &MediaWiki,
    params: Params,
    key: &str,
    pageid: Option<&str>,
) -> Result<Vec<Value>> {
    let is_generator = params.contains("generator");
    let prop = params.get("prop").map(ToString::to_string);

    let mut items = Vec::new();

    for response in Continuation::new(wiki, params) {
        let response = response?;

        let Some(batch) = response.get("query").and_then(|query| query.get(key)) else {
            continue;
        };

        match batch {
            Value::Object(pages) if is_generator => items.extend(pages.values().cloned()),
            Value::Array(list) => items.extend(list.iter().cloned()),
            Value::Object(pages) => {
                let pageid = pageid.ok_or_else(|| {
                    MediaWikiError::unexpected("property query without a page id")
                })?;

                if let Some(values) = pages
                    .get(pageid)
                    .and_then(|page| page.get(prop.as_deref().unwrap_or_default()))
                    .and_then(Value::as_array)
                {
                    items.extend(values.iter().cloned());
                }
            }
            _ => return Err(MediaWikiError::unexpected(format!("'{key}' is not a list"))),
        }
    }

    Ok(items)
}
