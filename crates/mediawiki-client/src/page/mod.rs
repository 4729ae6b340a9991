//! A single page of a MediaWiki site
//!
//! Loading a page only checks that it exists and resolves redirects. Everything else is
//! fetched the first time it is asked for and kept for the lifetime of the page.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::OnceLock;

use crate::continuation::{Continuation, continued_query};
use crate::error::{DisambiguationError, MediaWikiError, PageError, Result};
use crate::mediawiki::MediaWiki;
use crate::params::Params;

pub mod html;
pub mod sections;

pub use html::SectionLink;
pub use sections::{TableOfContents, TocEntry};

const ODD_ERROR_MESSAGE: &str = "This should not happen. If the MediaWiki site you are querying is available, then please report this issue.";

/// Redirect chains longer than this are treated as a broken response
const MAX_REDIRECTS: usize = 10;

/// What to load with [`MediaWiki::page`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub title: Option<String>,
    pub pageid: Option<u64>,
    /// Replace the title with the top search result before loading
    pub auto_suggest: bool,
    /// Follow redirects instead of failing with [`MediaWikiError::Redirect`]
    pub redirect: bool,
    /// Fetch the common lazy properties right away
    pub preload: bool,
}

impl PageQuery {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn pageid(pageid: u64) -> Self {
        Self {
            pageid: Some(pageid),
            auto_suggest: false,
            ..Self::default()
        }
    }

    pub fn auto_suggest(self, auto_suggest: bool) -> Self {
        Self {
            auto_suggest,
            ..self
        }
    }

    pub fn redirect(self, redirect: bool) -> Self {
        Self { redirect, ..self }
    }

    pub fn preload(self, preload: bool) -> Self {
        Self { preload, ..self }
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            title: None,
            pageid: None,
            auto_suggest: true,
            redirect: true,
            preload: false,
        }
    }
}

impl From<&str> for PageQuery {
    fn from(title: &str) -> Self {
        Self::title(title)
    }
}

impl From<String> for PageQuery {
    fn from(title: String) -> Self {
        Self::title(title)
    }
}

impl From<u64> for PageQuery {
    fn from(pageid: u64) -> Self {
        Self::pageid(pageid)
    }
}

/// Geographic coordinates of the subject of a page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
enum Lookup {
    Title(String),
    PageId(u64),
}

impl Lookup {
    fn params(&self) -> Params {
        match self {
            Self::Title(title) => Params::new().with("titles", title),
            Self::PageId(pageid) => Params::new().with("pageids", pageid),
        }
    }

    fn page_error(&self) -> PageError {
        match self {
            Self::Title(title) => PageError::Title(title.clone()),
            Self::PageId(pageid) => PageError::PageId(*pageid),
        }
    }

    fn title(&self) -> Option<&str> {
        match self {
            Self::Title(title) => Some(title),
            Self::PageId(_) => None,
        }
    }
}

impl Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title(title) => f.write_str(title),
            Self::PageId(pageid) => write!(f, "{pageid}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Revision {
    content: String,
    revision_id: u64,
    parent_id: u64,
}

/// Properties that share a single continued request
#[derive(Debug, Clone, Default)]
struct CombinedProperties {
    summary: Option<String>,
    links: Vec<String>,
    categories: Vec<String>,
    redirects: Vec<String>,
    references: Vec<String>,
    coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone)]
struct Sections {
    titles: Vec<String>,
    table_of_contents: TableOfContents,
}

/// Return the value in `cell`, loading it first if needed
///
/// If two threads race, both load but only the first value is kept.
fn lazy<'a, T>(cell: &'a OnceLock<T>, load: impl FnOnce() -> Result<T>) -> Result<&'a T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }

    let value = load()?;

    Ok(cell.get_or_init(|| value))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| MediaWikiError::unexpected(format!("missing '{key}'")))
}

fn sorted_titles<'a>(entries: impl IntoIterator<Item = &'a Value>) -> Vec<String> {
    let mut titles = entries
        .into_iter()
        .filter_map(|entry| entry.get("title").and_then(Value::as_str))
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    titles.sort();
    titles
}

/// A loaded page
///
/// Borrows the client it was loaded from, which is used to fetch the lazy properties.
pub struct MediaWikiPage<'wiki> {
    wiki: &'wiki MediaWiki,
    title: String,
    original_title: String,
    pageid: u64,
    url: String,
    revision: OnceLock<Revision>,
    html: OnceLock<String>,
    wikitext: OnceLock<String>,
    images: OnceLock<Vec<String>>,
    logos: OnceLock<Vec<String>>,
    hatnotes: OnceLock<Vec<String>>,
    combined: OnceLock<CombinedProperties>,
    backlinks: OnceLock<Vec<String>>,
    langlinks: OnceLock<BTreeMap<String, String>>,
    preview: OnceLock<Map<String, Value>>,
    sections: OnceLock<Sections>,
}

impl std::fmt::Debug for MediaWikiPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWikiPage")
            .field("title", &self.title)
            .field("pageid", &self.pageid)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl Display for MediaWikiPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<MediaWikiPage '{}'>", self.title)
    }
}

impl PartialEq for MediaWikiPage<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.pageid == other.pageid && self.title == other.title && self.url == other.url
    }
}

impl<'wiki> MediaWikiPage<'wiki> {
    /// Resolve `query` to an existing page, following redirects if allowed
    pub(crate) fn load(wiki: &'wiki MediaWiki, query: &PageQuery) -> Result<Self> {
        let mut lookup = match (&query.title, query.pageid) {
            (Some(title), _) => Lookup::Title(title.clone()),
            (None, Some(pageid)) => Lookup::PageId(pageid),
            (None, None) => {
                return Err(MediaWikiError::InvalidArgument(
                    "Either a title or a pageid must be specified".to_string(),
                ));
            }
        };

        let original_title = query.title.clone().unwrap_or_default();

        for _ in 0..=MAX_REDIRECTS {
            let params = lookup
                .params()
                .with("prop", "info|pageprops")
                .with("inprop", "url")
                .with("ppprop", "disambiguation")
                .with("redirects", "");

            let response = wiki.wiki_request(&params)?;

            MediaWiki::check_error_response(&response, &lookup.to_string())?;

            let query_result = response
                .get("query")
                .ok_or_else(|| MediaWikiError::unexpected("page info without 'query'"))?;

            let (key, page) = query_result
                .get("pages")
                .and_then(Value::as_object)
                .and_then(|pages| pages.iter().next())
                .ok_or_else(|| MediaWikiError::unexpected("page info without 'pages'"))?;

            if page.get("missing").is_some() {
                return Err(lookup.page_error().into());
            }

            if let Some(redirect) = query_result.pointer("/redirects/0") {
                if !query.redirect {
                    let title = lookup
                        .title()
                        .or_else(|| page.get("title").and_then(Value::as_str))
                        .unwrap_or_default()
                        .to_string();

                    return Err(MediaWikiError::Redirect { title });
                }

                lookup = Lookup::Title(follow_redirect(&lookup, query_result, redirect)?);
                continue;
            }

            if page.get("pageprops").is_some() {
                return Err(disambiguation(wiki, &lookup, key, page)?.into());
            }

            let page = Self {
                wiki,
                title: str_field(page, "title")?.to_string(),
                original_title: original_title.clone(),
                pageid: key.parse().map_err(|_| {
                    MediaWikiError::unexpected(format!("'{key}' is not a page id"))
                })?,
                url: str_field(page, "fullurl")?.to_string(),
                revision: OnceLock::new(),
                html: OnceLock::new(),
                wikitext: OnceLock::new(),
                images: OnceLock::new(),
                logos: OnceLock::new(),
                hatnotes: OnceLock::new(),
                combined: OnceLock::new(),
                backlinks: OnceLock::new(),
                langlinks: OnceLock::new(),
                preview: OnceLock::new(),
                sections: OnceLock::new(),
            };

            log::info!("Loaded page '{}' ({})", page.title, page.pageid);

            if query.preload {
                page.preload()?;
            }

            return Ok(page);
        }

        Err(MediaWikiError::unexpected(format!(
            "more than {MAX_REDIRECTS} redirects for '{original_title}'"
        )))
    }

    fn preload(&self) -> Result<()> {
        self.content()?;
        self.summary()?;
        self.images()?;
        self.references()?;
        self.links()?;
        self.sections()?;
        self.redirects()?;
        self.coordinates()?;
        self.backlinks()?;
        self.categories()?;

        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The title that was looked up, after auto-suggestion but before following redirects
    pub fn original_title(&self) -> &str {
        &self.original_title
    }

    pub fn pageid(&self) -> u64 {
        self.pageid
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn wiki(&self) -> &'wiki MediaWiki {
        self.wiki
    }

    fn title_params(&self) -> Params {
        Params::new().with("titles", &self.title)
    }

    /// `query.pages[pageid]` of a response
    fn page_of<'a>(&self, response: &'a Value) -> Result<&'a Value> {
        MediaWiki::check_error_response(response, &self.title)?;

        response
            .pointer(&format!("/query/pages/{}", self.pageid))
            .ok_or_else(|| MediaWikiError::unexpected(format!("no page '{}'", self.pageid)))
    }

    fn revision(&self) -> Result<&Revision> {
        lazy(&self.revision, || {
            let params = self
                .title_params()
                .with("prop", "extracts|revisions")
                .with("explaintext", "")
                .with("rvprop", "ids");

            let response = self.wiki.wiki_request(&params)?;
            let page = self.page_of(&response)?;

            let extract = page.get("extract").and_then(Value::as_str);

            if extract.is_none() && !self.wiki.extensions().contains("TextExtracts") {
                return Err(MediaWikiError::MissingExtension(
                    "Unable to extract page content; the TextExtracts extension must be installed!"
                        .to_string(),
                ));
            }

            let revision = page
                .pointer("/revisions/0")
                .ok_or_else(|| MediaWikiError::unexpected("page without revisions"))?;

            Ok(Revision {
                content: extract.unwrap_or_default().to_string(),
                revision_id: revision.get("revid").and_then(Value::as_u64).unwrap_or_default(),
                parent_id: revision
                    .get("parentid")
                    .and_then(Value::as_u64)
                    .unwrap_or_default(),
            })
        })
    }

    /// The plain text content of the page
    pub fn content(&self) -> Result<&str> {
        self.revision().map(|revision| revision.content.as_str())
    }

    pub fn revision_id(&self) -> Result<u64> {
        self.revision().map(|revision| revision.revision_id)
    }

    pub fn parent_id(&self) -> Result<u64> {
        self.revision().map(|revision| revision.parent_id)
    }

    /// The rendered HTML of the page, which can be slow for large pages
    pub fn html(&self) -> Result<&str> {
        lazy(&self.html, || {
            let params = self
                .title_params()
                .with("prop", "revisions")
                .with("rvprop", "content")
                .with("rvlimit", 1)
                .with("rvparse", "");

            let response = self.wiki.wiki_request(&params)?;
            let page = self.page_of(&response)?;

            page.pointer("/revisions/0/*")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| MediaWikiError::unexpected("revision without content"))
        })
        .map(String::as_str)
    }

    /// The wikitext source of the page
    pub fn wikitext(&self) -> Result<&str> {
        lazy(&self.wikitext, || {
            let params = Params::new()
                .with("action", "parse")
                .with("page", &self.title)
                .with("prop", "wikitext")
                .with("formatversion", "latest");

            let response = self.wiki.wiki_request(&params)?;

            MediaWiki::check_error_response(&response, &self.title)?;

            response
                .pointer("/parse/wikitext")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| MediaWikiError::unexpected("parse without 'wikitext'"))
        })
        .map(String::as_str)
    }

    /// URLs of every image on the page, sorted
    pub fn images(&self) -> Result<&[String]> {
        lazy(&self.images, || {
            let params = self
                .title_params()
                .with("generator", "images")
                .with("gimlimit", "max")
                .with("prop", "imageinfo")
                .with("iiprop", "url");

            let mut images = continued_query(self.wiki, params, "pages", None)?
                .iter()
                .filter_map(|page| page.pointer("/imageinfo/0/url").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect::<Vec<_>>();

            images.sort();
            Ok(images)
        })
        .map(Vec::as_slice)
    }

    /// Images in the infobox, usually the main image or logo of the subject
    ///
    /// Parsed from [`Self::html`], not part of the API.
    pub fn logos(&self) -> Result<&[String]> {
        lazy(&self.logos, || self.html().map(html::logos)).map(Vec::as_slice)
    }

    /// The "For other uses, see ..." notes on the page
    ///
    /// Parsed from [`Self::html`], not part of the API.
    pub fn hatnotes(&self) -> Result<&[String]> {
        lazy(&self.hatnotes, || self.html().map(html::hatnotes)).map(Vec::as_slice)
    }

    fn combined(&self) -> Result<&CombinedProperties> {
        lazy(&self.combined, || self.pull_combined_properties())
    }

    fn pull_combined_properties(&self) -> Result<CombinedProperties> {
        const LIST_KEYS: [&str; 5] = ["redirects", "links", "coordinates", "categories", "extlinks"];

        let params = self
            .title_params()
            .with("prop", "extracts|redirects|links|coordinates|categories|extlinks")
            .with("explaintext", "")
            .with("exintro", "")
            .with("rdprop", "title")
            .with("rdlimit", "max")
            .with("plnamespace", 0)
            .with("pllimit", "max")
            .with("colimit", "max")
            .with("cllimit", "max")
            .with("clshow", "!hidden")
            .with("ellimit", "max");

        let mut summary = None;
        let mut lists: BTreeMap<&str, Vec<Value>> = BTreeMap::new();

        for response in Continuation::new(self.wiki, params) {
            let response = response?;
            let page = self.page_of(&response)?;

            if summary.is_none() {
                summary = page
                    .get("extract")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
            }

            for key in LIST_KEYS {
                if let Some(values) = page.get(key).and_then(Value::as_array) {
                    lists.entry(key).or_default().extend(values.iter().cloned());
                }
            }
        }

        let list = |key: &str| lists.get(key).map(Vec::as_slice).unwrap_or_default();

        let prefix = format!("{}:", self.wiki.category_prefix());

        let mut categories = sorted_titles(list("categories"))
            .into_iter()
            .map(|title| {
                title
                    .strip_prefix(&prefix)
                    .map_or_else(|| title.clone(), ToString::to_string)
            })
            .collect::<Vec<_>>();

        categories.sort();

        let coordinates = list("coordinates").first().and_then(|coordinates| {
            Some(Coordinates {
                latitude: coordinates.get("lat")?.as_f64()?,
                longitude: coordinates.get("lon")?.as_f64()?,
            })
        });

        let mut references = list("extlinks")
            .iter()
            .filter_map(|link| {
                link.get("*")
                    .or_else(|| link.get("url"))
                    .and_then(Value::as_str)
            })
            .map(|link| {
                if link.starts_with("http") {
                    link.to_string()
                } else {
                    format!("http:{link}")
                }
            })
            .collect::<Vec<_>>();

        references.sort();

        Ok(CombinedProperties {
            summary,
            links: sorted_titles(list("links")),
            categories,
            redirects: sorted_titles(list("redirects")),
            references,
            coordinates,
        })
    }

    /// The lead section of the page as plain text
    pub fn summary(&self) -> Result<Option<&str>> {
        self.combined()
            .map(|combined| combined.summary.as_deref())
    }

    /// Titles of the pages this page links to, sorted
    pub fn links(&self) -> Result<&[String]> {
        self.combined().map(|combined| combined.links.as_slice())
    }

    /// Non-hidden categories of the page without the category prefix, sorted
    pub fn categories(&self) -> Result<&[String]> {
        self.combined()
            .map(|combined| combined.categories.as_slice())
    }

    /// Titles that redirect to this page, sorted
    pub fn redirects(&self) -> Result<&[String]> {
        self.combined()
            .map(|combined| combined.redirects.as_slice())
    }

    /// External links anywhere on the page, sorted
    pub fn references(&self) -> Result<&[String]> {
        self.combined()
            .map(|combined| combined.references.as_slice())
    }

    /// Requires the GeoData extension on the site
    pub fn coordinates(&self) -> Result<Option<Coordinates>> {
        self.combined().map(|combined| combined.coordinates)
    }

    /// Titles of the articles linking to this page, sorted
    pub fn backlinks(&self) -> Result<&[String]> {
        lazy(&self.backlinks, || {
            let params = Params::new()
                .with("list", "backlinks")
                .with("bltitle", &self.title)
                .with("bllimit", "max")
                .with("blfilterredir", "nonredirects")
                .with("blnamespace", 0);

            Ok(sorted_titles(&continued_query(
                self.wiki,
                params,
                "backlinks",
                None,
            )?))
        })
        .map(Vec::as_slice)
    }

    /// The title of this page in other languages, by language code
    pub fn langlinks(&self) -> Result<&BTreeMap<String, String>> {
        lazy(&self.langlinks, || {
            let params = self
                .title_params()
                .with("prop", "langlinks")
                .with("lllimit", "max");

            let pageid = self.pageid.to_string();

            Ok(continued_query(self.wiki, params, "pages", Some(&pageid))?
                .iter()
                .filter_map(|link| {
                    Some((
                        link.get("lang")?.as_str()?.to_string(),
                        link.get("*")
                            .or_else(|| link.get("title"))?
                            .as_str()?
                            .to_string(),
                    ))
                })
                .collect())
        })
    }

    /// The data used for hover previews: short extract, thumbnail, description ...
    pub fn preview(&self) -> Result<&Map<String, Value>> {
        lazy(&self.preview, || {
            let params = self
                .title_params()
                .with("formatversion", 2)
                .with("prop", "info|extracts|pageimages|revisions|pageterms|coordinates")
                .with("exsentences", 5)
                .with("explaintext", "")
                .with("piprop", "thumbnail|original")
                .with("pithumbsize", 320)
                .with("pilicense", "any")
                .with("rvprop", "timestamp|ids")
                .with("wbptterms", "description");

            let response = self.wiki.wiki_request(&params)?;

            MediaWiki::check_error_response(&response, &self.title)?;

            response
                .pointer("/query/pages/0")
                .and_then(Value::as_object)
                .cloned()
                .ok_or_else(|| MediaWikiError::unexpected("preview without pages"))
        })
    }

    /// Summarize the page by its first `sentences` sentences (at most 10), or else its
    /// first `chars` characters, or else the whole lead section
    pub fn summarize(&self, sentences: usize, chars: usize) -> Result<Option<String>> {
        let mut params = self
            .title_params()
            .with("prop", "extracts")
            .with("explaintext", "");

        if sentences > 0 {
            params.insert("exsentences", sentences.min(10));
        } else if chars > 0 {
            params.insert("exchars", chars.max(1));
        } else {
            params.insert("exintro", "");
        }

        let response = self.wiki.wiki_request(&params)?;

        Ok(self
            .page_of(&response)?
            .get("extract")
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    fn parsed_sections(&self) -> Result<&Sections> {
        lazy(&self.sections, || {
            let headings = sections::parse_headings(self.content()?);

            Ok(Sections {
                titles: headings.iter().map(|heading| heading.title.clone()).collect(),
                table_of_contents: sections::table_of_contents(&headings),
            })
        })
    }

    /// Section titles in page order
    pub fn sections(&self) -> Result<&[String]> {
        self.parsed_sections()
            .map(|sections| sections.titles.as_slice())
    }

    pub fn table_of_contents(&self) -> Result<&TableOfContents> {
        self.parsed_sections()
            .map(|sections| &sections.table_of_contents)
    }

    /// The plain text of a section up to the next heading; `None` selects the lead section
    ///
    /// Returns `Ok(None)` if there is no such section.
    pub fn section(&self, title: Option<&str>) -> Result<Option<String>> {
        Ok(sections::section_text(self.content()?, title))
    }

    /// Links in a section as `(text, url)`; `None` selects the links before the first section
    ///
    /// Returns `Ok(None)` if there is no such section.
    pub fn parse_section_links(&self, title: Option<&str>) -> Result<Option<Vec<SectionLink>>> {
        Ok(html::section_links(
            self.html()?,
            title,
            self.wiki.base_url(),
            &self.url,
        ))
    }
}

/// The title a redirect leads to, after checking it starts where the lookup did
fn follow_redirect(lookup: &Lookup, query: &Value, redirect: &Value) -> Result<String> {
    let from = str_field(redirect, "from")?;
    let to = str_field(redirect, "to")?;

    let expected = if let Some(normalized) = query.pointer("/normalized/0") {
        if Some(str_field(normalized, "from")?) != lookup.title() {
            return Err(MediaWikiError::unexpected(ODD_ERROR_MESSAGE));
        }

        str_field(normalized, "to")?
    } else {
        lookup.title().unwrap_or(from)
    };

    if from != expected {
        return Err(MediaWikiError::unexpected(ODD_ERROR_MESSAGE));
    }

    log::debug!("Following redirect from '{from}' to '{to}'");

    Ok(to.to_string())
}

fn disambiguation(
    wiki: &MediaWiki,
    lookup: &Lookup,
    key: &str,
    page: &Value,
) -> Result<DisambiguationError> {
    let params = lookup
        .params()
        .with("prop", "revisions")
        .with("rvprop", "content")
        .with("rvparse", "")
        .with("rvlimit", 1);

    let response = wiki.wiki_request(&params)?;

    MediaWiki::check_error_response(&response, &lookup.to_string())?;

    let html = response
        .pointer(&format!("/query/pages/{key}/revisions/0/*"))
        .and_then(Value::as_str)
        .ok_or_else(|| MediaWikiError::unexpected("disambiguation page without content"))?;

    let (unordered_options, details) = html::disambiguation_options(html);

    let title = match lookup.title() {
        Some(title) => title.to_string(),
        None => str_field(page, "title")?.to_string(),
    };

    Ok(DisambiguationError {
        title,
        url: page
            .get("fullurl")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        unordered_options,
        details,
    })
}
