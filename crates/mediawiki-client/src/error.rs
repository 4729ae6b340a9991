use std::fmt::Display;
use thiserror::Error;

use crate::client::HttpError;

/// The title or page id that failed to resolve to a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    Title(String),
    PageId(u64),
}

impl Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title(title) => {
                write!(f, "\"{title}\" does not match any pages. Try another query!")
            }
            Self::PageId(pageid) => write!(
                f,
                "Page id \"{pageid}\" does not match any pages. Try another id!"
            ),
        }
    }
}

/// One candidate listed on a disambiguation page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisambiguationOption {
    pub title: String,
    pub description: String,
}

/// A page resolved to a disambiguation page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisambiguationError {
    pub title: String,
    pub url: String,
    /// Linked titles in the order they show up on the page
    pub unordered_options: Vec<String>,
    pub details: Vec<DisambiguationOption>,
}

impl DisambiguationError {
    /// The linked titles, sorted
    pub fn options(&self) -> Vec<String> {
        let mut options = self.unordered_options.clone();
        options.sort();
        options
    }
}

impl Display for DisambiguationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\n\"{}\" may refer to: \n  {}",
            self.title,
            self.options().join("\n  ")
        )
    }
}

/// Everything that can go wrong talking to a MediaWiki site
#[derive(Debug, Error)]
pub enum MediaWikiError {
    #[error("{0}")]
    Page(PageError),
    #[error(
        "\"{title}\" resulted in a redirect. Set the redirect property to True to allow automatic redirects."
    )]
    Redirect { title: String },
    #[error("{0}")]
    Disambiguation(Box<DisambiguationError>),
    #[error(
        "Searching for \"{query}\" resulted in a timeout. Try again in a few seconds, and ensure you have rate limiting set to True."
    )]
    HttpTimeout { query: String },
    #[error("{api_url} is not a valid MediaWiki API URL")]
    ApiUrl { api_url: String },
    #[error(
        "GeoData search resulted in the following error: {error} - Please use valid coordinates or a proper page title."
    )]
    GeoCoord { error: String },
    #[error(
        "Categorytree threw an exception for trying to get the same category '{category}' too many times. Please try again later and perhaps use the rate limiting option."
    )]
    CategoryTree { category: String },
    #[error("{error}")]
    Login { error: String },
    /// An error reported by the API that has no dedicated variant
    #[error("An unknown error occurred: \"{error}\". Please report it on GitHub!")]
    Api { error: String },
    /// The caller supplied arguments the API can't work with
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    MissingExtension(String),
    /// The response didn't have the shape the API documents
    #[error("Unexpected response from the MediaWiki site: {0}")]
    UnexpectedResponse(String),
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
    #[error("Failed to deserialise response: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<PageError> for MediaWikiError {
    fn from(error: PageError) -> Self {
        Self::Page(error)
    }
}

impl From<DisambiguationError> for MediaWikiError {
    fn from(error: DisambiguationError) -> Self {
        Self::Disambiguation(Box::new(error))
    }
}

impl MediaWikiError {
    pub(crate) fn unexpected(what: impl Display) -> Self {
        Self::UnexpectedResponse(what.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MediaWikiError>;
