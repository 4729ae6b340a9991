#![forbid(unsafe_code)]

mod cache;
mod category;
mod client;
mod continuation;
mod error;
mod mediawiki;
mod page;
mod params;
mod search;

#[cfg(feature = "petgraph")]
mod graph;

cfg_if::cfg_if! {
    if #[cfg(feature = "ureq")] {
        pub use client::UreqTransport;
    }
}

#[cfg(feature = "petgraph")]
pub use graph::CategoryGraph;

pub use category::{CategoryMembers, CategoryNode, CategoryTree};

pub use client::{
    DEFAULT_API_URL, HeaderError, HttpError, LANGUAGE_PLACEHOLDER, MediaWikiConfig, Transport,
    USER_AGENT,
};

pub use continuation::{Continuation, continued_query};

pub use error::{DisambiguationError, DisambiguationOption, MediaWikiError, PageError, Result};

pub use mediawiki::{MediaWiki, SiteInfo};

pub use page::{
    Coordinates, MediaWikiPage, PageQuery, SectionLink, TableOfContents, TocEntry, html, sections,
};

pub use params::Params;

pub use search::{GeoSearch, OpenSearchResult, SearchResults};

pub use url::Url;
