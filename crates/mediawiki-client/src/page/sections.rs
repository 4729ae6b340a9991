//! Section headings in the plain-text rendering of a page
//!
//! The query API decorates section names with markup (italics, superscripts ...), so the
//! headings are read from the plain text content instead: `== Title ==` for top level
//! sections, one more `=` on each side per nesting level.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n==* .* ==*\n").expect("Failed to compile regex to find section headings")
});

/// A section heading and its nesting depth (0 for `== Title ==`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub depth: usize,
    pub title: String,
}

/// One section and its sub-sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub children: TableOfContents,
}

/// Sections and sub-sections, in page order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOfContents(pub Vec<TocEntry>);

impl TableOfContents {
    pub fn entries(&self) -> &[TocEntry] {
        &self.0
    }

    pub fn get(&self, title: &str) -> Option<&TocEntry> {
        self.0.iter().find(|entry| entry.title == title)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Add a section below the most recent section at `depth - 1`
    ///
    /// Skipped levels (an `====` directly under an `==`) attach to the deepest existing level.
    fn push(&mut self, depth: usize, title: String) {
        let mut level = self;

        for _ in 0..depth {
            if level.0.is_empty() {
                break;
            }

            let last = level.0.len() - 1;
            level = &mut level.0[last].children;
        }

        level.0.push(TocEntry {
            title,
            children: TableOfContents::default(),
        });
    }
}

pub fn parse_headings(content: &str) -> Vec<Heading> {
    SECTION_HEADING
        .find_iter(content)
        .map(|found| {
            let heading = found.as_str();

            let depth = (heading.matches('=').count() / 2).saturating_sub(2);

            let title = heading
                .trim_start_matches(['\n', '=', ' '])
                .trim_end_matches([' ', '=', '\n'])
                .to_string();

            Heading { depth, title }
        })
        .collect()
}

pub fn table_of_contents(headings: &[Heading]) -> TableOfContents {
    headings
        .iter()
        .fold(TableOfContents::default(), |mut toc, heading| {
            toc.push(heading.depth, heading.title.clone());
            toc
        })
}

/// The plain text of a section, up to the next heading of any level
///
/// `None` as title selects the lead section. Returns `None` if the section doesn't exist.
pub fn section_text(content: &str, title: Option<&str>) -> Option<String> {
    let start = match title.filter(|title| !title.is_empty()) {
        None => 0,
        Some(title) => {
            let heading = format!("== {title} ==");

            let mut index = content.find(&heading)? + heading.len();

            // Deeper headings have more '=' on the right
            while content.as_bytes().get(index + 1) == Some(&b'=') {
                index += 1;
            }

            index.min(content.len())
        }
    };

    let end = content[start..]
        .find("==")
        .map_or(content.len(), |offset| start + offset);

    Some(content[start..end].trim_start_matches('=').trim().to_string())
}
