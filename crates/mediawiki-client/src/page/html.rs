//! Parsing of rendered page HTML
//!
//! None of this is part of the API itself; it reads the markup MediaWiki generates for
//! disambiguation lists, infoboxes, hatnotes and section bodies.

use scraper::{ElementRef, Html, Selector};

use crate::error::DisambiguationOption;

/// A link found in the page body as `(text, absolute url)`
pub type SectionLink = (String, String);

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("Constant CSS selector failed to parse")
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn has_class_containing(element: ElementRef<'_>, needle: &str) -> bool {
    element
        .value()
        .classes()
        .any(|class| class.contains(needle))
}

/// The entries of a disambiguation page as `(may refer to, details)`
///
/// List items belonging to the table of contents are ignored. Items without a link keep
/// their text as the title.
pub fn disambiguation_options(html: &str) -> (Vec<String>, Vec<DisambiguationOption>) {
    let document = Html::parse_fragment(html);
    let list_items = selector("li");
    let links = selector("a");

    let items = document
        .select(&list_items)
        .filter(|item| !has_class_containing(*item, "tocsection"))
        .collect::<Vec<_>>();

    let may_refer_to = items
        .iter()
        .filter_map(|item| item.select(&links).next())
        .map(text_of)
        .collect();

    let details = items
        .iter()
        .map(|item| {
            let description = text_of(*item);

            let title = item
                .select(&links)
                .next()
                .and_then(|link| link.value().attr("title"))
                .map_or_else(|| description.clone(), ToString::to_string);

            DisambiguationOption { title, description }
        })
        .collect();

    (may_refer_to, details)
}

/// Images inside the first infobox, usually the main image or logo of the subject
pub fn logos(html: &str) -> Vec<String> {
    let document = Html::parse_fragment(html);

    let Some(infobox) = document.select(&selector("table.infobox")).next() else {
        return Vec::new();
    };

    infobox
        .select(&selector("a.image img, a.mw-file-description img"))
        .filter_map(|image| image.value().attr("src"))
        .map(|src| {
            if src.starts_with("//") {
                format!("https:{src}")
            } else {
                src.to_string()
            }
        })
        .collect()
}

/// The text of every hatnote (the "For other uses, see ..." notes at the top of sections)
pub fn hatnotes(html: &str) -> Vec<String> {
    Html::parse_fragment(html)
        .select(&selector("div.hatnote"))
        .map(text_of)
        .collect()
}

/// Simple check whether a url is relative (`Some(true)`), absolute (`Some(false)`) or
/// only a fragment within the current page (`None`)
pub fn is_relative_url(url: &str) -> Option<bool> {
    if url.starts_with('#') {
        return None;
    }

    Some(url.find("://").is_none_or(|index| index == 0) && !url.starts_with("//"))
}

fn is_heading(element: ElementRef<'_>) -> bool {
    matches!(element.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
        || element.value().classes().any(|class| class == "mw-heading")
        || element.select(&selector("span.mw-headline")).next().is_some()
}

fn heading_matches(element: ElementRef<'_>, wanted: &str) -> bool {
    text_of(element).trim().to_lowercase() == wanted
}

/// The element after which the body of section `title` starts
///
/// Handles both the older `<h2><span class="mw-headline">` markup and the newer
/// `<div class="mw-heading"><h2>` markup.
fn section_start<'a>(document: &'a Html, title: &str) -> Option<ElementRef<'a>> {
    let wanted = title.trim().to_lowercase();

    if let Some(headline) = document
        .select(&selector("span.mw-headline"))
        .find(|headline| heading_matches(*headline, &wanted))
    {
        return headline.parent().and_then(ElementRef::wrap);
    }

    let heading = document
        .select(&selector("h1, h2, h3, h4, h5, h6"))
        .find(|heading| heading_matches(*heading, &wanted))?;

    match heading.parent().and_then(ElementRef::wrap) {
        Some(wrapper) if wrapper.value().classes().any(|class| class == "mw-heading") => {
            Some(wrapper)
        }
        _ => Some(heading),
    }
}

fn link_info(link: ElementRef<'_>, base_url: &str, page_url: &str) -> SectionLink {
    let href = link.value().attr("href").unwrap_or_default();

    let text = text_of(link);
    let text = if text.is_empty() { href.to_string() } else { text };

    let url = match is_relative_url(href) {
        Some(true) => format!("{base_url}{href}"),
        None => format!("{page_url}{href}"),
        Some(false) => href.to_string(),
    };

    (text, url)
}

/// Links in the body of a section, or between the top of the page and the first section
/// when `title` is `None`
///
/// Navigation boxes, infoboxes and tables of contents are skipped. Returns `None` if the
/// section can't be found.
pub fn section_links(
    html: &str,
    title: Option<&str>,
    base_url: &str,
    page_url: &str,
) -> Option<Vec<SectionLink>> {
    let document = Html::parse_document(html);

    let candidates = match title.filter(|title| !title.trim().is_empty()) {
        None => {
            let Some(root) = document.select(&selector("div.mw-parser-output")).next() else {
                return Some(Vec::new());
            };

            root.children().filter_map(ElementRef::wrap).collect::<Vec<_>>()
        }
        Some(title) => section_start(&document, title)?
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .collect(),
    };

    let anchors = selector("a");
    let mut links = Vec::new();

    for node in candidates {
        if node.value().attr("role") == Some("navigation")
            || node.value().classes().any(|class| class == "infobox")
            || has_class_containing(node, "toc")
        {
            continue;
        }

        if is_heading(node) {
            break;
        }

        if node.value().name() == "a" {
            links.push(link_info(node, base_url, page_url));
        } else {
            links.extend(
                node.select(&anchors)
                    .map(|link| link_info(link, base_url, page_url)),
            );
        }
    }

    Some(links)
}
