use crate::common::{self, CHESS_CONTENT, CHESS_HTML, MockTransport};
use mediawiki_client::{Coordinates, MediaWikiError, PageQuery};
use pretty_assertions::assert_eq;
use serde_json::json;

fn chess() -> PageQuery {
    PageQuery::title("Chess").auto_suggest(false)
}

fn content_response(extract: Option<&str>) -> serde_json::Value {
    let mut page = json!({
        "pageid": 134,
        "title": "Chess",
        "revisions": [{"revid": 1_234_567, "parentid": 1_234_560}]
    });

    if let Some(extract) = extract {
        page["extract"] = json!(extract);
    }

    json!({"batchcomplete": "", "query": {"pages": {"134": page}}})
}

fn html_response() -> serde_json::Value {
    json!({"query": {"pages": {"134": {"pageid": 134, "title": "Chess", "revisions": [{"*": CHESS_HTML}]}}}})
}

#[test]
fn load_by_title() {
    let (wiki, _) = common::wiki(common::chess_transport());

    let page = wiki.page(chess()).unwrap();

    assert_eq!(page.title(), "Chess");
    assert_eq!(page.original_title(), "Chess");
    assert_eq!(page.pageid(), 134);
    assert_eq!(page.url(), "https://en.wikipedia.org/wiki/Chess");
    assert_eq!(page.to_string(), "<MediaWikiPage 'Chess'>");
}

#[test]
fn load_by_pageid() {
    let (wiki, _) = common::wiki(
        MockTransport::new().route(&[("pageids", "134"), ("prop", "info|pageprops")], common::chess_info()),
    );

    let by_id = wiki.page(134_u64).unwrap();

    assert_eq!(by_id.title(), "Chess");
    assert_eq!(by_id.original_title(), "");
}

#[test]
fn pages_compare_by_identity() {
    let (wiki, _) = common::wiki(
        common::chess_transport()
            .route(&[("pageids", "134"), ("prop", "info|pageprops")], common::chess_info()),
    );

    assert_eq!(wiki.page(chess()).unwrap(), wiki.page(134_u64).unwrap());
}

#[test]
fn auto_suggest_replaces_title() {
    let (wiki, log) = common::wiki(common::chess_transport().route(
        &[("list", "search"), ("srsearch", "chess")],
        json!({"query": {"search": [{"title": "Chess"}]}}),
    ));

    let page = wiki.page("chess").unwrap();

    assert_eq!(page.title(), "Chess");
    assert_eq!(log.count(&[("srlimit", "1"), ("srinfo", "suggestion")]), 1);
}

#[test]
fn auto_suggest_without_results() {
    let (wiki, _) = common::wiki(MockTransport::new().route(
        &[("list", "search")],
        json!({"query": {"searchinfo": {"totalhits": 0}, "search": []}}),
    ));

    let err = wiki.page("gobbilygook").unwrap_err();

    assert_eq!(
        err.to_string(),
        "\"gobbilygook\" does not match any pages. Try another query!"
    );
}

#[test]
fn missing_page() {
    let (wiki, _) = common::wiki(MockTransport::new().route(
        &[("titles", "Gobbilygook"), ("prop", "info|pageprops")],
        json!({"query": {"pages": {"-1": {"ns": 0, "title": "Gobbilygook", "missing": ""}}}}),
    ));

    let err = wiki
        .page(PageQuery::title("Gobbilygook").auto_suggest(false))
        .unwrap_err();

    assert!(matches!(err, MediaWikiError::Page(_)));
    assert_eq!(
        err.to_string(),
        "\"Gobbilygook\" does not match any pages. Try another query!"
    );
}

#[test]
fn missing_pageid() {
    let (wiki, _) = common::wiki(MockTransport::new().route(
        &[("pageids", "99999999"), ("prop", "info|pageprops")],
        json!({"query": {"pages": {"99999999": {"pageid": 99_999_999, "missing": ""}}}}),
    ));

    let err = wiki.page(99_999_999_u64).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Page id \"99999999\" does not match any pages. Try another id!"
    );
}

#[test]
fn empty_title_is_rejected() {
    let (wiki, _) = common::wiki(MockTransport::new());

    let err = wiki.page("").unwrap_err();

    assert_eq!(err.to_string(), "Either a title or a pageid must be specified");
}

fn redirect_transport() -> MockTransport {
    MockTransport::new()
        .route(
            &[("titles", "Arya"), ("prop", "info|pageprops")],
            json!({"query": {
                "redirects": [{"from": "Arya", "to": "Arya Stark"}],
                "pages": {"1": {"pageid": 1, "title": "Arya Stark", "fullurl": "https://en.wikipedia.org/wiki/Arya_Stark"}}
            }}),
        )
        .route(
            &[("titles", "Arya Stark"), ("prop", "info|pageprops")],
            json!({"query": {
                "pages": {"1": {"pageid": 1, "title": "Arya Stark", "fullurl": "https://en.wikipedia.org/wiki/Arya_Stark"}}
            }}),
        )
}

#[test]
fn blank_title_falls_back_to_pageid() {
    let (wiki, log) = common::wiki(
        MockTransport::new().route(&[("pageids", "134"), ("prop", "info|pageprops")], common::chess_info()),
    );

    let query = PageQuery {
        title: Some("  ".to_string()),
        ..PageQuery::pageid(134)
    };

    let page = wiki.page(query).unwrap();

    assert_eq!(page.title(), "Chess");
    assert_eq!(log.count(&[("list", "search")]), 0);
}

#[test]
fn redirects_are_followed() {
    let (wiki, _) = common::wiki(redirect_transport());

    let page = wiki
        .page(PageQuery::title("Arya").auto_suggest(false))
        .unwrap();

    assert_eq!(page.title(), "Arya Stark");
    assert_eq!(page.original_title(), "Arya");
}

#[test]
fn endless_redirects_are_cut_off() {
    let (wiki, log) = common::wiki(MockTransport::new().route(
        &[("titles", "Loop"), ("prop", "info|pageprops")],
        json!({"query": {
            "redirects": [{"from": "Loop", "to": "Loop"}],
            "pages": {"7": {"pageid": 7, "title": "Loop", "fullurl": "https://en.wikipedia.org/wiki/Loop"}}
        }}),
    ));

    let err = wiki
        .page(PageQuery::title("Loop").auto_suggest(false))
        .unwrap_err();

    assert!(matches!(err, MediaWikiError::UnexpectedResponse(_)));
    assert_eq!(
        err.to_string(),
        "Unexpected response from the MediaWiki site: more than 10 redirects for 'Loop'"
    );
    assert_eq!(log.count(&[("titles", "Loop")]), 11);
}

#[test]
fn redirect_not_allowed() {
    let (wiki, _) = common::wiki(redirect_transport());

    let err = wiki
        .page(PageQuery::title("Arya").auto_suggest(false).redirect(false))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "\"Arya\" resulted in a redirect. Set the redirect property to True to allow automatic redirects."
    );
}

#[test]
fn disambiguation_page() {
    let html = r##"<div class="mw-parser-output"><p><b>Bush</b> may refer to:</p><ul>
        <li class="toclevel-1 tocsection-1"><a href="#People">People</a></li>
        <li><a href="/wiki/Shrub" title="Shrub">Shrub</a>, a small woody plant</li>
        <li><a href="/wiki/Bush_(band)" title="Bush (band)">Bush (band)</a>, a British rock band</li>
    </ul></div>"##;

    let (wiki, _) = common::wiki(
        MockTransport::new()
            .route(
                &[("titles", "Bush"), ("prop", "info|pageprops")],
                json!({"query": {"pages": {"4321": {
                    "pageid": 4321,
                    "title": "Bush",
                    "fullurl": "https://en.wikipedia.org/wiki/Bush",
                    "pageprops": {"disambiguation": ""}
                }}}}),
            )
            .route(
                &[("titles", "Bush"), ("prop", "revisions"), ("rvparse", "")],
                json!({"query": {"pages": {"4321": {"revisions": [{"*": html}]}}}}),
            ),
    );

    let err = match wiki
        .page(PageQuery::title("Bush").auto_suggest(false))
        .unwrap_err()
    {
        MediaWikiError::Disambiguation(err) => err,
        other => panic!("Expected a disambiguation error, got '{other}'"),
    };

    assert_eq!(err.title, "Bush");
    assert_eq!(err.url, "https://en.wikipedia.org/wiki/Bush");
    assert_eq!(err.unordered_options, vec!["Shrub", "Bush (band)"]);
    assert_eq!(err.options(), vec!["Bush (band)", "Shrub"]);
    assert_eq!(err.details[1].description, "Bush (band), a British rock band");
}

#[test]
fn content_is_fetched_once() {
    let (wiki, log) = common::wiki(common::chess_transport().route(
        &[("titles", "Chess"), ("prop", "extracts|revisions")],
        content_response(Some(CHESS_CONTENT)),
    ));

    let page = wiki.page(chess()).unwrap();

    assert_eq!(page.content().unwrap(), CHESS_CONTENT);
    assert_eq!(page.revision_id().unwrap(), 1_234_567);
    assert_eq!(page.parent_id().unwrap(), 1_234_560);
    assert_eq!(page.content().unwrap(), CHESS_CONTENT);

    assert_eq!(log.count(&[("prop", "extracts|revisions"), ("rvprop", "ids")]), 1);
}

#[test]
fn content_needs_text_extracts() {
    let (wiki, _) = common::wiki(
        MockTransport::without_site_info()
            .route(&[("meta", "siteinfo")], common::site_info(&["GeoData"]))
            .route(&[("titles", "Chess"), ("prop", "info|pageprops")], common::chess_info())
            .route(
                &[("titles", "Chess"), ("prop", "extracts|revisions")],
                content_response(None),
            ),
    );

    let page = wiki.page(chess()).unwrap();

    assert!(matches!(page.content(), Err(MediaWikiError::MissingExtension(_))));
}

#[test]
fn sections_and_table_of_contents() {
    let (wiki, _) = common::wiki(common::chess_transport().route(
        &[("titles", "Chess"), ("prop", "extracts|revisions")],
        content_response(Some(CHESS_CONTENT)),
    ));

    let page = wiki.page(chess()).unwrap();

    assert_eq!(page.sections().unwrap(), ["History", "Modern chess", "Rules"]);

    let toc = page.table_of_contents().unwrap();

    assert_eq!(toc.len(), 2);
    assert_eq!(
        toc.get("History").unwrap().children.entries()[0].title,
        "Modern chess"
    );

    assert_eq!(
        page.section(Some("History")).unwrap().as_deref(),
        Some("Chess is believed to originate in India.")
    );
    assert_eq!(
        page.section(None).unwrap().as_deref(),
        Some("Chess is a board game for two players.")
    );
    assert_eq!(page.section(Some("Gobbilygook")).unwrap(), None);
}

fn combined_transport() -> MockTransport {
    common::chess_transport()
        .route(
            &[("titles", "Chess"), ("plcontinue", "134|0|Queen_(chess)")],
            json!({
                "batchcomplete": "",
                "query": {"pages": {"134": {
                    "pageid": 134,
                    "title": "Chess",
                    "links": [{"ns": 0, "title": "Bishop (chess)"}]
                }}}
            }),
        )
        .route(
            &[
                ("titles", "Chess"),
                ("prop", "extracts|redirects|links|coordinates|categories|extlinks"),
            ],
            json!({
                "continue": {"plcontinue": "134|0|Queen_(chess)", "continue": "||"},
                "query": {"pages": {"134": {
                    "pageid": 134,
                    "title": "Chess",
                    "extract": "Chess is a board game for two players.",
                    "redirects": [{"title": "Chess game"}, {"title": "Chess (game)"}],
                    "links": [{"ns": 0, "title": "Queen (chess)"}],
                    "coordinates": [{"lat": 51.5, "lon": -0.125, "primary": "", "globe": "earth"}],
                    "categories": [{"ns": 14, "title": "Category:Board games"}, {"ns": 14, "title": "Category:Abstract strategy games"}],
                    "extlinks": [{"*": "//www.fide.com/"}, {"*": "https://www.chess.com/"}]
                }}}
            }),
        )
}

#[test]
fn combined_properties_share_requests() {
    let (wiki, log) = common::wiki(combined_transport());

    let page = wiki.page(chess()).unwrap();

    assert_eq!(
        page.summary().unwrap(),
        Some("Chess is a board game for two players.")
    );
    assert_eq!(page.links().unwrap(), ["Bishop (chess)", "Queen (chess)"]);
    assert_eq!(
        page.categories().unwrap(),
        ["Abstract strategy games", "Board games"]
    );
    assert_eq!(page.redirects().unwrap(), ["Chess (game)", "Chess game"]);
    assert_eq!(
        page.references().unwrap(),
        ["http://www.fide.com/", "https://www.chess.com/"]
    );
    assert_eq!(
        page.coordinates().unwrap(),
        Some(Coordinates {
            latitude: 51.5,
            longitude: -0.125
        })
    );

    assert_eq!(log.count(&[("prop", "extracts|redirects|links|coordinates|categories|extlinks")]), 2);
    assert_eq!(log.count(&[("plcontinue", "134|0|Queen_(chess)"), ("continue", "||")]), 1);
}

#[test]
fn preload_fetches_properties_up_front() {
    let (wiki, log) = common::wiki(
        combined_transport()
            .route(
                &[("titles", "Chess"), ("prop", "extracts|revisions")],
                content_response(Some(CHESS_CONTENT)),
            )
            .route(
                &[("titles", "Chess"), ("generator", "images")],
                json!({"query": {"pages": {
                    "-1": {"ns": 6, "title": "File:A.png", "imageinfo": [{"url": "https://upload.wikimedia.org/a.png"}]}
                }}}),
            )
            .route(
                &[("list", "backlinks"), ("bltitle", "Chess")],
                json!({"batchcomplete": "", "query": {"backlinks": [{"pageid": 5, "ns": 0, "title": "Go (game)"}]}}),
            ),
    );

    let page = wiki.page(chess().preload(true)).unwrap();

    let sent = log.len();

    assert_eq!(log.count(&[("prop", "extracts|revisions")]), 1);
    assert_eq!(log.count(&[("generator", "images")]), 1);
    assert_eq!(log.count(&[("list", "backlinks")]), 1);
    assert_eq!(log.count(&[("prop", "extracts|redirects|links|coordinates|categories|extlinks")]), 2);

    assert_eq!(page.content().unwrap(), CHESS_CONTENT);
    assert_eq!(page.images().unwrap(), ["https://upload.wikimedia.org/a.png"]);
    assert_eq!(page.backlinks().unwrap(), ["Go (game)"]);
    assert_eq!(page.sections().unwrap(), ["History", "Modern chess", "Rules"]);
    assert_eq!(page.links().unwrap(), ["Bishop (chess)", "Queen (chess)"]);
    assert_eq!(page.categories().unwrap(), ["Abstract strategy games", "Board games"]);
    assert_eq!(page.redirects().unwrap(), ["Chess (game)", "Chess game"]);
    assert!(page.summary().unwrap().is_some());
    assert!(page.coordinates().unwrap().is_some());
    assert_eq!(page.references().unwrap().len(), 2);

    assert_eq!(log.len(), sent);
}

#[test]
fn stuck_continuation_stops() {
    let (wiki, log) = common::wiki(common::chess_transport().route(
        &[("list", "backlinks"), ("bltitle", "Chess")],
        json!({
            "continue": {"blcontinue": "0|1234", "continue": "-||"},
            "query": {"backlinks": [{"pageid": 5, "ns": 0, "title": "Go (game)"}]}
        }),
    ));

    let page = wiki.page(chess()).unwrap();

    assert_eq!(page.backlinks().unwrap(), ["Go (game)", "Go (game)"]);
    assert_eq!(log.count(&[("list", "backlinks")]), 2);
    assert_eq!(
        log.count(&[("list", "backlinks"), ("blfilterredir", "nonredirects"), ("blnamespace", "0")]),
        2
    );
}

#[test]
fn images_from_generator() {
    let (wiki, _) = common::wiki(common::chess_transport().route(
        &[("titles", "Chess"), ("generator", "images")],
        json!({"query": {"pages": {
            "-1": {"ns": 6, "title": "File:B.png", "imageinfo": [{"url": "https://upload.wikimedia.org/b.png"}]},
            "-2": {"ns": 6, "title": "File:A.png", "imageinfo": [{"url": "https://upload.wikimedia.org/a.png"}]},
            "-3": {"ns": 6, "title": "File:Hidden.png", "imagerepository": ""}
        }}}),
    ));

    let page = wiki.page(chess()).unwrap();

    assert_eq!(
        page.images().unwrap(),
        [
            "https://upload.wikimedia.org/a.png",
            "https://upload.wikimedia.org/b.png"
        ]
    );
}

#[test]
fn langlinks_by_language() {
    let (wiki, _) = common::wiki(common::chess_transport().route(
        &[("titles", "Chess"), ("prop", "langlinks")],
        json!({"query": {"pages": {"134": {
            "pageid": 134,
            "title": "Chess",
            "langlinks": [{"lang": "fr", "*": "Échecs"}, {"lang": "de", "*": "Schach"}]
        }}}}),
    ));

    let page = wiki.page(chess()).unwrap();
    let langlinks = page.langlinks().unwrap();

    assert_eq!(langlinks.len(), 2);
    assert_eq!(langlinks.get("de").map(String::as_str), Some("Schach"));
}

#[test]
fn html_derived_properties() {
    let (wiki, log) = common::wiki(common::chess_transport().route(
        &[("titles", "Chess"), ("prop", "revisions"), ("rvprop", "content")],
        html_response(),
    ));

    let page = wiki.page(chess()).unwrap();

    assert_eq!(
        page.logos().unwrap(),
        ["https://upload.wikimedia.org/ChessSet.jpg"]
    );
    assert_eq!(
        page.hatnotes().unwrap(),
        ["For other uses, see Chess (disambiguation)."]
    );

    let links = page.parse_section_links(Some("History")).unwrap().unwrap();

    assert_eq!(
        links,
        vec![
            (
                "India".to_string(),
                "https://en.wikipedia.org/wiki/India".to_string()
            ),
            (
                "rules".to_string(),
                "https://en.wikipedia.org/wiki/Chess#Rules".to_string()
            ),
        ]
    );

    let lead = page.parse_section_links(None).unwrap().unwrap();

    assert_eq!(lead.len(), 2);
    assert_eq!(lead[1].0, "board game");
    assert_eq!(page.parse_section_links(Some("Gobbilygook")).unwrap(), None);

    assert_eq!(log.count(&[("rvparse", "")]), 1);
}

#[test]
fn summarize_clamps_sentences() {
    let (wiki, log) = common::wiki(common::chess_transport().route(
        &[("titles", "Chess"), ("prop", "extracts")],
        json!({"query": {"pages": {"134": {"pageid": 134, "extract": "Chess is a board game."}}}}),
    ));

    let page = wiki.page(chess()).unwrap();

    assert_eq!(
        page.summarize(20, 0).unwrap().as_deref(),
        Some("Chess is a board game.")
    );
    page.summarize(0, 50).unwrap();
    page.summarize(0, 0).unwrap();

    assert_eq!(log.count(&[("exsentences", "10")]), 1);
    assert_eq!(log.count(&[("exchars", "50")]), 1);
    assert_eq!(log.count(&[("prop", "extracts"), ("exintro", "")]), 1);
}

#[test]
fn summary_is_memoized() {
    let (wiki, log) = common::wiki(common::chess_transport().route(
        &[("titles", "Chess"), ("prop", "extracts")],
        json!({"query": {"pages": {"134": {"pageid": 134, "extract": "Chess is a board game."}}}}),
    ));

    for _ in 0..2 {
        assert_eq!(
            wiki.summary("Chess", 1, 0, false, true).unwrap().as_deref(),
            Some("Chess is a board game.")
        );
    }

    assert_eq!(log.count(&[("prop", "info|pageprops")]), 1);
    assert_eq!(log.count(&[("exsentences", "1")]), 1);
}

#[test]
fn wikitext_and_preview() {
    let (wiki, log) = common::wiki(
        common::chess_transport()
            .route(
                &[("action", "parse"), ("page", "Chess")],
                json!({"parse": {"title": "Chess", "pageid": 134, "wikitext": "'''Chess''' is a [[board game]]."}}),
            )
            .route(
                &[("titles", "Chess"), ("formatversion", "2")],
                json!({"batchcomplete": true, "query": {"pages": [{
                    "pageid": 134,
                    "title": "Chess",
                    "extract": "Chess is a board game.",
                    "description": "Strategy board game",
                    "thumbnail": {"source": "https://upload.wikimedia.org/thumb.png", "width": 320, "height": 320}
                }]}}),
            ),
    );

    let page = wiki.page(chess()).unwrap();

    assert_eq!(page.wikitext().unwrap(), "'''Chess''' is a [[board game]].");

    let preview = page.preview().unwrap();

    assert_eq!(preview["description"], json!("Strategy board game"));
    assert_eq!(preview["thumbnail"]["width"], json!(320));

    page.preview().unwrap();

    assert_eq!(log.count(&[("formatversion", "2"), ("pithumbsize", "320")]), 1);
}
