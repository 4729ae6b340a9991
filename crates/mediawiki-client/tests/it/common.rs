use mediawiki_client::{HttpError, MediaWiki, MediaWikiConfig, Params, Transport, Url};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

pub const API_URL: &str = "https://en.wikipedia.org/w/api.php";

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn site_info(extensions: &[&str]) -> Value {
    json!({
        "batchcomplete": "",
        "query": {
            "general": {
                "mainpage": "Main Page",
                "sitename": "Wikipedia",
                "generator": "MediaWiki 1.43.0-wmf.1",
                "server": "//en.wikipedia.org",
                "lang": "en"
            },
            "extensions": extensions
                .iter()
                .map(|name| json!({"type": "other", "name": name}))
                .collect::<Vec<_>>()
        }
    })
}

struct Route {
    matches: Vec<(String, String)>,
    response: Value,
}

impl Route {
    fn matches(&self, params: &Params) -> bool {
        self.matches
            .iter()
            .all(|(name, value)| params.get(name) == Some(value.as_str()))
    }
}

/// Every request a [`MockTransport`] received, shared with the test
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Params>>>);

impl RequestLog {
    fn push(&self, params: Params) {
        self.0.lock().unwrap().push(params);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// How many requests carried all of `pairs`
    pub fn count(&self, pairs: &[(&str, &str)]) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|params| {
                pairs
                    .iter()
                    .all(|(name, value)| params.get(name) == Some(*value))
            })
            .count()
    }
}

/// Answers requests with canned JSON; the first route whose pairs all match wins
pub struct MockTransport {
    routes: Vec<Route>,
    hosts: Vec<String>,
    log: RequestLog,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::without_site_info().route(
            &[("meta", "siteinfo"), ("siprop", "extensions|general")],
            site_info(&["TextExtracts", "GeoData", "PageImages"]),
        )
    }

    pub fn without_site_info() -> Self {
        Self {
            routes: Vec::new(),
            hosts: vec!["en.wikipedia.org".to_string()],
            log: RequestLog::default(),
        }
    }

    pub fn route(mut self, matches: &[(&str, &str)], response: Value) -> Self {
        self.routes.push(Route {
            matches: matches
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            response,
        });
        self
    }

    /// Also answer requests sent to `host`
    pub fn host(mut self, host: &str) -> Self {
        self.hosts.push(host.to_string());
        self
    }

    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }

    fn respond(&self, api_url: &Url, params: &Params) -> Result<String, HttpError> {
        if !self
            .hosts
            .iter()
            .any(|host| api_url.host_str() == Some(host.as_str()))
        {
            return Err(HttpError::Backend(format!("unknown host in '{api_url}'")));
        }

        self.log.push(params.clone());

        self.routes
            .iter()
            .find(|route| route.matches(params))
            .map(|route| route.response.to_string())
            .ok_or(HttpError::Status(404))
    }
}

impl Transport for MockTransport {
    fn get(&self, api_url: &Url, params: &Params) -> Result<String, HttpError> {
        self.respond(api_url, params)
    }

    fn post(&self, api_url: &Url, params: &Params) -> Result<String, HttpError> {
        self.respond(api_url, params)
    }
}

pub fn config() -> MediaWikiConfig {
    MediaWikiConfig::default().api_url(API_URL)
}

/// A client over `transport`, and the log of every request it sends
pub fn wiki(transport: MockTransport) -> (MediaWiki, RequestLog) {
    wiki_with_config(config(), transport)
}

pub fn wiki_with_config(config: MediaWikiConfig, transport: MockTransport) -> (MediaWiki, RequestLog) {
    init_logger();

    let log = transport.log();

    let wiki = MediaWiki::with_transport(config, Box::new(transport))
        .expect("Failed to create client over mock transport");

    (wiki, log)
}

pub fn chess_info() -> Value {
    json!({
        "batchcomplete": "",
        "query": {
            "pages": {
                "134": {
                    "pageid": 134,
                    "ns": 0,
                    "title": "Chess",
                    "contentmodel": "wikitext",
                    "fullurl": "https://en.wikipedia.org/wiki/Chess",
                    "canonicalurl": "https://en.wikipedia.org/wiki/Chess"
                }
            }
        }
    })
}

pub const CHESS_CONTENT: &str = "Chess is a board game for two players.\n\n\n== History ==\nChess is believed to originate in India.\n\n\n=== Modern chess ===\nThe rules were standardized in the 19th century.\n\n\n== Rules ==\nEach player begins with 16 pieces.";

pub const CHESS_HTML: &str = r##"<div class="mw-parser-output">
<div role="note" class="hatnote navigation-not-searchable">For other uses, see <a href="/wiki/Chess_(disambiguation)">Chess (disambiguation)</a>.</div>
<table class="infobox"><tbody><tr><td><a href="/wiki/File:ChessSet.jpg" class="mw-file-description"><img src="//upload.wikimedia.org/ChessSet.jpg"></a></td></tr></tbody></table>
<p><b>Chess</b> is a <a href="/wiki/Board_game">board game</a>.</p>
<div class="mw-heading mw-heading2"><h2 id="History">History</h2></div>
<p>Chess originated in <a href="/wiki/India">India</a>, see <a href="#Rules">rules</a>.</p>
<div class="mw-heading mw-heading2"><h2 id="Rules">Rules</h2></div>
<p><a href="/wiki/Chess_piece">Pieces</a></p>
</div>"##;

/// A transport that knows the "Chess" page
pub fn chess_transport() -> MockTransport {
    MockTransport::new().route(&[("titles", "Chess"), ("prop", "info|pageprops")], chess_info())
}
