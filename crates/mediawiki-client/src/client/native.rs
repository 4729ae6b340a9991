use super::{HttpError, MediaWikiConfig, Transport};
use crate::params::Params;
use http::HeaderMap;
use ureq::Agent;
use url::Url;

type InnerClient = ureq::Agent;

type HttpErrorInner = ureq::Error;

impl From<HttpErrorInner> for HttpError {
    fn from(error: HttpErrorInner) -> Self {
        match error {
            HttpErrorInner::StatusCode(code) => Self::Status(code),
            HttpErrorInner::Timeout(_) => Self::Timeout,
            other => Self::Backend(other.to_string()),
        }
    }
}

/// A blocking transport backed by a [`ureq::Agent`]
///
/// The agent keeps a cookie store, so a login through [`crate::MediaWiki::login`] lasts until
/// the transport is reconfigured.
pub struct UreqTransport {
    client: InnerClient,
    headers: HeaderMap,
}

impl UreqTransport {
    pub fn from_config(config: &MediaWikiConfig) -> Result<Self, HttpError> {
        Ok(Self {
            client: Self::build_agent(config)?,
            headers: config.headers().clone(),
        })
    }

    fn build_agent(config: &MediaWikiConfig) -> Result<InnerClient, HttpError> {
        let mut builder = ureq::config::Config::builder()
            .max_redirects(super::CLIENT_REDIRECTS)
            .timeout_global(config.get_timeout());

        if let Some(proxy) = config.get_proxy() {
            builder = builder.proxy(Some(ureq::Proxy::new(proxy)?));
        }

        if !config.get_verify_ssl() {
            log::warn!("TLS certificate verification is disabled");

            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }

        Ok(Agent::new_with_config(builder.build()))
    }
}

impl Transport for UreqTransport {
    fn get(&self, api_url: &Url, params: &Params) -> Result<String, HttpError> {
        let mut url = api_url.clone();

        url.query_pairs_mut().extend_pairs(params.iter());

        log::info!("Loading from url '{}'", &url);

        let mut request = self.client.get(url.as_str());

        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }

        Ok(request
            .call()
            .and_then(|body| body.into_body().read_to_string())?)
    }

    fn post(&self, api_url: &Url, params: &Params) -> Result<String, HttpError> {
        log::info!(
            "Posting to url '{api_url}' (action '{}')",
            params.get("action").unwrap_or("query")
        );

        let mut request = self.client.post(api_url.as_str());

        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }

        Ok(request
            .send_form(params.iter())
            .and_then(|body| body.into_body().read_to_string())?)
    }

    fn configure(&mut self, config: &MediaWikiConfig) -> Result<(), HttpError> {
        self.client = Self::build_agent(config)?;
        self.headers = config.headers().clone();

        Ok(())
    }
}
