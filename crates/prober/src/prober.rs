// crates/prober/src/prober.rs
//! HTTP site prober implementation

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument};

use namehunt_catalog::{ACCEPT_LANGUAGE as BROWSER_ACCEPT_LANGUAGE, BROWSER_USER_AGENT};
use namehunt_common::{NamehuntError, NamehuntResult, ProbeDefinition, ProbeResult, Prober};

use crate::template::{render_body, render_uri};

/// Response bytes kept for signal matching; the rest is never read.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Client-wide options for [`HttpProber`].
#[derive(Debug, Clone)]
pub struct HttpProberOptions {
    pub verify_tls: bool,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for HttpProberOptions {
    fn default() -> Self {
        Self {
            verify_tls: false,
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

impl HttpProberOptions {
    /// Verify TLS certificates of probed sites.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }
}

/// Probes sites over HTTP with one shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// Create a prober with default options.
    pub fn new() -> NamehuntResult<Self> {
        Self::with_options(HttpProberOptions::default())
    }

    pub fn with_options(options: HttpProberOptions) -> NamehuntResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));

        let client = reqwest::Client::builder()
            .user_agent(options.user_agent)
            .default_headers(headers)
            .danger_accept_invalid_certs(!options.verify_tls)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .build()
            .map_err(|e| NamehuntError::Network(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn build_request(
        &self,
        definition: &ProbeDefinition,
        url: url::Url,
        username: &str,
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let request = match &definition.post_body {
            Some(body) => self.client.post(url).body(render_body(body, username)),
            None => self.client.get(url),
        };

        // Malformed per-site headers are skipped; the probe still runs.
        let mut headers = HeaderMap::new();
        for (k, v) in &definition.headers {
            match (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
                (Ok(k), Ok(v)) => {
                    headers.insert(k, v);
                }
                _ => debug!("Ignoring malformed header {} for {}", k, definition.site_name),
            }
        }

        request.headers(headers).timeout(timeout)
    }

    /// Send the request and read at most `MAX_BODY_BYTES` of the body.
    async fn fetch(request: reqwest::RequestBuilder) -> Result<(u16, String), reqwest::Error> {
        let mut response = request.send().await?;
        let status = response.status().as_u16();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = MAX_BODY_BYTES - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!("Body truncated at {} bytes", MAX_BODY_BYTES);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }
}

/// Flatten an error and its sources into one line.
fn describe_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }
    message
}

#[async_trait]
impl Prober for HttpProber {
    /// Probe a single site and classify the response.
    #[instrument(skip_all, fields(site = %definition.site_name))]
    async fn probe(
        &self,
        definition: &ProbeDefinition,
        username: &str,
        probe_timeout: Duration,
    ) -> ProbeResult {
        let site = definition.site_name.as_str();

        let url = match render_uri(&definition.uri_template, username) {
            Ok(url) => url,
            Err(e) => {
                debug!("Template rejected: {}", e);
                return ProbeResult::error(site, e.to_string());
            }
        };

        let shown_uri = definition
            .profile_template
            .as_deref()
            .and_then(|t| render_uri(t, username).ok())
            .unwrap_or_else(|| url.clone())
            .to_string();

        let request = self.build_request(definition, url, username, probe_timeout);
        let start = Instant::now();

        // The outer timeout also bounds body reads on slow-drip responses.
        match timeout(probe_timeout, Self::fetch(request)).await {
            Ok(Ok((status, body))) => {
                let elapsed = start.elapsed();
                let outcome = definition.existence_signal.classify(status, &body);
                debug!("HTTP {} in {:?} -> {}", status, elapsed, outcome);
                ProbeResult::new(site, outcome)
                    .with_http_status(status)
                    .with_uri(shown_uri)
                    .with_elapsed(elapsed)
            }
            Ok(Err(e)) if e.is_timeout() => {
                debug!("Timed out: {}", e);
                ProbeResult::timed_out(site, probe_timeout).with_uri(shown_uri)
            }
            Ok(Err(e)) => {
                let detail = describe_error(&e);
                debug!("Request failed: {}", detail);
                let mut result = ProbeResult::error(site, detail)
                    .with_uri(shown_uri)
                    .with_elapsed(start.elapsed());
                if let Some(status) = e.status() {
                    result = result.with_http_status(status.as_u16());
                }
                result
            }
            Err(_) => {
                debug!("Timed out after {:?}", probe_timeout);
                ProbeResult::timed_out(site, probe_timeout).with_uri(shown_uri)
            }
        }
    }

    fn name(&self) -> &str {
        "HTTP Prober"
    }
}
