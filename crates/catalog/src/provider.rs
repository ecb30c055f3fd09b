//! Catalog providers: in-memory, file, HTTP, and a load-once wrapper.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use namehunt_common::{CatalogProvider, NamehuntError, NamehuntResult, ProbeDefinition};

use crate::wmn::parse_wmn;

/// Default upstream WhatsMyName catalog.
pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/WebBreacher/WhatsMyName/main/wmn-data.json";

/// Browser-like user agent sent when fetching the catalog and probing sites.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Accept-Language sent alongside [`BROWSER_USER_AGENT`].
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Catalog held in memory.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    definitions: Arc<[ProbeDefinition]>,
}

impl StaticCatalog {
    pub fn new(definitions: Vec<ProbeDefinition>) -> Self {
        Self {
            definitions: definitions.into(),
        }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn load(&self) -> NamehuntResult<Arc<[ProbeDefinition]>> {
        Ok(self.definitions.clone())
    }

    fn source(&self) -> &str {
        "memory"
    }
}

/// Catalog read from a WhatsMyName JSON file on every load.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
    label: String,
}

impl FileCatalog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }
}

#[async_trait]
impl CatalogProvider for FileCatalog {
    #[instrument(skip(self), fields(path = %self.label))]
    async fn load(&self) -> NamehuntResult<Arc<[ProbeDefinition]>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            NamehuntError::Catalog(format!("cannot read {}: {}", self.label, e))
        })?;
        let definitions = parse_wmn(&raw)?;
        debug!("Loaded {} site definitions from file", definitions.len());
        Ok(definitions.into())
    }

    fn source(&self) -> &str {
        &self.label
    }
}

/// Catalog fetched over HTTP on every load.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    url: String,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new<S: Into<String>>(url: S) -> NamehuntResult<Self> {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout<S: Into<String>>(url: S, timeout: Duration) -> NamehuntResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| NamehuntError::Network(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl CatalogProvider for HttpCatalog {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn load(&self) -> NamehuntResult<Arc<[ProbeDefinition]>> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| NamehuntError::Catalog(format!("fetching {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NamehuntError::Catalog(format!(
                "fetching {} returned HTTP {}",
                self.url, status
            )));
        }

        // Served as text/plain by raw.githubusercontent.com, so parse the body directly.
        let body = response
            .text()
            .await
            .map_err(|e| NamehuntError::Catalog(format!("reading {} failed: {}", self.url, e)))?;
        let definitions = parse_wmn(&body)?;
        info!("Fetched {} site definitions", definitions.len());
        Ok(definitions.into())
    }

    fn source(&self) -> &str {
        &self.url
    }
}

/// Loads the wrapped catalog once and serves the same definitions afterwards.
///
/// A failed load is not remembered; the next call retries.
pub struct CachedCatalog {
    inner: Arc<dyn CatalogProvider>,
    loaded: OnceCell<Arc<[ProbeDefinition]>>,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn CatalogProvider>) -> Self {
        Self {
            inner,
            loaded: OnceCell::new(),
        }
    }
}

#[async_trait]
impl CatalogProvider for CachedCatalog {
    async fn load(&self) -> NamehuntResult<Arc<[ProbeDefinition]>> {
        self.loaded
            .get_or_try_init(|| self.inner.load())
            .await
            .cloned()
    }

    fn source(&self) -> &str {
        self.inner.source()
    }
}

/// Pick a provider for `source`: `http(s)://` URLs are fetched, anything else is a file path.
pub fn catalog_from_source(source: &str) -> NamehuntResult<Arc<dyn CatalogProvider>> {
    let source = source.trim();
    if source.is_empty() {
        return Err(NamehuntError::Config("catalog source must not be empty".into()));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(Arc::new(HttpCatalog::new(source)?))
    } else {
        Ok(Arc::new(FileCatalog::new(source)))
    }
}
