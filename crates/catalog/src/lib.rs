//! Catalog - probe definition loading
//!
//! Parses the WhatsMyName JSON catalog and supplies it to the engine through
//! the `CatalogProvider` trait. Supported sources:
//! - in-memory definitions: `StaticCatalog`
//! - a local file: `FileCatalog`
//! - an `http(s)://` URL: `HttpCatalog`
//!
//! `CachedCatalog` wraps any of these so the catalog is read once per process.

mod provider;
mod wmn;

pub use provider::{
    catalog_from_source, CachedCatalog, FileCatalog, HttpCatalog, StaticCatalog,
    ACCEPT_LANGUAGE, BROWSER_USER_AGENT, DEFAULT_CATALOG_URL,
};
pub use wmn::parse_wmn;
