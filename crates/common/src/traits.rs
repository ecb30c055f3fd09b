//! Core traits for namehunt components
//!
//! - `Prober`: checks one site for one username; failures become data
//! - `CatalogProvider`: supplies the read-only probe catalog

use crate::error::NamehuntResult;
use crate::types::{ProbeDefinition, ProbeResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Site prober trait - every probe implementation must implement this.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Check one site for `username`, giving up after `timeout`.
    ///
    /// Never fails: malformed definitions, network faults and slow sites
    /// are reported through the returned result's status.
    async fn probe(&self, definition: &ProbeDefinition, username: &str, timeout: Duration)
        -> ProbeResult;

    /// Prober name/identifier
    fn name(&self) -> &str;
}

/// Source of probe definitions.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Load the full ordered catalog.
    async fn load(&self) -> NamehuntResult<Arc<[ProbeDefinition]>>;

    /// Where the catalog comes from, for logs.
    fn source(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExistenceSignal, ProbeStatus};

    struct MockProber;

    #[async_trait]
    impl Prober for MockProber {
        async fn probe(
            &self,
            definition: &ProbeDefinition,
            _username: &str,
            _timeout: Duration,
        ) -> ProbeResult {
            ProbeResult::new(definition.site_name.clone(), ProbeStatus::Absent)
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_prober_trait() {
        let prober: Arc<dyn Prober> = Arc::new(MockProber);
        let def = ProbeDefinition::new(
            "example",
            "https://example.com/{account}",
            ExistenceSignal::default(),
        );

        let result = prober.probe(&def, "alice", Duration::from_secs(1)).await;
        assert_eq!(result.site_name, "example");
        assert_eq!(result.status, ProbeStatus::Absent);
    }
}
