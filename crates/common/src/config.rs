//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NamehuntError, NamehuntResult};

/// Tuning knobs for probing, scheduling, caching and job retention.
///
/// Fields are `pub` so the orchestrator and prober can read them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on one site check.
    pub per_probe_timeout: Duration,
    /// Upper bound on total enumeration wall time for one job.
    pub job_timeout: Duration,
    /// Age after which a cached result is ignored.
    pub cache_expiration: Duration,
    /// Max simultaneous in-flight probes per job.
    pub concurrency_limit: usize,
    pub max_username_len: usize,
    /// Verify TLS certificates of probed sites.
    pub verify_tls: bool,
    /// Return the running job's id for a duplicate submit instead of starting another run.
    pub coalesce_inflight: bool,
    /// Terminal jobs kept before the oldest are evicted.
    pub max_retained_jobs: usize,
    /// Terminal jobs older than this are evicted.
    pub job_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            per_probe_timeout: Duration::from_secs(30),
            job_timeout: Duration::from_secs(90),
            cache_expiration: Duration::from_secs(900),
            concurrency_limit: 50,
            max_username_len: 64,
            verify_tls: false,
            coalesce_inflight: true,
            max_retained_jobs: 10_000,
            job_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EngineConfig {
    #[inline]
    #[must_use]
    pub fn with_per_probe_timeout(mut self, timeout: Duration) -> Self {
        self.per_probe_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache_expiration = expiration;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_coalesce_inflight(mut self, coalesce: bool) -> Self {
        self.coalesce_inflight = coalesce;
        self
    }

    pub fn validate(&self) -> NamehuntResult<()> {
        if self.per_probe_timeout.is_zero() {
            return Err(NamehuntError::Config("per_probe_timeout must be positive".into()));
        }
        if self.job_timeout.is_zero() {
            return Err(NamehuntError::Config("job_timeout must be positive".into()));
        }
        if self.concurrency_limit == 0 {
            return Err(NamehuntError::Config("concurrency_limit must be at least 1".into()));
        }
        if self.max_username_len == 0 {
            return Err(NamehuntError::Config("max_username_len must be at least 1".into()));
        }
        if self.max_retained_jobs == 0 {
            return Err(NamehuntError::Config("max_retained_jobs must be at least 1".into()));
        }
        Ok(())
    }
}
