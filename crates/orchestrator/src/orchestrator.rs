// crates/orchestrator/src/orchestrator.rs
//! Orchestrator - lookup submission and job status

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

use namehunt_common::{
    normalize_username, username_key, CatalogProvider, EngineConfig, JobId, JobSnapshot,
    NamehuntError, NamehuntResult, Prober,
};
use namehunt_telemetry::record_cache_lookup;

use crate::cache::ResultCache;
use crate::scheduler::{EnumerationScheduler, ScheduleLimits};
use crate::store::JobStore;

/// Entry point tying the cache, job store and scheduler together.
pub struct Orchestrator {
    config: EngineConfig,
    store: Arc<JobStore>,
    cache: Arc<ResultCache>,
    scheduler: Arc<EnumerationScheduler>,
    catalog: Arc<dyn CatalogProvider>,
    /// Username key -> job still being enumerated.
    inflight: Arc<DashMap<String, JobId>>,
}

impl Orchestrator {
    /// Build an orchestrator from a validated configuration.
    pub fn new(
        config: EngineConfig,
        prober: Arc<dyn Prober>,
        catalog: Arc<dyn CatalogProvider>,
    ) -> NamehuntResult<Self> {
        config.validate()?;
        let store = Arc::new(JobStore::new(config.max_retained_jobs, config.job_retention));
        let cache = Arc::new(ResultCache::new(config.cache_expiration));
        let scheduler = Arc::new(EnumerationScheduler::new(prober, cache.clone()));
        Ok(Self {
            config,
            store,
            cache,
            scheduler,
            catalog,
            inflight: Arc::new(DashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Start (or reuse) a lookup for `username` and return its job id.
    ///
    /// Returns immediately; enumeration runs on the current tokio runtime.
    pub fn submit(&self, username: &str) -> NamehuntResult<JobId> {
        let username = normalize_username(username, self.config.max_username_len)?;
        let key = username_key(&username);

        if let Some(results) = self.cache.lookup(&key) {
            record_cache_lookup(true);
            let id = self.store.create_completed(&username, (*results).clone());
            info!("Cache hit for {}, returning job {}", username, id);
            return Ok(id);
        }
        record_cache_lookup(false);

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| NamehuntError::Config("submit requires a tokio runtime".into()))?;

        let id = if self.config.coalesce_inflight {
            match self.inflight.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    let existing = *entry.get();
                    if self.is_active(&existing) {
                        debug!("Lookup for {} already running as job {}", username, existing);
                        return Ok(existing);
                    }
                    let id = self.store.create(&username);
                    entry.insert(id);
                    id
                }
                Entry::Vacant(entry) => {
                    let id = self.store.create(&username);
                    entry.insert(id);
                    id
                }
            }
        } else {
            self.store.create(&username)
        };

        let handle = self.store.handle(id);
        let scheduler = self.scheduler.clone();
        let catalog = self.catalog.clone();
        let inflight = self.inflight.clone();
        let limits = ScheduleLimits::from(&self.config);
        let task_username = username.clone();

        runtime.spawn(
            async move {
                scheduler
                    .run(handle, catalog.as_ref(), &task_username, limits)
                    .await;
                inflight.remove_if(&key, |_, running| *running == id);
            }
            .instrument(info_span!("lookup", job = %id)),
        );

        info!("Job {} created for lookup username: {}", id, username);
        Ok(id)
    }

    /// Submit several usernames; each gets its own outcome.
    pub fn submit_many<I, S>(&self, usernames: I) -> Vec<(String, NamehuntResult<JobId>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        usernames
            .into_iter()
            .map(|u| {
                let raw = u.as_ref().to_string();
                let outcome = self.submit(&raw);
                (raw, outcome)
            })
            .collect()
    }

    /// Current snapshot of a job.
    pub fn status(&self, id: &JobId) -> NamehuntResult<JobSnapshot> {
        self.store.get(id)
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, id: &JobId, poll_interval: Duration) -> NamehuntResult<JobSnapshot> {
        loop {
            let snapshot = self.status(id)?;
            if snapshot.state.is_terminal() {
                return Ok(snapshot);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn is_active(&self, id: &JobId) -> bool {
        self.store
            .get(id)
            .map(|job| !job.state.is_terminal())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{catalog, MockProber};
    use namehunt_catalog::StaticCatalog;
    use namehunt_common::{JobState, ProbeStatus};

    fn orchestrator(prober: Arc<MockProber>, sites: usize, config: EngineConfig) -> Orchestrator {
        let catalog = Arc::new(StaticCatalog::new(catalog(sites)));
        Orchestrator::new(config, prober, catalog).unwrap()
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_per_probe_timeout(Duration::from_secs(5))
            .with_job_timeout(Duration::from_secs(60))
            .with_concurrency_limit(4)
    }

    #[tokio::test(start_paused = true)]
    async fn submit_then_poll_to_complete() {
        let prober = Arc::new(MockProber::new().with_default_delay(Duration::from_millis(200)));
        let orch = orchestrator(prober, 6, config());

        let id = orch.submit("alice").unwrap();
        let first = orch.status(&id).unwrap();
        assert!(matches!(first.state, JobState::Pending | JobState::Running));

        let done = orch.wait(&id, Duration::from_millis(50)).await.unwrap();
        assert_eq!(done.state, JobState::Complete);
        assert_eq!(done.results.len(), 6);
        assert!(done.results.values().all(|r| r.status == ProbeStatus::Present));
        assert!(!done.from_cache);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_is_served_from_cache() {
        let prober = Arc::new(MockProber::new());
        let orch = orchestrator(prober.clone(), 3, config());

        let first = orch.submit("Alice").unwrap();
        let first = orch.wait(&first, Duration::from_millis(10)).await.unwrap();
        assert_eq!(prober.calls(), 3);

        let second = orch.submit("  alice ").unwrap();
        let cached = orch.status(&second).unwrap();
        assert_ne!(first.job_id, cached.job_id);
        assert_eq!(cached.state, JobState::Complete);
        assert!(cached.from_cache);
        assert_eq!(cached.results, first.results);
        assert_eq!(cached.completed_probes, cached.total_probes);
        assert_eq!(prober.calls(), 3, "cache hit must not probe");
    }

    #[tokio::test(start_paused = true)]
    async fn cache_expires_and_reprobes() {
        let prober = Arc::new(MockProber::new());
        let orch = orchestrator(
            prober.clone(),
            2,
            config().with_cache_expiration(Duration::from_secs(60)),
        );

        let id = orch.submit("alice").unwrap();
        orch.wait(&id, Duration::from_millis(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let id = orch.submit("alice").unwrap();
        let job = orch.wait(&id, Duration::from_millis(10)).await.unwrap();
        assert!(!job.from_cache);
        assert_eq!(prober.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_jobs_are_not_cached() {
        let prober = Arc::new(MockProber::new().with_default_delay(Duration::from_secs(5)));
        let orch = orchestrator(
            prober.clone(),
            10,
            config()
                .with_per_probe_timeout(Duration::from_secs(30))
                .with_job_timeout(Duration::from_secs(1))
                .with_concurrency_limit(10),
        );

        let id = orch.submit("alice").unwrap();
        let job = orch.wait(&id, Duration::from_millis(100)).await.unwrap();
        assert_eq!(job.state, JobState::TimedOut);
        assert_eq!(job.completed_probes, 0);
        assert!(orch.cache().lookup("alice").is_none());

        let again = orch.submit("alice").unwrap();
        assert_ne!(again, id);
        assert!(!orch.status(&again).unwrap().from_cache);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submits_share_the_running_job() {
        let prober = Arc::new(MockProber::new().with_default_delay(Duration::from_secs(1)));
        let orch = orchestrator(prober.clone(), 3, config());

        let a = orch.submit("alice").unwrap();
        let b = orch.submit("ALICE").unwrap();
        assert_eq!(a, b);

        orch.wait(&a, Duration::from_millis(100)).await.unwrap();
        assert_eq!(prober.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sites_see_username_as_typed() {
        let prober = Arc::new(MockProber::new());
        let orch = orchestrator(prober.clone(), 2, config());

        let id = orch.submit("  AliceSmith ").unwrap();
        let job = orch.wait(&id, Duration::from_millis(10)).await.unwrap();
        assert_eq!(job.username, "AliceSmith");
        assert_eq!(prober.usernames(), vec!["AliceSmith".to_string()]);

        // Case-only variants still share the cached lookup.
        let again = orch.submit("alicesmith").unwrap();
        assert!(orch.status(&again).unwrap().from_cache);
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn coalescing_can_be_disabled() {
        let prober = Arc::new(MockProber::new().with_default_delay(Duration::from_secs(1)));
        let orch = orchestrator(prober.clone(), 3, config().with_coalesce_inflight(false));

        let a = orch.submit("alice").unwrap();
        let b = orch.submit("alice").unwrap();
        assert_ne!(a, b);
        orch.wait(&a, Duration::from_millis(100)).await.unwrap();
        orch.wait(&b, Duration::from_millis(100)).await.unwrap();
        assert_eq!(prober.calls(), 6);
    }

    #[tokio::test]
    async fn invalid_usernames_are_rejected() {
        let orch = orchestrator(Arc::new(MockProber::new()), 1, config());
        assert_eq!(orch.submit("").unwrap_err().code(), "INVALID_INPUT");
        assert_eq!(orch.submit(&"x".repeat(65)).unwrap_err().code(), "INVALID_INPUT");
        assert_eq!(orch.submit("two words").unwrap_err().code(), "INVALID_INPUT");
        assert!(orch.store().is_empty());
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let orch = orchestrator(Arc::new(MockProber::new()), 1, config());
        let err = orch.status(&JobId::new()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test(start_paused = true)]
    async fn submit_many_reports_each_outcome() {
        let orch = orchestrator(Arc::new(MockProber::new()), 2, config());
        let outcomes = orch.submit_many(["alice", "", "bob"]);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].1.is_ok());
        assert!(outcomes[1].1.is_err());
        assert!(outcomes[2].1.is_ok());
    }

    #[test]
    fn submit_outside_runtime_is_an_error() {
        let orch = orchestrator(Arc::new(MockProber::new()), 1, config());
        assert_eq!(orch.submit("alice").unwrap_err().code(), "CONFIG");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let catalog = Arc::new(StaticCatalog::new(catalog(1)));
        let result = Orchestrator::new(
            config().with_concurrency_limit(0),
            Arc::new(MockProber::new()),
            catalog,
        );
        assert!(result.is_err());
    }
}
