// crates/orchestrator/src/scheduler.rs
//! Enumeration scheduler - fans one username out across the catalog
//!
//! A fixed pool of workers drains a shared queue of catalog entries. The
//! whole run is bounded by the job deadline; on expiry the job is frozen as
//! TIMED_OUT and outstanding workers are signalled and aborted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

use namehunt_common::{
    username_key, CatalogProvider, EngineConfig, JobState, ProbeDefinition, ProbeResult, Prober,
};
use namehunt_telemetry::{record_job, record_probe};

use crate::cache::ResultCache;
use crate::store::JobHandle;

/// Time and concurrency bounds for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleLimits {
    pub per_probe_timeout: Duration,
    pub job_timeout: Duration,
    pub concurrency_limit: usize,
}

impl From<&EngineConfig> for ScheduleLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            per_probe_timeout: config.per_probe_timeout,
            job_timeout: config.job_timeout,
            concurrency_limit: config.concurrency_limit,
        }
    }
}

pub struct EnumerationScheduler {
    prober: Arc<dyn Prober>,
    cache: Arc<ResultCache>,
}

impl EnumerationScheduler {
    pub fn new(prober: Arc<dyn Prober>, cache: Arc<ResultCache>) -> Self {
        Self { prober, cache }
    }

    /// Run one job to a terminal state and return that state.
    #[instrument(skip(self, job, catalog, limits), fields(job = %job.id()))]
    pub async fn run(
        &self,
        job: JobHandle,
        catalog: &dyn CatalogProvider,
        username: &str,
        limits: ScheduleLimits,
    ) -> JobState {
        // The job deadline also covers loading the catalog.
        let deadline = Instant::now() + limits.job_timeout;
        let definitions = match timeout_at(deadline, catalog.load()).await {
            Ok(Ok(defs)) if defs.is_empty() => {
                return fail_job(&job, format!("catalog {} is empty", catalog.source()));
            }
            Ok(Ok(defs)) => defs,
            Ok(Err(e)) => {
                return fail_job(&job, format!("catalog {} unavailable: {}", catalog.source(), e));
            }
            Err(_) => {
                return fail_job(
                    &job,
                    format!(
                        "catalog {} did not load within {:?}",
                        catalog.source(),
                        limits.job_timeout
                    ),
                );
            }
        };

        let total = definitions.len();
        if let Err(e) = job.start(total) {
            warn!("Job could not start: {}", e);
            return job.snapshot().map(|s| s.state).unwrap_or(JobState::Failed);
        }
        info!(
            "Starting job for {} sites={} prober={}",
            username,
            total,
            self.prober.name()
        );

        let queue = Arc::new(Mutex::new((0..total).collect::<VecDeque<usize>>()));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let username: Arc<str> = Arc::from(username);

        // Spawn worker tasks up to the concurrency limit. Each worker pops from the shared queue.
        let worker_count = limits.concurrency_limit.clamp(1, total);
        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            workers.push(tokio::spawn(worker(
                queue.clone(),
                definitions.clone(),
                self.prober.clone(),
                job.clone(),
                username.clone(),
                limits.per_probe_timeout,
                cancel_rx.clone(),
            )));
        }

        let wait_all = async {
            let mut panic = None;
            for w in workers.iter_mut() {
                if let Err(e) = w.await {
                    if e.is_panic() {
                        panic = Some(e.to_string());
                    }
                }
            }
            panic
        };
        let outcome = timeout_at(deadline, wait_all).await;

        let state = match outcome {
            Ok(None) => match job.complete() {
                Ok(()) => {
                    if let Ok(snapshot) = job.snapshot() {
                        self.cache.store(&username_key(&username), snapshot.results);
                    }
                    JobState::Complete
                }
                Err(e) => {
                    let recorded = job.snapshot().map(|s| s.completed_probes).unwrap_or(0);
                    error!("Job finished with {}/{} results: {}", recorded, total, e);
                    let _ = job.fail(format!("{} of {} probe results recorded", recorded, total));
                    JobState::Failed
                }
            },
            Ok(Some(panic)) => {
                let _ = cancel_tx.send(true);
                error!("Probe worker panicked: {}", panic);
                let _ = job.fail(format!("probe worker panicked: {}", panic));
                JobState::Failed
            }
            Err(_) => {
                // Freeze first so anything still in flight is dropped on append.
                if let Err(e) = job.time_out() {
                    warn!("Could not mark job timed out: {}", e);
                }
                let _ = cancel_tx.send(true);
                for w in &workers {
                    w.abort();
                }
                warn!("Job exceeded {:?}", limits.job_timeout);
                JobState::TimedOut
            }
        };

        record_job(state);
        log_summary(&job, state);
        state
    }
}

fn fail_job(job: &JobHandle, detail: String) -> JobState {
    error!("Job failed before dispatch: {}", detail);
    if let Err(e) = job.fail(detail) {
        warn!("Could not mark job failed: {}", e);
    }
    record_job(JobState::Failed);
    JobState::Failed
}

async fn worker(
    queue: Arc<Mutex<VecDeque<usize>>>,
    definitions: Arc<[ProbeDefinition]>,
    prober: Arc<dyn Prober>,
    job: JobHandle,
    username: Arc<str>,
    per_probe_timeout: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        if *cancel.borrow() {
            break;
        }

        // Pop the next catalog entry from the shared queue
        let next = {
            let mut q = queue.lock().await;
            q.pop_front()
        };
        let Some(index) = next else {
            break; // queue empty, exit worker
        };
        let definition = &definitions[index];

        // The prober enforces the timeout itself; this bounds a prober that does not.
        let probe = timeout(
            per_probe_timeout,
            prober.probe(definition, &username, per_probe_timeout),
        );
        let result = tokio::select! {
            biased;
            _ = cancel.changed() => break,
            outcome = probe => outcome
                .unwrap_or_else(|_| ProbeResult::timed_out(definition.site_name.clone(), per_probe_timeout)),
        };

        record_probe(result.status, result.elapsed);
        match job.append_result(result) {
            Ok(true) => {}
            Ok(false) => debug!("Discarded late result for {}", definition.site_name),
            Err(e) => {
                warn!("Job vanished while probing: {}", e);
                break;
            }
        }
    }
}

fn log_summary(job: &JobHandle, state: JobState) {
    let Ok(snapshot) = job.snapshot() else { return };
    let stats = snapshot.stats();

    info!("Lookup Summary ({}):", state);
    info!("  Sites: {}/{}", snapshot.completed_probes, snapshot.total_probes);
    info!("  Found: {}", stats.profiles_found);
    info!("  Errors: {} (timed out: {})", stats.errors, stats.timed_out);
    if let Some(elapsed) = snapshot.duration() {
        info!("  Duration: {:?}", elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobStore;
    use crate::testing::{catalog, MockProber};
    use namehunt_catalog::StaticCatalog;
    use namehunt_common::{NamehuntError, NamehuntResult, ProbeStatus};

    fn limits(per_probe: u64, job: u64, concurrency: usize) -> ScheduleLimits {
        ScheduleLimits {
            per_probe_timeout: Duration::from_secs(per_probe),
            job_timeout: Duration::from_secs(job),
            concurrency_limit: concurrency,
        }
    }

    fn setup(prober: MockProber) -> (Arc<JobStore>, Arc<ResultCache>, EnumerationScheduler) {
        let store = Arc::new(JobStore::default());
        let cache = Arc::new(ResultCache::new(Duration::from_secs(900)));
        let scheduler = EnumerationScheduler::new(Arc::new(prober), cache.clone());
        (store, cache, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_and_caches() {
        let (store, cache, scheduler) = setup(MockProber::new());
        let id = store.create("alice");
        let sites = StaticCatalog::new(catalog(5));

        let state = scheduler.run(store.handle(id), &sites, "alice", limits(5, 60, 3)).await;
        assert_eq!(state, JobState::Complete);

        let job = store.get(&id).unwrap();
        assert_eq!(job.state, JobState::Complete);
        assert_eq!(job.total_probes, 5);
        assert_eq!(job.completed_probes, 5);
        assert_eq!(job.results.len(), 5);
        assert_eq!(*cache.lookup("alice").unwrap(), job.results);
    }

    #[tokio::test(start_paused = true)]
    async fn network_error_is_data_not_failure() {
        let prober = MockProber::new().with_error("site-1");
        let (store, _, scheduler) = setup(prober);
        let id = store.create("alice");

        let state = scheduler
            .run(store.handle(id), &StaticCatalog::new(catalog(3)), "alice", limits(5, 60, 3))
            .await;
        assert_eq!(state, JobState::Complete);

        let job = store.get(&id).unwrap();
        assert_eq!(job.results.len(), 3);
        assert_eq!(job.results["site-1"].status, ProbeStatus::Error);
        assert_eq!(job.stats().errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out_individually() {
        let prober = MockProber::new().with_delay("site-0", Duration::from_secs(10));
        let (store, _, scheduler) = setup(prober);
        let id = store.create("alice");

        let state = scheduler
            .run(store.handle(id), &StaticCatalog::new(catalog(2)), "alice", limits(2, 60, 2))
            .await;
        assert_eq!(state, JobState::Complete);
        let job = store.get(&id).unwrap();
        assert_eq!(job.results["site-0"].status, ProbeStatus::TimedOut);
        assert_eq!(job.results["site-1"].status, ProbeStatus::Present);
    }

    #[tokio::test(start_paused = true)]
    async fn job_timeout_freezes_partial_results() {
        let prober = MockProber::new().with_default_delay(Duration::from_secs(5));
        let (store, cache, scheduler) = setup(prober);
        let id = store.create("alice");

        let started = Instant::now();
        let state = scheduler
            .run(store.handle(id), &StaticCatalog::new(catalog(10)), "alice", limits(30, 1, 10))
            .await;
        let waited = started.elapsed();

        assert_eq!(state, JobState::TimedOut);
        assert!(waited < Duration::from_secs(2), "took {:?}", waited);

        let job = store.get(&id).unwrap();
        assert_eq!(job.state, JobState::TimedOut);
        assert_eq!(job.completed_probes, 0);
        assert!(job.results.is_empty());
        assert!(cache.lookup("alice").is_none());

        // Outstanding probes would have finished by now; nothing may land.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.get(&id).unwrap(), job);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_fan_out_loses_nothing() {
        let prober = Arc::new(MockProber::new().with_default_delay(Duration::from_millis(50)));
        let store = Arc::new(JobStore::default());
        let cache = Arc::new(ResultCache::new(Duration::from_secs(900)));
        let scheduler = EnumerationScheduler::new(prober.clone(), cache);
        let id = store.create("alice");

        let state = scheduler
            .run(store.handle(id), &StaticCatalog::new(catalog(100)), "alice", limits(5, 60, 10))
            .await;
        assert_eq!(state, JobState::Complete);

        let job = store.get(&id).unwrap();
        assert_eq!(job.results.len(), 100);
        assert_eq!(job.completed_probes, 100);
        assert_eq!(prober.calls(), 100);
        assert!(prober.peak_in_flight() <= 10);
        assert!(prober.peak_in_flight() > 1);
    }

    #[tokio::test]
    async fn empty_catalog_fails_without_running() {
        let (store, _, scheduler) = setup(MockProber::new());
        let id = store.create("alice");

        let state = scheduler
            .run(store.handle(id), &StaticCatalog::new(Vec::new()), "alice", limits(5, 60, 3))
            .await;
        assert_eq!(state, JobState::Failed);

        let job = store.get(&id).unwrap();
        assert!(job.started_at.is_none());
        assert!(job.detail.unwrap().contains("empty"));
    }

    struct BrokenCatalog;

    #[async_trait::async_trait]
    impl CatalogProvider for BrokenCatalog {
        async fn load(&self) -> NamehuntResult<Arc<[ProbeDefinition]>> {
            Err(NamehuntError::Catalog("connection reset".into()))
        }

        fn source(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn unreadable_catalog_fails() {
        let (store, _, scheduler) = setup(MockProber::new());
        let id = store.create("alice");

        let state = scheduler
            .run(store.handle(id), &BrokenCatalog, "alice", limits(5, 60, 3))
            .await;
        assert_eq!(state, JobState::Failed);
        assert!(store.get(&id).unwrap().detail.unwrap().contains("connection reset"));
    }

    struct StalledCatalog;

    #[async_trait::async_trait]
    impl CatalogProvider for StalledCatalog {
        async fn load(&self) -> NamehuntResult<Arc<[ProbeDefinition]>> {
            std::future::pending().await
        }

        fn source(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_catalog_fails_at_job_deadline() {
        let (store, _, scheduler) = setup(MockProber::new());
        let id = store.create("alice");

        let started = Instant::now();
        let state = timeout(
            Duration::from_secs(3600),
            scheduler.run(store.handle(id), &StalledCatalog, "alice", limits(5, 1, 3)),
        )
        .await
        .expect("run must not outlive the job deadline");
        assert_eq!(state, JobState::Failed);
        assert!(started.elapsed() < Duration::from_secs(2));

        let job = store.get(&id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.started_at.is_none());
        assert!(job.detail.unwrap().contains("did not load"));
    }

    struct PanickingProber;

    #[async_trait::async_trait]
    impl Prober for PanickingProber {
        async fn probe(
            &self,
            definition: &ProbeDefinition,
            _username: &str,
            _timeout: Duration,
        ) -> ProbeResult {
            if definition.site_name == "site-1" {
                panic!("boom");
            }
            ProbeResult::new(definition.site_name.clone(), ProbeStatus::Absent)
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn worker_panic_fails_job() {
        let store = Arc::new(JobStore::default());
        let cache = Arc::new(ResultCache::new(Duration::from_secs(900)));
        let scheduler = EnumerationScheduler::new(Arc::new(PanickingProber), cache.clone());
        let id = store.create("alice");

        let state = scheduler
            .run(store.handle(id), &StaticCatalog::new(catalog(3)), "alice", limits(5, 60, 1))
            .await;
        assert_eq!(state, JobState::Failed);

        let job = store.get(&id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.detail.as_deref().unwrap().contains("panicked"));
        assert!(!job.results.contains_key("site-1"));
        assert!(cache.lookup("alice").is_none());

        // Frozen: nothing lands after the terminal transition.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.get(&id).unwrap(), job);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_never_exceeds_total() {
        let prober = MockProber::new().with_default_delay(Duration::from_millis(100));
        let store = Arc::new(JobStore::default());
        let cache = Arc::new(ResultCache::new(Duration::from_secs(900)));
        let scheduler = Arc::new(EnumerationScheduler::new(Arc::new(prober), cache));
        let id = store.create("alice");

        let run = {
            let scheduler = scheduler.clone();
            let handle = store.handle(id);
            tokio::spawn(async move {
                let sites = StaticCatalog::new(catalog(20));
                scheduler.run(handle, &sites, "alice", limits(5, 60, 4)).await
            })
        };

        let mut saw_running = false;
        loop {
            let job = store.get(&id).unwrap();
            assert!(job.completed_probes <= job.total_probes);
            assert_eq!(job.completed_probes, job.results.len());
            saw_running |= job.state == JobState::Running;
            if job.state.is_terminal() {
                assert_eq!(job.state, JobState::Complete);
                assert_eq!(job.completed_probes, job.total_probes);
                break;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        assert!(saw_running);
        assert_eq!(run.await.unwrap(), JobState::Complete);
    }
}
