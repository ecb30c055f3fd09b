//! Job store - owns every job record
//!
//! Each job sits behind its own lock so probe completions for one job never
//! contend with readers of another. Readers always get a deep copy.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use namehunt_common::{
    JobId, JobSnapshot, JobState, NamehuntError, NamehuntResult, ProbeResult, ResultSet,
};

type JobCell = Arc<RwLock<JobSnapshot>>;

#[derive(Default)]
struct Jobs {
    by_id: HashMap<JobId, JobCell>,
    /// Creation order, oldest first.
    order: VecDeque<JobId>,
}

pub struct JobStore {
    jobs: RwLock<Jobs>,
    max_retained: usize,
    retention: Duration,
}

impl JobStore {
    /// Create a store keeping at most `max_retained` jobs and dropping
    /// terminal jobs older than `retention`. Active jobs are never evicted.
    pub fn new(max_retained: usize, retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(Jobs::default()),
            max_retained: max_retained.max(1),
            retention,
        }
    }

    /// Register a new PENDING job.
    pub fn create(&self, username: &str) -> JobId {
        let id = JobId::new();
        let snapshot = JobSnapshot {
            job_id: id,
            username: username.to_string(),
            state: JobState::Pending,
            results: ResultSet::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            total_probes: 0,
            completed_probes: 0,
            detail: None,
            from_cache: false,
        };
        self.insert(snapshot);
        debug!("Created job {} for {}", id, username);
        id
    }

    /// Register an already COMPLETE job carrying cached results.
    pub fn create_completed(&self, username: &str, results: ResultSet) -> JobId {
        let id = JobId::new();
        let now = Utc::now();
        let count = results.len();
        let snapshot = JobSnapshot {
            job_id: id,
            username: username.to_string(),
            state: JobState::Complete,
            results,
            created_at: now,
            started_at: Some(now),
            finished_at: Some(now),
            total_probes: count,
            completed_probes: count,
            detail: None,
            from_cache: true,
        };
        self.insert(snapshot);
        debug!("Created cached job {} for {}", id, username);
        id
    }

    fn insert(&self, snapshot: JobSnapshot) {
        let id = snapshot.job_id;
        let mut jobs = self.jobs.write();
        self.evict(&mut jobs);
        jobs.by_id.insert(id, Arc::new(RwLock::new(snapshot)));
        jobs.order.push_back(id);
    }

    /// Drop expired terminal jobs, then the oldest terminal jobs while over capacity.
    fn evict(&self, jobs: &mut Jobs) {
        let now = Utc::now();
        let mut over = (jobs.by_id.len() + 1).saturating_sub(self.max_retained);
        let mut evicted = Vec::new();

        for id in &jobs.order {
            let Some(cell) = jobs.by_id.get(id) else { continue };
            let job = cell.read();
            if !job.state.is_terminal() {
                continue;
            }
            let expired = job
                .finished_at
                .and_then(|finished| (now - finished).to_std().ok())
                .is_some_and(|age| age >= self.retention);
            if expired || over > 0 {
                over = over.saturating_sub(1);
                evicted.push(*id);
            }
        }

        if evicted.is_empty() {
            return;
        }
        for id in &evicted {
            jobs.by_id.remove(id);
        }
        jobs.order.retain(|id| jobs.by_id.contains_key(id));
        trace!("Evicted {} terminal jobs", evicted.len());
    }

    fn cell(&self, id: &JobId) -> NamehuntResult<JobCell> {
        self.jobs
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| NamehuntError::NotFound(id.to_string()))
    }

    /// Consistent copy of a job.
    pub fn get(&self, id: &JobId) -> NamehuntResult<JobSnapshot> {
        let cell = self.cell(id)?;
        let snapshot = cell.read().clone();
        Ok(snapshot)
    }

    /// Record one probe result.
    ///
    /// Returns `Ok(false)` when the result was dropped: the job is not
    /// RUNNING (late results after a terminal transition land here), the
    /// site already has a result, or every expected probe has reported.
    pub fn append_result(&self, id: &JobId, result: ProbeResult) -> NamehuntResult<bool> {
        let cell = self.cell(id)?;
        let mut job = cell.write();

        if job.state != JobState::Running {
            trace!("Dropping result for {} on {} job {}", result.site_name, job.state, id);
            return Ok(false);
        }
        if job.completed_probes >= job.total_probes || job.results.contains_key(&result.site_name) {
            debug!("Dropping duplicate result for {} on job {}", result.site_name, id);
            return Ok(false);
        }

        job.results.insert(result.site_name.clone(), result);
        job.completed_probes += 1;
        Ok(true)
    }

    /// Move a job to `next`, enforcing the lifecycle table.
    pub fn transition(&self, id: &JobId, next: JobState) -> NamehuntResult<()> {
        self.apply(id, next, |_| {})
    }

    /// PENDING -> RUNNING, publishing the probe count in the same step.
    pub fn start(&self, id: &JobId, total_probes: usize) -> NamehuntResult<()> {
        self.apply(id, JobState::Running, |job| job.total_probes = total_probes)
    }

    /// Move a job to FAILED with a reason.
    pub fn fail<S: Into<String>>(&self, id: &JobId, detail: S) -> NamehuntResult<()> {
        let detail = detail.into();
        self.apply(id, JobState::Failed, |job| job.detail = Some(detail))
    }

    fn apply<F>(&self, id: &JobId, next: JobState, update: F) -> NamehuntResult<()>
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let cell = self.cell(id)?;
        let mut job = cell.write();

        let from = job.state;
        if !from.can_transition_to(next) {
            return Err(NamehuntError::InvalidTransition { from, to: next });
        }
        if next == JobState::Complete && job.completed_probes != job.total_probes {
            return Err(NamehuntError::InvalidTransition { from, to: next });
        }

        let now = Utc::now();
        update(&mut job);
        job.state = next;
        if next == JobState::Running {
            job.started_at = Some(now);
        }
        if next.is_terminal() {
            job.finished_at = Some(now);
        }
        debug!("Job {} {} -> {}", id, from, next);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write handle for one job.
    pub fn handle(self: &Arc<Self>, id: JobId) -> JobHandle {
        JobHandle {
            id,
            store: Arc::clone(self),
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(24 * 60 * 60))
    }
}

/// The only way the scheduler touches a job: append results and move state.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    store: Arc<JobStore>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn start(&self, total_probes: usize) -> NamehuntResult<()> {
        self.store.start(&self.id, total_probes)
    }

    pub fn append_result(&self, result: ProbeResult) -> NamehuntResult<bool> {
        self.store.append_result(&self.id, result)
    }

    pub fn complete(&self) -> NamehuntResult<()> {
        self.store.transition(&self.id, JobState::Complete)
    }

    pub fn time_out(&self) -> NamehuntResult<()> {
        self.store.transition(&self.id, JobState::TimedOut)
    }

    pub fn fail<S: Into<String>>(&self, detail: S) -> NamehuntResult<()> {
        self.store.fail(&self.id, detail)
    }

    pub fn snapshot(&self) -> NamehuntResult<JobSnapshot> {
        self.store.get(&self.id)
    }
}
