//! Core data types for the namehunt enumeration engine
//!
//! Builder-style methods consume `self` so definitions and results can be
//! assembled without intermediate clones. Everything here is plain data: the
//! only logic is response classification and the job state table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::NamehuntError;

/// Placeholder substituted with the target username in templates.
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    Present,
    Absent,
    Unknown,
    Error,
    TimedOut,
}

impl ProbeStatus {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Present => "present",
            ProbeStatus::Absent => "absent",
            ProbeStatus::Unknown => "unknown",
            ProbeStatus::Error => "error",
            ProbeStatus::TimedOut => "timed_out",
        }
    }

    /// True for outcomes where the site could not be checked at all.
    #[inline]
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, ProbeStatus::Error | ProbeStatus::TimedOut)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One half of an existence signal.
///
/// Every criterion present must hold for the rule to match. A rule with no
/// criteria at all never matches, so a half-specified catalog entry degrades
/// to UNKNOWN instead of reporting every username as present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRule {
    pub status: Option<u16>,
    #[serde(default)]
    pub body_contains: Vec<String>,
    #[serde(default)]
    pub body_excludes: Vec<String>,
}

impl SignalRule {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    #[must_use]
    pub fn containing<S: Into<String>>(mut self, needle: S) -> Self {
        self.body_contains.push(needle.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn excluding<S: Into<String>>(mut self, needle: S) -> Self {
        self.body_excludes.push(needle.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.body_contains.is_empty() && self.body_excludes.is_empty()
    }

    pub fn matches(&self, status: u16, body: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.status.is_some_and(|expected| expected != status) {
            return false;
        }
        self.body_contains.iter().all(|needle| body.contains(needle.as_str()))
            && !self.body_excludes.iter().any(|needle| body.contains(needle.as_str()))
    }
}

/// Rules deciding whether a response means the account exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceSignal {
    pub exists: SignalRule,
    pub missing: SignalRule,
}

impl ExistenceSignal {
    #[inline]
    #[must_use]
    pub fn new(exists: SignalRule, missing: SignalRule) -> Self {
        Self { exists, missing }
    }

    /// Classify a response. Matching both rules is ambiguous and yields UNKNOWN.
    pub fn classify(&self, status: u16, body: &str) -> ProbeStatus {
        match (self.exists.matches(status, body), self.missing.matches(status, body)) {
            (true, false) => ProbeStatus::Present,
            (false, true) => ProbeStatus::Absent,
            _ => ProbeStatus::Unknown,
        }
    }
}

/// One site's check. Immutable once loaded; shared read-only across jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeDefinition {
    pub site_name: String,
    pub uri_template: String,
    pub existence_signal: ExistenceSignal,
    pub category: Option<String>,
    /// Human-facing profile URL, templated like `uri_template`.
    pub profile_template: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// When set the probe is sent as a POST carrying this templated body.
    pub post_body: Option<String>,
}

impl ProbeDefinition {
    #[inline]
    #[must_use]
    pub fn new<N: Into<String>, U: Into<String>>(
        site_name: N,
        uri_template: U,
        existence_signal: ExistenceSignal,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            uri_template: uri_template.into(),
            existence_signal,
            category: None,
            profile_template: None,
            headers: BTreeMap::new(),
            post_body: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_profile_template<S: Into<String>>(mut self, template: S) -> Self {
        self.profile_template = Some(template.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_post_body<S: Into<String>>(mut self, body: S) -> Self {
        self.post_body = Some(body.into());
        self
    }
}

/// Result of probing one site for one job. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub site_name: String,
    pub status: ProbeStatus,
    pub checked_at: DateTime<Utc>,
    pub http_status: Option<u16>,
    pub detail: Option<String>,
    pub uri: Option<String>,
    /// Round-trip time of the probe (Duration::ZERO when never sent).
    pub elapsed: Duration,
}

impl ProbeResult {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(site_name: S, status: ProbeStatus) -> Self {
        Self {
            site_name: site_name.into(),
            status,
            checked_at: Utc::now(),
            http_status: None,
            detail: None,
            uri: None,
            elapsed: Duration::ZERO,
        }
    }

    #[inline]
    #[must_use]
    pub fn error<S: Into<String>, D: Into<String>>(site_name: S, detail: D) -> Self {
        Self::new(site_name, ProbeStatus::Error).with_detail(detail)
    }

    #[inline]
    #[must_use]
    pub fn timed_out<S: Into<String>>(site_name: S, timeout: Duration) -> Self {
        Self::new(site_name, ProbeStatus::TimedOut)
            .with_detail(format!("no response within {}ms", timeout.as_millis()))
            .with_elapsed(timeout)
    }

    #[inline]
    #[must_use]
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self.status, ProbeStatus::Present)
    }
}

/// Results of one job keyed by site name.
pub type ResultSet = BTreeMap<String, ProbeResult>;

/// Job lifecycle: `PENDING -> RUNNING -> {COMPLETE, TIMED_OUT, FAILED}`,
/// plus `PENDING -> FAILED` for faults detected before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Complete,
    TimedOut,
    Failed,
}

impl JobState {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Complete => "COMPLETE",
            JobState::TimedOut => "TIMED_OUT",
            JobState::Failed => "FAILED",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::TimedOut | JobState::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Running, JobState::Complete)
                | (JobState::Running, JobState::TimedOut)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque job identifier (UUID v4, never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = NamehuntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| NamehuntError::InvalidInput(format!("job id '{}' is not a valid UUID", s)))
    }
}

/// Point-in-time copy of a job, safe to hand to any reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub username: String,
    pub state: JobState,
    pub results: ResultSet,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_probes: usize,
    pub completed_probes: usize,
    pub detail: Option<String>,
    /// Synthesized from the result cache; no probes were run.
    pub from_cache: bool,
}

impl JobSnapshot {
    /// Progress percentage in [0.0, 100.0].
    #[inline]
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.total_probes == 0 {
            0.0
        } else {
            (self.completed_probes as f32 / self.total_probes as f32) * 100.0
        }
    }

    /// Sites where the account was found, in site-name order.
    pub fn found(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.values().filter(|r| r.is_present())
    }

    #[must_use]
    pub fn stats(&self) -> LookupStats {
        LookupStats::from_results(self.results.values())
    }

    /// Wall time between dispatch and the terminal transition.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        (finished - started).to_std().ok()
    }
}

/// Aggregate counters over a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupStats {
    pub sites_checked: usize,
    pub profiles_found: usize,
    pub absent: usize,
    pub unknown: usize,
    pub errors: usize,
    pub timed_out: usize,
}

impl LookupStats {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a ProbeResult>,
    {
        let mut stats = Self::default();
        for result in results {
            stats.update(result);
        }
        stats
    }

    pub fn update(&mut self, result: &ProbeResult) {
        self.sites_checked = self.sites_checked.saturating_add(1);
        let bucket = match result.status {
            ProbeStatus::Present => &mut self.profiles_found,
            ProbeStatus::Absent => &mut self.absent,
            ProbeStatus::Unknown => &mut self.unknown,
            ProbeStatus::Error => &mut self.errors,
            ProbeStatus::TimedOut => &mut self.timed_out,
        };
        *bucket = bucket.saturating_add(1);
    }
}
