//! Test doubles shared by the orchestrator tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use namehunt_common::{
    ExistenceSignal, ProbeDefinition, ProbeResult, ProbeStatus, Prober, SignalRule,
};

/// `count` distinct sites named `site-0`, `site-1`, ...
pub fn catalog(count: usize) -> Vec<ProbeDefinition> {
    (0..count)
        .map(|i| {
            ProbeDefinition::new(
                format!("site-{}", i),
                format!("https://site-{}.example/{{account}}", i),
                ExistenceSignal::new(
                    SignalRule::new().with_status(200),
                    SignalRule::new().with_status(404),
                ),
            )
        })
        .collect()
}

/// Prober answering PRESENT after a configurable delay, or ERROR for chosen sites.
#[derive(Default)]
pub struct MockProber {
    default_delay: Duration,
    delays: HashMap<String, Duration>,
    errors: HashSet<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    usernames: Mutex<BTreeSet<String>>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_delay(mut self, site: &str, delay: Duration) -> Self {
        self.delays.insert(site.to_string(), delay);
        self
    }

    pub fn with_error(mut self, site: &str) -> Self {
        self.errors.insert(site.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Distinct usernames passed to `probe`, sorted.
    pub fn usernames(&self) -> Vec<String> {
        self.usernames.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(
        &self,
        definition: &ProbeDefinition,
        username: &str,
        _timeout: Duration,
    ) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.usernames.lock().insert(username.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self
            .delays
            .get(&definition.site_name)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.errors.contains(&definition.site_name) {
            ProbeResult::error(definition.site_name.clone(), "connection refused")
        } else {
            ProbeResult::new(definition.site_name.clone(), ProbeStatus::Present)
                .with_http_status(200)
                .with_elapsed(delay)
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
