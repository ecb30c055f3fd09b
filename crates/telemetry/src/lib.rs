//! Telemetry - logging setup and engine metrics
//!
//! Metrics go through the `metrics` facade, so recording is a no-op until an
//! exporter is installed (see [`install_prometheus`]).

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use namehunt_common::{JobState, ProbeStatus};

pub const PROBES_TOTAL: &str = "namehunt_probes_total";
pub const PROBE_DURATION_SECONDS: &str = "namehunt_probe_duration_seconds";
pub const JOBS_TOTAL: &str = "namehunt_jobs_total";
pub const CACHE_LOOKUPS_TOTAL: &str = "namehunt_cache_lookups_total";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks info/debug/trace.
pub fn init_logging(verbose: u8, json: bool) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).compact().init();
    }
}

/// Serve Prometheus metrics on `addr`. Must be called inside a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to start metrics listener on {}", addr))?;
    describe_metrics();
    info!("Serving metrics on http://{}/metrics", addr);
    Ok(())
}

fn describe_metrics() {
    describe_counter!(PROBES_TOTAL, "Site probes finished, by outcome");
    describe_histogram!(PROBE_DURATION_SECONDS, Unit::Seconds, "Site probe round-trip time");
    describe_counter!(JOBS_TOTAL, "Enumeration jobs reaching a terminal state");
    describe_counter!(CACHE_LOOKUPS_TOTAL, "Result cache lookups, by outcome");
}

pub fn record_probe(status: ProbeStatus, elapsed: Duration) {
    counter!(PROBES_TOTAL, "status" => status.as_str()).increment(1);
    histogram!(PROBE_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_job(state: JobState) {
    counter!(JOBS_TOTAL, "state" => state.as_str()).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(CACHE_LOOKUPS_TOTAL, "outcome" => outcome).increment(1);
}
