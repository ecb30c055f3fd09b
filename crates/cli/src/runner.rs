// runner.rs
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use namehunt_catalog::{catalog_from_source, CachedCatalog};
use namehunt_common::{CatalogProvider, EngineConfig, JobId, JobSnapshot};
use namehunt_orchestrator::Orchestrator;
use namehunt_prober::{HttpProber, HttpProberOptions};

use crate::args::LookupArgs;
use crate::output::{print_results, print_sites};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROGRESS_EVERY: Duration = Duration::from_secs(5);

pub async fn run_lookup(args: LookupArgs) -> Result<()> {
    if let Some(addr) = args.metrics_addr {
        namehunt_telemetry::install_prometheus(addr)?;
    }

    let config = engine_config(&args);
    info!("Starting lookup...");
    info!("Usernames: {}", args.usernames.join(", "));
    info!("Catalog: {}", args.catalog);
    info!("Concurrency: {}", config.concurrency_limit);
    info!(
        "Timeouts: site {:?}, lookup {:?}",
        config.per_probe_timeout, config.job_timeout
    );

    let prober = HttpProber::with_options(
        HttpProberOptions::default().with_verify_tls(config.verify_tls),
    )
    .context("Failed to build HTTP client")?;
    let catalog: Arc<dyn CatalogProvider> =
        Arc::new(CachedCatalog::new(catalog_from_source(&args.catalog)?));

    // Load once up front so a bad catalog is reported before any job starts.
    let sites = catalog
        .load()
        .await
        .with_context(|| format!("Failed to load catalog from {}", args.catalog))?;
    info!("Loaded {} site definitions", sites.len());

    let orchestrator = Orchestrator::new(config, Arc::new(prober), catalog)?;

    let lookup_start = Instant::now();
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    for (username, submitted) in orchestrator.submit_many(&args.usernames) {
        match submitted {
            Ok(id) if seen.insert(id) => jobs.push(id),
            Ok(_) => {}
            Err(e) => warn!("Skipping username '{}': {}", username, e),
        }
    }
    if jobs.is_empty() {
        return Err(anyhow!("No valid usernames to look up"));
    }

    let mut snapshots = Vec::with_capacity(jobs.len());
    for id in &jobs {
        snapshots.push(wait_with_progress(&orchestrator, id).await?);
    }
    let elapsed = lookup_start.elapsed();

    print_results(&snapshots, args.format, args.all, elapsed)?;
    if let Some(path) = &args.output {
        write_json(path, &snapshots)?;
        info!("Wrote {} lookup(s) to {}", snapshots.len(), path.display());
    }
    Ok(())
}

pub async fn run_sites(catalog: &str, category: Option<&str>) -> Result<()> {
    let provider = catalog_from_source(catalog)?;
    let sites = provider
        .load()
        .await
        .with_context(|| format!("Failed to load catalog from {}", catalog))?;
    print_sites(&sites, category);
    Ok(())
}

fn engine_config(args: &LookupArgs) -> EngineConfig {
    let mut config = EngineConfig::default()
        .with_per_probe_timeout(Duration::from_secs(args.site_timeout))
        .with_job_timeout(Duration::from_secs(args.job_timeout))
        .with_cache_expiration(Duration::from_secs(args.cache_expiration))
        .with_concurrency_limit(args.concurrency);
    config.max_username_len = args.max_username_length;
    config.verify_tls = args.verify_tls;
    config
}

/// Poll a job to its terminal state, logging progress while it runs.
async fn wait_with_progress(orchestrator: &Orchestrator, id: &JobId) -> Result<JobSnapshot> {
    let mut last_report = Instant::now();
    loop {
        let job = orchestrator.status(id)?;
        if job.state.is_terminal() {
            info!(
                "Lookup for {} finished: {} ({} found)",
                job.username,
                job.state,
                job.found().count()
            );
            return Ok(job);
        }
        if last_report.elapsed() >= PROGRESS_EVERY {
            info!(
                "Progress {}: {}/{} sites ({:.1}%)",
                job.username,
                job.completed_probes,
                job.total_probes,
                job.progress()
            );
            last_report = Instant::now();
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn write_json(path: &Path, snapshots: &[JobSnapshot]) -> Result<()> {
    let body = serde_json::to_string_pretty(snapshots)?;
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}
