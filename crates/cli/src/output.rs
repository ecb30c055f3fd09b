//! Output formatting for lookup results

use anyhow::Result;
use serde_json::json;
use std::time::Duration;

use namehunt_common::{JobSnapshot, LookupStats, ProbeDefinition, ProbeResult};

use crate::args::OutputFormat;

/// Print lookup results in the specified format
pub fn print_results(
    jobs: &[JobSnapshot],
    format: OutputFormat,
    all: bool,
    elapsed: Duration,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", render_json(jobs, all, elapsed)?),
        OutputFormat::Csv => print!("{}", render_csv(jobs, all)),
        OutputFormat::Text => print_table(jobs, all, elapsed),
    }
    Ok(())
}

fn visible(job: &JobSnapshot, all: bool) -> impl Iterator<Item = &ProbeResult> {
    job.results.values().filter(move |r| all || r.is_present())
}

/// Print results as a table, one block per username
fn print_table(jobs: &[JobSnapshot], all: bool, elapsed: Duration) {
    for job in jobs {
        println!("\n{:-<80}", "");
        println!("{} [{}]{}", job.username, job.state, if job.from_cache { " (cached)" } else { "" });
        if let Some(detail) = &job.detail {
            println!("  {}", detail);
        }
        println!("{:-<80}", "");
        println!("{:<24} {:<10} {:<6} {:<38}", "SITE", "STATUS", "HTTP", "PROFILE");

        let mut shown = 0;
        for result in visible(job, all) {
            println!(
                "{:<24} {:<10} {:<6} {:<38}",
                truncate(&result.site_name, 24),
                result.status.as_str(),
                result.http_status.map(|s| s.to_string()).unwrap_or_default(),
                result.uri.as_deref().unwrap_or("")
            );
            shown += 1;
        }
        if shown == 0 {
            println!("No profiles found.");
        }

        let stats = job.stats();
        println!("{:-<80}", "");
        println!("Summary:");
        println!("  Sites checked: {}/{}", job.completed_probes, job.total_probes);
        println!("  Found: {}", stats.profiles_found);
        println!("  Not found: {}", stats.absent);
        println!("  Inconclusive: {}", stats.unknown);
        println!("  Errors: {} (timed out: {})", stats.errors, stats.timed_out);
        if let Some(duration) = job.duration() {
            println!("  Duration: {}", format_duration(duration));
        }
    }
    println!("\nTotal time: {}\n", format_duration(elapsed));
}

fn render_json(jobs: &[JobSnapshot], all: bool, elapsed: Duration) -> Result<String> {
    let mut lookups = Vec::with_capacity(jobs.len());
    for job in jobs {
        let results = visible(job, all)
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let stats: LookupStats = job.stats();
        lookups.push(json!({
            "job_id": job.job_id,
            "username": job.username,
            "state": job.state,
            "from_cache": job.from_cache,
            "detail": job.detail,
            "total_probes": job.total_probes,
            "completed_probes": job.completed_probes,
            "stats": stats,
            "results": results,
        }));
    }

    let output = json!({
        "lookup_info": {
            "duration_seconds": elapsed.as_secs_f64(),
            "duration_formatted": format_duration(elapsed),
            "usernames": jobs.len(),
        },
        "lookups": lookups,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

fn render_csv(jobs: &[JobSnapshot], all: bool) -> String {
    let mut out = String::from("username,site,status,http_status,uri,elapsed_ms,detail\n");
    for job in jobs {
        for result in visible(job, all) {
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                csv_field(&job.username),
                csv_field(&result.site_name),
                result.status.as_str(),
                result.http_status.map(|s| s.to_string()).unwrap_or_default(),
                csv_field(result.uri.as_deref().unwrap_or("")),
                result.elapsed.as_millis(),
                csv_field(result.detail.as_deref().unwrap_or("")),
            ));
        }
    }
    out
}

fn csv_field(value: &str) -> String {
    let escaped = value.replace('"', "\"\"").replace(['\n', '\r'], " ");
    format!("\"{}\"", escaped)
}

/// Print catalog sites, optionally filtered by category
pub fn print_sites(sites: &[ProbeDefinition], category: Option<&str>) {
    let mut count = 0;
    println!("{:<32} {:<20}", "SITE", "CATEGORY");
    for site in sites.iter().filter(|s| matches_category(s, category)) {
        println!("{:<32} {:<20}", truncate(&site.site_name, 32), site.category.as_deref().unwrap_or("-"));
        count += 1;
    }
    println!("\n{} site(s)", count);
}

fn matches_category(site: &ProbeDefinition, category: Option<&str>) -> bool {
    match category {
        None => true,
        Some(wanted) => site
            .category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(wanted)),
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let cut: String = value.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        value.to_string()
    }
}

/// Format duration in a human-readable way
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}
