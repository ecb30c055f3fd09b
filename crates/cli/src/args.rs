use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use namehunt_catalog::DEFAULT_CATALOG_URL;

#[derive(Parser)]
#[command(name = "namehunt")]
#[command(version)]
#[command(about = "Find which sites have an account for a username", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every catalog site for one or more usernames
    Lookup(LookupArgs),

    /// List the sites in the catalog
    Sites {
        /// Catalog file path or http(s) URL
        #[arg(long, env = "WMN_URL", default_value = DEFAULT_CATALOG_URL)]
        catalog: String,

        /// Only list sites in this category
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct LookupArgs {
    /// Usernames to look up. Example: alice or alice,bob
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub usernames: Vec<String>,

    /// Catalog file path or http(s) URL
    #[arg(long, env = "WMN_URL", default_value = DEFAULT_CATALOG_URL)]
    pub catalog: String,

    /// Per-site timeout in seconds
    #[arg(long, env = "CHECK_SITE_TIMEOUT", default_value = "30")]
    pub site_timeout: u64,

    /// Whole-lookup timeout in seconds
    #[arg(long, env = "JOB_TIMEOUT", default_value = "90")]
    pub job_timeout: u64,

    /// Max concurrent site checks per username
    #[arg(short, long, env = "CONCURRENCY_LIMIT", default_value = "50")]
    pub concurrency: usize,

    /// Seconds a finished lookup is reused
    #[arg(long, env = "CACHE_EXPIRATION", default_value = "900")]
    pub cache_expiration: u64,

    #[arg(long, env = "MAX_USERNAME_LENGTH", default_value = "64")]
    pub max_username_length: usize,

    /// Verify TLS certificates of probed sites
    #[arg(long, env = "SSL_WEBSITE_ENUMERATION")]
    pub verify_tls: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the full lookup snapshots as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show every site, not only those where the account was found
    #[arg(long)]
    pub all: bool,

    /// Serve Prometheus metrics on this address while running
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}
