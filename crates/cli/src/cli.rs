//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Resolve a URL into downloadable resources and fetch them.
#[derive(Debug, Parser)]
#[command(name = "linkscout", version, about)]
pub struct Cli {
    /// Configuration file; missing files fall back to defaults.
    #[arg(long, env = "LINKSCOUT_CONFIG", default_value = "linkscout.toml", global = true)]
    pub config: PathBuf,

    /// Emit events and logs as JSON lines.
    #[arg(long, global = true)]
    pub json: bool,

    /// Print Prometheus metrics to stderr before exiting.
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find downloadable resources behind a URL.
    Sniff(SniffArgs),
    /// Download URLs directly, or as media formats with --format.
    Download(DownloadArgs),
    /// Show the strategy queue and scoring table for a URL.
    Select {
        url: String,
    },
    /// Fetch a URL through the engine escalation and print the response.
    Fetch(FetchArgs),
    /// Print learned per-domain strategy successes.
    Experience,
}

#[derive(Debug, Args)]
pub struct SniffArgs {
    pub url: String,

    /// Download the found items afterwards: `all` or comma-separated indices.
    #[arg(long, value_name = "SELECTION")]
    pub download: Option<String>,

    /// Destination directory (defaults to the configured output directory).
    #[arg(long)]
    pub dest: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Media format selector; downloads through the media extractor.
    #[arg(long)]
    pub format: Option<String>,

    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Output file name (direct downloads of a single URL).
    #[arg(long)]
    pub filename: Option<String>,

    /// Container for merged media formats.
    #[arg(long)]
    pub merge_output_format: Option<String>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    pub url: String,

    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Query parameter, `name=value`. Repeatable.
    #[arg(long = "query", value_name = "PARAM")]
    pub query: Vec<String>,

    /// JSON request body.
    #[arg(long, conflicts_with = "form")]
    pub data: Option<String>,

    /// Form field, `name=value`. Repeatable.
    #[arg(long)]
    pub form: Vec<String>,

    /// Engine to start the escalation from.
    #[arg(long)]
    pub start_engine: Option<String>,

    #[arg(long)]
    pub ignore_robots: bool,

    /// Referer for the request's identity.
    #[arg(long)]
    pub previous_url: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print response headers too.
    #[arg(long, short = 'i')]
    pub include_headers: bool,
}

/// Split `Name: value`.
pub fn parse_header(raw: &str) -> Option<(String, String)> {
    let (name, value) = raw.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Split `name=value`.
pub fn parse_pair(raw: &str) -> Option<(String, String)> {
    let (name, value) = raw.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.to_string()))
}

/// Parse `all` or a comma-separated list of indices below `len`.
pub fn parse_selection(raw: &str, len: usize) -> Result<Vec<usize>, String> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok((0..len).collect());
    }
    let mut indices = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let index: usize = part
            .parse()
            .map_err(|_| format!("invalid index '{}'", part))?;
        if index >= len {
            return Err(format!("index {} out of range (found {} items)", index, len));
        }
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    if indices.is_empty() {
        return Err("empty selection".to_string());
    }
    Ok(indices)
}
