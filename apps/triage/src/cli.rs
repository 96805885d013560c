//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// triage - contextual threat-informed vulnerability triage
#[derive(Parser)]
#[command(name = "triage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Contextual threat-informed vulnerability triage")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the triage pipeline once over a pair of input feeds
    Run {
        /// Dependency alert feed JSON
        #[arg(long, value_name = "PATH", default_value = "dependency_feed.json")]
        dependency_feed: PathBuf,

        /// Image scan feed JSON
        #[arg(long, value_name = "PATH", default_value = "image_scan.json")]
        image_scan: PathBuf,

        /// Deployment context document
        #[arg(long, value_name = "PATH", default_value = "context.json")]
        context: PathBuf,

        /// Normalized findings artifact
        #[arg(long, value_name = "PATH", default_value = "normalized_findings.json")]
        normalized: PathBuf,

        /// Threat intel artifact
        #[arg(long, value_name = "PATH", default_value = "threat_intel.json")]
        threat_intel: PathBuf,

        /// Environmental overrides artifact
        #[arg(long, value_name = "PATH", default_value = "env_overrides.json")]
        env_overrides: PathBuf,

        /// Markdown report output
        #[arg(
            long,
            value_name = "PATH",
            default_value = "contextual-threat-risk-triage.md"
        )]
        output_md: PathBuf,

        /// JSON report output
        #[arg(
            long,
            value_name = "PATH",
            default_value = "contextual-threat-risk-triage.json"
        )]
        output_json: PathBuf,

        /// Write artifacts into the repo's dated .triage/ layout
        #[arg(long, value_name = "DIR")]
        repo_root: Option<PathBuf>,

        /// Skip network intel fetch; emit the empty fallback cache
        #[arg(long)]
        offline: bool,

        /// Write the bounded adjustment annotation document here
        #[arg(long, value_name = "PATH")]
        adjust_output: Option<PathBuf>,

        /// Apply adjustment deltas instead of annotating only
        #[arg(long)]
        enable_adjustment: bool,
    },

    /// Scan multiple repositories: collect, run the pipeline, index reports
    Scan {
        /// Repository roots to scan
        #[arg(long, value_name = "DIRS", value_delimiter = ',', required = true)]
        repos: Vec<PathBuf>,

        /// Worker count (1 = sequential)
        #[arg(long, value_name = "N", default_value_t = 1)]
        parallel: usize,

        /// Max repos per batch (0 = no batching)
        #[arg(long, value_name = "N", default_value_t = 0)]
        batch_size: usize,

        /// Skip network fetches in every repo
        #[arg(long)]
        offline: bool,

        /// Write the batch summary document here
        #[arg(long, value_name = "PATH")]
        summary_json: Option<PathBuf>,
    },

    /// Fetch EPSS/KEV threat intel for an existing normalized artifact
    FetchIntel {
        /// Normalized findings artifact to read CVE ids from
        #[arg(long, value_name = "PATH", default_value = "normalized_findings.json")]
        normalized: PathBuf,

        /// Threat intel output
        #[arg(long, value_name = "PATH", default_value = "threat_intel.json")]
        output: PathBuf,

        /// Emit the empty fallback cache without touching the network
        #[arg(long)]
        offline: bool,
    },

    /// Write a context document template with every leaf unknown
    InitContext {
        /// Context output path
        #[arg(long, value_name = "PATH", default_value = ".triage/context.json")]
        output: PathBuf,

        /// JSON object of dotted-path answers to apply to the template
        #[arg(long, value_name = "PATH")]
        answers_json: Option<PathBuf>,

        /// Overwrite an existing context file
        #[arg(long)]
        force: bool,
    },

    /// Check a context document for drift (exit 2 on warnings)
    CheckContext {
        /// Context document to check
        #[arg(long, value_name = "PATH", default_value = ".triage/context.json")]
        context: PathBuf,

        /// Alternate JSON schema (defaults to the built-in context schema)
        #[arg(long, value_name = "PATH")]
        schema: Option<PathBuf>,

        /// Staleness threshold in days
        #[arg(long, value_name = "N", default_value_t = 30)]
        max_age_days: i64,

        /// Unknown-leaf count threshold
        #[arg(long, value_name = "N", default_value_t = 8)]
        max_unknown_fields: usize,

        /// Write the drift report document here
        #[arg(long, value_name = "PATH")]
        output_json: Option<PathBuf>,
    },

    /// Prune dated cache and report directories (dry-run by default)
    Retention {
        /// Repository root holding the .triage/ layout
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,

        /// Dated directories older than this many days are candidates
        #[arg(long, value_name = "N", default_value_t = 30)]
        keep_days: i64,

        /// Always keep this many most-recent dated directories
        #[arg(long, value_name = "N", default_value_t = 7)]
        keep_latest: usize,

        /// Delete instead of reporting
        #[arg(long)]
        apply: bool,

        /// Write the retention report document here
        #[arg(long, value_name = "PATH")]
        report_json: Option<PathBuf>,
    },

    /// Run the pipeline twice with a fixed clock and byte-compare artifacts
    VerifyDeterminism {
        /// Dependency alert feed JSON
        #[arg(long, value_name = "PATH", default_value = "dependency_feed.json")]
        dependency_feed: PathBuf,

        /// Image scan feed JSON
        #[arg(long, value_name = "PATH", default_value = "image_scan.json")]
        image_scan: PathBuf,

        /// Deployment context document
        #[arg(long, value_name = "PATH", default_value = "context.json")]
        context: PathBuf,

        /// RFC3339 instant injected as the clock for both runs
        #[arg(
            long,
            value_name = "RFC3339",
            default_value = "2026-01-01T00:00:00+00:00"
        )]
        fixed_time: String,
    },
}
