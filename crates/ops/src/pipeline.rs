//! Single-repo pipeline run: normalize, fetch intel, derive environmental
//! overrides, score, and serialize the report artifacts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use triage_context::derive_env_overrides;
use triage_errors::Result;
use triage_ingest::normalized_doc;
use triage_intel::fetch_threat_intel;
use triage_report::{canonical_json, render_markdown, RenderInputs};
use triage_score::{annotate_report, build_report};
use triage_types::ScoreTables;

use crate::clock;

/// Default artifact names, written to the working directory unless the
/// options are rooted at a repository.
pub const NORMALIZED_FILE: &str = "normalized_findings.json";
pub const THREAT_INTEL_FILE: &str = "threat_intel.json";
pub const ENV_OVERRIDES_FILE: &str = "env_overrides.json";
pub const REPORT_MD_FILE: &str = "contextual-threat-risk-triage.md";
pub const REPORT_JSON_FILE: &str = "contextual-threat-risk-triage.json";

/// One pipeline invocation: input paths, artifact paths, and mode flags.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub dependency_feed: PathBuf,
    pub image_scan: PathBuf,
    pub context: PathBuf,
    pub normalized: PathBuf,
    pub threat_intel: PathBuf,
    pub env_overrides: PathBuf,
    pub output_md: PathBuf,
    pub output_json: PathBuf,
    pub adjust_output: Option<PathBuf>,
    pub enable_adjustment: bool,
    pub offline: bool,
    /// Overrides the clock seam entirely; used by the determinism verifier.
    pub fixed_now: Option<DateTime<Utc>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            dependency_feed: PathBuf::from("dependency_feed.json"),
            image_scan: PathBuf::from("image_scan.json"),
            context: PathBuf::from("context.json"),
            normalized: PathBuf::from(NORMALIZED_FILE),
            threat_intel: PathBuf::from(THREAT_INTEL_FILE),
            env_overrides: PathBuf::from(ENV_OVERRIDES_FILE),
            output_md: PathBuf::from(REPORT_MD_FILE),
            output_json: PathBuf::from(REPORT_JSON_FILE),
            adjust_output: None,
            enable_adjustment: false,
            offline: false,
            fixed_now: None,
        }
    }
}

impl PipelineOptions {
    /// Point the default artifact paths at the repo's dated `.triage/`
    /// layout: derived artifacts under `cache/<date>/`, the report pair
    /// under `reports/<date>/report-<ts>.{md,json}`.
    #[must_use]
    pub fn rooted(mut self, repo_root: &Path, now: DateTime<Utc>) -> Self {
        let triage_dir = triage_config::triage_dir(repo_root);
        let date = clock::date_token(now);
        let ts = clock::ts_token(now);
        let cache_dir = triage_dir.join("cache").join(&date);
        let report_dir = triage_dir.join("reports").join(&date);

        self.context = triage_dir.join("context.json");
        self.normalized = cache_dir.join(NORMALIZED_FILE);
        self.threat_intel = cache_dir.join(THREAT_INTEL_FILE);
        self.env_overrides = cache_dir.join(ENV_OVERRIDES_FILE);
        self.output_md = report_dir.join(format!("report-{ts}.md"));
        self.output_json = report_dir.join(format!("report-{ts}.json"));
        self
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub total_findings: usize,
    pub output_md: PathBuf,
    pub output_json: PathBuf,
}

async fn read_optional_json(path: &Path) -> Option<Value> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(_) => return None,
    };
    match serde_json::from_str(&raw) {
        Ok(payload) => Some(payload),
        Err(error) => {
            warn!(path = %path.display(), %error, "input file is not JSON; treating as absent");
            None
        }
    }
}

async fn write_artifact<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, canonical_json(value)?).await?;
    Ok(())
}

/// Run the full pipeline once.
///
/// Absent inputs degrade per the error taxonomy: missing feed files become
/// empty finding sets, a missing context yields all-unknown environmental
/// metrics, and intel failures fall back to the empty cache. Only I/O on
/// the artifact paths is a hard error.
///
/// # Errors
///
/// Returns an error when the clock seam is misconfigured or an artifact
/// cannot be written.
pub async fn run_pipeline(opts: &PipelineOptions) -> Result<PipelineOutcome> {
    let now = match opts.fixed_now {
        Some(now) => now,
        None => clock::utc_now()?,
    };
    let generated_at = Some(now.to_rfc3339());

    let dependency_feed = read_optional_json(&opts.dependency_feed).await;
    let image_scan = read_optional_json(&opts.image_scan).await;
    let context = read_optional_json(&opts.context).await;

    let normalized = normalized_doc(
        dependency_feed.as_ref(),
        image_scan.as_ref(),
        generated_at.clone(),
    );
    write_artifact(&opts.normalized, &normalized).await?;

    let cves: Vec<String> = normalized.items.iter().map(|i| i.cve.clone()).collect();
    let intel = fetch_threat_intel(&cves, opts.offline, generated_at.clone()).await;
    write_artifact(&opts.threat_intel, &intel).await?;

    let env = derive_env_overrides(context.as_ref(), generated_at);
    write_artifact(&opts.env_overrides, &env).await?;

    let report = build_report(&normalized, &intel, &env, &ScoreTables::default());
    let render_inputs =
        RenderInputs::from_docs(Some(&normalized), Some(&intel), Some(&env), !opts.offline);

    if let Some(parent) = opts.output_md.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&opts.output_md, render_markdown(&report, &render_inputs)).await?;
    write_artifact(&opts.output_json, &report).await?;

    if let Some(adjust_output) = &opts.adjust_output {
        let doc = annotate_report(
            &report,
            opts.enable_adjustment,
            &opts.output_json.display().to_string(),
        );
        write_artifact(adjust_output, &doc).await?;
    }

    info!(
        findings = report.findings.len(),
        offline = opts.offline,
        report = %opts.output_json.display(),
        "pipeline run complete"
    );

    Ok(PipelineOutcome {
        total_findings: report.findings.len(),
        output_md: opts.output_md.clone(),
        output_json: opts.output_json.clone(),
    })
}
