//! Multi-repo batch scanner.
//!
//! Each repository gets the full treatment: layout contract, typed config
//! load, collectors, pipeline run, a run manifest plus cache audit, and an
//! aggregate per-day report index. Failures are recorded per repo; one bad
//! repo never aborts the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use triage_collect::{collect_dependency_feed, collect_image_scan, CollectMeta};
use triage_config::Config;
use triage_errors::Result;
use triage_report::canonical_json;

use crate::clock;
use crate::pipeline::{run_pipeline, PipelineOptions};

/// Batch-run options.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub repos: Vec<PathBuf>,
    /// Worker count; 1 means sequential.
    pub parallel: usize,
    /// Max repos per batch; 0 disables batching.
    pub batch_size: usize,
    pub offline: bool,
    pub summary_json: Option<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            repos: Vec::new(),
            parallel: 1,
            batch_size: 0,
            offline: false,
            summary_json: None,
        }
    }
}

/// One repository's result line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoOutcome {
    pub repo: String,
    pub status: String,
    pub detail: String,
}

impl RepoOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Deterministic batch summary, optionally written as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub generated_at: String,
    pub mode: String,
    pub workers: usize,
    pub batch_size: usize,
    pub total_batches: usize,
    pub offline: bool,
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub results: Vec<RepoOutcome>,
}

impl ScanSummary {
    /// `summary: total=N ok=N failed=N` line for the CLI.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "summary: total={} ok={} failed={}",
            self.total, self.ok, self.failed
        )
    }
}

async fn write_json_file(path: &Path, payload: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, canonical_json(payload)?).await?;
    Ok(())
}

fn read_json_file(path: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Rebuild `index.json` for a dated report directory from its manifests.
async fn update_run_index(report_dir: &Path, date: &str, generated_at: &str) -> Result<PathBuf> {
    let mut manifest_paths: Vec<PathBuf> = std::fs::read_dir(report_dir)
        .map(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("run-manifest-") && n.ends_with(".json"))
                })
                .collect()
        })
        .unwrap_or_default();
    manifest_paths.sort();

    let mut rows: Vec<Value> = Vec::new();
    for manifest_path in &manifest_paths {
        let Some(payload) = read_json_file(manifest_path) else {
            continue;
        };
        let outputs = payload.get("outputs").cloned().unwrap_or_else(|| json!({}));
        rows.push(json!({
            "run_id": payload.get("run_id"),
            "repo_path": payload.get("repo_path"),
            "status": payload.get("status"),
            "started_at": payload.get("started_at"),
            "ended_at": payload.get("ended_at"),
            "report_md": outputs.get("report_md"),
            "report_json": outputs.get("report_json"),
            "manifest": manifest_path.display().to_string(),
        }));
    }
    rows.sort_by_key(|row| {
        (
            row.get("report_json")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            row.get("run_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        )
    });

    let ok = rows
        .iter()
        .filter(|row| row.get("status").and_then(Value::as_str) == Some("ok"))
        .count();
    let index_path = report_dir.join("index.json");
    write_json_file(
        &index_path,
        &json!({
            "date": date,
            "generated_at": generated_at,
            "total_runs": rows.len(),
            "ok": ok,
            "failed": rows.len() - ok,
            "reports": rows,
        }),
    )
    .await?;
    Ok(index_path)
}

/// Full treatment for one repo. Never returns Err; every failure becomes an
/// error outcome so the batch keeps going.
async fn process_repo(repo: PathBuf, offline: bool, mode: String) -> RepoOutcome {
    let repo_display = repo.display().to_string();
    match process_repo_inner(&repo, offline, &mode).await {
        Ok(detail) => RepoOutcome {
            repo: repo_display,
            status: "ok".to_string(),
            detail,
        },
        Err(err) => {
            error!(repo = %repo_display, error = %err, "repo scan failed");
            RepoOutcome {
                repo: repo_display,
                status: "error".to_string(),
                detail: err,
            }
        }
    }
}

#[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
async fn process_repo_inner(repo: &Path, offline: bool, mode: &str) -> std::result::Result<String, String> {
    triage_config::validate_layout(repo).map_err(|e| e.to_string())?;

    let config_path = triage_config::triage_dir(repo).join("config.json");
    let config = Config::load(&config_path)
        .await
        .map_err(|e| format!("{}: {e}", config_path.display()))?;
    if !config.processing.deterministic_mode {
        return Err(triage_errors::OpsError::DeterministicModeRequired {
            repo: repo.display().to_string(),
        }
        .to_string());
    }

    // Auth misconfiguration surfaces up front; the collectors still decide
    // whether a run can proceed without it.
    for problem in triage_collect::validate_collector_auth(&config, repo) {
        warn!(repo = %repo.display(), %problem, "collector auth gap");
    }

    let started_at = clock::utc_now().map_err(|e| e.to_string())?;
    let date = clock::date_token(started_at);
    let ts = clock::ts_token(started_at);
    let run_id = Uuid::new_v4().to_string();

    let triage_dir = triage_config::triage_dir(repo);
    let cache_dir = triage_dir.join("cache").join(&date);
    let report_dir = triage_dir.join("reports").join(&date);
    tokio::fs::create_dir_all(&cache_dir)
        .await
        .map_err(|e| e.to_string())?;
    tokio::fs::create_dir_all(&report_dir)
        .await
        .map_err(|e| e.to_string())?;

    let (dep_path, dep_meta): (PathBuf, CollectMeta) =
        collect_dependency_feed(&config, repo, &cache_dir, &ts)
            .await
            .map_err(|e| format!("dependency-feed collector failed: {e}"))?;
    let (scan_path, scan_meta): (PathBuf, CollectMeta) =
        collect_image_scan(&config, repo, &cache_dir, &ts)
            .await
            .map_err(|e| format!("image-scan collector failed: {e}"))?;

    let opts = PipelineOptions {
        dependency_feed: dep_path.clone(),
        image_scan: scan_path.clone(),
        offline,
        adjust_output: config
            .processing
            .allow_adjustment
            .then(|| report_dir.join(format!("adjustments-{ts}.json"))),
        enable_adjustment: config.processing.allow_adjustment,
        // One clock reading per run: dated paths and artifact timestamps agree.
        fixed_now: Some(started_at),
        ..PipelineOptions::default()
    }
    .rooted(repo, started_at);

    let pipeline_result = run_pipeline(&opts).await;
    let ended_at = clock::utc_now().map_err(|e| e.to_string())?;

    let (status, error_field) = match &pipeline_result {
        Ok(_) => ("ok", Value::Null),
        Err(err) => ("error", Value::String(err.to_string())),
    };

    let inputs = json!({
        "dependency_feed": dep_path.display().to_string(),
        "image_scan": scan_path.display().to_string(),
        "context": opts.context.display().to_string(),
        "config": config_path.display().to_string(),
    });
    let outputs = json!({
        "normalized": opts.normalized.display().to_string(),
        "threat_intel": opts.threat_intel.display().to_string(),
        "env_overrides": opts.env_overrides.display().to_string(),
        "report_md": opts.output_md.display().to_string(),
        "report_json": opts.output_json.display().to_string(),
    });
    let collector_meta = json!({
        "dependency_feed": dep_meta,
        "image_scan": scan_meta,
    });

    let manifest_path = report_dir.join(format!("run-manifest-{run_id}.json"));
    write_json_file(
        &manifest_path,
        &json!({
            "run_id": run_id,
            "repo_path": repo.display().to_string(),
            "started_at": started_at.to_rfc3339(),
            "ended_at": ended_at.to_rfc3339(),
            "duration_seconds": (ended_at - started_at).num_milliseconds() as f64 / 1000.0,
            "mode": mode,
            "offline": offline,
            "status": status,
            "error": error_field,
            "inputs": inputs,
            "outputs": outputs,
            "collector_meta": collector_meta,
        }),
    )
    .await
    .map_err(|e| e.to_string())?;

    let cache_audit_path = cache_dir.join(format!("cache-audit-{run_id}.json"));
    write_json_file(
        &cache_audit_path,
        &json!({
            "run_id": run_id,
            "repo_path": repo.display().to_string(),
            "date": date,
            "generated_at": ended_at.to_rfc3339(),
            "status": status,
            "collector_inputs": inputs,
            "collector_meta": collector_meta,
            "derived_artifacts": {
                "normalized_findings": opts.normalized.display().to_string(),
                "threat_intel": opts.threat_intel.display().to_string(),
                "env_overrides": opts.env_overrides.display().to_string(),
            },
            "report_artifacts": {
                "markdown": opts.output_md.display().to_string(),
                "json": opts.output_json.display().to_string(),
                "manifest": manifest_path.display().to_string(),
            },
        }),
    )
    .await
    .map_err(|e| e.to_string())?;

    update_run_index(&report_dir, &date, &ended_at.to_rfc3339())
        .await
        .map_err(|e| e.to_string())?;

    match pipeline_result {
        Ok(outcome) => Ok(format!(
            "ok; findings={}; manifest={}",
            outcome.total_findings,
            manifest_path.display()
        )),
        Err(err) => Err(format!("{err}; manifest={}", manifest_path.display())),
    }
}

fn batches(repos: &[PathBuf], batch_size: usize) -> Vec<Vec<PathBuf>> {
    if batch_size == 0 {
        return vec![repos.to_vec()];
    }
    repos.chunks(batch_size).map(<[PathBuf]>::to_vec).collect()
}

/// Scan every repository and return the batch summary. Scan-level errors
/// (bad options, unwritable summary path) are hard; per-repo failures are
/// folded into the summary.
///
/// # Errors
///
/// Returns an error for invalid options or when the summary file cannot be
/// written.
pub async fn scan(options: &ScanOptions) -> Result<ScanSummary> {
    if options.repos.is_empty() {
        return Err(triage_errors::OpsError::InvalidArgument {
            message: "no repository paths supplied".to_string(),
        }
        .into());
    }
    if options.parallel == 0 {
        return Err(triage_errors::OpsError::InvalidArgument {
            message: "parallel worker count must be >= 1".to_string(),
        }
        .into());
    }

    let mode = if options.parallel > 1 {
        "parallel"
    } else {
        "sequential"
    };
    let repo_batches = batches(&options.repos, options.batch_size);
    let mut results: Vec<RepoOutcome> = Vec::with_capacity(options.repos.len());

    for (batch_index, batch) in repo_batches.iter().enumerate() {
        info!(
            batch = batch_index + 1,
            batches = repo_batches.len(),
            size = batch.len(),
            "scanning batch"
        );

        if options.parallel == 1 {
            for repo in batch {
                results.push(process_repo(repo.clone(), options.offline, mode.to_string()).await);
            }
        } else {
            let semaphore = Arc::new(Semaphore::new(options.parallel));
            let mut tasks = FuturesUnordered::new();
            for (idx, repo) in batch.iter().cloned().enumerate() {
                let semaphore = Arc::clone(&semaphore);
                let offline = options.offline;
                let mode = mode.to_string();
                tasks.push(tokio::spawn(async move {
                    // Holds a permit for the duration of the repo run.
                    let _permit = semaphore.acquire_owned().await;
                    (idx, process_repo(repo, offline, mode).await)
                }));
            }

            let mut indexed: Vec<Option<RepoOutcome>> = vec![None; batch.len()];
            while let Some(joined) = tasks.next().await {
                match joined {
                    Ok((idx, outcome)) => indexed[idx] = Some(outcome),
                    Err(err) => {
                        return Err(triage_errors::OpsError::StageFailed {
                            stage: "scan worker".to_string(),
                            message: err.to_string(),
                        }
                        .into())
                    }
                }
            }
            // Re-ordered by input index so the summary is deterministic.
            for (idx, outcome) in indexed.into_iter().enumerate() {
                if let Some(outcome) = outcome {
                    results.push(outcome);
                } else {
                    results.push(RepoOutcome {
                        repo: batch[idx].display().to_string(),
                        status: "error".to_string(),
                        detail: "worker produced no result".to_string(),
                    });
                }
            }
        }
    }

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let summary = ScanSummary {
        generated_at: clock::utc_now()?.to_rfc3339(),
        mode: mode.to_string(),
        workers: options.parallel,
        batch_size: options.batch_size,
        total_batches: repo_batches.len(),
        offline: options.offline,
        total: results.len(),
        ok,
        failed: results.len() - ok,
        results,
    };

    if let Some(summary_path) = &options.summary_json {
        write_json_file(summary_path, &serde_json::to_value(&summary)?).await?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batching_rules() {
        let repos: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("r{i}"))).collect();
        assert_eq!(batches(&repos, 0).len(), 1);
        assert_eq!(batches(&repos, 2).len(), 3);
        assert_eq!(batches(&repos, 10).len(), 1);
    }

    #[tokio::test]
    async fn scan_requires_repos() {
        let err = scan(&ScanOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("no repository paths"));
    }
}
