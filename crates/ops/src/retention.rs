//! Retention pruning for dated cache/report directories.
//!
//! Dry-run is the default; nothing is deleted unless `apply` is set. The
//! newest `keep_latest` dated directories are always protected regardless
//! of age.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use triage_errors::{OpsError, Result};
use triage_report::canonical_json;

use crate::clock;

/// Pruning thresholds and mode.
#[derive(Debug, Clone)]
pub struct RetentionOptions {
    /// Dated directories older than this many days are candidates.
    pub keep_days: i64,
    /// Always keep this many most-recent dated directories.
    pub keep_latest: usize,
    /// Delete instead of reporting.
    pub apply: bool,
    pub report_json: Option<PathBuf>,
}

impl Default for RetentionOptions {
    fn default() -> Self {
        Self {
            keep_days: 30,
            keep_latest: 7,
            apply: false,
            report_json: None,
        }
    }
}

/// Per-root (cache or reports) pruning result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSection {
    pub root: String,
    pub total_dated_dirs: usize,
    pub delete_count: usize,
    pub delete_dirs: Vec<String>,
}

/// The retention report document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionReport {
    pub generated_at: String,
    pub repo: String,
    pub mode: String,
    pub keep_days: i64,
    pub keep_latest: usize,
    pub cache: RetentionSection,
    pub reports: RetentionSection,
}

impl RetentionReport {
    /// The one-line CLI summary.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "retention mode={} cache_delete={} reports_delete={}",
            self.mode, self.cache.delete_count, self.reports.delete_count
        )
    }
}

fn parse_date_dir(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

fn dated_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir() && parse_date_dir(p).is_some())
        .collect();
    dirs.sort();
    dirs
}

fn select_for_deletion(
    dirs: &[PathBuf],
    keep_days: i64,
    keep_latest: usize,
    today: NaiveDate,
) -> Vec<PathBuf> {
    let protected_from = dirs.len().saturating_sub(keep_latest);
    dirs.iter()
        .enumerate()
        .filter(|(idx, path)| {
            if keep_latest > 0 && *idx >= protected_from {
                return false;
            }
            parse_date_dir(path)
                .is_some_and(|date| (today - date).num_days() > keep_days)
        })
        .map(|(_, path)| path.clone())
        .collect()
}

/// Prune dated cache/report directories under `<repo_root>/.triage/`.
///
/// # Errors
///
/// Returns an error for negative thresholds, failed deletions, or an
/// unwritable report path.
pub async fn prune(repo_root: &Path, options: &RetentionOptions) -> Result<RetentionReport> {
    if options.keep_days < 0 {
        return Err(OpsError::InvalidArgument {
            message: "keep_days must be >= 0".to_string(),
        }
        .into());
    }

    let now = clock::utc_now()?;
    let today = now.date_naive();
    let triage_dir = triage_config::triage_dir(repo_root);
    let cache_root = triage_dir.join("cache");
    let report_root = triage_dir.join("reports");

    let cache_dirs = dated_dirs(&cache_root);
    let report_dirs = dated_dirs(&report_root);
    let delete_cache = select_for_deletion(&cache_dirs, options.keep_days, options.keep_latest, today);
    let delete_reports =
        select_for_deletion(&report_dirs, options.keep_days, options.keep_latest, today);

    if options.apply {
        for path in delete_cache.iter().chain(&delete_reports) {
            info!(path = %path.display(), "removing expired artifact directory");
            tokio::fs::remove_dir_all(path).await?;
        }
    }

    let report = RetentionReport {
        generated_at: now.to_rfc3339(),
        repo: repo_root.display().to_string(),
        mode: if options.apply { "apply" } else { "dry-run" }.to_string(),
        keep_days: options.keep_days,
        keep_latest: options.keep_latest,
        cache: RetentionSection {
            root: cache_root.display().to_string(),
            total_dated_dirs: cache_dirs.len(),
            delete_count: delete_cache.len(),
            delete_dirs: delete_cache.iter().map(|p| p.display().to_string()).collect(),
        },
        reports: RetentionSection {
            root: report_root.display().to_string(),
            total_dated_dirs: report_dirs.len(),
            delete_count: delete_reports.len(),
            delete_dirs: delete_reports.iter().map(|p| p.display().to_string()).collect(),
        },
    };

    if let Some(report_path) = &options.report_json {
        if let Some(parent) = report_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(report_path, canonical_json(&report)?).await?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn keeps_latest_regardless_of_age() {
        let dirs: Vec<PathBuf> = ["2026-01-01", "2026-01-02", "2026-01-03"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let selected = select_for_deletion(&dirs, 0, 2, date("2026-03-01"));
        assert_eq!(selected, vec![PathBuf::from("2026-01-01")]);
    }

    #[test]
    fn fresh_dirs_survive_without_protection() {
        let dirs: Vec<PathBuf> = ["2026-02-27", "2026-02-28"].iter().map(PathBuf::from).collect();
        assert!(select_for_deletion(&dirs, 30, 0, date("2026-03-01")).is_empty());
    }

    #[tokio::test]
    async fn dry_run_deletes_nothing_and_apply_deletes_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join(".triage/cache");
        std::fs::create_dir_all(cache.join("2020-01-01")).unwrap();
        std::fs::create_dir_all(cache.join("2099-01-01")).unwrap();
        std::fs::create_dir_all(dir.path().join(".triage/reports")).unwrap();

        let dry = prune(dir.path(), &RetentionOptions { keep_latest: 1, ..RetentionOptions::default() })
            .await
            .unwrap();
        assert_eq!(dry.mode, "dry-run");
        assert_eq!(dry.cache.delete_count, 1);
        assert!(cache.join("2020-01-01").exists());
        assert_eq!(dry.summary_line(), "retention mode=dry-run cache_delete=1 reports_delete=0");

        let applied = prune(
            dir.path(),
            &RetentionOptions {
                keep_latest: 1,
                apply: true,
                ..RetentionOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(applied.mode, "apply");
        assert!(!cache.join("2020-01-01").exists());
        assert!(cache.join("2099-01-01").exists());
    }
}
