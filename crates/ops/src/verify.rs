//! Determinism verifier: two offline pipeline runs with a pinned clock must
//! produce byte-identical artifacts.

use std::path::PathBuf;

use tracing::info;

use triage_errors::{OpsError, Result};

use crate::clock;
use crate::pipeline::{
    run_pipeline, PipelineOptions, ENV_OVERRIDES_FILE, NORMALIZED_FILE, REPORT_JSON_FILE,
    REPORT_MD_FILE, THREAT_INTEL_FILE,
};

/// Inputs for a verification run.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub dependency_feed: PathBuf,
    pub image_scan: PathBuf,
    pub context: PathBuf,
    /// RFC3339 instant injected into both runs.
    pub fixed_time: String,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            dependency_feed: PathBuf::from("dependency_feed.json"),
            image_scan: PathBuf::from("image_scan.json"),
            context: PathBuf::from("context.json"),
            fixed_time: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }
}

const COMPARED_ARTIFACTS: [&str; 5] = [
    NORMALIZED_FILE,
    THREAT_INTEL_FILE,
    ENV_OVERRIDES_FILE,
    REPORT_MD_FILE,
    REPORT_JSON_FILE,
];

async fn run_into(root: &std::path::Path, options: &VerifyOptions) -> Result<()> {
    let opts = PipelineOptions {
        dependency_feed: options.dependency_feed.clone(),
        image_scan: options.image_scan.clone(),
        context: options.context.clone(),
        normalized: root.join(NORMALIZED_FILE),
        threat_intel: root.join(THREAT_INTEL_FILE),
        env_overrides: root.join(ENV_OVERRIDES_FILE),
        output_md: root.join(REPORT_MD_FILE),
        output_json: root.join(REPORT_JSON_FILE),
        adjust_output: None,
        enable_adjustment: false,
        offline: true,
        fixed_now: Some(clock::parse_fixed(&options.fixed_time)?),
    };
    run_pipeline(&opts).await?;
    Ok(())
}

/// Run the pipeline twice offline into temp dirs and byte-compare the five
/// artifacts.
///
/// # Errors
///
/// Returns `OpsError::DeterminismMismatch` naming the first differing file,
/// or an I/O error if a run fails outright.
pub async fn verify_determinism(options: &VerifyOptions) -> Result<()> {
    let scratch = tempfile::tempdir()?;
    let run_a = scratch.path().join("run-a");
    let run_b = scratch.path().join("run-b");

    run_into(&run_a, options).await?;
    run_into(&run_b, options).await?;

    for rel in COMPARED_ARTIFACTS {
        let a = tokio::fs::read(run_a.join(rel)).await?;
        let b = tokio::fs::read(run_b.join(rel)).await?;
        if a != b {
            return Err(OpsError::DeterminismMismatch {
                file: rel.to_string(),
            }
            .into());
        }
    }

    info!(artifacts = COMPARED_ARTIFACTS.len(), "determinism check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn identical_offline_runs_verify_clean() {
        let dir = tempfile::tempdir().unwrap();
        let dep = dir.path().join("dependency_feed.json");
        let scan = dir.path().join("image_scan.json");
        let context = dir.path().join("context.json");
        std::fs::write(
            &dep,
            json!([{
                "number": 1,
                "security_advisory": {"cve_id": "CVE-2024-0001", "severity": "high"},
                "dependency": {"package": {"name": "openssl"}}
            }])
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            &scan,
            json!({"findings": [{"name": "CVE-2024-0002", "severity": "MEDIUM"}]}).to_string(),
        )
        .unwrap();
        std::fs::write(&context, "{}").unwrap();

        let options = VerifyOptions {
            dependency_feed: dep,
            image_scan: scan,
            context,
            ..VerifyOptions::default()
        };
        verify_determinism(&options).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_fixed_time_is_an_argument_error() {
        let options = VerifyOptions {
            fixed_time: "not-a-time".to_string(),
            ..VerifyOptions::default()
        };
        let err = verify_determinism(&options).await.unwrap_err();
        assert!(err.to_string().contains("RFC3339"));
    }
}
