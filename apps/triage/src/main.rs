//! triage - contextual threat-informed vulnerability triage
//!
//! This is the CLI application that drives the pipeline, the multi-repo
//! batch scanner, and the maintenance commands through the ops crate.

mod cli;
mod error;

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde_json::Value;
use tracing::{error, info};

use triage_context::{check_context, context_schema, init_context, DriftOptions, DriftReport};
use triage_intel::fetch_threat_intel;
use triage_ops::{
    prune, run_pipeline, scan, utc_now, verify_determinism, PipelineOptions, RetentionOptions,
    ScanOptions, VerifyOptions,
};
use triage_report::canonical_json;
use triage_types::NormalizedDoc;

use crate::cli::{Cli, Commands};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(cli.global.debug);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("command failed: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    // Logs go to stderr so --json consumers can parse stdout unharmed.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<i32, CliError> {
    let json_mode = cli.global.json;

    match cli.command {
        Commands::Run {
            dependency_feed,
            image_scan,
            context,
            normalized,
            threat_intel,
            env_overrides,
            output_md,
            output_json,
            repo_root,
            offline,
            adjust_output,
            enable_adjustment,
        } => {
            let mut opts = PipelineOptions {
                dependency_feed,
                image_scan,
                context,
                normalized,
                threat_intel,
                env_overrides,
                output_md,
                output_json,
                adjust_output,
                enable_adjustment,
                offline,
                fixed_now: None,
            };
            if let Some(root) = repo_root {
                let now = utc_now()?;
                opts = opts.rooted(&root, now);
            }
            let outcome = run_pipeline(&opts).await?;
            if json_mode {
                let payload = serde_json::json!({
                    "total_findings": outcome.total_findings,
                    "output_md": outcome.output_md.display().to_string(),
                    "output_json": outcome.output_json.display().to_string(),
                });
                println!("{payload}");
            } else {
                println!("findings total={}", outcome.total_findings);
                println!("report: {}", outcome.output_md.display());
                println!("report: {}", outcome.output_json.display());
            }
            Ok(0)
        }

        Commands::Scan {
            repos,
            parallel,
            batch_size,
            offline,
            summary_json,
        } => {
            if parallel == 0 {
                return Err(CliError::InvalidArguments(
                    "--parallel must be at least 1".to_string(),
                ));
            }
            let summary = scan(&ScanOptions {
                repos,
                parallel,
                batch_size,
                offline,
                summary_json,
            })
            .await?;

            if json_mode {
                println!("{}", canonical_json(&summary)?);
            } else {
                for result in &summary.results {
                    let tag = if result.is_ok() { "[OK]" } else { "[ERROR]" };
                    println!("{tag} {}: {}", result.repo, result.detail);
                }
                println!("{}", summary.summary_line());
            }
            Ok(i32::from(summary.failed > 0))
        }

        Commands::FetchIntel {
            normalized,
            output,
            offline,
        } => {
            let doc = read_normalized(&normalized).await?;
            let cves: Vec<String> = doc.items.iter().map(|i| i.cve.clone()).collect();
            let now = utc_now()?;
            let intel = fetch_threat_intel(&cves, offline, Some(now.to_rfc3339())).await;
            write_document(&output, &intel).await?;
            info!(
                cves = cves.len(),
                output = %output.display(),
                "threat intel written"
            );
            if json_mode {
                println!("{}", canonical_json(&intel)?);
            } else {
                println!("threat intel: {}", output.display());
            }
            Ok(0)
        }

        Commands::InitContext {
            output,
            answers_json,
            force,
        } => {
            let answers = match answers_json {
                Some(path) => Some(read_json(&path).await?),
                None => None,
            };
            init_context(&output, answers.as_ref(), force)?;
            if !json_mode {
                println!("context template written: {}", output.display());
            }
            Ok(0)
        }

        Commands::CheckContext {
            context,
            schema,
            max_age_days,
            max_unknown_fields,
            output_json,
        } => {
            let schema = match schema {
                Some(path) => read_json(&path).await?,
                None => context_schema(),
            };
            let report = check_context(
                &context,
                &schema,
                DriftOptions {
                    max_age_days,
                    max_unknown_fields,
                },
                chrono::Utc::now(),
            );
            if let Some(path) = output_json {
                write_document(&path, &report).await?;
            }
            render_drift(&report, json_mode)?;
            Ok(if report.is_clean() { 0 } else { 2 })
        }

        Commands::Retention {
            root,
            keep_days,
            keep_latest,
            apply,
            report_json,
        } => {
            let report = prune(
                &root,
                &RetentionOptions {
                    keep_days,
                    keep_latest,
                    apply,
                    report_json,
                },
            )
            .await?;
            if json_mode {
                println!("{}", canonical_json(&report)?);
            } else {
                println!("{}", report.summary_line());
            }
            Ok(0)
        }

        Commands::VerifyDeterminism {
            dependency_feed,
            image_scan,
            context,
            fixed_time,
        } => {
            verify_determinism(&VerifyOptions {
                dependency_feed,
                image_scan,
                context,
                fixed_time,
            })
            .await?;
            println!("determinism-check: pass");
            Ok(0)
        }
    }
}

fn render_drift(report: &DriftReport, json_mode: bool) -> Result<(), CliError> {
    if json_mode {
        println!("{}", canonical_json(report)?);
        return Ok(());
    }
    if report.is_clean() {
        println!("context-drift-check: clean");
    } else {
        for warning in &report.warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}

async fn read_json(path: &Path) -> Result<Value, CliError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn read_normalized(path: &Path) -> Result<NormalizedDoc, CliError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn write_document<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, canonical_json(value)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_rejects_zero_workers_before_running() {
        let cli = Cli::parse_from(["triage", "scan", "--repos", "repo-a", "--parallel", "0"]);
        let err = run(cli).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidArguments(_)));
        assert!(err.to_string().contains("--parallel"));
    }
}
