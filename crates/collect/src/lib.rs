#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Raw-finding collectors
//!
//! Fetches the two feed payloads and caches them verbatim under the dated
//! cache directory. Resolution order per source: env-override file (no
//! network), repo-local file, HTTPS API. The image-scan collector degrades
//! to its configured fallback file when the API fails; the dependency-feed
//! collector fails hard without a token or local payload.

mod client;

pub use client::{FeedClient, RetryPolicy};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use triage_config::Config;
use triage_errors::{CollectError, Result};
use triage_report::canonical_json;

/// Env var naming a local dependency-feed payload, bypassing the network.
pub const DEPENDENCY_FEED_FILE_VAR: &str = "TRIAGE_DEPENDENCY_FEED_FILE";

/// Env var naming a local image-scan payload, bypassing the network.
pub const IMAGE_SCAN_FILE_VAR: &str = "TRIAGE_IMAGE_SCAN_FILE";

const PAGE_SIZE: usize = 100;

/// How a collector ultimately sourced its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectMode {
    #[serde(rename = "disabled")]
    Disabled,
    #[serde(rename = "env-override")]
    EnvOverride,
    #[serde(rename = "repo-file")]
    RepoFile,
    #[serde(rename = "api")]
    Api,
    #[serde(rename = "api-fallback-file")]
    ApiFallbackFile,
}

/// Per-collector run metadata, recorded in the scan manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectMeta {
    pub mode: CollectMode,
    pub attempts: u32,
    pub items: usize,
}

async fn read_json_file(path: &Path) -> Result<Value> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn write_payload(path: &Path, payload: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, canonical_json(payload)?).await?;
    Ok(())
}

fn env_override(var: &str) -> Result<Option<PathBuf>> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let path = PathBuf::from(raw);
    if !path.exists() {
        return Err(CollectError::OverrideMissing {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(Some(path))
}

fn item_count(payload: &Value) -> usize {
    match payload {
        Value::Array(items) => items.len(),
        Value::Object(map) => map
            .get("findings")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        _ => 0,
    }
}

/// Collect open dependency-feed alerts into
/// `<cache_dir>/dependency-feed-raw-<ts>.json`.
///
/// # Errors
///
/// Fails when the env-override path is set but missing, when no token and
/// no local payload exist, or when the API stays down past the retry budget.
pub async fn collect_dependency_feed(
    config: &Config,
    repo_root: &Path,
    cache_dir: &Path,
    timestamp: &str,
) -> Result<(PathBuf, CollectMeta)> {
    let feed = &config.sources.dependency_feed;
    let out_path = cache_dir.join(format!("dependency-feed-raw-{timestamp}.json"));

    if !feed.enabled {
        write_payload(&out_path, &json!([])).await?;
        return Ok((
            out_path,
            CollectMeta {
                mode: CollectMode::Disabled,
                attempts: 0,
                items: 0,
            },
        ));
    }

    if let Some(override_path) = env_override(DEPENDENCY_FEED_FILE_VAR)? {
        let payload = read_json_file(&override_path).await?;
        let items = item_count(&payload);
        write_payload(&out_path, &payload).await?;
        info!(path = %override_path.display(), items, "dependency feed from env override");
        return Ok((
            out_path,
            CollectMeta {
                mode: CollectMode::EnvOverride,
                attempts: 0,
                items,
            },
        ));
    }

    let repo_file = repo_root.join("dependency_feed.json");
    if repo_file.exists() {
        let payload = read_json_file(&repo_file).await?;
        let items = item_count(&payload);
        write_payload(&out_path, &payload).await?;
        info!(path = %repo_file.display(), items, "dependency feed from repo-local file");
        return Ok((
            out_path,
            CollectMeta {
                mode: CollectMode::RepoFile,
                attempts: 0,
                items,
            },
        ));
    }

    let token = std::env::var(&feed.auth_token_env)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CollectError::TokenMissing {
            source_name: "dependency-feed".to_string(),
            var: feed.auth_token_env.clone(),
        })?;

    let client = FeedClient::new(RetryPolicy::from_env()?)?;
    let mut alerts: Vec<Value> = Vec::new();
    let mut attempts = 0;
    let mut page = 1usize;
    loop {
        let url = format!(
            "{}/repos/{}/dependabot/alerts?state=open&per_page={PAGE_SIZE}&page={page}",
            feed.api_base.trim_end_matches('/'),
            feed.repository,
        );
        let label = format!("dependency-feed page {page}");
        let (payload, used) = client
            .json_with_retry(
                |c| {
                    c.get(&url)
                        .header("Accept", "application/vnd.github+json")
                        .bearer_auth(&token)
                },
                &label,
            )
            .await
            .map_err(|error| CollectError::FetchFailed {
                source_name: "dependency-feed".to_string(),
                attempts: client.policy().max_attempts,
                message: error.to_string(),
            })?;
        attempts += used;

        let Value::Array(batch) = payload else {
            return Err(CollectError::FetchFailed {
                source_name: "dependency-feed".to_string(),
                attempts,
                message: "API payload is not a list".to_string(),
            }
            .into());
        };
        let short_page = batch.len() < PAGE_SIZE;
        alerts.extend(batch);
        if short_page {
            break;
        }
        page += 1;
    }

    let payload = Value::Array(alerts);
    let items = item_count(&payload);
    write_payload(&out_path, &payload).await?;
    info!(items, pages = page, "dependency feed from API");
    Ok((
        out_path,
        CollectMeta {
            mode: CollectMode::Api,
            attempts,
            items,
        },
    ))
}

/// Collect image-scan findings into `<cache_dir>/image-scan-raw-<ts>.json`.
///
/// # Errors
///
/// Fails when the env-override path is set but missing, or when the API
/// fails and no usable fallback file is configured.
pub async fn collect_image_scan(
    config: &Config,
    repo_root: &Path,
    cache_dir: &Path,
    timestamp: &str,
) -> Result<(PathBuf, CollectMeta)> {
    let scan = &config.sources.image_scan;
    let out_path = cache_dir.join(format!("image-scan-raw-{timestamp}.json"));

    if !scan.enabled {
        write_payload(&out_path, &json!({ "findings": [] })).await?;
        return Ok((
            out_path,
            CollectMeta {
                mode: CollectMode::Disabled,
                attempts: 0,
                items: 0,
            },
        ));
    }

    if let Some(override_path) = env_override(IMAGE_SCAN_FILE_VAR)? {
        let payload = read_json_file(&override_path).await?;
        let items = item_count(&payload);
        write_payload(&out_path, &payload).await?;
        info!(path = %override_path.display(), items, "image scan from env override");
        return Ok((
            out_path,
            CollectMeta {
                mode: CollectMode::EnvOverride,
                attempts: 0,
                items,
            },
        ));
    }

    let client = FeedClient::new(RetryPolicy::from_env()?)?;
    let url = format!("{}/findings", scan.api_base.trim_end_matches('/'));
    let body = json!({
        "registry": scan.registry,
        "repository": scan.repository,
    });

    match client
        .json_with_retry(|c| c.post(&url).json(&body), "image-scan findings")
        .await
    {
        Ok((payload, attempts)) => {
            let items = item_count(&payload);
            write_payload(&out_path, &payload).await?;
            info!(items, "image scan from API");
            Ok((
                out_path,
                CollectMeta {
                    mode: CollectMode::Api,
                    attempts,
                    items,
                },
            ))
        }
        Err(error) => {
            let fallback = scan.fallback_file.as_ref().map(|f| repo_root.join(f));
            match fallback {
                Some(path) if path.exists() => {
                    warn!(%error, path = %path.display(), "image-scan API failed; using fallback file");
                    let payload = read_json_file(&path).await?;
                    let items = item_count(&payload);
                    write_payload(&out_path, &payload).await?;
                    Ok((
                        out_path,
                        CollectMeta {
                            mode: CollectMode::ApiFallbackFile,
                            attempts: client.policy().max_attempts,
                            items,
                        },
                    ))
                }
                _ => Err(CollectError::FetchFailed {
                    source_name: "image-scan".to_string(),
                    attempts: client.policy().max_attempts,
                    message: error.to_string(),
                }
                .into()),
            }
        }
    }
}

/// Pre-flight auth/override checks for a batch run. Returns one message per
/// misconfiguration; an empty list means collection can proceed.
#[must_use]
pub fn validate_collector_auth(config: &Config, repo_root: &Path) -> Vec<String> {
    let mut problems = Vec::new();

    let feed = &config.sources.dependency_feed;
    if feed.enabled {
        match env_override(DEPENDENCY_FEED_FILE_VAR) {
            Err(_) => {
                if let Ok(raw) = std::env::var(DEPENDENCY_FEED_FILE_VAR) {
                    problems.push(format!("{DEPENDENCY_FEED_FILE_VAR} does not exist: {raw}"));
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                let token_set =
                    std::env::var(&feed.auth_token_env).is_ok_and(|t| !t.trim().is_empty());
                if !token_set && !repo_root.join("dependency_feed.json").exists() {
                    problems.push(format!(
                        "dependency-feed auth unavailable: set {} or provide \
                         {DEPENDENCY_FEED_FILE_VAR} or repo-local dependency_feed.json",
                        feed.auth_token_env,
                    ));
                }
            }
        }
    }

    let scan = &config.sources.image_scan;
    if scan.enabled {
        match env_override(IMAGE_SCAN_FILE_VAR) {
            Err(_) => {
                if let Ok(raw) = std::env::var(IMAGE_SCAN_FILE_VAR) {
                    problems.push(format!("{IMAGE_SCAN_FILE_VAR} does not exist: {raw}"));
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Some(fallback) = &scan.fallback_file {
                    if !repo_root.join(fallback).exists() {
                        problems.push(format!(
                            "image-scan fallback_file does not exist: {fallback}"
                        ));
                    }
                }
            }
        }
    }

    problems
}
