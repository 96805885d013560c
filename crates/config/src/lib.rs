#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for triage
//!
//! This crate handles loading `.triage/config.json`, the only document the
//! pipeline treats as authoritative: an unsupported schema version or an
//! invalid field is a hard failure before the core runs, unlike the
//! data-quality degradations elsewhere in the pipeline.

mod schema;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::debug;
use triage_errors::{ConfigError, Error};

pub use schema::validate_json_schema;

/// The config schema version this build reads and writes.
pub const CURRENT_CONFIG_SCHEMA_VERSION: &str = "0.1.0";

/// Main configuration structure (`.triage/config.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: String,
    pub component_name: String,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Finding-source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub dependency_feed: DependencyFeedConfig,
    #[serde(default)]
    pub image_scan: ImageScanConfig,
}

/// Dependency-alert feed collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyFeedConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `owner/name` repository slug.
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_dependency_api_base")]
    pub api_base: String,
    /// Env var holding the bearer token for the feed API.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

/// Image-scan collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageScanConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub api_base: String,
    /// Local payload used when the scan API is unreachable.
    #[serde(default)]
    pub fallback_file: Option<String>,
}

/// Pipeline processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_deterministic_mode")]
    pub deterministic_mode: bool,
    #[serde(default)]
    pub allow_adjustment: bool,
    #[serde(default = "default_cache_root")]
    pub cache_root: String,
    #[serde(default = "default_report_root")]
    pub report_root: String,
}

fn default_dependency_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_auth_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_deterministic_mode() -> bool {
    true
}

fn default_cache_root() -> String {
    ".triage/cache".to_string()
}

fn default_report_root() -> String {
    ".triage/reports".to_string()
}

impl Default for DependencyFeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repository: String::new(),
            api_base: default_dependency_api_base(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

impl Default for ImageScanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            registry: String::new(),
            repository: String::new(),
            api_base: String::new(),
            fallback_file: None,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            deterministic_mode: default_deterministic_mode(),
            allow_adjustment: false,
            cache_root: default_cache_root(),
            report_root: default_report_root(),
        }
    }
}

impl Config {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the file is missing, unparseable, has an
    /// unsupported schema version, or fails per-field validation.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path).await.map_err(|_| {
            Error::from(ConfigError::NotFound {
                path: path.display().to_string(),
            })
        })?;

        let payload: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })?;
        let payload = migrate_config(payload)?;

        let config: Self = serde_json::from_value(payload).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;

        debug!(path = %path.display(), component = %config.component_name, "loaded config");
        Ok(config)
    }

    /// Validate field values beyond what deserialization checks.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the offending JSON path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.component_name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "component_name".to_string(),
            });
        }

        let dep = &self.sources.dependency_feed;
        if dep.enabled {
            let mut parts = dep.repository.splitn(2, '/');
            let owner = parts.next().unwrap_or_default();
            let name = parts.next().unwrap_or_default();
            if owner.is_empty() || name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "sources.dependency_feed.repository (must be \"owner/name\")"
                        .to_string(),
                    value: dep.repository.clone(),
                });
            }
            if dep.auth_token_env.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "sources.dependency_feed.auth_token_env".to_string(),
                });
            }
        }

        let img = &self.sources.image_scan;
        if img.enabled && img.repository.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "sources.image_scan.repository".to_string(),
            });
        }

        if self.processing.cache_root.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "processing.cache_root".to_string(),
            });
        }
        if self.processing.report_root.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "processing.report_root".to_string(),
            });
        }

        Ok(())
    }
}

/// Migration hook: identity for the current schema version, a hard error
/// for anything else (no automatic migration exists yet).
///
/// # Errors
///
/// Returns `ConfigError::UnsupportedSchemaVersion` for any other version.
pub fn migrate_config(payload: Value) -> Result<Value, ConfigError> {
    let version = payload
        .get("schema_version")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: "schema_version".to_string(),
        })?;

    if version == CURRENT_CONFIG_SCHEMA_VERSION {
        return Ok(payload);
    }
    Err(ConfigError::UnsupportedSchemaVersion {
        found: version.to_string(),
        supported: CURRENT_CONFIG_SCHEMA_VERSION.to_string(),
    })
}

/// Paths a scannable repository must provide under `.triage/`.
const REQUIRED_LAYOUT: &[&str] = &[
    ".triage",
    ".triage/config.json",
    ".triage/context.json",
    ".triage/cache",
    ".triage/reports",
];

/// Validate that a repository root carries the `.triage/` layout contract.
///
/// # Errors
///
/// Returns `ConfigError::LayoutViolation` for the first missing path.
pub fn validate_layout(repo_root: &Path) -> Result<(), ConfigError> {
    for rel in REQUIRED_LAYOUT {
        let path = repo_root.join(rel);
        if !path.exists() {
            return Err(ConfigError::LayoutViolation {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// The `.triage/` directory for a repository root.
#[must_use]
pub fn triage_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".triage")
}
