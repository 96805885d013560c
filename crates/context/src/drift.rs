//! Context drift checking
//!
//! A context document drifts when it goes stale, stops validating against
//! the schema, or accumulates too many `"unknown"` leaves. Drift is a
//! warning condition, not an error: callers map warnings to exit code 2.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use triage_config::validate_json_schema;

/// Thresholds for the drift evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DriftOptions {
    pub max_age_days: i64,
    pub max_unknown_fields: usize,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_unknown_fields: 8,
        }
    }
}

/// Result document of a drift check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub context_path: String,
    pub exists: bool,
    pub schema_valid: bool,
    pub schema_errors: Vec<String>,
    pub age_days: Option<i64>,
    /// `$.a.b[0].c` paths of `"unknown"` leaves.
    pub unknown_fields: Vec<String>,
    pub warnings: Vec<String>,
}

impl DriftReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn collect_unknown_paths(node: &Value, path: &str, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let child = format!("{path}.{key}");
                if value.as_str().is_some_and(|s| s.trim().eq_ignore_ascii_case("unknown")) {
                    out.push(child);
                } else {
                    collect_unknown_paths(value, &child, out);
                }
            }
        }
        Value::Array(entries) => {
            for (idx, entry) in entries.iter().enumerate() {
                collect_unknown_paths(entry, &format!("{path}[{idx}]"), out);
            }
        }
        _ => {}
    }
}

fn file_age_days(path: &Path, now: DateTime<Utc>) -> Option<i64> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let mtime: DateTime<Utc> = modified.into();
    Some((now - mtime).num_days())
}

/// Evaluate a context document against `schema` and the drift thresholds.
/// `now` is injected so tests control the staleness clock.
#[must_use]
pub fn check_context(
    context_path: &Path,
    schema: &Value,
    options: DriftOptions,
    now: DateTime<Utc>,
) -> DriftReport {
    let path_display = context_path.display().to_string();

    let payload = std::fs::read_to_string(context_path)
        .ok()
        .and_then(|text| serde_json::from_str::<Value>(&text).ok());
    let Some(payload) = payload else {
        return DriftReport {
            context_path: path_display,
            exists: false,
            schema_valid: false,
            schema_errors: vec!["missing file".to_string()],
            age_days: None,
            unknown_fields: Vec::new(),
            warnings: vec!["context file missing".to_string()],
        };
    };

    let mut warnings = Vec::new();
    let mut schema_errors = Vec::new();

    let schema_valid = match validate_json_schema(schema, &payload) {
        Ok(()) => true,
        Err(err) => {
            schema_errors.push(err.to_string());
            warnings.push("schema validation failed".to_string());
            false
        }
    };

    let age_days = file_age_days(context_path, now);
    if let Some(age) = age_days {
        if age > options.max_age_days {
            warnings.push(format!(
                "context appears stale: age_days={age} > max_age_days={}",
                options.max_age_days
            ));
        }
    }

    let mut unknown_fields = Vec::new();
    collect_unknown_paths(&payload, "$", &mut unknown_fields);
    if unknown_fields.len() > options.max_unknown_fields {
        warnings.push(format!(
            "context has high unknown-field count: {} > max_unknown_fields={}",
            unknown_fields.len(),
            options.max_unknown_fields
        ));
    }

    let allowed_endpoints = payload
        .get("network")
        .and_then(|n| n.get("allowed_endpoints"))
        .and_then(Value::as_array);
    if allowed_endpoints.is_some_and(Vec::is_empty) {
        warnings.push("network.allowed_endpoints is empty".to_string());
    }

    DriftReport {
        context_path: path_display,
        exists: true,
        schema_valid,
        schema_errors,
        age_days,
        unknown_fields,
        warnings,
    }
}
