//! CVE identifier recognition
//!
//! Identifiers follow `CVE-YYYY-NNNN+`, matched case-insensitively and
//! normalized to uppercase. Some feed shapes only embed CVEs inside
//! free-text advisory fields, so a recursive tree walk over the parsed
//! JSON value collects every CVE-shaped token as a fallback.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn cve_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)CVE-\d{4}-\d{4,}").unwrap())
}

/// Extract every CVE-shaped token from a string, uppercased and deduplicated.
#[must_use]
pub fn normalize_cve(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    for found in cve_pattern().find_iter(text) {
        seen.insert(found.as_str().to_uppercase());
    }
    seen.into_iter().collect()
}

/// Recursively scan a JSON value for CVE-shaped tokens in strings and
/// object keys. Returns a sorted, deduplicated list.
#[must_use]
pub fn collect_cve_tokens(value: &Value) -> Vec<String> {
    let mut seen = BTreeSet::new();
    walk(value, &mut seen);
    seen.into_iter().collect()
}

fn walk(value: &Value, seen: &mut BTreeSet<String>) {
    match value {
        Value::String(text) => {
            for cve in normalize_cve(text) {
                seen.insert(cve);
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                walk(entry, seen);
            }
        }
        Value::Object(map) => {
            for (key, entry) in map {
                for cve in normalize_cve(key) {
                    seen.insert(cve);
                }
                walk(entry, seen);
            }
        }
        _ => {}
    }
}
