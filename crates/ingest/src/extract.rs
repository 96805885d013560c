//! Per-source field extraction
//!
//! Each logical field is read through an ordered table of key-paths; the
//! first structurally-valid match wins. This tolerates schema variance
//! across feed versions without dynamic-shape probing scattered through
//! the code. Unknown or malformed records are skipped.

use serde_json::Value;
use tracing::debug;

use triage_types::finding::norm_package;
use triage_types::{InputFinding, Severity, Source, UNKNOWN};

use crate::cve::{collect_cve_tokens, normalize_cve};

/// Root keys that may hold the record array in a dependency-feed payload.
const DEPENDENCY_FEED_ROOTS: &[&str] = &["alerts", "dependencies", "findings", "vulnerabilities"];

/// Root keys that may hold the record array in an image-scan payload.
const IMAGE_SCAN_ROOTS: &[&str] = &["findings", "results", "vulnerabilities"];

/// Ordered key-paths per logical field, dependency-feed shape.
const DEP_CVE_PATHS: &[&[&str]] = &[
    &["security_advisory", "cve_id"],
    &["cve_id"],
    &["cve"],
];
const DEP_PACKAGE_PATHS: &[&[&str]] = &[
    &["dependency", "package", "name"],
    &["security_vulnerability", "package", "name"],
    &["package", "name"],
    &["package"],
];
const DEP_SEVERITY_PATHS: &[&[&str]] = &[
    &["security_advisory", "severity"],
    &["security_vulnerability", "severity"],
    &["severity"],
];
const DEP_FIX_PATHS: &[&[&str]] = &[
    &["security_vulnerability", "first_patched_version", "identifier"],
    &["first_patched_version"],
    &["fixed_version"],
];
const DEP_VECTOR_PATHS: &[&[&str]] = &[
    &["security_advisory", "cvss", "vector_string"],
    &["cvss", "vector_string"],
    &["vector_string"],
];
const DEP_EVIDENCE_PATHS: &[&[&str]] = &[&["html_url"], &["url"]];

/// Ordered key-paths per logical field, image-scan shape.
const IMG_CVE_PATHS: &[&[&str]] = &[
    &["packageVulnerabilityDetails", "vulnerabilityId"],
    &["vulnerabilityId"],
    &["name"],
    &["title"],
];
const IMG_SEVERITY_PATHS: &[&[&str]] = &[
    &["severity"],
    &["packageVulnerabilityDetails", "severity"],
];
const IMG_FIX_PATHS: &[&[&str]] = &[&["fixedInVersion"], &["fixed_version"]];
const IMG_EVIDENCE_PATHS: &[&[&str]] = &[&["findingArn"], &["uri"], &["title"]];

/// Walk one dotted key-path into an object tree.
fn lookup<'a>(record: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = record;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

/// First path that resolves to a non-empty string.
fn first_string(record: &Value, paths: &[&[&str]]) -> Option<String> {
    for path in paths {
        if let Some(text) = lookup(record, path).and_then(Value::as_str) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Pull the record array out of a payload: a bare list, or the first
/// present root key holding a list.
fn records<'a>(payload: &'a Value, roots: &[&str]) -> Vec<&'a Value> {
    match payload {
        Value::Array(entries) => entries.iter().collect(),
        Value::Object(_) => {
            for root in roots {
                if let Some(Value::Array(entries)) = payload.get(root) {
                    return entries.iter().collect();
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// CVEs for a record: explicit fields first (pattern-scanned so embedded or
/// lowercase tokens still normalize), then the recursive whole-record scan.
fn record_cves(record: &Value, explicit_paths: &[&[&str]]) -> Vec<String> {
    for path in explicit_paths {
        if let Some(text) = lookup(record, path).and_then(Value::as_str) {
            let found = normalize_cve(text);
            if !found.is_empty() {
                return found;
            }
        }
    }
    collect_cve_tokens(record)
}

fn severity_from(record: &Value, paths: &[&[&str]]) -> Severity {
    first_string(record, paths).map_or(Severity::Unknown, |raw| Severity::parse(&raw))
}

fn fix_from(record: &Value, paths: &[&[&str]]) -> Option<String> {
    first_string(record, paths)
}

/// Extract input findings from a dependency-feed payload. `None` (source
/// absent) yields the empty set.
#[must_use]
pub fn extract_dependency_feed(payload: Option<&Value>) -> Vec<InputFinding> {
    let Some(payload) = payload else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    for record in records(payload, DEPENDENCY_FEED_ROOTS) {
        if !record.is_object() {
            debug!("skipping non-object dependency-feed record");
            continue;
        }

        let mut cves = dependency_feed_identifier_cves(record);
        if cves.is_empty() {
            cves = record_cves(record, DEP_CVE_PATHS);
        }
        if cves.is_empty() {
            debug!("skipping dependency-feed record with no CVE identifier");
            continue;
        }

        let package = norm_package(first_string(record, DEP_PACKAGE_PATHS).as_deref());
        let severity = severity_from(record, DEP_SEVERITY_PATHS);
        let fix_version = fix_from(record, DEP_FIX_PATHS);
        let base_vector = first_string(record, DEP_VECTOR_PATHS);
        let evidence = first_string(record, DEP_EVIDENCE_PATHS)
            .or_else(|| lookup(record, &["number"]).and_then(Value::as_i64).map(|n| format!("alert #{n}")));

        for cve in cves {
            findings.push(InputFinding {
                source: Source::DependencyFeed,
                evidence: evidence.clone().unwrap_or_else(|| format!("dependency-feed:{cve}")),
                cve,
                package: package.clone(),
                severity,
                fix_version: fix_version.clone(),
                base_vector: base_vector.clone(),
            });
        }
    }
    findings
}

/// `security_advisory.identifiers[]` entries of type "CVE" take priority
/// over the flat fields.
fn dependency_feed_identifier_cves(record: &Value) -> Vec<String> {
    let Some(identifiers) = lookup(record, &["security_advisory", "identifiers"]).and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for entry in identifiers {
        let is_cve = entry.get("type").and_then(Value::as_str) == Some("CVE");
        if !is_cve {
            continue;
        }
        if let Some(value) = entry.get("value").and_then(Value::as_str) {
            for cve in normalize_cve(value) {
                if !found.contains(&cve) {
                    found.push(cve);
                }
            }
        }
    }
    found.sort();
    found
}

/// Extract input findings from an image-scan payload.
#[must_use]
pub fn extract_image_scan(payload: Option<&Value>) -> Vec<InputFinding> {
    let Some(payload) = payload else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    for record in records(payload, IMAGE_SCAN_ROOTS) {
        if !record.is_object() {
            debug!("skipping non-object image-scan record");
            continue;
        }

        let cves = record_cves(record, IMG_CVE_PATHS);
        if cves.is_empty() {
            debug!("skipping image-scan record with no CVE identifier");
            continue;
        }

        let (package, package_fix) = image_scan_package(record);
        let severity = severity_from(record, IMG_SEVERITY_PATHS);
        let fix_version = package_fix.or_else(|| fix_from(record, IMG_FIX_PATHS));
        let base_vector = image_scan_vector(record);
        let evidence = first_string(record, IMG_EVIDENCE_PATHS);

        for cve in cves {
            findings.push(InputFinding {
                source: Source::ImageScan,
                evidence: evidence.clone().unwrap_or_else(|| format!("image-scan:{cve}")),
                cve,
                package: package.clone(),
                severity,
                fix_version: fix_version.clone(),
                base_vector: base_vector.clone(),
            });
        }
    }
    findings
}

/// Reduce a multi-package record to one deterministic (package, fix) pair:
/// the lexicographically smallest non-"unknown" normalized name, and the
/// lexicographically smallest non-null fix version among all entries.
fn image_scan_package(record: &Value) -> (String, Option<String>) {
    let entries = lookup(record, &["packageVulnerabilityDetails", "vulnerablePackages"])
        .and_then(Value::as_array)
        .or_else(|| lookup(record, &["vulnerablePackages"]).and_then(Value::as_array));

    if let Some(entries) = entries {
        let mut best_name: Option<String> = None;
        let mut best_fix: Option<String> = None;
        for entry in entries {
            let name = norm_package(entry.get("name").and_then(Value::as_str));
            if name != UNKNOWN {
                match &best_name {
                    Some(existing) if existing.as_str() <= name.as_str() => {}
                    _ => best_name = Some(name),
                }
            }
            if let Some(fix) = entry.get("fixedInVersion").and_then(Value::as_str) {
                let fix = fix.trim();
                if !fix.is_empty() {
                    match &best_fix {
                        Some(existing) if existing.as_str() <= fix => {}
                        _ => best_fix = Some(fix.to_string()),
                    }
                }
            }
        }
        if let Some(name) = best_name {
            return (name, best_fix);
        }
        if best_fix.is_some() {
            return (UNKNOWN.to_string(), best_fix);
        }
    }

    (
        norm_package(lookup(record, &["package", "name"]).and_then(Value::as_str)),
        None,
    )
}

/// First CVSS entry carrying a scoring vector string.
fn image_scan_vector(record: &Value) -> Option<String> {
    let scores = lookup(record, &["packageVulnerabilityDetails", "cvss"])
        .and_then(Value::as_array)
        .or_else(|| lookup(record, &["cvss"]).and_then(Value::as_array))?;

    for entry in scores {
        if let Some(vector) = entry.get("scoringVector").and_then(Value::as_str) {
            let trimmed = vector.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dependency_feed_reads_nested_alert_shape() {
        let payload = json!({
            "alerts": [{
                "number": 7,
                "security_advisory": {
                    "severity": "high",
                    "identifiers": [{"type": "GHSA", "value": "GHSA-xxxx"},
                                     {"type": "CVE", "value": "CVE-2024-0001"}],
                    "cvss": {"vector_string": "CVSS:4.0/AV:N/AC:H"}
                },
                "security_vulnerability": {
                    "severity": "high",
                    "first_patched_version": {"identifier": "1.0.2z"}
                },
                "dependency": {"package": {"name": "OpenSSL"}}
            }]
        });

        let findings = extract_dependency_feed(Some(&payload));
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.cve, "CVE-2024-0001");
        assert_eq!(finding.package, "openssl");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.fix_version.as_deref(), Some("1.0.2z"));
        assert_eq!(finding.base_vector.as_deref(), Some("CVSS:4.0/AV:N/AC:H"));
        assert_eq!(finding.evidence, "alert #7");
    }

    #[test]
    fn dependency_feed_accepts_bare_list_and_flat_fields() {
        let payload = json!([
            {"cve": "cve-2024-0002", "package": "zlib", "severity": "medium"}
        ]);

        let findings = extract_dependency_feed(Some(&payload));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].cve, "CVE-2024-0002");
        assert_eq!(findings[0].package, "zlib");
        assert_eq!(findings[0].fix_version, None);
        assert_eq!(findings[0].evidence, "dependency-feed:CVE-2024-0002");
    }

    #[test]
    fn free_text_cve_fallback_yields_one_finding_per_token() {
        let payload = json!({
            "findings": [{
                "severity": "low",
                "package": {"name": "libfoo"},
                "description": "addresses CVE-2024-0003 and CVE-2024-0004"
            }]
        });

        let findings = extract_dependency_feed(Some(&payload));
        let cves: Vec<&str> = findings.iter().map(|f| f.cve.as_str()).collect();
        assert_eq!(cves, vec!["CVE-2024-0003", "CVE-2024-0004"]);
        assert!(findings.iter().all(|f| f.package == "libfoo"));
    }

    #[test]
    fn image_scan_picks_smallest_package_and_fix() {
        let payload = json!({
            "findings": [{
                "severity": "MEDIUM",
                "findingArn": "arn:scan:1",
                "packageVulnerabilityDetails": {
                    "vulnerabilityId": "CVE-2024-0002",
                    "vulnerablePackages": [
                        {"name": "zlib1g", "fixedInVersion": "1.3.1"},
                        {"name": "zlib", "fixedInVersion": "1.2.9"}
                    ]
                }
            }]
        });

        let findings = extract_image_scan(Some(&payload));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].package, "zlib");
        assert_eq!(findings[0].fix_version.as_deref(), Some("1.2.9"));
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].evidence, "arn:scan:1");
    }

    #[test]
    fn image_scan_reads_first_scoring_vector() {
        let payload = json!({
            "results": [{
                "vulnerabilityId": "CVE-2024-0005",
                "severity": "critical",
                "packageVulnerabilityDetails": {
                    "cvss": [{"version": "4.0", "scoringVector": "CVSS:4.0/AV:N"},
                              {"version": "3.1", "scoringVector": "CVSS:3.1/AV:N"}]
                }
            }]
        });

        let findings = extract_image_scan(Some(&payload));
        assert_eq!(findings[0].base_vector.as_deref(), Some("CVSS:4.0/AV:N"));
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let payload = json!({
            "findings": [42, "text", {"no_cve_here": true},
                          {"vulnerabilityId": "CVE-2024-0006", "severity": "low"}]
        });

        let findings = extract_image_scan(Some(&payload));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].cve, "CVE-2024-0006");
        assert_eq!(findings[0].package, "unknown");
    }

    #[test]
    fn absent_payload_yields_empty_set() {
        assert!(extract_dependency_feed(None).is_empty());
        assert!(extract_image_scan(None).is_empty());
    }

    #[test]
    fn unrecognized_root_shape_yields_empty_set() {
        assert!(extract_dependency_feed(Some(&json!("not a payload"))).is_empty());
        assert!(extract_image_scan(Some(&json!({"results": "not a list"}))).is_empty());
    }
}
