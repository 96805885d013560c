//! Scored report rows and summary counts
//!
//! A [`ScoredFinding`] is the terminal artifact of the pipeline: one ranked
//! row joining a correlated finding with its threat signal and environmental
//! metrics. Rows are never mutated after scoring, only serialized.

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::finding::{Severity, SourceBucket};
use crate::intel::ExploitationLevel;

/// Whether a package is believed to execute in production at request time.
///
/// Ascending declaration order so the derived `Ord` matches the rank table
/// (`runtime=2 > unknown=1 > build-only=0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuntimePresence {
    #[serde(rename = "build-only")]
    BuildOnly,
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "runtime")]
    Runtime,
}

impl RuntimePresence {
    /// Parse a raw presence value; anything outside the vocabulary
    /// collapses to `Unknown`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "runtime" => Self::Runtime,
            "build-only" => Self::BuildOnly,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Runtime => 2,
            Self::Unknown => 1,
            Self::BuildOnly => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Unknown => "unknown",
            Self::BuildOnly => "build-only",
        }
    }
}

impl std::fmt::Display for RuntimePresence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully-scored, rank-ready report row.
///
/// String fields carry the `"unknown"` sentinel instead of null so both
/// serializations render identically without per-field special cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFinding {
    pub cve: String,
    pub package: String,
    pub severity: Severity,
    pub risk: u8,
    pub e: ExploitationLevel,
    pub source_bucket: SourceBucket,
    pub runtime: RuntimePresence,
    pub mav: String,
    pub crirar: String,
    pub base_vector: String,
    pub final_vector: String,
    pub fix_version: String,
    pub recommended_action: String,
    pub evidence: String,
    pub score_breakdown: String,
    /// Ranking input only; not part of the serialized row.
    #[serde(skip)]
    pub has_fix: bool,
}

impl ScoredFinding {
    /// The six-level descending comparator with the (cve, package)
    /// ascending tie-break. Total and strict: no two rows with distinct
    /// keys compare equal.
    #[must_use]
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        self.ranking_key().cmp(&other.ranking_key())
    }

    fn ranking_key(&self) -> (Reverse<u8>, Reverse<u8>, Reverse<u8>, Reverse<u8>, Reverse<u8>, Reverse<u8>, &str, &str) {
        (
            Reverse(self.risk),
            Reverse(self.severity.rank()),
            Reverse(self.e.rank()),
            Reverse(self.source_bucket.rank()),
            Reverse(self.runtime.rank()),
            Reverse(u8::from(self.has_fix)),
            self.cve.as_str(),
            self.package.as_str(),
        )
    }
}

/// Count aggregation over the ranked rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub severity_counts: BTreeMap<String, usize>,
    pub threat_counts: BTreeMap<String, usize>,
    pub source_counts: BTreeMap<String, usize>,
}

impl ReportSummary {
    /// Build summary counts from scored rows. Every vocabulary value is
    /// present in the maps even at zero.
    #[must_use]
    pub fn from_rows(rows: &[ScoredFinding]) -> Self {
        let mut severity_counts: BTreeMap<String, usize> = Severity::ALL
            .iter()
            .map(|severity| (severity.as_str().to_string(), 0))
            .collect();
        let mut threat_counts: BTreeMap<String, usize> = ExploitationLevel::ALL
            .iter()
            .map(|level| (level.as_str().to_string(), 0))
            .collect();
        let mut source_counts: BTreeMap<String, usize> = SourceBucket::ALL
            .iter()
            .map(|bucket| (bucket.as_str().to_string(), 0))
            .collect();

        for row in rows {
            *severity_counts
                .entry(row.severity.as_str().to_string())
                .or_insert(0) += 1;
            *threat_counts.entry(row.e.as_str().to_string()).or_insert(0) += 1;
            *source_counts
                .entry(row.source_bucket.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            total: rows.len(),
            severity_counts,
            threat_counts,
            source_counts,
        }
    }

    #[must_use]
    pub fn severity_count(&self, severity: Severity) -> usize {
        self.severity_counts.get(severity.as_str()).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn threat_count(&self, level: ExploitationLevel) -> usize {
        self.threat_counts.get(level.as_str()).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn source_count(&self, bucket: SourceBucket) -> usize {
        self.source_counts.get(bucket.as_str()).copied().unwrap_or(0)
    }
}

/// The report JSON document (terminal artifact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDoc {
    pub summary: ReportSummary,
    pub findings: Vec<ScoredFinding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cve: &str, package: &str, risk: u8) -> ScoredFinding {
        ScoredFinding {
            cve: cve.to_string(),
            package: package.to_string(),
            severity: Severity::Medium,
            risk,
            e: ExploitationLevel::X,
            source_bucket: SourceBucket::DependencyFeedOnly,
            runtime: RuntimePresence::Unknown,
            mav: "MAV:X".to_string(),
            crirar: "CR:X/IR:X/AR:X".to_string(),
            base_vector: "unknown".to_string(),
            final_vector: "unknown".to_string(),
            fix_version: "unknown".to_string(),
            recommended_action: "Investigate; insufficient data in inputs".to_string(),
            evidence: "unknown".to_string(),
            score_breakdown: String::new(),
            has_fix: false,
        }
    }

    #[test]
    fn higher_risk_ranks_first() {
        let a = row("CVE-2024-0002", "zlib", 40);
        let b = row("CVE-2024-0001", "openssl", 80);
        assert_eq!(b.ranking_cmp(&a), Ordering::Less);
    }

    #[test]
    fn equal_numeric_fields_fall_back_to_cve_then_package() {
        let a = row("CVE-2024-0001", "openssl", 40);
        let b = row("CVE-2024-0002", "zlib", 40);
        assert_eq!(a.ranking_cmp(&b), Ordering::Less);

        let c = row("CVE-2024-0001", "libssl", 40);
        assert_eq!(c.ranking_cmp(&a), Ordering::Less);
    }

    #[test]
    fn distinct_keys_never_compare_equal() {
        let a = row("CVE-2024-0001", "openssl", 40);
        let b = row("CVE-2024-0001", "zlib", 40);
        assert_ne!(a.ranking_cmp(&b), Ordering::Equal);
    }

    #[test]
    fn summary_includes_zero_counts() {
        let rows = vec![row("CVE-2024-0001", "openssl", 40)];
        let summary = ReportSummary::from_rows(&rows);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.severity_count(Severity::Medium), 1);
        assert_eq!(summary.severity_count(Severity::Critical), 0);
        assert_eq!(summary.threat_count(ExploitationLevel::A), 0);
        assert_eq!(summary.source_count(SourceBucket::DependencyFeedOnly), 1);
        assert_eq!(summary.severity_counts.len(), 5);
        assert_eq!(summary.threat_counts.len(), 5);
        assert_eq!(summary.source_counts.len(), 3);
    }

    #[test]
    fn sort_key_is_not_serialized() {
        let value = serde_json::to_value(row("CVE-2024-0001", "openssl", 40)).unwrap();
        assert!(value.get("has_fix").is_none());
        assert_eq!(value["risk"], 40);
        assert_eq!(value["severity"], "medium");
    }
}
