//! Finding records: raw extraction output and the correlated canonical unit
//!
//! An [`InputFinding`] is one (source record, CVE) pair as extracted from a
//! feed payload. A [`CorrelatedFinding`] is the canonical unit of risk,
//! exactly one per distinct (cve, package) key per run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::UNKNOWN;

/// Which feed reported a finding.
///
/// The derived order (`DependencyFeed < ImageScan`) is part of the merge
/// contract: input findings are pre-sorted by (source, cve, package) before
/// correlation so that first-wins fields are stable across fetch orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    DependencyFeed,
    ImageScan,
}

impl Source {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DependencyFeed => "DependencyFeed",
            Self::ImageScan => "ImageScan",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five-level severity vocabulary, totally ordered by rank.
///
/// Declaration order is ascending so the derived `Ord` agrees with the
/// rank table (`critical=4 > high=3 > medium=2 > low=1 > unknown=0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a raw severity value; anything outside the five-level
    /// vocabulary collapses to `Unknown`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Unknown => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }

    /// Capitalized form used in the markdown findings table.
    #[must_use]
    pub fn capitalized(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }

    /// All values in descending rank order, for fixed-order count maps.
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Unknown,
    ];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a finding by which feed(s) reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceBucket {
    #[serde(rename = "DependencyFeed-only")]
    DependencyFeedOnly,
    #[serde(rename = "ImageScan-only")]
    ImageScanOnly,
    Both,
}

impl SourceBucket {
    #[must_use]
    pub fn from_sources(sources: &BTreeSet<Source>) -> Self {
        let dep = sources.contains(&Source::DependencyFeed);
        let img = sources.contains(&Source::ImageScan);
        match (dep, img) {
            (true, true) => Self::Both,
            (false, true) => Self::ImageScanOnly,
            // A finding with no recorded source can only come from the
            // dependency feed path dropping its tag; treat it as feed-only.
            _ => Self::DependencyFeedOnly,
        }
    }

    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Both => 3,
            Self::ImageScanOnly => 2,
            Self::DependencyFeedOnly => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "Both",
            Self::ImageScanOnly => "ImageScan-only",
            Self::DependencyFeedOnly => "DependencyFeed-only",
        }
    }

    pub const ALL: [Self; 3] = [Self::Both, Self::ImageScanOnly, Self::DependencyFeedOnly];
}

impl std::fmt::Display for SourceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted (source record, CVE) pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFinding {
    pub source: Source,
    pub cve: String,
    /// Never empty; absent package names become the `"unknown"` sentinel.
    pub package: String,
    pub severity: Severity,
    pub fix_version: Option<String>,
    pub base_vector: Option<String>,
    pub evidence: String,
}

impl InputFinding {
    /// Sort key used to stabilize first-wins merge fields.
    #[must_use]
    pub fn merge_key(&self) -> (Source, &str, &str) {
        (self.source, self.cve.as_str(), self.package.as_str())
    }
}

/// The canonical unit of risk: one per distinct (cve, package) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatedFinding {
    pub cve: String,
    pub package: String,
    pub sources: BTreeSet<Source>,
    pub severity: Severity,
    pub fix_version: Option<String>,
    pub base_vector: Option<String>,
    pub evidence_ids: BTreeSet<String>,
}

impl CorrelatedFinding {
    #[must_use]
    pub fn new(cve: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            cve: cve.into(),
            package: package.into(),
            sources: BTreeSet::new(),
            severity: Severity::Unknown,
            fix_version: None,
            base_vector: None,
            evidence_ids: BTreeSet::new(),
        }
    }

    /// Fold one input finding into this record.
    ///
    /// Commutative and associative for severity/sources/evidence; the
    /// first-wins `base_vector` field relies on callers feeding inputs in
    /// (source, cve, package) order.
    pub fn absorb(&mut self, input: &InputFinding) {
        self.sources.insert(input.source);
        self.severity = self.severity.max(input.severity);
        if let Some(fix) = &input.fix_version {
            match &self.fix_version {
                Some(existing) if existing.as_str() <= fix.as_str() => {}
                _ => self.fix_version = Some(fix.clone()),
            }
        }
        if self.base_vector.is_none() {
            self.base_vector.clone_from(&input.base_vector);
        }
        if !input.evidence.is_empty() {
            self.evidence_ids.insert(input.evidence.clone());
        }
    }

    #[must_use]
    pub fn source_bucket(&self) -> SourceBucket {
        SourceBucket::from_sources(&self.sources)
    }
}

/// One entry in the normalized findings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub cve: String,
    pub package: String,
    pub severity: Severity,
    pub sources: Vec<Source>,
    pub source_bucket: SourceBucket,
    pub fix_version: Option<String>,
    pub cvss_base_vector: Option<String>,
    pub evidence_ids: Vec<String>,
}

impl From<&CorrelatedFinding> for NormalizedItem {
    fn from(finding: &CorrelatedFinding) -> Self {
        Self {
            cve: finding.cve.clone(),
            package: finding.package.clone(),
            severity: finding.severity,
            sources: finding.sources.iter().copied().collect(),
            source_bucket: finding.source_bucket(),
            fix_version: finding.fix_version.clone(),
            cvss_base_vector: finding.base_vector.clone(),
            evidence_ids: finding.evidence_ids.iter().cloned().collect(),
        }
    }
}

/// The normalized findings document (stage 1 artifact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDoc {
    pub generated_at: Option<String>,
    /// Input file name -> "present" | "missing".
    pub inputs: std::collections::BTreeMap<String, String>,
    /// Sorted ascending by (cve, package).
    pub items: Vec<NormalizedItem>,
}

/// Normalize a package name: trim + lowercase, empty collapses to the sentinel.
#[must_use]
pub fn norm_package(raw: Option<&str>) -> String {
    match raw {
        Some(value) => {
            let cleaned = value.trim().to_lowercase();
            if cleaned.is_empty() {
                UNKNOWN.to_string()
            } else {
                cleaned
            }
        }
        None => UNKNOWN.to_string(),
    }
}
