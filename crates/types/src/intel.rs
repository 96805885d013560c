//! Threat-activity signal types: EPSS probability, KEV listing, and the
//! single ordinal exploitation level they reduce to.

use serde::{Deserialize, Serialize};

/// Ordinal exploitation-activity level derived from EPSS/KEV.
///
/// Ascending declaration order so the derived `Ord` matches the rank table
/// (`A=4 > F=3 > P=2 > U=1 > X=0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExploitationLevel {
    /// Unknown: no numeric EPSS and not KEV-listed.
    X,
    /// Unlikely: numeric EPSS below 0.30.
    U,
    /// Probable: EPSS in [0.30, 0.70).
    P,
    /// Frequent: EPSS in [0.70, 0.90).
    F,
    /// Active: KEV-listed, or EPSS >= 0.90.
    A,
}

impl ExploitationLevel {
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::A => 4,
            Self::F => 3,
            Self::P => 2,
            Self::U => 1,
            Self::X => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::F => "F",
            Self::P => "P",
            Self::U => "U",
            Self::X => "X",
        }
    }

    /// All values in descending rank order, for fixed-order count maps.
    pub const ALL: [Self; 5] = [Self::A, Self::F, Self::P, Self::U, Self::X];
}

impl std::fmt::Display for ExploitationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-CVE threat signal as cached in the threat-intel document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatSignal {
    pub cve: String,
    pub epss_probability: Option<f64>,
    pub epss_percentile: Option<f64>,
    pub cisa_kev_listed: bool,
    pub kev_date_added: Option<String>,
    pub kev_due_date: Option<String>,
}

impl ThreatSignal {
    /// An all-null signal for a CVE absent from every intel source.
    #[must_use]
    pub fn empty(cve: impl Into<String>) -> Self {
        Self {
            cve: cve.into(),
            epss_probability: None,
            epss_percentile: None,
            cisa_kev_listed: false,
            kev_date_added: None,
            kev_due_date: None,
        }
    }
}

/// Whether the intel fetch ran or degraded to the empty fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "fallback-empty")]
    FallbackEmpty,
}

impl FetchStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::FallbackEmpty => "fallback-empty",
        }
    }
}

/// URLs of the intel feeds contributing to a cache document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelSources {
    pub epss: String,
    pub kev: String,
}

/// The threat-intel document (stage 2 artifact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatIntelDoc {
    pub generated_at: Option<String>,
    pub sources: IntelSources,
    pub fetch_status: FetchStatus,
    /// Sorted ascending by CVE.
    pub items: Vec<ThreatSignal>,
}

impl ThreatIntelDoc {
    /// Index the items by CVE for scoring-time lookup.
    #[must_use]
    pub fn index(&self) -> std::collections::BTreeMap<&str, &ThreatSignal> {
        self.items
            .iter()
            .map(|signal| (signal.cve.as_str(), signal))
            .collect()
    }
}
