//! Immutable scoring tables
//!
//! The scorer is a pure function parameterized by these tables; tests can
//! substitute alternates without touching global state.

use crate::finding::Severity;
use crate::intel::ExploitationLevel;
use crate::report::RuntimePresence;

/// Sub-score weights. Sum to 1.0 for the default table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub severity: f64,
    pub exploitation: f64,
    pub exposure: f64,
    pub impact: f64,
    pub runtime: f64,
    pub fix: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            severity: 0.30,
            exploitation: 0.25,
            exposure: 0.15,
            impact: 0.15,
            runtime: 0.10,
            fix: 0.05,
        }
    }
}

/// Normalized sub-score lookup tables, indexed by the rank of each ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTables {
    pub weights: Weights,
    /// Indexed by `Severity::rank()`: unknown, low, medium, high, critical.
    pub severity_sub: [f64; 5],
    /// Indexed by `ExploitationLevel::rank()`: X, U, P, F, A.
    pub exploitation_sub: [f64; 5],
    /// Indexed by `RuntimePresence::rank()`: build-only, unknown, runtime.
    pub runtime_sub: [f64; 3],
    /// MAV token value -> exposure sub-score.
    pub exposure_network: f64,
    pub exposure_adjacent: f64,
    pub exposure_local: f64,
    pub exposure_unknown: f64,
    pub fix_known_sub: f64,
    pub fix_unknown_sub: f64,
}

impl Default for ScoreTables {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            severity_sub: [0.10, 0.25, 0.50, 0.75, 1.00],
            exploitation_sub: [0.10, 0.25, 0.50, 0.75, 1.00],
            runtime_sub: [0.30, 0.70, 1.00],
            exposure_network: 1.00,
            exposure_adjacent: 0.60,
            exposure_local: 0.30,
            exposure_unknown: 0.50,
            fix_known_sub: 1.00,
            fix_unknown_sub: 0.60,
        }
    }
}

impl ScoreTables {
    #[must_use]
    pub fn severity_sub(&self, severity: Severity) -> f64 {
        self.severity_sub[usize::from(severity.rank())]
    }

    #[must_use]
    pub fn exploitation_sub(&self, level: ExploitationLevel) -> f64 {
        self.exploitation_sub[usize::from(level.rank())]
    }

    #[must_use]
    pub fn runtime_sub(&self, presence: RuntimePresence) -> f64 {
        self.runtime_sub[usize::from(presence.rank())]
    }

    /// Exposure sub-score from the MAV token. Unrecognized tokens score
    /// like the unknown sentinel.
    #[must_use]
    pub fn exposure_sub(&self, mav_token: &str) -> f64 {
        match mav_token {
            "MAV:N" => self.exposure_network,
            "MAV:A" => self.exposure_adjacent,
            "MAV:L" => self.exposure_local,
            _ => self.exposure_unknown,
        }
    }

    #[must_use]
    pub fn fix_sub(&self, has_fix: bool) -> f64 {
        if has_fix {
            self.fix_known_sub
        } else {
            self.fix_unknown_sub
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = Weights::default();
        let sum = w.severity + w.exploitation + w.exposure + w.impact + w.runtime + w.fix;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn severity_sub_follows_rank() {
        let tables = ScoreTables::default();
        assert!((tables.severity_sub(Severity::Critical) - 1.00).abs() < 1e-9);
        assert!((tables.severity_sub(Severity::High) - 0.75).abs() < 1e-9);
        assert!((tables.severity_sub(Severity::Medium) - 0.50).abs() < 1e-9);
        assert!((tables.severity_sub(Severity::Low) - 0.25).abs() < 1e-9);
        assert!((tables.severity_sub(Severity::Unknown) - 0.10).abs() < 1e-9);
    }

    #[test]
    fn exposure_sub_treats_unrecognized_as_unknown() {
        let tables = ScoreTables::default();
        assert!((tables.exposure_sub("MAV:N") - 1.00).abs() < 1e-9);
        assert!((tables.exposure_sub("MAV:Q") - 0.50).abs() < 1e-9);
    }
}
