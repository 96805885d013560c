//! Bounded adjustment annotations
//!
//! Feature-flagged side document that suggests small risk deltas per row.
//! Annotations never feed back into the main report; `adjusted_risk` equals
//! `base_risk` unless the flag is enabled.

use serde::{Deserialize, Serialize};

use triage_types::{
    ExploitationLevel, ReportDoc, RuntimePresence, ScoredFinding, Severity, SourceBucket, UNKNOWN,
};

/// One per-row annotation in the adjustments document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentAnnotation {
    pub cve: String,
    pub package: String,
    pub base_risk: u8,
    pub suggested_delta: i8,
    pub adjusted_risk: u8,
    pub applied: bool,
    pub rationale: String,
}

/// The adjustments document (side artifact, never merged into the report).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentDoc {
    pub feature_flag: String,
    pub adjustment_enabled: bool,
    pub annotations: Vec<AdjustmentAnnotation>,
    pub source_report: String,
}

fn delta_for_row(row: &ScoredFinding) -> (i8, String) {
    let mut delta: i8 = 0;
    let mut reasons: Vec<&str> = Vec::new();

    if row.severity == Severity::Critical && row.e == ExploitationLevel::A {
        delta += 5;
        reasons.push("critical severity with active threat signal");
    }
    if row.runtime == RuntimePresence::Runtime
        && matches!(row.source_bucket, SourceBucket::Both | SourceBucket::ImageScanOnly)
    {
        delta += 3;
        reasons.push("runtime-relevant production surface");
    }
    if row.fix_version == UNKNOWN {
        delta -= 2;
        reasons.push("fix version unknown lowers confidence");
    }

    if reasons.is_empty() {
        reasons.push("no bounded adjustment rule matched");
    }
    (delta, reasons.join("; "))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_risk(base: u8, delta: i8) -> u8 {
    (i16::from(base) + i16::from(delta)).clamp(0, 100) as u8
}

/// Annotate every row of a ranked report with its suggested delta.
#[must_use]
pub fn annotate_report(report: &ReportDoc, enabled: bool, source_report: &str) -> AdjustmentDoc {
    let annotations = report
        .findings
        .iter()
        .map(|row| {
            let (delta, rationale) = delta_for_row(row);
            AdjustmentAnnotation {
                cve: row.cve.clone(),
                package: row.package.clone(),
                base_risk: row.risk,
                suggested_delta: delta,
                adjusted_risk: if enabled {
                    clamp_risk(row.risk, delta)
                } else {
                    row.risk
                },
                applied: enabled,
                rationale,
            }
        })
        .collect();

    AdjustmentDoc {
        feature_flag: "processing.allow_adjustment".to_string(),
        adjustment_enabled: enabled,
        annotations,
        source_report: source_report.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::ReportSummary;

    fn row(severity: Severity, e: ExploitationLevel, runtime: RuntimePresence, fix: &str) -> ScoredFinding {
        ScoredFinding {
            cve: "CVE-2024-0001".to_string(),
            package: "openssl".to_string(),
            severity,
            risk: 98,
            e,
            source_bucket: SourceBucket::Both,
            runtime,
            mav: "MAV:N".to_string(),
            crirar: "CR:H/IR:X/AR:X".to_string(),
            base_vector: UNKNOWN.to_string(),
            final_vector: UNKNOWN.to_string(),
            fix_version: fix.to_string(),
            recommended_action: String::new(),
            evidence: UNKNOWN.to_string(),
            score_breakdown: String::new(),
            has_fix: fix != UNKNOWN,
        }
    }

    fn report(findings: Vec<ScoredFinding>) -> ReportDoc {
        let summary = ReportSummary::from_rows(&findings);
        ReportDoc { summary, findings }
    }

    #[test]
    fn all_rules_stack_and_clamp() {
        let doc = annotate_report(
            &report(vec![row(
                Severity::Critical,
                ExploitationLevel::A,
                RuntimePresence::Runtime,
                UNKNOWN,
            )]),
            true,
            "report.json",
        );

        let a = &doc.annotations[0];
        assert_eq!(a.suggested_delta, 6);
        assert_eq!(a.adjusted_risk, 100);
        assert!(a.applied);
        assert_eq!(
            a.rationale,
            "critical severity with active threat signal; \
             runtime-relevant production surface; \
             fix version unknown lowers confidence"
        );
    }

    #[test]
    fn disabled_flag_keeps_base_risk() {
        let doc = annotate_report(
            &report(vec![row(
                Severity::Critical,
                ExploitationLevel::A,
                RuntimePresence::Runtime,
                UNKNOWN,
            )]),
            false,
            "report.json",
        );

        let a = &doc.annotations[0];
        assert_eq!(a.suggested_delta, 6);
        assert_eq!(a.adjusted_risk, a.base_risk);
        assert!(!a.applied);
        assert!(!doc.adjustment_enabled);
        assert_eq!(doc.feature_flag, "processing.allow_adjustment");
    }

    #[test]
    fn no_rule_matched_rationale() {
        let doc = annotate_report(
            &report(vec![row(
                Severity::Medium,
                ExploitationLevel::U,
                RuntimePresence::BuildOnly,
                "1.2.3",
            )]),
            true,
            "report.json",
        );

        let a = &doc.annotations[0];
        assert_eq!(a.suggested_delta, 0);
        assert_eq!(a.rationale, "no bounded adjustment rule matched");
    }
}
