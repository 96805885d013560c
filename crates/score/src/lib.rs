#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Risk scoring and ranking
//!
//! Joins normalized findings with the threat-intel cache and environmental
//! overrides, computes the weighted risk score, and emits the ranked report
//! rows. Pure over its inputs: no I/O, no clock, no global state beyond the
//! score tables the caller passes in.

mod adjust;

pub use adjust::{annotate_report, AdjustmentAnnotation, AdjustmentDoc};

use tracing::debug;

use triage_types::{
    EnvOverridesDoc, ExploitationLevel, NormalizedDoc, ReportDoc, ReportSummary, ScoreTables,
    ScoredFinding, ThreatIntelDoc, ThreatSignal, UNKNOWN,
};

/// Reduce a per-CVE threat signal to its ordinal exploitation level.
///
/// KEV listing dominates; otherwise the EPSS probability is bucketed, and a
/// missing probability maps to the unknown level.
#[must_use]
pub fn exploitation_level(signal: &ThreatSignal) -> ExploitationLevel {
    if signal.cisa_kev_listed {
        return ExploitationLevel::A;
    }
    match signal.epss_probability {
        Some(p) if p >= 0.90 => ExploitationLevel::A,
        Some(p) if p >= 0.70 => ExploitationLevel::F,
        Some(p) if p >= 0.30 => ExploitationLevel::P,
        Some(_) => ExploitationLevel::U,
        None => ExploitationLevel::X,
    }
}

/// Impact sub-score from the CR/IR/AR requirement tokens.
///
/// Any `:H` dominates, then any `:M`, then all-`:L`; mixed or unknown
/// requirements score the midpoint.
fn impact_sub(cr: &str, ir: &str, ar: &str) -> f64 {
    let tokens = [cr, ir, ar];
    if tokens.iter().any(|t| t.ends_with(":H")) {
        1.00
    } else if tokens.iter().any(|t| t.ends_with(":M")) {
        0.70
    } else if tokens.iter().all(|t| t.ends_with(":L")) {
        0.40
    } else {
        0.50
    }
}

/// Extend a base CVSS vector with the exploitation level and every known
/// environmental token, in fixed CR,IR,AR,MAV,MAC,MPR order. Without a base
/// vector there is nothing to extend; the row renders `unknown`.
fn final_vector(
    base: Option<&str>,
    level: ExploitationLevel,
    env: &triage_types::EnvTokens,
) -> Option<String> {
    let base = base?;
    let mut vector = format!("{base}/E:{level}");
    for token in env.ordered() {
        if !token.ends_with(":X") {
            vector.push('/');
            vector.push_str(token);
        }
    }
    Some(vector)
}

/// First-match action ladder over (package known, fix known, source bucket).
fn recommended_action(
    package: &str,
    fix_version: Option<&str>,
    bucket: triage_types::SourceBucket,
) -> String {
    use triage_types::SourceBucket;

    let package_known = package != UNKNOWN;
    match (package_known, fix_version, bucket) {
        (true, Some(fix), _) => format!("Upgrade {package} to {fix}"),
        (true, None, b) if b != SourceBucket::ImageScanOnly => {
            format!("Upgrade {package}; fixed version unknown in input")
        }
        (_, None, SourceBucket::ImageScanOnly) => "Update base image and rebuild".to_string(),
        (_, Some(_), SourceBucket::ImageScanOnly) => {
            "Rebuild image to pick up upstream patches".to_string()
        }
        _ => "Investigate; insufficient data in inputs".to_string(),
    }
}

fn breakdown_string(s: f64, t: f64, x: f64, i: f64, r: f64, f: f64) -> String {
    format!("S={s:.2},T={t:.2},X={x:.2},I={i:.2},R={r:.2},F={f:.2}")
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn risk_score(raw: f64) -> u8 {
    // Ties round to even, matching the documented .5-boundary behavior.
    raw.round_ties_even().clamp(0.0, 100.0) as u8
}

/// Score every normalized finding and return the ranked rows.
///
/// Missing intel entries score as the empty signal; the environmental
/// document applies run-wide except for per-package runtime overrides.
#[must_use]
pub fn score_findings(
    normalized: &NormalizedDoc,
    intel: &ThreatIntelDoc,
    env: &EnvOverridesDoc,
    tables: &ScoreTables,
) -> Vec<ScoredFinding> {
    let intel_index = intel.index();
    let tokens = &env.overrides;
    let weights = tables.weights;

    let mut rows: Vec<ScoredFinding> = normalized
        .items
        .iter()
        .map(|item| {
            let level = intel_index
                .get(item.cve.as_str())
                .map_or(ExploitationLevel::X, |signal| exploitation_level(signal));
            let runtime = env.runtime_presence_for(&item.package);
            let has_fix = item.fix_version.is_some();

            let s = tables.severity_sub(item.severity);
            let t = tables.exploitation_sub(level);
            let x = tables.exposure_sub(&tokens.mav);
            let i = impact_sub(&tokens.cr, &tokens.ir, &tokens.ar);
            let r = tables.runtime_sub(runtime);
            let f = tables.fix_sub(has_fix);

            let raw = 100.0
                * (weights.severity * s
                    + weights.exploitation * t
                    + weights.exposure * x
                    + weights.impact * i
                    + weights.runtime * r
                    + weights.fix * f);
            let risk = risk_score(raw);
            debug!(cve = %item.cve, package = %item.package, risk, "scored finding");

            let evidence = if item.evidence_ids.is_empty() {
                UNKNOWN.to_string()
            } else {
                item.evidence_ids.join(", ")
            };

            ScoredFinding {
                cve: item.cve.clone(),
                package: item.package.clone(),
                severity: item.severity,
                risk,
                e: level,
                source_bucket: item.source_bucket,
                runtime,
                mav: tokens.mav.clone(),
                crirar: tokens.crirar(),
                base_vector: item
                    .cvss_base_vector
                    .clone()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                final_vector: final_vector(item.cvss_base_vector.as_deref(), level, tokens)
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                fix_version: item
                    .fix_version
                    .clone()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                recommended_action: recommended_action(
                    &item.package,
                    item.fix_version.as_deref(),
                    item.source_bucket,
                ),
                evidence,
                score_breakdown: breakdown_string(s, t, x, i, r, f),
                has_fix,
            }
        })
        .collect();

    rows.sort_by(|a, b| a.ranking_cmp(b));
    rows
}

/// Score, rank, and wrap the rows with their summary counts.
#[must_use]
pub fn build_report(
    normalized: &NormalizedDoc,
    intel: &ThreatIntelDoc,
    env: &EnvOverridesDoc,
    tables: &ScoreTables,
) -> ReportDoc {
    let findings = score_findings(normalized, intel, env, tables);
    let summary = ReportSummary::from_rows(&findings);
    ReportDoc { summary, findings }
}
