//! Property tests over scoring and ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use proptest::prelude::*;

use triage_score::{exploitation_level, score_findings};
use triage_types::{
    EnvOverridesDoc, EnvTokens, FetchStatus, IntelSources, NormalizedDoc, NormalizedItem,
    RuntimePresence, ScoreTables, Severity, Source, SourceBucket, ThreatIntelDoc, ThreatSignal,
};

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Unknown),
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn bucket_strategy() -> impl Strategy<Value = SourceBucket> {
    prop_oneof![
        Just(SourceBucket::DependencyFeedOnly),
        Just(SourceBucket::ImageScanOnly),
        Just(SourceBucket::Both),
    ]
}

fn token_strategy(metric: &'static str) -> impl Strategy<Value = String> {
    prop_oneof![
        Just(format!("{metric}:H")),
        Just(format!("{metric}:M")),
        Just(format!("{metric}:L")),
        Just(format!("{metric}:N")),
        Just(format!("{metric}:X")),
    ]
}

fn item_strategy() -> impl Strategy<Value = NormalizedItem> {
    (
        1u32..=9999,
        "[a-z]{1,12}",
        severity_strategy(),
        bucket_strategy(),
        proptest::option::of("[0-9]\\.[0-9]\\.[0-9]"),
        proptest::option::of(Just("CVSS:3.1/AV:N/AC:L".to_string())),
    )
        .prop_map(|(num, package, severity, source_bucket, fix_version, cvss_base_vector)| {
            let sources = match source_bucket {
                SourceBucket::DependencyFeedOnly => vec![Source::DependencyFeed],
                SourceBucket::ImageScanOnly => vec![Source::ImageScan],
                SourceBucket::Both => vec![Source::DependencyFeed, Source::ImageScan],
            };
            NormalizedItem {
                cve: format!("CVE-2024-{num:04}"),
                package,
                severity,
                sources,
                source_bucket,
                fix_version,
                cvss_base_vector,
                evidence_ids: vec![],
            }
        })
}

fn env_strategy() -> impl Strategy<Value = EnvOverridesDoc> {
    (
        token_strategy("CR"),
        token_strategy("IR"),
        token_strategy("AR"),
        token_strategy("MAV"),
        prop_oneof![
            Just(RuntimePresence::BuildOnly),
            Just(RuntimePresence::Unknown),
            Just(RuntimePresence::Runtime),
        ],
    )
        .prop_map(|(cr, ir, ar, mav, runtime_presence_default)| EnvOverridesDoc {
            generated_at: None,
            context_json: "present".to_string(),
            overrides: EnvTokens {
                cr,
                ir,
                ar,
                mav,
                mac: "MAC:X".to_string(),
                mpr: "MPR:X".to_string(),
                exposure: "unknown".to_string(),
            },
            runtime_presence_default,
            runtime_presence_by_package: BTreeMap::new(),
            rationale: vec![],
        })
}

fn signal_strategy() -> impl Strategy<Value = ThreatSignal> {
    (
        1u32..=9999,
        proptest::option::of(0.0f64..=1.0),
        proptest::bool::ANY,
    )
        .prop_map(|(num, epss, kev)| ThreatSignal {
            cve: format!("CVE-2024-{num:04}"),
            epss_probability: epss,
            epss_percentile: epss,
            cisa_kev_listed: kev,
            kev_date_added: None,
            kev_due_date: None,
        })
}

fn doc(items: Vec<NormalizedItem>) -> NormalizedDoc {
    NormalizedDoc {
        generated_at: None,
        inputs: BTreeMap::new(),
        items,
    }
}

fn intel(items: Vec<ThreatSignal>) -> ThreatIntelDoc {
    ThreatIntelDoc {
        generated_at: None,
        sources: IntelSources {
            epss: "epss".to_string(),
            kev: "kev".to_string(),
        },
        fetch_status: FetchStatus::Ok,
        items,
    }
}

proptest! {
    #[test]
    fn risk_is_always_bounded(
        items in proptest::collection::vec(item_strategy(), 0..24),
        signals in proptest::collection::vec(signal_strategy(), 0..24),
        env in env_strategy(),
    ) {
        let rows = score_findings(&doc(items), &intel(signals), &env, &ScoreTables::default());
        for row in rows {
            prop_assert!(row.risk <= 100);
        }
    }

    #[test]
    fn ranking_is_a_strict_total_order(
        items in proptest::collection::vec(item_strategy(), 2..24),
        env in env_strategy(),
    ) {
        let rows = score_findings(&doc(items), &intel(vec![]), &env, &ScoreTables::default());

        for window in rows.windows(2) {
            prop_assert_ne!(window[0].ranking_cmp(&window[1]), Ordering::Greater);
        }
        for a in &rows {
            for b in &rows {
                if (a.cve.as_str(), a.package.as_str()) != (b.cve.as_str(), b.package.as_str()) {
                    prop_assert_ne!(a.ranking_cmp(b), Ordering::Equal);
                    prop_assert_eq!(a.ranking_cmp(b), b.ranking_cmp(a).reverse());
                }
            }
        }
    }

    #[test]
    fn exploitation_level_is_monotone_in_epss(
        lo in 0.0f64..=1.0,
        hi in 0.0f64..=1.0,
    ) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let make = |p: f64| ThreatSignal {
            cve: "CVE-2024-0001".to_string(),
            epss_probability: Some(p),
            epss_percentile: Some(p),
            cisa_kev_listed: false,
            kev_date_added: None,
            kev_due_date: None,
        };
        prop_assert!(exploitation_level(&make(lo)) <= exploitation_level(&make(hi)));
    }
}
