//! Integration tests for types

#[cfg(test)]
mod tests {
    use triage_types::*;

    fn input(source: Source, severity: Severity, fix: Option<&str>) -> InputFinding {
        InputFinding {
            source,
            cve: "CVE-2024-1234".into(),
            package: "openssl".into(),
            severity,
            fix_version: fix.map(Into::into),
            base_vector: Some("CVSS:3.1/AV:N/AC:L".into()),
            evidence: "GHSA-xxxx".into(),
        }
    }

    #[test]
    fn correlation_folds_both_sources_into_one_record() {
        let mut record = CorrelatedFinding::new("CVE-2024-1234", "openssl");
        record.absorb(&input(Source::DependencyFeed, Severity::High, Some("3.0.9")));
        record.absorb(&input(Source::ImageScan, Severity::Critical, Some("3.0.8")));

        assert_eq!(record.source_bucket(), SourceBucket::Both);
        // Max severity, min fix version.
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.fix_version.as_deref(), Some("3.0.8"));
    }

    #[test]
    fn normalized_item_mirrors_the_correlated_record() {
        let mut record = CorrelatedFinding::new("CVE-2024-1234", "openssl");
        record.absorb(&input(Source::ImageScan, Severity::Medium, None));

        let item = NormalizedItem::from(&record);
        assert_eq!(item.cve, "CVE-2024-1234");
        assert_eq!(item.source_bucket, SourceBucket::ImageScanOnly);
        assert_eq!(item.cvss_base_vector.as_deref(), Some("CVSS:3.1/AV:N/AC:L"));
        assert_eq!(item.evidence_ids, vec!["GHSA-xxxx".to_string()]);
    }

    #[test]
    fn source_bucket_serializes_with_report_vocabulary() {
        let json = serde_json::to_string(&SourceBucket::ImageScanOnly).unwrap();
        assert_eq!(json, "\"ImageScan-only\"");
        let json = serde_json::to_string(&SourceBucket::DependencyFeedOnly).unwrap();
        assert_eq!(json, "\"DependencyFeed-only\"");
    }

    #[test]
    fn severity_parsing_is_case_insensitive_with_unknown_fallback() {
        assert_eq!(Severity::parse("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse(" Medium "), Severity::Medium);
        assert_eq!(Severity::parse("bogus"), Severity::Unknown);
        assert!(Severity::Critical.rank() > Severity::Unknown.rank());
    }

    #[test]
    fn threat_intel_index_is_keyed_by_cve() {
        let doc = ThreatIntelDoc {
            generated_at: None,
            sources: IntelSources {
                epss: "https://api.first.org/data/v1/epss".into(),
                kev: "https://www.cisa.gov/kev".into(),
            },
            fetch_status: FetchStatus::Ok,
            items: vec![
                ThreatSignal::empty("CVE-2024-0001"),
                ThreatSignal::empty("CVE-2024-0002"),
            ],
        };
        let index = doc.index();
        assert!(index.contains_key("CVE-2024-0001"));
        assert!(!index.contains_key("CVE-2024-9999"));
    }

    #[test]
    fn env_tokens_default_to_unknown_sentinels() {
        let tokens = EnvTokens::unknown();
        assert!(tokens.ordered().iter().all(|t| t.ends_with(":X")));
        assert_eq!(tokens.crirar(), "CR:X/IR:X/AR:X");
    }

    #[test]
    fn summary_counts_cover_the_full_vocabulary_at_zero() {
        let summary = ReportSummary::from_rows(&[]);
        assert_eq!(summary.total, 0);
        for severity in Severity::ALL {
            assert_eq!(summary.severity_count(severity), 0);
        }
        for bucket in SourceBucket::ALL {
            assert_eq!(summary.source_count(bucket), 0);
        }
        for level in ExploitationLevel::ALL {
            assert_eq!(summary.threat_count(level), 0);
        }
    }

    #[test]
    fn scored_rows_serialize_without_the_ranking_helper() {
        let row = ScoredFinding {
            cve: "CVE-2024-0001".into(),
            package: "openssl".into(),
            severity: Severity::High,
            risk: 70,
            e: ExploitationLevel::A,
            source_bucket: SourceBucket::Both,
            runtime: RuntimePresence::Runtime,
            mav: "N".into(),
            crirar: "CR:H/IR:M/AR:M".into(),
            base_vector: "CVSS:3.1/AV:N/AC:L".into(),
            final_vector: "CVSS:3.1/AV:N/AC:L/E:A".into(),
            fix_version: "3.0.8".into(),
            recommended_action: "Upgrade openssl to 3.0.8".into(),
            evidence: "GHSA-xxxx".into(),
            score_breakdown: "S=0.75,T=1.00,X=1.00,I=0.50,R=1.00,F=1.00".into(),
            has_fix: true,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("has_fix").is_none());
        assert_eq!(value["risk"], 70);
    }
}
