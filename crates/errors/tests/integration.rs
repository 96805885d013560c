//! Integration tests for error types

#[cfg(test)]
mod tests {
    use triage_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://example.com".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CollectError::OverrideMissing {
            path: "/tmp/feed.json".into(),
        };
        assert_eq!(
            err.to_string(),
            "override file does not exist: /tmp/feed.json"
        );
    }

    #[test]
    fn test_error_clone() {
        let err = OpsError::DeterminismMismatch {
            file: "report.json".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_user_facing_codes_are_stable() {
        let err: Error = IntelError::EpssFetchFailed {
            message: "connection refused".into(),
        }
        .into();
        assert_eq!(err.user_code(), Some("intel.epss_fetch_failed"));

        let err: Error = OpsError::DeterministicModeRequired {
            repo: "/repos/svc".into(),
        }
        .into();
        assert_eq!(err.user_code(), Some("ops.deterministic_mode_required"));
    }

    #[test]
    fn test_retryability_propagates_through_umbrella() {
        let retryable: Error = NetworkError::RateLimited { seconds: 30 }.into();
        assert!(retryable.is_retryable());

        let not_retryable: Error = CollectError::TokenMissing {
            source_name: "dependency feed".into(),
            var: "GITHUB_TOKEN".into(),
        }
        .into();
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_io_error_conversion_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: Error = io.into();
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::NotFound,
                ..
            }
        ));
        assert_eq!(err.user_code(), Some("error.io"));
    }

    #[test]
    fn test_hints_surface_remediation() {
        let err: Error = CollectError::FallbackMissing {
            source_name: "image scan".into(),
        }
        .into();
        let hint = err.user_hint().unwrap();
        assert!(hint.contains("fallback_file"));
    }
}
