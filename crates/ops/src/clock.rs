//! Injected-clock seam.
//!
//! Scoring and correlation never see the clock; only artifact timestamps and
//! dated directory names do, and those come from here so determinism checks
//! can pin the time.

use chrono::{DateTime, Utc};

use triage_errors::{Error, OpsError};

/// When set to an RFC3339 timestamp, every run observes that fixed instant.
pub const FIXED_UTC_NOW_VAR: &str = "TRIAGE_FIXED_UTC_NOW";

/// The current UTC time, or the pinned instant from [`FIXED_UTC_NOW_VAR`].
///
/// # Errors
///
/// Returns an error when the variable is set but not valid RFC3339.
pub fn utc_now() -> Result<DateTime<Utc>, Error> {
    match std::env::var(FIXED_UTC_NOW_VAR) {
        Ok(raw) if !raw.trim().is_empty() => parse_fixed(raw.trim()),
        _ => Ok(Utc::now()),
    }
}

pub(crate) fn parse_fixed(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            OpsError::InvalidArgument {
                message: format!("fixed UTC time is not RFC3339: {e}"),
            }
            .into()
        })
}

/// `YYYY-MM-DD` token used for dated cache/report directories.
#[must_use]
pub fn date_token(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Filename-safe timestamp token (`2026-01-01T000000Z`).
#[must_use]
pub fn ts_token(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_parses_and_formats() {
        let now = parse_fixed("2026-01-01T00:00:00+00:00").unwrap();
        assert_eq!(date_token(now), "2026-01-01");
        assert_eq!(ts_token(now), "2026-01-01T000000Z");
    }

    #[test]
    fn invalid_fixed_time_is_rejected() {
        assert!(parse_fixed("yesterday").is_err());
    }
}
