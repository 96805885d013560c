#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Threat-intel fetching (EPSS + CISA KEV)
//!
//! Produces one [`ThreatSignal`] per requested CVE. Offline mode or any
//! fetch failure degrades to the empty fallback cache with
//! `fetch_status="fallback-empty"`; a fetch problem is never an error for
//! the pipeline. The mapper does not retry; callers wrap their own
//! timeout/retry policy.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use triage_errors::{Error, IntelError};
use triage_types::{FetchStatus, IntelSources, ThreatIntelDoc, ThreatSignal};

/// EPSS scores API. CVE ids are appended comma-separated per batch.
pub const EPSS_URL: &str = "https://api.first.org/data/v1/epss";

/// CISA Known Exploited Vulnerabilities catalog.
pub const KEV_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

/// EPSS ids per request, for request-size hygiene only.
const EPSS_BATCH_SIZE: usize = 100;

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

fn intel_sources() -> IntelSources {
    IntelSources {
        epss: EPSS_URL.to_string(),
        kev: KEV_URL.to_string(),
    }
}

fn sorted_distinct(cves: &[String]) -> Vec<String> {
    let mut distinct: Vec<String> = cves
        .iter()
        .map(|cve| cve.trim().to_uppercase())
        .filter(|cve| !cve.is_empty())
        .collect();
    distinct.sort();
    distinct.dedup();
    distinct
}

/// The empty fallback cache: every requested CVE present with null EPSS
/// fields and `cisa_kev_listed=false`, sorted ascending by CVE.
#[must_use]
pub fn fallback_cache(cves: &[String]) -> ThreatIntelDoc {
    ThreatIntelDoc {
        generated_at: None,
        sources: intel_sources(),
        fetch_status: FetchStatus::FallbackEmpty,
        items: sorted_distinct(cves)
            .into_iter()
            .map(ThreatSignal::empty)
            .collect(),
    }
}

/// Fetch threat intel for the distinct CVE set.
///
/// Offline mode returns the fallback cache immediately; online fetch
/// failures log a warning and also degrade to the fallback — the report
/// discloses the degradation via `fetch_status`.
pub async fn fetch_threat_intel(
    cves: &[String],
    offline: bool,
    generated_at: Option<String>,
) -> ThreatIntelDoc {
    if offline {
        info!(cves = cves.len(), "offline mode; emitting empty intel cache");
        return fallback_cache(cves);
    }

    match fetch_online(cves, generated_at).await {
        Ok(doc) => doc,
        Err(err) => {
            warn!(error = %err, "threat intel fetch failed; degrading to empty cache");
            fallback_cache(cves)
        }
    }
}

async fn fetch_online(cves: &[String], generated_at: Option<String>) -> Result<ThreatIntelDoc, Error> {
    let distinct = sorted_distinct(cves);
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(format!("triage/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IntelError::EpssFetchFailed {
            message: e.to_string(),
        })?;

    let mut epss: BTreeMap<String, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for batch in distinct.chunks(EPSS_BATCH_SIZE) {
        let url = format!("{EPSS_URL}?cve={}", batch.join(","));
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| IntelError::EpssFetchFailed {
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(IntelError::EpssFetchFailed {
                message: format!("EPSS API returned status {}", response.status()),
            }
            .into());
        }
        let payload: Value = response.json().await.map_err(|e| IntelError::MalformedResponse {
            source_name: "epss".to_string(),
            message: e.to_string(),
        })?;
        merge_epss_response(&payload, &mut epss);
    }

    let response = client
        .get(KEV_URL)
        .send()
        .await
        .map_err(|e| IntelError::KevFetchFailed {
            message: e.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(IntelError::KevFetchFailed {
            message: format!("KEV feed returned status {}", response.status()),
        }
        .into());
    }
    let catalog: Value = response.json().await.map_err(|e| IntelError::MalformedResponse {
        source_name: "kev".to_string(),
        message: e.to_string(),
    })?;
    let kev = index_kev_catalog(&catalog);

    let items = distinct
        .into_iter()
        .map(|cve| {
            let (probability, percentile) = epss.get(&cve).copied().unwrap_or((None, None));
            let kev_entry = kev.get(&cve);
            ThreatSignal {
                epss_probability: probability,
                epss_percentile: percentile,
                cisa_kev_listed: kev_entry.is_some(),
                kev_date_added: kev_entry.and_then(|(added, _)| added.clone()),
                kev_due_date: kev_entry.and_then(|(_, due)| due.clone()),
                cve,
            }
        })
        .collect();

    info!("threat intel fetch ok");
    Ok(ThreatIntelDoc {
        generated_at,
        sources: intel_sources(),
        fetch_status: FetchStatus::Ok,
        items,
    })
}

/// Fold one EPSS API response page into the probability/percentile index.
/// The API encodes scores as decimal strings.
fn merge_epss_response(payload: &Value, out: &mut BTreeMap<String, (Option<f64>, Option<f64>)>) {
    let Some(rows) = payload.get("data").and_then(Value::as_array) else {
        return;
    };
    for row in rows {
        let Some(cve) = row.get("cve").and_then(Value::as_str) else {
            continue;
        };
        let probability = row
            .get("epss")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok());
        let percentile = row
            .get("percentile")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok());
        out.insert(cve.to_uppercase(), (probability, percentile));
    }
}

/// Index the KEV catalog by uppercase CVE id -> (dateAdded, dueDate).
fn index_kev_catalog(catalog: &Value) -> BTreeMap<String, (Option<String>, Option<String>)> {
    let mut index = BTreeMap::new();
    let Some(entries) = catalog.get("vulnerabilities").and_then(Value::as_array) else {
        return index;
    };
    for entry in entries {
        let Some(cve) = entry.get("cveID").and_then(Value::as_str) else {
            continue;
        };
        let added = entry
            .get("dateAdded")
            .and_then(Value::as_str)
            .map(String::from);
        let due = entry
            .get("dueDate")
            .and_then(Value::as_str)
            .map(String::from);
        index.insert(cve.to_uppercase(), (added, due));
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_cache_is_sorted_and_deduplicated() {
        let cves = vec![
            "CVE-2024-0002".to_string(),
            "CVE-2024-0001".to_string(),
            "cve-2024-0002".to_string(),
        ];
        let doc = fallback_cache(&cves);

        assert_eq!(doc.fetch_status, FetchStatus::FallbackEmpty);
        assert!(doc.generated_at.is_none());
        let ids: Vec<&str> = doc.items.iter().map(|s| s.cve.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2024-0001", "CVE-2024-0002"]);
        assert!(doc.items.iter().all(|s| s.epss_probability.is_none()));
        assert!(doc.items.iter().all(|s| !s.cisa_kev_listed));
    }

    #[tokio::test]
    async fn offline_fetch_returns_fallback() {
        let cves = vec!["CVE-2024-0001".to_string(), "CVE-2024-0002".to_string()];
        let doc = fetch_threat_intel(&cves, true, Some("2026-01-01T00:00:00Z".to_string())).await;
        assert_eq!(doc.fetch_status, FetchStatus::FallbackEmpty);
        assert_eq!(doc.items.len(), 2);
    }

    #[test]
    fn epss_response_parses_string_scores() {
        let payload = json!({"data": [
            {"cve": "CVE-2024-0001", "epss": "0.954", "percentile": "0.991"},
            {"cve": "cve-2024-0002", "epss": "not-a-number"},
            {"epss": "0.5"}
        ]});
        let mut index = BTreeMap::new();
        merge_epss_response(&payload, &mut index);

        assert_eq!(index["CVE-2024-0001"], (Some(0.954), Some(0.991)));
        assert_eq!(index["CVE-2024-0002"], (None, None));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn kev_catalog_indexes_by_cve_id() {
        let catalog = json!({"vulnerabilities": [
            {"cveID": "CVE-2024-0001", "dateAdded": "2024-02-01", "dueDate": "2024-02-22"},
            {"cveID": "CVE-2020-9999"}
        ]});
        let index = index_kev_catalog(&catalog);

        assert_eq!(
            index["CVE-2024-0001"],
            (Some("2024-02-01".to_string()), Some("2024-02-22".to_string()))
        );
        assert_eq!(index["CVE-2020-9999"], (None, None));
    }
}
