//! Correlation of input findings into canonical records
//!
//! Groups input findings by (cve, package) and merges them per the
//! documented rules. The output ordering, ascending by (cve, package), is
//! the contract downstream stages rely on for determinism.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use triage_types::{CorrelatedFinding, InputFinding, InputState, NormalizedDoc, NormalizedItem};

/// Merge input findings into exactly one [`CorrelatedFinding`] per distinct
/// (cve, package) key.
///
/// Inputs are pre-sorted by (source, cve, package) before folding so the
/// first-wins `base_vector` rule is stable regardless of fetch order.
#[must_use]
pub fn correlate(mut inputs: Vec<InputFinding>) -> Vec<CorrelatedFinding> {
    inputs.sort_by(|a, b| a.merge_key().cmp(&b.merge_key()));

    let mut grouped: BTreeMap<(String, String), CorrelatedFinding> = BTreeMap::new();
    for input in &inputs {
        grouped
            .entry((input.cve.clone(), input.package.clone()))
            .or_insert_with(|| CorrelatedFinding::new(input.cve.clone(), input.package.clone()))
            .absorb(input);
    }

    let findings: Vec<CorrelatedFinding> = grouped.into_values().collect();
    info!(
        inputs = inputs.len(),
        correlated = findings.len(),
        "correlated findings"
    );
    findings
}

/// Build the normalized findings document (stage 1 artifact) from the two
/// optionally-absent raw payloads.
#[must_use]
pub fn normalized_doc(
    dependency_feed: Option<&Value>,
    image_scan: Option<&Value>,
    generated_at: Option<String>,
) -> NormalizedDoc {
    let mut inputs = crate::extract_dependency_feed(dependency_feed);
    inputs.extend(crate::extract_image_scan(image_scan));
    let findings = correlate(inputs);

    let mut input_states = BTreeMap::new();
    input_states.insert(
        "dependency_feed.json".to_string(),
        InputState::from_present(dependency_feed.is_some())
            .as_str()
            .to_string(),
    );
    input_states.insert(
        "image_scan.json".to_string(),
        InputState::from_present(image_scan.is_some())
            .as_str()
            .to_string(),
    );

    NormalizedDoc {
        generated_at,
        inputs: input_states,
        items: findings.iter().map(NormalizedItem::from).collect(),
    }
}
