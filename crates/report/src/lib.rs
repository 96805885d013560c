#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Report serialization
//!
//! Renders the ranked report as markdown and as canonical JSON. Both
//! renditions are pure string builders over their inputs so that two runs
//! over identical documents produce byte-identical artifacts.

mod markdown;

pub use markdown::{render_markdown, RenderInputs};

use serde::Serialize;

use triage_errors::{Error, Result};

/// Serialize any document in the canonical artifact form: sorted object
/// keys, two-space indentation, trailing newline.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    // to_value re-keys every object through serde_json's BTreeMap-backed
    // map, which sorts keys; pretty-printing then fixes the indentation.
    let value = serde_json::to_value(value).map_err(Error::from)?;
    let mut rendered = serde_json::to_string_pretty(&value).map_err(Error::from)?;
    rendered.push('\n');
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_and_ends_with_newline() {
        let value = json!({"zeta": 1, "alpha": {"b": 2, "a": 3}});
        let rendered = canonical_json(&value).unwrap();
        assert!(rendered.ends_with('\n'));
        let alpha = rendered.find("\"alpha\"").unwrap();
        let zeta = rendered.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
        assert!(rendered.contains("  \"alpha\""));
    }

    #[test]
    fn canonical_json_is_stable_across_calls() {
        let value = json!({"b": [1, 2, 3], "a": null});
        assert_eq!(canonical_json(&value).unwrap(), canonical_json(&value).unwrap());
    }
}
