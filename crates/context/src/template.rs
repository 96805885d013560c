//! Context template and non-interactive authoring
//!
//! `triage init-context` writes the full default document with every leaf
//! set to the unknown sentinel, optionally applying dotted-path answers
//! (`component.name`, `network.internet_ingress.mTLS`) on top.

use std::path::Path;

use serde_json::{json, Value};
use tracing::info;
use triage_errors::{ContextError, Error};

/// Schema version written into new context documents.
pub const CURRENT_CONTEXT_SCHEMA_VERSION: &str = "0.1.0";

/// The full default context document. Every leaf is `"unknown"`, `false`,
/// or empty so the drift checker can measure completeness.
#[must_use]
pub fn context_template() -> Value {
    json!({
        "schema_version": CURRENT_CONTEXT_SCHEMA_VERSION,
        "component": {
            "name": "unknown",
            "type": "unknown",
            "runtime": "unknown",
            "orchestrator": "unknown",
            "cloud": "unknown",
            "platform": "unknown",
            "namespace": "unknown",
            "exposure": "unknown"
        },
        "network": {
            "internet_ingress": {
                "public_entrypoint": false,
                "unrestricted": false,
                "fronted_by": [],
                "authn": "unknown",
                "authz": "unknown",
                "rate_limited": false,
                "waf": "unknown",
                "mTLS": "unknown"
            },
            "service_reachability": {
                "reachable_from_internet_directly": false,
                "reachable_via_public_ingress": false,
                "reachable_from_same_vpc": false,
                "reachable_only_from_cluster": false
            },
            "allowed_endpoints": [],
            "default_deny": false
        },
        "auth_boundary": {
            "internet_to_ingress": "unknown",
            "ingress_to_service": "unknown",
            "service_requires_auth": false,
            "auth_type": [],
            "privilege_required": "unknown"
        },
        "data": {
            "confidentiality_requirement": "unknown",
            "integrity_requirement": "unknown",
            "availability_requirement": "unknown"
        },
        "controls": {
            "reverse_proxy_hardened": false,
            "input_validation_at_edge": "unknown",
            "egress_restricted": "unknown",
            "pod_security": "unknown",
            "network_policy_enforced": "unknown"
        }
    })
}

/// Structural schema the drift checker validates contexts against.
#[must_use]
pub fn context_schema() -> Value {
    json!({
        "type": "object",
        "required": ["schema_version", "component", "network", "auth_boundary", "data", "controls"],
        "properties": {
            "schema_version": {"const": CURRENT_CONTEXT_SCHEMA_VERSION},
            "component": {
                "type": "object",
                "required": ["name", "exposure"],
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "exposure": {"enum": ["internal", "public", "unknown"]}
                }
            },
            "network": {
                "type": "object",
                "required": ["internet_ingress", "service_reachability", "allowed_endpoints"],
                "properties": {
                    "allowed_endpoints": {"type": "array", "items": {"type": "object"}}
                }
            },
            "auth_boundary": {"type": "object"},
            "data": {
                "type": "object",
                "required": [
                    "confidentiality_requirement",
                    "integrity_requirement",
                    "availability_requirement"
                ]
            },
            "controls": {"type": "object"}
        }
    })
}

/// Apply one dotted-path answer to the document. The path must resolve to
/// an existing leaf in the template; new branches are not invented.
fn apply_answer(doc: &mut Value, path: &str, answer: &Value) -> Result<(), ContextError> {
    let mut current = doc;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let Some(object) = current.as_object_mut() else {
            return Err(ContextError::AnswerPathInvalid {
                path: path.to_string(),
            });
        };
        let Some(slot) = object.get_mut(segment) else {
            return Err(ContextError::AnswerPathInvalid {
                path: path.to_string(),
            });
        };

        if segments.peek().is_none() {
            if slot.is_object() {
                return Err(ContextError::AnswerPathInvalid {
                    path: path.to_string(),
                });
            }
            *slot = answer.clone();
            return Ok(());
        }
        current = slot;
    }

    Err(ContextError::AnswerPathInvalid {
        path: path.to_string(),
    })
}

/// Write a fresh context document, applying `answers` (a flat JSON object
/// keyed by dotted field paths) over the template.
///
/// # Errors
///
/// Refuses to overwrite an existing file without `force`; rejects answers
/// that are not a flat object or that name a non-existent field.
pub fn init_context(path: &Path, answers: Option<&Value>, force: bool) -> Result<Value, Error> {
    if path.exists() && !force {
        return Err(ContextError::AlreadyExists {
            path: path.display().to_string(),
        }
        .into());
    }

    let mut doc = context_template();
    if let Some(answers) = answers {
        let Some(entries) = answers.as_object() else {
            return Err(ContextError::InvalidAnswers {
                path: path.display().to_string(),
            }
            .into());
        };
        for (answer_path, answer) in entries {
            apply_answer(&mut doc, answer_path, answer)?;
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut rendered = serde_json::to_string_pretty(&doc)?;
    rendered.push('\n');
    std::fs::write(path, rendered)?;
    info!(path = %path.display(), "wrote context document");
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn template_validates_against_its_own_schema() {
        let doc = context_template();
        triage_config::validate_json_schema(&context_schema(), &doc).unwrap();
    }

    #[test]
    fn answers_apply_to_existing_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        let answers = json!({
            "component.name": "payments",
            "component.exposure": "internal",
            "network.internet_ingress.mTLS": true
        });

        let doc = init_context(&path, Some(&answers), false).unwrap();
        assert_eq!(doc["component"]["name"], "payments");
        assert_eq!(doc["network"]["internet_ingress"]["mTLS"], true);
        assert!(path.exists());
    }

    #[test]
    fn unknown_answer_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        let answers = json!({"component.nonexistent": "x"});

        let err = init_context(&path, Some(&answers), false).unwrap_err();
        assert!(matches!(
            err,
            Error::Context(ContextError::AnswerPathInvalid { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        init_context(&path, None, false).unwrap();

        let err = init_context(&path, None, false).unwrap_err();
        assert!(matches!(
            err,
            Error::Context(ContextError::AlreadyExists { .. })
        ));
        assert!(init_context(&path, None, true).is_ok());
    }
}
