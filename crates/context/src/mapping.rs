//! Environmental metric derivation
//!
//! Each metric is derived by a first-match rule ladder over the context
//! document. Evaluation order is fixed, so the rationale list is
//! deterministic for a given context.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use triage_types::{EnvOverridesDoc, EnvTokens, RuntimePresence, UNKNOWN};

fn lookup<'a>(context: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = context;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

fn str_at(context: &Value, path: &[&str]) -> Option<String> {
    lookup(context, path)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn true_at(context: &Value, path: &[&str]) -> bool {
    lookup(context, path).and_then(Value::as_bool) == Some(true)
}

/// high→H, medium→M, low→L, anything else→X.
fn requirement_token(metric: &str, raw: Option<String>) -> String {
    let value = match raw.as_deref() {
        Some("high") => "H",
        Some("medium") => "M",
        Some("low") => "L",
        _ => "X",
    };
    format!("{metric}:{value}")
}

fn mav_token(context: &Value, rationale: &mut Vec<String>) -> String {
    let network_reachable = true_at(context, &["network", "internet_ingress", "public_entrypoint"])
        || true_at(context, &["network", "internet_ingress", "unrestricted"])
        || true_at(
            context,
            &["network", "service_reachability", "reachable_from_internet_directly"],
        )
        || true_at(
            context,
            &["network", "service_reachability", "reachable_via_public_ingress"],
        );

    if network_reachable {
        rationale.push("MAV:N: internet-reachable entrypoint in context".to_string());
        return "MAV:N".to_string();
    }
    if true_at(context, &["network", "service_reachability", "reachable_from_same_vpc"]) {
        rationale.push("MAV:A: reachable from same VPC only".to_string());
        return "MAV:A".to_string();
    }
    if true_at(context, &["network", "service_reachability", "reachable_only_from_cluster"]) {
        rationale.push("MAV:L: reachable only from the local cluster".to_string());
        return "MAV:L".to_string();
    }
    "MAV:X".to_string()
}

fn mpr_token(context: &Value, rationale: &mut Vec<String>) -> String {
    let privilege = str_at(context, &["auth_boundary", "privilege_required"]);
    let value = match privilege.as_deref() {
        Some("none") => "N",
        Some("user" | "service") => "L",
        Some("admin") => "H",
        _ => "X",
    };
    if value != "X" {
        rationale.push(format!(
            "MPR:{value}: privilege_required={}",
            privilege.unwrap_or_default()
        ));
    }
    format!("MPR:{value}")
}

fn mac_token(context: &Value, exposure: &str, rationale: &mut Vec<String>) -> String {
    let ingress_boundary = str_at(context, &["auth_boundary", "ingress_to_service"]);

    if true_at(context, &["network", "internet_ingress", "mTLS"])
        || true_at(context, &["controls", "network_policy_enforced"])
    {
        rationale.push("MAC:H: mTLS or network policy enforced".to_string());
        return "MAC:H".to_string();
    }
    if exposure == "internal" && ingress_boundary.as_deref() != Some("none") {
        rationale.push("MAC:H: internal exposure behind an auth boundary".to_string());
        return "MAC:H".to_string();
    }
    if exposure == "public" && ingress_boundary.as_deref() == Some("none") {
        rationale.push("MAC:L: public exposure with no auth boundary".to_string());
        return "MAC:L".to_string();
    }
    "MAC:X".to_string()
}

fn runtime_default(context: &Value, rationale: &mut Vec<String>) -> RuntimePresence {
    let runtime = str_at(context, &["component", "runtime"]);
    match runtime.as_deref() {
        Some("container" | "vm" | "serverless" | "bare-metal") => {
            rationale.push(format!(
                "runtime presence default runtime: component.runtime={}",
                runtime.unwrap_or_default()
            ));
            RuntimePresence::Runtime
        }
        _ => RuntimePresence::Unknown,
    }
}

fn runtime_by_package(context: &Value) -> BTreeMap<String, RuntimePresence> {
    let Some(map) = context
        .get("runtime_presence_by_package")
        .and_then(Value::as_object)
    else {
        return BTreeMap::new();
    };

    map.iter()
        .filter_map(|(package, value)| {
            value.as_str().map(|presence| {
                (
                    package.trim().to_lowercase(),
                    RuntimePresence::parse(presence),
                )
            })
        })
        .collect()
}

/// Derive the environmental-overrides document from an optionally-absent
/// context document. Absent context yields the all-unknown defaults.
#[must_use]
pub fn derive_env_overrides(
    context: Option<&Value>,
    generated_at: Option<String>,
) -> EnvOverridesDoc {
    let Some(context) = context else {
        debug!("context absent; environmental metrics default to unknown");
        return EnvOverridesDoc::missing_context(generated_at);
    };

    let mut rationale = Vec::new();

    let cr = requirement_token(
        "CR",
        str_at(context, &["data", "confidentiality_requirement"]),
    );
    let ir = requirement_token("IR", str_at(context, &["data", "integrity_requirement"]));
    let ar = requirement_token("AR", str_at(context, &["data", "availability_requirement"]));
    for token in [&cr, &ir, &ar] {
        if !token.ends_with(":X") {
            rationale.push(format!("{token}: data requirement from context"));
        }
    }

    let exposure = str_at(context, &["component", "exposure"]).unwrap_or_else(|| UNKNOWN.to_string());
    let mav = mav_token(context, &mut rationale);
    let mac = mac_token(context, &exposure, &mut rationale);
    let mpr = mpr_token(context, &mut rationale);

    let runtime_presence_default = runtime_default(context, &mut rationale);

    EnvOverridesDoc {
        generated_at,
        context_json: "present".to_string(),
        overrides: EnvTokens {
            cr,
            ir,
            ar,
            mav,
            mac,
            mpr,
            exposure,
        },
        runtime_presence_default,
        runtime_presence_by_package: runtime_by_package(context),
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_context_defaults_everything_unknown() {
        let doc = derive_env_overrides(None, None);
        assert_eq!(doc.context_json, "missing");
        assert_eq!(doc.overrides.mav, "MAV:X");
        assert_eq!(doc.overrides.exposure, "unknown");
        assert_eq!(doc.runtime_presence_default, RuntimePresence::Unknown);
    }

    #[test]
    fn requirements_map_to_bounded_tokens() {
        let context = json!({"data": {
            "confidentiality_requirement": "HIGH",
            "integrity_requirement": "medium",
            "availability_requirement": "nonsense"
        }});
        let doc = derive_env_overrides(Some(&context), None);
        assert_eq!(doc.overrides.cr, "CR:H");
        assert_eq!(doc.overrides.ir, "IR:M");
        assert_eq!(doc.overrides.ar, "AR:X");
    }

    #[test]
    fn public_entrypoint_wins_over_vpc_reachability() {
        let context = json!({"network": {
            "internet_ingress": {"public_entrypoint": true},
            "service_reachability": {"reachable_from_same_vpc": true}
        }});
        let doc = derive_env_overrides(Some(&context), None);
        assert_eq!(doc.overrides.mav, "MAV:N");
    }

    #[test]
    fn vpc_then_cluster_then_unknown() {
        let vpc = json!({"network": {"service_reachability": {"reachable_from_same_vpc": true}}});
        assert_eq!(derive_env_overrides(Some(&vpc), None).overrides.mav, "MAV:A");

        let cluster =
            json!({"network": {"service_reachability": {"reachable_only_from_cluster": true}}});
        assert_eq!(
            derive_env_overrides(Some(&cluster), None).overrides.mav,
            "MAV:L"
        );

        assert_eq!(
            derive_env_overrides(Some(&json!({})), None).overrides.mav,
            "MAV:X"
        );
    }

    #[test]
    fn privilege_mapping_covers_the_vocabulary() {
        for (raw, expected) in [
            ("none", "MPR:N"),
            ("user", "MPR:L"),
            ("service", "MPR:L"),
            ("admin", "MPR:H"),
            ("unknown", "MPR:X"),
        ] {
            let context = json!({"auth_boundary": {"privilege_required": raw}});
            assert_eq!(derive_env_overrides(Some(&context), None).overrides.mpr, expected);
        }
    }

    #[test]
    fn mac_prefers_channel_controls_then_exposure_rules() {
        let mtls = json!({"network": {"internet_ingress": {"mTLS": true}}});
        assert_eq!(derive_env_overrides(Some(&mtls), None).overrides.mac, "MAC:H");

        let internal = json!({
            "component": {"exposure": "internal"},
            "auth_boundary": {"ingress_to_service": "strong"}
        });
        assert_eq!(
            derive_env_overrides(Some(&internal), None).overrides.mac,
            "MAC:H"
        );

        let open = json!({
            "component": {"exposure": "public"},
            "auth_boundary": {"ingress_to_service": "none"}
        });
        assert_eq!(derive_env_overrides(Some(&open), None).overrides.mac, "MAC:L");

        // Tri-state "unknown" mTLS is not treated as enforced.
        let unknown = json!({"network": {"internet_ingress": {"mTLS": "unknown"}}});
        assert_eq!(
            derive_env_overrides(Some(&unknown), None).overrides.mac,
            "MAC:X"
        );
    }

    #[test]
    fn runtime_presence_comes_from_component_runtime_and_overrides() {
        let context = json!({
            "component": {"runtime": "container"},
            "runtime_presence_by_package": {"Zlib": "build-only", "openssl": "runtime"}
        });
        let doc = derive_env_overrides(Some(&context), None);
        assert_eq!(doc.runtime_presence_default, RuntimePresence::Runtime);
        assert_eq!(doc.runtime_presence_for("zlib"), RuntimePresence::BuildOnly);
        assert_eq!(doc.runtime_presence_for("libxml2"), RuntimePresence::Runtime);
    }

    #[test]
    fn rationale_is_deterministic() {
        let context = json!({
            "component": {"exposure": "internal", "runtime": "vm"},
            "data": {"confidentiality_requirement": "high"},
            "auth_boundary": {"ingress_to_service": "strong", "privilege_required": "user"},
            "network": {"service_reachability": {"reachable_from_same_vpc": true}}
        });
        let a = derive_env_overrides(Some(&context), None);
        let b = derive_env_overrides(Some(&context), None);
        assert_eq!(a.rationale, b.rationale);
        assert!(!a.rationale.is_empty());
    }
}
