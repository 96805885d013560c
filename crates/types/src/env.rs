//! Environmental metric tokens derived once per run from the deployment
//! context document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::report::RuntimePresence;
use crate::UNKNOWN;

/// The six bounded environmental metric tokens plus the exposure label.
///
/// Values carry the full `metric:value` token (`"CR:H"`, `"MAV:X"`) so the
/// scorer and report render them without reassembly. `:X` marks unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvTokens {
    #[serde(rename = "CR")]
    pub cr: String,
    #[serde(rename = "IR")]
    pub ir: String,
    #[serde(rename = "AR")]
    pub ar: String,
    #[serde(rename = "MAV")]
    pub mav: String,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "MPR")]
    pub mpr: String,
    pub exposure: String,
}

impl EnvTokens {
    /// All-unknown tokens, the default when no context document exists.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            cr: "CR:X".to_string(),
            ir: "IR:X".to_string(),
            ar: "AR:X".to_string(),
            mav: "MAV:X".to_string(),
            mac: "MAC:X".to_string(),
            mpr: "MPR:X".to_string(),
            exposure: UNKNOWN.to_string(),
        }
    }

    /// Metric tokens in the fixed order used for final-vector extension.
    #[must_use]
    pub fn ordered(&self) -> [&str; 6] {
        [&self.cr, &self.ir, &self.ar, &self.mav, &self.mac, &self.mpr]
    }

    /// `CR:H/IR:M/AR:L` style display string for the report table.
    #[must_use]
    pub fn crirar(&self) -> String {
        format!("{}/{}/{}", self.cr, self.ir, self.ar)
    }
}

impl Default for EnvTokens {
    fn default() -> Self {
        Self::unknown()
    }
}

/// The environmental-overrides document (stage 3 artifact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvOverridesDoc {
    pub generated_at: Option<String>,
    /// "present" | "missing".
    pub context_json: String,
    pub overrides: EnvTokens,
    pub runtime_presence_default: RuntimePresence,
    pub runtime_presence_by_package: BTreeMap<String, RuntimePresence>,
    /// One line per non-default mapping decision, fixed evaluation order.
    pub rationale: Vec<String>,
}

impl EnvOverridesDoc {
    /// The document produced when no context file is available.
    #[must_use]
    pub fn missing_context(generated_at: Option<String>) -> Self {
        Self {
            generated_at,
            context_json: "missing".to_string(),
            overrides: EnvTokens::unknown(),
            runtime_presence_default: RuntimePresence::Unknown,
            runtime_presence_by_package: BTreeMap::new(),
            rationale: vec!["context.json missing; all environmental metrics unknown".to_string()],
        }
    }

    /// Resolve runtime presence for a package: explicit override, else the
    /// run-wide default.
    #[must_use]
    pub fn runtime_presence_for(&self, package: &str) -> RuntimePresence {
        self.runtime_presence_by_package
            .get(package)
            .copied()
            .unwrap_or(self.runtime_presence_default)
    }
}
