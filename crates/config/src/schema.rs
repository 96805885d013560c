//! Minimal structural JSON-schema checker
//!
//! Supports the bounded keyword subset the contract schemas use: `type`,
//! `const`, `enum`, `required`, `properties`, `additionalProperties`,
//! `items`, `minLength`. Anything outside the subset is ignored.

use serde_json::Value;
use triage_errors::ConfigError;

/// Validate `value` against `schema`, reporting the first violation with
/// its JSON-path location.
///
/// # Errors
///
/// Returns `ConfigError::SchemaViolation` for the first failing check.
pub fn validate_json_schema(schema: &Value, value: &Value) -> Result<(), ConfigError> {
    validate_at(schema, value, "$")
}

fn violation(location: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::SchemaViolation {
        location: location.to_string(),
        message: message.into(),
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        // Unknown type names are not enforced.
        _ => true,
    }
}

fn validate_at(schema: &Value, value: &Value, path: &str) -> Result<(), ConfigError> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            return Err(violation(path, format!("expected type '{expected}'")));
        }
    }

    if let Some(constant) = schema.get("const") {
        if value != constant {
            return Err(violation(path, format!("expected const value {constant}")));
        }
    }

    if let Some(options) = schema.get("enum").and_then(Value::as_array) {
        if !options.contains(value) {
            return Err(violation(path, format!("value {value} not in enum")));
        }
    }

    if let Some(min_length) = schema.get("minLength").and_then(Value::as_u64) {
        if let Some(text) = value.as_str() {
            if (text.len() as u64) < min_length {
                return Err(violation(
                    path,
                    format!("string shorter than minLength={min_length}"),
                ));
            }
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(key) {
                    return Err(violation(path, format!("missing required key '{key}'")));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        let additional_allowed = schema
            .get("additionalProperties")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        for (key, entry) in object {
            if let Some(prop_schema) = properties.and_then(|p| p.get(key)) {
                validate_at(prop_schema, entry, &format!("{path}.{key}"))?;
            } else if !additional_allowed {
                return Err(violation(path, format!("unexpected key '{key}'")));
            }
        }
    }

    if let Some(entries) = value.as_array() {
        if let Some(item_schema) = schema.get("items") {
            for (idx, item) in entries.iter().enumerate() {
                validate_at(item_schema, item, &format!("{path}[{idx}]"))?;
            }
        }
    }

    Ok(())
}
