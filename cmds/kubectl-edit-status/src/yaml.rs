//! Conversion between JSON documents and the YAML text shown in the editor.

use serde_json::Value as JsonValue;

/// Render a document as YAML, keeping its field order.
pub fn to_yaml(value: &JsonValue) -> Result<String, serde_yaml::Error> {
	serde_yaml::to_string(value)
}

/// Parse YAML (or JSON, which is valid YAML) text into a JSON document.
///
/// Empty text parses to `null`.
pub fn from_yaml(text: &str) -> Result<JsonValue, serde_yaml::Error> {
	if text.trim().is_empty() {
		return Ok(JsonValue::Null);
	}
	serde_yaml::from_str(text)
}
