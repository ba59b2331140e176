//! Helper functions for mock Kubernetes testing.

/// Apply a merge patch (RFC 7386) against the `status` of `existing`.
///
/// Mirrors the API server's status sub-resource: only the patched `status`
/// is taken over, every other field of the stored object is kept as is.
pub fn merge_status(existing: &serde_json::Value, patch: &serde_json::Value) -> serde_json::Value {
	let mut merged = existing.clone();
	json_patch::merge(&mut merged, patch);

	let mut result = existing.clone();
	if let serde_json::Value::Object(ref mut obj) = result {
		match merged.get("status") {
			Some(status) => {
				obj.insert("status".to_string(), status.clone());
			}
			None => {
				obj.remove("status");
			}
		}
	}
	result
}

/// Parse a Kubernetes API path into (api_path, resource_name).
///
/// Examples:
/// - `/api/v1/namespaces/default/configmaps/my-config` -> (`/api/v1/namespaces/default/configmaps`, `my-config`)
/// - `/apis/example.com/v1/myresources/test` -> (`/apis/example.com/v1/myresources`, `test`)
pub fn parse_resource_path(path: &str) -> (String, String) {
	let path = path.trim_end_matches('/');
	if let Some(last_slash) = path.rfind('/') {
		let api_path = &path[..last_slash];
		let name = &path[last_slash + 1..];
		(api_path.to_string(), name.to_string())
	} else {
		(path.to_string(), String::new())
	}
}

/// Build a `Status` failure body as returned by the API server.
pub fn status_failure(code: u16, reason: &str, message: &str) -> serde_json::Value {
	serde_json::json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}
