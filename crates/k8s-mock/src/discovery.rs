//! Mock Kubernetes API discovery types.

use indexmap::IndexMap;

/// Pre-configured discovery responses.
///
/// `group_resources` is keyed by `group/version`. Groups are served in
/// insertion order, and the first version registered for a group is its
/// preferred version.
pub struct MockDiscovery {
	pub core_resources: Vec<MockApiResource>,
	pub group_resources: IndexMap<String, Vec<MockApiResource>>,
}

impl Default for MockDiscovery {
	fn default() -> Self {
		Self {
			core_resources: vec![
				MockApiResource::namespaced("configmaps", "ConfigMap").with_short_names(&["cm"]),
				MockApiResource::namespaced("secrets", "Secret"),
				MockApiResource::namespaced("services", "Service").with_short_names(&["svc"]),
				MockApiResource::namespaced("pods", "Pod").with_short_names(&["po"]),
				MockApiResource::subresource("pods/status", "Pod"),
				MockApiResource::cluster_scoped("namespaces", "Namespace").with_short_names(&["ns"]),
				MockApiResource::cluster_scoped("nodes", "Node").with_short_names(&["no"]),
			],
			group_resources: IndexMap::from([(
				"apps/v1".to_string(),
				vec![
					MockApiResource::namespaced("deployments", "Deployment")
						.with_short_names(&["deploy"]),
					MockApiResource::subresource("deployments/status", "Deployment"),
					MockApiResource::namespaced("statefulsets", "StatefulSet")
						.with_short_names(&["sts"]),
				],
			)]),
		}
	}
}

impl MockDiscovery {
	/// Serve additional resources under `group/version`.
	///
	/// Registering a second version of an existing group appends it after the
	/// versions already known, so the first one stays preferred.
	pub fn with_group_version(mut self, group_version: &str, resources: Vec<MockApiResource>) -> Self {
		self.group_resources
			.entry(group_version.to_string())
			.or_default()
			.extend(resources);
		self
	}

	/// Find the resource serving `kind` under `api_version`.
	pub fn find_kind(&self, api_version: &str, kind: &str) -> Option<&MockApiResource> {
		let resources = if api_version.contains('/') {
			self.group_resources.get(api_version)?
		} else if api_version == "v1" {
			&self.core_resources
		} else {
			return None;
		};
		resources
			.iter()
			.find(|r| r.kind == kind && !r.name.contains('/'))
	}
}

/// A mock API resource definition.
pub struct MockApiResource {
	pub name: String,
	pub singular_name: String,
	pub kind: String,
	pub namespaced: bool,
	pub short_names: Vec<String>,
	pub verbs: Vec<String>,
}

impl MockApiResource {
	pub fn namespaced(name: &str, kind: &str) -> Self {
		Self::new(name, kind, true, default_verbs())
	}

	pub fn cluster_scoped(name: &str, kind: &str) -> Self {
		Self::new(name, kind, false, default_verbs())
	}

	/// A `resource/subresource` entry, as listed next to its parent.
	pub fn subresource(name: &str, kind: &str) -> Self {
		Self::new(name, kind, true, vec!["get".into(), "patch".into(), "update".into()])
	}

	pub fn with_short_names(mut self, short_names: &[&str]) -> Self {
		self.short_names = short_names.iter().map(|s| s.to_string()).collect();
		self
	}

	fn new(name: &str, kind: &str, namespaced: bool, verbs: Vec<String>) -> Self {
		let singular_name = if name.contains('/') {
			String::new()
		} else {
			kind.to_lowercase()
		};
		Self {
			name: name.to_string(),
			singular_name,
			kind: kind.to_string(),
			namespaced,
			short_names: Vec::new(),
			verbs,
		}
	}

	pub(crate) fn to_discovery_json(&self) -> serde_json::Value {
		let mut value = serde_json::json!({
			"name": self.name,
			"singularName": self.singular_name,
			"namespaced": self.namespaced,
			"kind": self.kind,
			"verbs": self.verbs,
		});
		if !self.short_names.is_empty() {
			value["shortNames"] = serde_json::json!(self.short_names);
		}
		value
	}
}

fn default_verbs() -> Vec<String> {
	["create", "delete", "get", "list", "patch", "update", "watch"]
		.into_iter()
		.map(String::from)
		.collect()
}
