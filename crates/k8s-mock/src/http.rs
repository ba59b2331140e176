//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This provides a real HTTP server that can be used with actual kubeconfig-based
//! connections.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex, RwLock},
};

use bon::Builder;
use indexmap::IndexMap;
use kube::config::Kubeconfig;
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::{
	discovery::{MockApiResource, MockDiscovery},
	helpers::{merge_status, parse_resource_path, status_failure},
};

/// Type alias for the shared mutable resources map.
pub type SharedResources = Arc<RwLock<HashMap<(String, String), serde_json::Value>>>;

/// A PATCH request received by the mock server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPatch {
	/// Request path, including any sub-resource suffix.
	pub path: String,
	pub content_type: Option<String>,
	pub body: serde_json::Value,
}

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Discovery data served under `/api` and `/apis`.
	#[builder(default)]
	discovery: MockDiscovery,
	/// Resources to serve as raw manifests. The server derives API paths from
	/// apiVersion/kind using the discovery data.
	#[builder(default)]
	resources: Vec<serde_json::Value>,
	/// `group/version` lists that answer with 503 instead of their resources.
	#[builder(default)]
	unavailable_group_versions: Vec<String>,
	/// Plural resource names whose objects answer with 403.
	#[builder(default)]
	forbidden_resources: Vec<String>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	resources: SharedResources,
	patches: Arc<Mutex<Vec<RecordedPatch>>>,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;

		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut resources: HashMap<(String, String), serde_json::Value> = HashMap::new();

		for manifest in self.resources {
			if let Some((api_path, name)) = api_path_for_manifest(&manifest, &self.discovery) {
				trace!(api_path = %api_path, name = %name, "Registered resource");
				resources.insert((api_path, name), manifest);
			}
		}

		let shared_resources = Arc::new(RwLock::new(resources));
		let patches = Arc::new(Mutex::new(Vec::new()));

		mount_version(&server).await;
		mount_discovery(&server, &self.discovery, &self.unavailable_group_versions).await;
		mount_resources(
			&server,
			&shared_resources,
			&patches,
			Arc::new(self.forbidden_resources),
		)
		.await;

		RunningHttpMockK8sServer {
			server,
			resources: shared_resources,
			patches,
		}
	}
}

/// Derive the API path for a manifest using discovery data.
fn api_path_for_manifest(
	manifest: &serde_json::Value,
	discovery: &MockDiscovery,
) -> Option<(String, String)> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let name = manifest.get("metadata")?.get("name")?.as_str()?.to_string();
	let namespace = manifest
		.get("metadata")
		.and_then(|m| m.get("namespace"))
		.and_then(|n| n.as_str());

	let resource = discovery.find_kind(api_version, kind)?;
	let prefix = if api_version.contains('/') {
		format!("/apis/{}", api_version)
	} else {
		format!("/api/{}", api_version)
	};

	let path = if resource.namespaced {
		let ns = namespace.unwrap_or("default");
		format!("{}/namespaces/{}/{}", prefix, ns, resource.name)
	} else {
		format!("{}/{}", prefix, resource.name)
	};

	Some((path, name))
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let text = format!(
			"apiVersion: v1
kind: Config
clusters:
- name: mock-cluster
  cluster:
    server: {server}
    insecure-skip-tls-verify: true
users:
- name: mock-user
  user: {{}}
contexts:
- name: {context_name}
  context:
    cluster: mock-cluster
    user: mock-user
    namespace: default
current-context: {context_name}
",
			server = self.uri(),
		);
		Kubeconfig::from_yaml(&text).expect("mock kubeconfig is valid")
	}

	/// Current stored state of the object `name` under `api_path`.
	pub fn resource(&self, api_path: &str, name: &str) -> Option<serde_json::Value> {
		self.resources
			.read()
			.unwrap()
			.get(&(api_path.to_string(), name.to_string()))
			.cloned()
	}

	/// All PATCH requests received so far, in arrival order.
	pub fn patches(&self) -> Vec<RecordedPatch> {
		self.patches.lock().unwrap().clone()
	}

	/// Paths of all GET requests received for objects (discovery excluded).
	pub async fn object_gets(&self) -> Vec<String> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.filter(|req| req.method.as_str() == "GET")
			.map(|req| req.url.path().to_string())
			.filter(|p| is_object_path(p))
			.collect()
	}
}

/// Whether a path addresses a single object rather than a discovery document.
fn is_object_path(path: &str) -> bool {
	let segments = path.trim_matches('/').split('/').count();
	if path.starts_with("/apis/") {
		// apis/{group}/{version}/{resource}/{name}
		segments >= 5
	} else if path.starts_with("/api/") {
		// api/{version}/{resource}/{name}
		segments >= 4
	} else {
		false
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"major": "1",
			"minor": "28",
			"gitVersion": "v1.28.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-01-01T00:00:00Z",
			"goVersion": "go1.21.0",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

fn resource_list(group_version: &str, resources: &[MockApiResource]) -> serde_json::Value {
	let resources: Vec<_> = resources
		.iter()
		.map(MockApiResource::to_discovery_json)
		.collect();
	serde_json::json!({
		"kind": "APIResourceList",
		"apiVersion": "v1",
		"groupVersion": group_version,
		"resources": resources
	})
}

async fn mount_discovery(server: &MockServer, discovery: &MockDiscovery, unavailable: &[String]) {
	// Core API versions
	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"kind": "APIVersions",
			"versions": ["v1"],
			"serverAddressByClientCIDRs": []
		})))
		.mount(server)
		.await;

	// API groups, versions in registration order, first one preferred
	let mut grouped: IndexMap<&str, Vec<(&str, &str)>> = IndexMap::new();
	for gv in discovery.group_resources.keys() {
		let (group, version) = gv.split_once('/').unwrap_or(("", gv));
		grouped.entry(group).or_default().push((gv, version));
	}
	let groups: Vec<_> = grouped
		.iter()
		.map(|(group, versions)| {
			let versions: Vec<_> = versions
				.iter()
				.map(|(gv, version)| serde_json::json!({"groupVersion": gv, "version": version}))
				.collect();
			serde_json::json!({
				"name": group,
				"versions": versions,
				"preferredVersion": versions[0]
			})
		})
		.collect();

	Mock::given(method("GET"))
		.and(path("/apis"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"kind": "APIGroupList",
			"apiVersion": "v1",
			"groups": groups
		})))
		.mount(server)
		.await;

	Mock::given(method("GET"))
		.and(path("/api/v1"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(resource_list("v1", &discovery.core_resources)),
		)
		.mount(server)
		.await;

	for (gv, rs) in &discovery.group_resources {
		let response = if unavailable.contains(gv) {
			ResponseTemplate::new(503).set_body_json(status_failure(
				503,
				"ServiceUnavailable",
				"the server is currently unable to handle the request",
			))
		} else {
			ResponseTemplate::new(200).set_body_json(resource_list(gv, rs))
		};

		Mock::given(method("GET"))
			.and(path(format!("/apis/{}", gv)))
			.respond_with(response)
			.mount(server)
			.await;
	}
}

/// Plural resource name of an object collection path.
fn plural_of(api_path: &str) -> &str {
	api_path.rsplit('/').next().unwrap_or_default()
}

async fn mount_resources(
	server: &MockServer,
	resources: &SharedResources,
	patches: &Arc<Mutex<Vec<RecordedPatch>>>,
	forbidden: Arc<Vec<String>>,
) {
	let patch_resources = Arc::clone(resources);
	let get_resources = Arc::clone(resources);
	let recorded = Arc::clone(patches);
	let patch_forbidden = Arc::clone(&forbidden);

	// PATCH endpoints - merge patch the stored object, or only its status
	// when addressed through the status sub-resource
	Mock::given(method("PATCH"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let path_str = req.url.path();
			let (object_path, is_status) = match path_str.strip_suffix("/status") {
				Some(object_path) => (object_path, true),
				None => (path_str, false),
			};
			let (api_path, name) = parse_resource_path(object_path);

			if patch_forbidden.iter().any(|r| r == plural_of(&api_path)) {
				return ResponseTemplate::new(403).set_body_json(status_failure(
					403,
					"Forbidden",
					"forbidden",
				));
			}

			let patch: serde_json::Value =
				serde_json::from_slice(&req.body).unwrap_or(serde_json::Value::Null);

			recorded.lock().unwrap().push(RecordedPatch {
				path: path_str.to_string(),
				content_type: req
					.headers
					.get("content-type")
					.and_then(|v| v.to_str().ok())
					.map(str::to_string),
				body: patch.clone(),
			});

			let mut resources = patch_resources.write().unwrap();
			let Some(existing) = resources.get(&(api_path.clone(), name.clone())) else {
				return ResponseTemplate::new(404).set_body_json(status_failure(
					404,
					"NotFound",
					"not found",
				));
			};

			let result = if is_status {
				merge_status(existing, &patch)
			} else {
				let mut merged = existing.clone();
				json_patch::merge(&mut merged, &patch);
				merged
			};

			resources.insert((api_path, name), result.clone());
			ResponseTemplate::new(200).set_body_json(result)
		})
		.mount(server)
		.await;

	// GET endpoints for single objects
	Mock::given(method("GET"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let (api_path, name) = parse_resource_path(req.url.path());

			if forbidden.iter().any(|r| r == plural_of(&api_path)) {
				return ResponseTemplate::new(403).set_body_json(status_failure(
					403,
					"Forbidden",
					"forbidden",
				));
			}

			let resources = get_resources.read().unwrap();
			match resources.get(&(api_path, name)) {
				Some(resource) => ResponseTemplate::new(200).set_body_json(resource.clone()),
				None => {
					ResponseTemplate::new(404).set_body_json(status_failure(404, "NotFound", "not found"))
				}
			}
		})
		.mount(server)
		.await;
}
