//! Shared fixtures for tests against the mock API server.

#![allow(dead_code)]

use k8s_mock::{HttpMockK8sServer, MockApiResource, MockDiscovery, RunningHttpMockK8sServer};
use kubectl_edit_status::{
	editor::{EditError, EditSession},
	k8s::client::{ClusterConnection, ConnectionOpts},
	yaml,
};
use serde_json::{json, Value};

/// Discovery with a namespaced `myresources` (short name `mr`) and a
/// cluster-scoped `clusterwidgets` under `example.com/v1`.
pub fn example_discovery() -> MockDiscovery {
	MockDiscovery::default().with_group_version(
		"example.com/v1",
		vec![
			MockApiResource::namespaced("myresources", "MyResource").with_short_names(&["mr"]),
			MockApiResource::subresource("myresources/status", "MyResource"),
			MockApiResource::cluster_scoped("clusterwidgets", "ClusterWidget"),
		],
	)
}

pub fn my_resource(name: &str, status: Value) -> Value {
	json!({
		"apiVersion": "example.com/v1",
		"kind": "MyResource",
		"metadata": {"name": name, "namespace": "default"},
		"spec": {"replicas": 1},
		"status": status
	})
}

pub async fn connect(server: &RunningHttpMockK8sServer) -> ClusterConnection {
	ClusterConnection::from_kubeconfig(server.kubeconfig(), &ConnectionOpts::default())
		.await
		.expect("connection should succeed")
}

pub async fn start(discovery: MockDiscovery, resources: Vec<Value>) -> RunningHttpMockK8sServer {
	HttpMockK8sServer::builder()
		.discovery(discovery)
		.resources(resources)
		.build()
		.start()
		.await
}

/// Edits the document as a JSON value, the way a user would edit the YAML.
pub struct ValueEdit<F>(pub F);

impl<F> EditSession for ValueEdit<F>
where
	F: Fn(&mut Value),
{
	fn edit(&self, document: &str) -> Result<String, EditError> {
		let mut value = yaml::from_yaml(document).expect("editor receives valid YAML");
		(self.0)(&mut value);
		Ok(yaml::to_yaml(&value).expect("edited value renders"))
	}
}

/// Replaces the document with fixed text.
pub struct FixedText(pub &'static str);

impl EditSession for FixedText {
	fn edit(&self, _document: &str) -> Result<String, EditError> {
		Ok(self.0.to_string())
	}
}
