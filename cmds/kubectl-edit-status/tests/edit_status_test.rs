//! End-to-end runs of the edit-status workflow against the mock API server.

mod common;

use std::io::Write;

use assert_matches::assert_matches;
use indoc::indoc;
use k8s_mock::{HttpMockK8sServer, MockApiResource, MockDiscovery};
use kubectl_edit_status::{
	commands::edit_status::edit_status,
	config::EditStatusConfig,
	editor::{EditError, EditSession, EditSource},
	error::EditStatusError,
	k8s::{
		client::ConnectionOpts,
		discovery::DiscoveryError,
		patch::{DiffError, PatchKind},
		resolve::{MissReason, PartialSpec, ResolveError},
		KindId, ResourceScope, ResourceTypeId,
	},
};
use rstest::rstest;
use serde_json::{json, Value};

use common::{connect, example_discovery, my_resource, start, FixedText, ValueEdit};

const MY_OBJECT_PATH: &str = "/apis/example.com/v1/namespaces/default/myresources";

fn config(token: &str, name: &str, explicit_scope: Option<ResourceScope>) -> EditStatusConfig {
	EditStatusConfig {
		spec: PartialSpec::new(token, name).unwrap(),
		explicit_scope,
		edit_source: EditSource::File("unused.yaml".into()),
		connection: ConnectionOpts::default(),
	}
}

struct FailingEditor;

impl EditSession for FailingEditor {
	fn edit(&self, _document: &str) -> Result<String, EditError> {
		Err(EditError::NoEditor)
	}
}

#[tokio::test]
async fn test_short_name_status_edit() {
	let server = start(
		example_discovery(),
		vec![my_resource(
			"my-object",
			json!({"phase": "Pending", "message": "waiting"}),
		)],
	)
	.await;
	let conn = connect(&server).await;

	let session = ValueEdit(|doc: &mut Value| {
		let status = doc["status"].as_object_mut().unwrap();
		status.insert("phase".to_string(), json!("Ready"));
		status.remove("message");
	});
	let outcome = edit_status(&config("mr", "my-object", None), &conn, &session)
		.await
		.expect("edit should succeed");

	assert_eq!(
		outcome.resolved.resource_type,
		ResourceTypeId::new("example.com", "v1", "myresources")
	);
	assert_eq!(outcome.resolved.scope, ResourceScope::Namespaced);
	assert_eq!(
		outcome.resolved.snapshot.kind,
		KindId::new("example.com", "v1", "MyResource")
	);
	assert_eq!(
		outcome.patch.body,
		json!({"status": {"phase": "Ready", "message": null}})
	);

	let patches = server.patches();
	assert_eq!(patches.len(), 1);
	assert_eq!(patches[0].path, format!("{MY_OBJECT_PATH}/my-object/status"));
	assert_eq!(
		patches[0].content_type.as_deref(),
		Some(PatchKind::Merge.content_type())
	);
	assert_eq!(patches[0].body, outcome.patch.body);

	let stored = server.resource(MY_OBJECT_PATH, "my-object").unwrap();
	assert_eq!(stored["status"], json!({"phase": "Ready"}));
	assert_eq!(stored["spec"], json!({"replicas": 1}));
	assert_eq!(server.object_gets().await, vec![format!("{MY_OBJECT_PATH}/my-object")]);
}

#[tokio::test]
async fn test_spec_changes_do_not_reach_the_object() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let session = ValueEdit(|doc: &mut Value| {
		doc["spec"]["replicas"] = json!(3);
		doc["status"]["phase"] = json!("Ready");
	});
	let outcome = edit_status(&config("myresources", "my-object", None), &conn, &session)
		.await
		.unwrap();

	// the patch carries both changes, the status endpoint only honours the status
	assert_eq!(
		outcome.patch.body,
		json!({"spec": {"replicas": 3}, "status": {"phase": "Ready"}})
	);
	let stored = server.resource(MY_OBJECT_PATH, "my-object").unwrap();
	assert_eq!(stored["spec"], json!({"replicas": 1}));
	assert_eq!(stored["status"], json!({"phase": "Ready"}));
}

#[tokio::test]
async fn test_unchanged_document_sends_empty_patch() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let outcome = edit_status(
		&config("myresources.example.com", "my-object", None),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap();

	assert!(outcome.patch.is_empty());
	let patches = server.patches();
	assert_eq!(patches.len(), 1);
	assert_eq!(patches[0].body, json!({}));
}

#[rstest]
#[case::plural("deployments")]
#[case::singular("deployment")]
#[case::short_name("deploy")]
#[case::group_qualified("deployments.apps")]
#[case::trailing_separator("deployments.")]
#[case::group_prefix("deployments.ap")]
#[tokio::test]
async fn test_builtin_resource_spellings(#[case] token: &str) {
	let deployment = json!({
		"apiVersion": "apps/v1",
		"kind": "Deployment",
		"metadata": {"name": "web", "namespace": "default"},
		"status": {"replicas": 1}
	});
	let server = start(MockDiscovery::default(), vec![deployment]).await;
	let conn = connect(&server).await;

	let session = ValueEdit(|doc: &mut Value| doc["status"]["replicas"] = json!(2));
	let outcome = edit_status(&config(token, "web", None), &conn, &session)
		.await
		.expect("edit should succeed");

	assert_eq!(
		outcome.resolved.resource_type,
		ResourceTypeId::new("apps", "v1", "deployments")
	);
	assert_eq!(
		server.patches()[0].path,
		"/apis/apps/v1/namespaces/default/deployments/web/status"
	);
}

#[tokio::test]
async fn test_cluster_scoped_resource_is_inferred() {
	let widget = json!({
		"apiVersion": "example.com/v1",
		"kind": "ClusterWidget",
		"metadata": {"name": "w"},
		"status": {"ready": false}
	});
	let server = start(example_discovery(), vec![widget]).await;
	let conn = connect(&server).await;

	let session = ValueEdit(|doc: &mut Value| doc["status"]["ready"] = json!(true));
	let outcome = edit_status(&config("clusterwidgets", "w", None), &conn, &session)
		.await
		.unwrap();

	assert_eq!(outcome.resolved.scope, ResourceScope::ClusterWide);
	assert_eq!(
		server.object_gets().await,
		vec!["/apis/example.com/v1/clusterwidgets/w".to_string()]
	);
	assert_eq!(
		server.patches()[0].path,
		"/apis/example.com/v1/clusterwidgets/w/status"
	);
}

#[tokio::test]
async fn test_explicit_scope_overrides_discovery() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let err = edit_status(
		&config("myresources", "my-object", Some(ResourceScope::ClusterWide)),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap_err();

	assert_eq!(
		server.object_gets().await,
		vec!["/apis/example.com/v1/myresources/my-object".to_string()]
	);
	assert_matches!(&err, EditStatusError::NotFound(not_found) if not_found.scope == "cluster-scoped");
	assert!(err
		.to_string()
		.starts_with("cluster-scoped resource myresources \"my-object\" not found"));
	assert!(server.patches().is_empty());
}

#[tokio::test]
async fn test_falls_back_to_next_version() {
	let discovery = MockDiscovery::default()
		.with_group_version(
			"example.com/v1",
			vec![MockApiResource::namespaced("widgets", "Widget")],
		)
		.with_group_version(
			"example.com/v2",
			vec![MockApiResource::namespaced("widgets", "Widget")],
		);
	let widget = json!({
		"apiVersion": "example.com/v2",
		"kind": "Widget",
		"metadata": {"name": "w", "namespace": "default"},
		"status": {"phase": "Pending"}
	});
	let server = start(discovery, vec![widget]).await;
	let conn = connect(&server).await;

	let session = ValueEdit(|doc: &mut Value| doc["status"]["phase"] = json!("Ready"));
	let outcome = edit_status(&config("widgets", "w", None), &conn, &session)
		.await
		.unwrap();

	assert_eq!(
		outcome.resolved.resource_type,
		ResourceTypeId::new("example.com", "v2", "widgets")
	);
	assert_eq!(
		server.object_gets().await,
		vec![
			"/apis/example.com/v1/namespaces/default/widgets/w".to_string(),
			"/apis/example.com/v2/namespaces/default/widgets/w".to_string(),
		]
	);
	assert_eq!(
		server.patches()[0].path,
		"/apis/example.com/v2/namespaces/default/widgets/w/status"
	);
}

#[tokio::test]
async fn test_not_found_lists_every_miss() {
	let server = start(example_discovery(), vec![]).await;
	let conn = connect(&server).await;

	let err = edit_status(
		&config("mr", "missing", None),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap_err();

	let EditStatusError::NotFound(not_found) = &err else {
		panic!("expected not found, got {err:?}");
	};
	assert_eq!(not_found.scope, "namespaced (in \"default\")");
	assert_eq!(not_found.misses.len(), 2);
	assert_eq!(not_found.misses[0].candidate, ResourceTypeId::new("", "", "mr"));
	assert_eq!(not_found.misses[0].reason, MissReason::NoResourceMatch);
	assert_eq!(
		not_found.misses[1].reason,
		MissReason::ObjectNotFound {
			resource_type: ResourceTypeId::new("example.com", "v1", "myresources"),
			scope: ResourceScope::Namespaced,
		}
	);
	assert!(err
		.to_string()
		.starts_with("namespaced (in \"default\") resource mr \"missing\" not found"));
	assert!(server.patches().is_empty());
}

#[tokio::test]
async fn test_unknown_resource_type() {
	let server = start(example_discovery(), vec![]).await;
	let conn = connect(&server).await;

	let err = edit_status(
		&config("nosuchthings", "x", None),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap_err();

	assert_matches!(err, EditStatusError::NotFound(not_found) if not_found.misses.len() == 1);
	assert!(server.object_gets().await.is_empty());
}

#[tokio::test]
async fn test_forbidden_fetch_aborts() {
	let server = HttpMockK8sServer::builder()
		.discovery(example_discovery())
		.resources(vec![my_resource("my-object", json!({}))])
		.forbidden_resources(vec!["myresources".to_string()])
		.build()
		.start()
		.await;
	let conn = connect(&server).await;

	let err = edit_status(
		&config("mr", "my-object", None),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap_err();

	assert_matches!(
		err,
		EditStatusError::Fetch(ResolveError::Fetch { resource_type, name, .. })
			if resource_type == ResourceTypeId::new("example.com", "v1", "myresources")
				&& name == "my-object"
	);
	assert!(server.patches().is_empty());
}

#[tokio::test]
async fn test_unavailable_group_version_fails_discovery() {
	let server = HttpMockK8sServer::builder()
		.discovery(example_discovery())
		.unavailable_group_versions(vec!["example.com/v1".to_string()])
		.build()
		.start()
		.await;
	let conn = connect(&server).await;

	let err = edit_status(
		&config("mr", "my-object", None),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap_err();

	assert_matches!(
		err,
		EditStatusError::Discovery(DiscoveryError::GroupVersion { group_version, .. })
			if group_version == "example.com/v1"
	);
}

#[tokio::test]
async fn test_malformed_edit_is_not_applied() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let err = edit_status(
		&config("mr", "my-object", None),
		&conn,
		&FixedText("status: [unclosed"),
	)
	.await
	.unwrap_err();

	assert_matches!(err, EditStatusError::Diff(DiffError::Malformed(_)));
	assert!(server.patches().is_empty());
}

#[tokio::test]
async fn test_non_object_edit_is_rejected() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let err = edit_status(&config("mr", "my-object", None), &conn, &FixedText("- a\n- b\n"))
		.await
		.unwrap_err();

	assert_matches!(err, EditStatusError::Diff(DiffError::EditedNotObject));
	assert!(server.patches().is_empty());
}

#[tokio::test]
async fn test_editor_failure_is_reported() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let err = edit_status(&config("mr", "my-object", None), &conn, &FailingEditor)
		.await
		.unwrap_err();

	assert_matches!(err, EditStatusError::Edit(EditError::NoEditor));
	assert!(server.patches().is_empty());
}

#[tokio::test]
async fn test_edited_file_source() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(
		indoc! {"
			apiVersion: example.com/v1
			kind: MyResource
			metadata:
			  name: my-object
			  namespace: default
			spec:
			  replicas: 1
			status:
			  phase: Ready
			  conditions:
			  - type: Available
			    status: \"True\"
		"}
		.as_bytes(),
	)
	.unwrap();

	let source = EditSource::File(file.path().to_path_buf());
	let outcome = edit_status(&config("mr", "my-object", None), &conn, &source)
		.await
		.unwrap();

	assert_eq!(
		outcome.patch.body,
		json!({"status": {"phase": "Ready", "conditions": [{"type": "Available", "status": "True"}]}})
	);
	assert_eq!(
		server.resource(MY_OBJECT_PATH, "my-object").unwrap()["status"]["conditions"][0]["type"],
		"Available"
	);
}

#[tokio::test]
async fn test_group_prefix_resolves_custom_resource() {
	let server = start(
		example_discovery(),
		vec![my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let outcome = edit_status(
		&config("myresources.example", "my-object", None),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap();

	assert_eq!(
		outcome.resolved.resource_type,
		ResourceTypeId::new("example.com", "v1", "myresources")
	);
}

#[tokio::test]
async fn test_not_found_reports_explicit_scope() {
	let server = start(example_discovery(), vec![]).await;
	let conn = connect(&server).await;

	let err = edit_status(
		&config("nosuchthings", "x", Some(ResourceScope::ClusterWide)),
		&conn,
		&ValueEdit(|_: &mut Value| {}),
	)
	.await
	.unwrap_err();

	assert_matches!(&err, EditStatusError::NotFound(not_found) if not_found.scope == "cluster-scoped");
	assert!(err
		.to_string()
		.starts_with("cluster-scoped resource nosuchthings \"x\" not found"));
}

#[tokio::test]
async fn test_literal_resource_wins_over_short_name() {
	let discovery =
		example_discovery().with_group_version("other.io/v1", vec![MockApiResource::namespaced("mr", "Mr")]);
	let literal = json!({
		"apiVersion": "other.io/v1",
		"kind": "Mr",
		"metadata": {"name": "my-object", "namespace": "default"},
		"status": {"phase": "Pending"}
	});
	let server = start(
		discovery,
		vec![literal, my_resource("my-object", json!({"phase": "Pending"}))],
	)
	.await;
	let conn = connect(&server).await;

	let session = ValueEdit(|doc: &mut Value| doc["status"]["phase"] = json!("Ready"));
	let outcome = edit_status(&config("mr", "my-object", None), &conn, &session)
		.await
		.unwrap();

	assert_eq!(
		outcome.resolved.resource_type,
		ResourceTypeId::new("other.io", "v1", "mr")
	);
	assert_eq!(
		server.object_gets().await,
		vec!["/apis/other.io/v1/namespaces/default/mr/my-object".to_string()]
	);
	assert_eq!(
		server.resource(MY_OBJECT_PATH, "my-object").unwrap()["status"],
		json!({"phase": "Pending"})
	);
}
