//! Computing merge patches and applying them to the status sub-resource.

use kube::{
	api::{DynamicObject, Patch, PatchParams},
	Client,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use super::{
	client::ClusterConnection,
	discovery::{DiscoveryError, DiscoveryGateway},
	dynamic_api, KindId,
};

/// Errors computing a patch from two documents.
#[derive(Debug, Error)]
pub enum DiffError {
	#[error("cannot convert edited object's YAML to JSON")]
	Malformed(#[source] serde_yaml::Error),

	#[error("cannot prepare merge patch: original document is not an object")]
	OriginalNotObject,

	#[error("cannot prepare merge patch: edited document is not an object")]
	EditedNotObject,
}

/// Errors applying a patch to the cluster.
#[derive(Debug, Error)]
pub enum ApplyError {
	#[error("cannot resolve REST mapping")]
	Mapping(#[source] DiscoveryError),

	#[error("cannot merge patch object: GVK: {kind}, Name: {name}")]
	PatchFailed {
		kind: KindId,
		name: String,
		#[source]
		source: Box<kube::Error>,
	},
}

/// Patch flavours understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchKind {
	/// JSON merge patch (RFC 7386).
	#[default]
	Merge,
}

impl PatchKind {
	pub fn content_type(self) -> &'static str {
		match self {
			PatchKind::Merge => "application/merge-patch+json",
		}
	}
}

/// A patch body together with how it is to be interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument {
	pub kind: PatchKind,
	pub body: Value,
}

impl PatchDocument {
	/// Whether applying this patch changes nothing.
	pub fn is_empty(&self) -> bool {
		self.body.as_object().is_some_and(Map::is_empty)
	}
}

/// Compute the merge patch turning `original` into `edited`.
///
/// Unchanged fields are left out, changed and added fields carry their new
/// value, removed fields are set to `null`. Objects are compared field by
/// field, anything else (arrays included) is replaced as a whole.
pub fn diff(original: &Value, edited: &Value) -> Result<PatchDocument, DiffError> {
	let original = original.as_object().ok_or(DiffError::OriginalNotObject)?;
	let edited = edited.as_object().ok_or(DiffError::EditedNotObject)?;

	Ok(PatchDocument {
		kind: PatchKind::Merge,
		body: Value::Object(merge_patch(original, edited)),
	})
}

fn merge_patch(original: &Map<String, Value>, edited: &Map<String, Value>) -> Map<String, Value> {
	let mut patch = Map::new();

	for (key, old) in original {
		match edited.get(key) {
			None => {
				patch.insert(key.clone(), Value::Null);
			}
			Some(new) if new == old => {}
			Some(Value::Object(new)) => match old {
				Value::Object(old) => {
					let nested = merge_patch(old, new);
					if !nested.is_empty() {
						patch.insert(key.clone(), Value::Object(nested));
					}
				}
				_ => {
					patch.insert(key.clone(), Value::Object(new.clone()));
				}
			},
			Some(new) => {
				patch.insert(key.clone(), new.clone());
			}
		}
	}

	for (key, new) in edited {
		if !original.contains_key(key) {
			patch.insert(key.clone(), new.clone());
		}
	}

	patch
}

/// Submits patches against the `status` sub-resource of objects.
pub struct StatusPatcher {
	client: Client,
	namespace: String,
	discovery: DiscoveryGateway,
}

impl StatusPatcher {
	pub fn new(connection: &ClusterConnection) -> Self {
		Self {
			client: connection.client().clone(),
			namespace: connection.namespace().to_string(),
			discovery: DiscoveryGateway::new(connection.client().clone()),
		}
	}

	/// Apply `patch` to the status of the object `name` of kind `gvk`.
	///
	/// An empty patch is sent like any other. Nothing is retried.
	#[instrument(skip_all, fields(gvk = %gvk, name))]
	pub async fn apply(
		&self,
		gvk: &KindId,
		name: &str,
		patch: &PatchDocument,
	) -> Result<DynamicObject, ApplyError> {
		let mapping = self
			.discovery
			.rest_mapping(gvk)
			.await
			.map_err(ApplyError::Mapping)?;

		let namespace = mapping.scope.namespace(&self.namespace);
		let api = dynamic_api(self.client.clone(), &mapping.api_resource, namespace);

		let body = match patch.kind {
			PatchKind::Merge => Patch::Merge(&patch.body),
		};

		let patched = api
			.patch_status(name, &PatchParams::default(), &body)
			.await
			.map_err(|e| ApplyError::PatchFailed {
				kind: gvk.clone(),
				name: name.to_string(),
				source: Box::new(e),
			})?;

		tracing::info!(
			gvk = %gvk,
			name,
			namespace = namespace.unwrap_or_default(),
			content_type = patch.kind.content_type(),
			"patched status"
		);
		Ok(patched)
	}
}
