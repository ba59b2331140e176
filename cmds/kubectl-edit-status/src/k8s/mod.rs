//! Kubernetes side of status editing.
//!
//! Resolves a partial resource specification against the cluster's discovery
//! data, fetches the named object and applies merge patches to its `status`
//! sub-resource, all through kube-rs.

use std::fmt;

use kube::{
	api::{Api, DynamicObject},
	discovery::ApiResource,
	Client,
};

pub mod client;
pub mod discovery;
pub mod patch;
pub mod resolve;
pub mod scope;

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
	/// Resource is namespaced (e.g., Deployment, ConfigMap).
	Namespaced,

	/// Resource is cluster-wide (e.g., Namespace, ClusterRole).
	ClusterWide,
}

impl ResourceScope {
	pub fn from_namespaced(namespaced: bool) -> Self {
		if namespaced {
			Self::Namespaced
		} else {
			Self::ClusterWide
		}
	}

	pub fn is_namespaced(self) -> bool {
		self == Self::Namespaced
	}

	/// Human readable description, naming the namespace when it applies.
	pub fn describe(self, namespace: &str) -> String {
		match self {
			Self::Namespaced => format!("namespaced (in {:?})", namespace),
			Self::ClusterWide => "cluster-scoped".to_string(),
		}
	}

	/// The namespace to address objects of this scope in, if any.
	pub fn namespace(self, namespace: &str) -> Option<&str> {
		match self {
			Self::Namespaced => Some(namespace),
			Self::ClusterWide => None,
		}
	}
}

/// A resource type served by the cluster: group, version and plural resource name.
///
/// Empty `group` is the core group. While resolving, `version` (and `group`)
/// may be empty to mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResourceTypeId {
	pub group: String,
	pub version: String,
	pub resource: String,
}

impl ResourceTypeId {
	pub fn new(group: &str, version: &str, resource: &str) -> Self {
		Self {
			group: group.to_string(),
			version: version.to_string(),
			resource: resource.to_string(),
		}
	}

	/// `group/version`, or just `version` for the core group.
	pub fn api_version(&self) -> String {
		api_version(&self.group, &self.version)
	}
}

impl fmt::Display for ResourceTypeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// partially specified types leave out what is unknown
		if !self.version.is_empty() {
			write!(f, "{}, ", self.api_version())?;
		} else if !self.group.is_empty() {
			write!(f, "{}, ", self.group)?;
		}
		write!(f, "Resource={}", self.resource)
	}
}

/// The typed-schema identity matching a [`ResourceTypeId`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KindId {
	pub group: String,
	pub version: String,
	pub kind: String,
}

impl KindId {
	pub fn new(group: &str, version: &str, kind: &str) -> Self {
		Self {
			group: group.to_string(),
			version: version.to_string(),
			kind: kind.to_string(),
		}
	}

	pub fn api_version(&self) -> String {
		api_version(&self.group, &self.version)
	}
}

impl fmt::Display for KindId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}, Kind={}", self.api_version(), self.kind)
	}
}

/// Create a dynamic API for the given resource, namespaced when `namespace` is set.
pub fn dynamic_api(client: Client, ar: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
	match namespace {
		Some(ns) => Api::namespaced_with(client, ns, ar),
		None => Api::all_with(client, ar),
	}
}

fn api_version(group: &str, version: &str) -> String {
	if group.is_empty() {
		version.to_string()
	} else {
		format!("{}/{}", group, version)
	}
}
