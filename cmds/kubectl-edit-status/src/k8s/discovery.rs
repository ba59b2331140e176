//! Kubernetes API resource discovery.
//!
//! Every lookup goes to the cluster's discovery endpoints; nothing is cached
//! between calls.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroup, APIResourceList};
use kube::{core::GroupVersionKind, discovery::ApiResource, Client};
use thiserror::Error;
use tracing::instrument;

use super::{KindId, ResourceScope, ResourceTypeId};

/// Errors that can occur during API resource discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("cannot list core API versions")]
	CoreVersions(#[source] kube::Error),

	#[error("cannot list API groups")]
	Groups(#[source] kube::Error),

	#[error("cannot discover server resources for GV: {group_version:?}")]
	GroupVersion {
		group_version: String,
		#[source]
		source: kube::Error,
	},

	#[error("cannot get GVK for GVR: {0}")]
	KindNotFound(ResourceTypeId),

	#[error("cannot get REST mapping for GVK: {0}")]
	MappingNotFound(KindId),
}

/// A resource type served by the cluster, as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
	pub id: ResourceTypeId,
	pub kind: String,
	pub singular_name: String,
	pub short_names: Vec<String>,
	pub scope: ResourceScope,
}

/// How objects of a kind are addressed over REST.
#[derive(Debug, Clone)]
pub struct RestMapping {
	/// The kube ApiResource for making API calls.
	pub api_resource: ApiResource,
	pub scope: ResourceScope,
}

/// Read-only queries against the cluster's API description.
#[derive(Clone)]
pub struct DiscoveryGateway {
	client: Client,
}

impl DiscoveryGateway {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Enumerate every resource type served by the cluster.
	///
	/// Order: the core group first, then the named groups as listed by the
	/// server; within a group the preferred version comes first.
	#[instrument(skip(self))]
	pub async fn list_group_resources(&self) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
		let mut resources = Vec::new();

		let core = self
			.client
			.list_core_api_versions()
			.await
			.map_err(DiscoveryError::CoreVersions)?;
		for version in &core.versions {
			resources.extend(self.list_resources_for_group_version("", version).await?);
		}

		let groups = self
			.client
			.list_api_groups()
			.await
			.map_err(DiscoveryError::Groups)?;
		for group in &groups.groups {
			for version in ordered_versions(group) {
				resources.extend(
					self.list_resources_for_group_version(&group.name, &version)
						.await?,
				);
			}
		}

		tracing::debug!(count = resources.len(), "discovered resource types");
		Ok(resources)
	}

	/// List the resource types served under one group/version.
	#[instrument(skip(self))]
	pub async fn list_resources_for_group_version(
		&self,
		group: &str,
		version: &str,
	) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
		let result = if group.is_empty() {
			self.client.list_core_api_resources(version).await
		} else {
			self.client
				.list_api_group_resources(&format!("{}/{}", group, version))
				.await
		};

		let list = result.map_err(|source| DiscoveryError::GroupVersion {
			group_version: ResourceTypeId::new(group, version, "").api_version(),
			source,
		})?;
		Ok(resources_from_list(list))
	}

	/// Map a concrete resource type to its kind.
	#[instrument(skip_all, fields(gvr = %gvr))]
	pub async fn kind_for(&self, gvr: &ResourceTypeId) -> Result<KindId, DiscoveryError> {
		self.list_resources_for_group_version(&gvr.group, &gvr.version)
			.await?
			.into_iter()
			.find(|r| r.id.resource == gvr.resource)
			.map(|r| KindId::new(&r.id.group, &r.id.version, &r.kind))
			.ok_or_else(|| DiscoveryError::KindNotFound(gvr.clone()))
	}

	/// Map a kind to the plural resource and scope used to address its objects.
	#[instrument(skip_all, fields(gvk = %gvk))]
	pub async fn rest_mapping(&self, gvk: &KindId) -> Result<RestMapping, DiscoveryError> {
		let resource = self
			.list_resources_for_group_version(&gvk.group, &gvk.version)
			.await?
			.into_iter()
			.find(|r| r.kind == gvk.kind)
			.ok_or_else(|| DiscoveryError::MappingNotFound(gvk.clone()))?;

		Ok(RestMapping {
			api_resource: ApiResource::from_gvk_with_plural(
				&GroupVersionKind::gvk(&gvk.group, &gvk.version, &gvk.kind),
				&resource.id.resource,
			),
			scope: resource.scope,
		})
	}
}

/// Expand a partial resource type into every served type it may refer to.
///
/// The resource matches the plural or singular name, case-insensitively. An
/// empty group or version matches any. A group matches exactly; only when no
/// served group does is it taken as a prefix (`storage` for `storage.k8s.io`).
/// The result keeps discovery order.
pub fn expand_partial<'a>(
	resources: &'a [DiscoveredResource],
	partial: &ResourceTypeId,
) -> Vec<&'a DiscoveredResource> {
	let wanted = partial.resource.to_lowercase();
	let named: Vec<&DiscoveredResource> = resources
		.iter()
		.filter(|r| partial.version.is_empty() || r.id.version == partial.version)
		.filter(|r| {
			r.id.resource == wanted || (!r.singular_name.is_empty() && r.singular_name == wanted)
		})
		.collect();

	if partial.group.is_empty() {
		return named;
	}

	let exact: Vec<_> = named
		.iter()
		.copied()
		.filter(|r| r.id.group == partial.group)
		.collect();
	if !exact.is_empty() {
		return exact;
	}

	named
		.into_iter()
		.filter(|r| r.id.group.starts_with(&partial.group))
		.collect()
}

/// Group versions of `group`, preferred version first.
fn ordered_versions(group: &APIGroup) -> Vec<String> {
	let preferred = group.preferred_version.as_ref().map(|v| v.version.clone());
	let rest = group
		.versions
		.iter()
		.map(|v| v.version.clone())
		.filter(|v| Some(v) != preferred.as_ref());
	preferred.clone().into_iter().chain(rest).collect()
}

/// Convert a discovery resource list, skipping sub-resources.
fn resources_from_list(list: APIResourceList) -> Vec<DiscoveredResource> {
	let (group, version) = match list.group_version.split_once('/') {
		Some((g, v)) => (g.to_string(), v.to_string()),
		None => (String::new(), list.group_version.clone()),
	};

	list.resources
		.into_iter()
		.filter(|r| !r.name.contains('/'))
		.map(|r| DiscoveredResource {
			id: ResourceTypeId {
				group: r.group.unwrap_or_else(|| group.clone()),
				version: r.version.unwrap_or_else(|| version.clone()),
				resource: r.name,
			},
			kind: r.kind,
			singular_name: r.singular_name,
			short_names: r.short_names.unwrap_or_default(),
			scope: ResourceScope::from_namespaced(r.namespaced),
		})
		.collect()
}
