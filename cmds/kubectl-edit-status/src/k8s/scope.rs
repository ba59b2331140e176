//! Deciding whether a resource type is namespaced or cluster-scoped.

use tracing::instrument;

use super::{
	discovery::{DiscoveredResource, DiscoveryError, DiscoveryGateway},
	ResourceScope, ResourceTypeId,
};

/// Scope assumed when discovery does not list the resource.
pub const DEFAULT_SCOPE: ResourceScope = ResourceScope::Namespaced;

/// Scope decisions for resource types.
///
/// An explicit override from the command line always wins; otherwise the
/// scope is looked up live in the resource's group/version listing.
#[derive(Clone)]
pub struct ScopeInference {
	discovery: DiscoveryGateway,
	explicit: Option<ResourceScope>,
}

impl ScopeInference {
	pub fn new(discovery: DiscoveryGateway, explicit: Option<ResourceScope>) -> Self {
		Self {
			discovery,
			explicit,
		}
	}

	/// The scope forced from the command line, if any.
	pub fn explicit(&self) -> Option<ResourceScope> {
		self.explicit
	}

	#[instrument(skip_all, fields(gvr = %gvr))]
	pub async fn scope_for(&self, gvr: &ResourceTypeId) -> Result<ResourceScope, DiscoveryError> {
		if let Some(scope) = self.explicit {
			tracing::debug!(?scope, "using explicit scope");
			return Ok(scope);
		}

		let listed = self
			.discovery
			.list_resources_for_group_version(&gvr.group, &gvr.version)
			.await?;
		let scope = scope_from_listing(&listed, &gvr.resource);
		tracing::debug!(?scope, "inferred scope");
		Ok(scope)
	}

	pub async fn is_namespaced(&self, gvr: &ResourceTypeId) -> Result<bool, DiscoveryError> {
		Ok(self.scope_for(gvr).await?.is_namespaced())
	}
}

/// Scope of `resource` within a group/version listing.
fn scope_from_listing(listed: &[DiscoveredResource], resource: &str) -> ResourceScope {
	match listed.iter().find(|r| r.id.resource == resource) {
		Some(r) => r.scope,
		None => {
			tracing::debug!(resource, "resource not listed, assuming default scope");
			DEFAULT_SCOPE
		}
	}
}
