//! Resolving a partial resource specification to a single object.
//!
//! The user names a resource type loosely (`myresources`, `mr`,
//! `myresources.example.com`). That is turned into an ordered list of
//! candidate resource types, which are tried one after the other until an
//! object with the requested name turns up.

use std::{collections::HashSet, fmt};

use kube::{api::DynamicObject, core::GroupVersionKind, discovery::ApiResource, Client};
use thiserror::Error;
use tracing::instrument;

use super::{
	client::ClusterConnection,
	discovery::{expand_partial, DiscoveredResource, DiscoveryError, DiscoveryGateway},
	dynamic_api,
	scope::{ScopeInference, DEFAULT_SCOPE},
	KindId, ResourceScope, ResourceTypeId,
};

/// Separates the resource from its group in a partial specification.
const GROUP_SEPARATOR: char = '.';
/// Separates the partial specification from the object name in a single argument.
const NAME_SEPARATOR: char = '/';

/// Errors in the user supplied resource/name arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("invalid number of command-line arguments. Expecting 1 or 2 arguments, got {0}")]
	ArgumentCount(usize),

	#[error(
		"single command-line argument must be in the following format: \
		 <partial resource specification>/<resource name>, got {0:?}"
	)]
	SingleArgument(String),

	#[error("partial resource specification must not be empty")]
	EmptyResource,

	#[error("resource name must not be empty")]
	EmptyName,
}

/// A loosely specified resource type plus the name of the object to edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSpec {
	/// `resource` or `resource.group`.
	pub token: String,
	/// Name of the object.
	pub name: String,
}

impl PartialSpec {
	pub fn new(token: &str, name: &str) -> Result<Self, ParseError> {
		if token.is_empty() {
			return Err(ParseError::EmptyResource);
		}
		if name.is_empty() {
			return Err(ParseError::EmptyName);
		}
		Ok(Self {
			token: token.to_string(),
			name: name.to_string(),
		})
	}

	/// Parse positional arguments: `<token> <name>` or `<token>/<name>`.
	pub fn from_args(args: &[String]) -> Result<Self, ParseError> {
		match args {
			[token, name] => Self::new(token, name),
			[single] => {
				let parts: Vec<&str> = single.split(NAME_SEPARATOR).collect();
				match parts.as_slice() {
					[token, name] => Self::new(token, name),
					_ => Err(ParseError::SingleArgument(single.clone())),
				}
			}
			_ => Err(ParseError::ArgumentCount(args.len())),
		}
	}

	/// Split the token at its first separator into resource and group.
	///
	/// The group is empty when there is no separator, or nothing after it.
	pub fn split_token(&self) -> (&str, &str) {
		self.token
			.split_once(GROUP_SEPARATOR)
			.unwrap_or((self.token.as_str(), ""))
	}

	/// The literal reading of the token, with any version.
	pub fn primary_candidate(&self) -> ResourceTypeId {
		let (resource, group) = self.split_token();
		ResourceTypeId::new(group, "", resource)
	}
}

impl fmt::Display for PartialSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}{}", self.token, NAME_SEPARATOR, self.name)
	}
}

/// Resource types whose short names include `short_name`, in discovery order.
pub fn short_name_candidates(
	resources: &[DiscoveredResource],
	short_name: &str,
) -> Vec<ResourceTypeId> {
	resources
		.iter()
		.filter(|r| r.short_names.iter().any(|sn| sn == short_name))
		.map(|r| r.id.clone())
		.collect()
}

/// Ordered search list: the literal reading first, then short-name matches.
pub fn candidates(spec: &PartialSpec, resources: &[DiscoveredResource]) -> Vec<ResourceTypeId> {
	let primary = spec.primary_candidate();
	let short_names = short_name_candidates(resources, &primary.resource);

	let mut candidates = Vec::with_capacity(1 + short_names.len());
	candidates.push(primary);
	candidates.extend(short_names);
	candidates
}

/// The fetched object, captured once as the base for the merge patch.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot {
	pub original_document: serde_json::Value,
	pub kind: KindId,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObject {
	pub snapshot: ObjectSnapshot,
	pub resource_type: ResourceTypeId,
	pub scope: ResourceScope,
}

/// Why a candidate did not yield the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
	/// Discovery serves no resource type matching the candidate.
	NoResourceMatch,
	/// The resource type exists, the object does not.
	ObjectNotFound {
		resource_type: ResourceTypeId,
		scope: ResourceScope,
	},
}

/// A candidate that was tried without success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMiss {
	pub candidate: ResourceTypeId,
	pub reason: MissReason,
}

impl fmt::Display for CandidateMiss {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.reason {
			MissReason::NoResourceMatch => write!(f, "no matches for {}", self.candidate),
			MissReason::ObjectNotFound {
				resource_type,
				scope,
			} => write!(f, "{} ({:?}): not found", resource_type, scope),
		}
	}
}

/// No candidate produced the requested object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
	pub token: String,
	pub name: String,
	/// Scope of the last attempt, with the namespace if namespaced.
	pub scope: String,
	pub misses: Vec<CandidateMiss>,
}

impl fmt::Display for NotFoundError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} resource {} {:?} not found: cannot find any GVRs for the partial specification, \
			 or no objects have been found",
			self.scope, self.token, self.name
		)?;
		if !self.misses.is_empty() {
			let misses: Vec<String> = self.misses.iter().map(ToString::to_string).collect();
			write!(f, " (tried: {})", misses.join("; "))?;
		}
		Ok(())
	}
}

impl std::error::Error for NotFoundError {}

/// Errors that abort resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),

	#[error("cannot get object: GVR: {resource_type}, Name: {name}")]
	Fetch {
		resource_type: ResourceTypeId,
		name: String,
		#[source]
		source: kube::Error,
	},

	#[error("cannot marshal object into JSON")]
	Serialize(#[source] serde_json::Error),

	#[error(transparent)]
	NotFound(#[from] NotFoundError),
}

/// Finds the object a [`PartialSpec`] refers to.
pub struct ResourceResolver {
	client: Client,
	namespace: String,
	discovery: DiscoveryGateway,
	scopes: ScopeInference,
}

impl ResourceResolver {
	pub fn new(connection: &ClusterConnection, explicit_scope: Option<ResourceScope>) -> Self {
		let discovery = DiscoveryGateway::new(connection.client().clone());
		Self {
			client: connection.client().clone(),
			namespace: connection.namespace().to_string(),
			scopes: ScopeInference::new(discovery.clone(), explicit_scope),
			discovery,
		}
	}

	/// Resolve `spec` to exactly one object.
	///
	/// Candidates are tried in order; the first one under which the object
	/// exists wins. A missing object or an unknown resource type moves on to
	/// the next candidate, any other failure aborts.
	#[instrument(skip_all, fields(spec = %spec))]
	pub async fn resolve(&self, spec: &PartialSpec) -> Result<ResolvedObject, ResolveError> {
		let resources = self.discovery.list_group_resources().await?;
		let candidates = candidates(spec, &resources);

		let mut misses = Vec::new();
		let mut attempted = HashSet::new();
		let mut last_scope = self.scopes.explicit().unwrap_or(DEFAULT_SCOPE);

		for candidate in candidates {
			let expanded = expand_partial(&resources, &candidate);
			if expanded.is_empty() {
				tracing::debug!(candidate = %candidate, "no resource type matches candidate");
				misses.push(CandidateMiss {
					candidate,
					reason: MissReason::NoResourceMatch,
				});
				continue;
			}

			for resource in expanded {
				if !attempted.insert(resource.id.clone()) {
					continue;
				}

				let scope = self.scopes.scope_for(&resource.id).await?;
				last_scope = scope;

				tracing::debug!(gvr = %resource.id, ?scope, name = %spec.name, "trying candidate");
				match self.fetch(resource, scope, &spec.name).await? {
					Some(object) => {
						let original_document =
							serde_json::to_value(&object).map_err(ResolveError::Serialize)?;
						let kind = self.discovery.kind_for(&resource.id).await?;

						tracing::debug!(gvr = %resource.id, gvk = %kind, "found object");
						return Ok(ResolvedObject {
							snapshot: ObjectSnapshot {
								original_document,
								kind,
							},
							resource_type: resource.id.clone(),
							scope,
						});
					}
					None => misses.push(CandidateMiss {
						candidate: candidate.clone(),
						reason: MissReason::ObjectNotFound {
							resource_type: resource.id.clone(),
							scope,
						},
					}),
				}
			}
		}

		Err(NotFoundError {
			token: spec.token.clone(),
			name: spec.name.clone(),
			scope: last_scope.describe(&self.namespace),
			misses,
		}
		.into())
	}

	/// Get the named object, `None` if it does not exist.
	async fn fetch(
		&self,
		resource: &DiscoveredResource,
		scope: ResourceScope,
		name: &str,
	) -> Result<Option<DynamicObject>, ResolveError> {
		let ar = ApiResource::from_gvk_with_plural(
			&GroupVersionKind::gvk(&resource.id.group, &resource.id.version, &resource.kind),
			&resource.id.resource,
		);
		let api = dynamic_api(self.client.clone(), &ar, scope.namespace(&self.namespace));

		api.get_opt(name).await.map_err(|source| ResolveError::Fetch {
			resource_type: resource.id.clone(),
			name: name.to_string(),
			source,
		})
	}
}
