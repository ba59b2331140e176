//! Top-level error for an edit-status run.

use thiserror::Error;

use crate::{
	editor::EditError,
	k8s::{
		client::ConnectionError,
		discovery::DiscoveryError,
		patch::{ApplyError, DiffError},
		resolve::{NotFoundError, ParseError, ResolveError},
	},
};

/// Any failure of the edit-status workflow.
#[derive(Debug, Error)]
pub enum EditStatusError {
	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error("cannot connect to cluster")]
	Connection(#[from] ConnectionError),

	#[error("cannot discover API resources")]
	Discovery(#[source] DiscoveryError),

	#[error(transparent)]
	NotFound(NotFoundError),

	/// Fetching the object failed for a reason other than its absence.
	#[error(transparent)]
	Fetch(ResolveError),

	#[error(transparent)]
	Edit(#[from] EditError),

	#[error(transparent)]
	Diff(#[from] DiffError),

	#[error(transparent)]
	Apply(#[from] ApplyError),
}

impl From<ResolveError> for EditStatusError {
	fn from(err: ResolveError) -> Self {
		match err {
			ResolveError::Discovery(err) => EditStatusError::Discovery(err),
			ResolveError::NotFound(err) => EditStatusError::NotFound(err),
			err @ (ResolveError::Fetch { .. } | ResolveError::Serialize(_)) => {
				EditStatusError::Fetch(err)
			}
		}
	}
}
