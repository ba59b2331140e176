//! The edit-status workflow: resolve, edit, diff, patch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use kube::api::DynamicObject;
use tracing::instrument;

use crate::{
	config::EditStatusConfig,
	editor::{EditError, EditSession},
	error::EditStatusError,
	k8s::{
		client::ClusterConnection,
		patch::{diff, DiffError, PatchDocument, StatusPatcher},
		resolve::{ResolvedObject, ResourceResolver},
	},
	telemetry, yaml,
};

/// Command-line arguments.
#[derive(Args, Debug, Clone)]
pub struct EditStatusArgs {
	/// `<resource>[.<group>] <name>` or `<resource>[.<group>]/<name>`
	#[arg(value_name = "RESOURCE", required = true)]
	pub resource: Vec<String>,

	/// Treat the resource as namespaced (or, with `=false`, cluster-scoped)
	/// instead of asking the API server
	#[arg(
		long,
		value_name = "BOOL",
		num_args = 0..=1,
		require_equals = true,
		default_missing_value = "true"
	)]
	pub namespaced: Option<bool>,

	/// Editor command; several `:`-separated alternatives may be given.
	/// Defaults to $KUBE_EDITOR, then $EDITOR, then vi
	#[arg(short, long)]
	pub editor: Option<String>,

	/// Read the edited object from this file instead of starting an editor
	#[arg(short = 'f', long)]
	pub filename: Option<PathBuf>,

	/// Path to the kubeconfig file
	#[arg(long)]
	pub kubeconfig: Option<PathBuf>,

	/// Kubeconfig context to use
	#[arg(long)]
	pub context: Option<String>,

	/// Namespace of the object, when namespaced
	#[arg(short, long)]
	pub namespace: Option<String>,

	/// Log level (overrides RUST_LOG)
	#[arg(long)]
	pub log_level: Option<tracing::Level>,
}

/// What an edit-status run did.
#[derive(Debug, Clone)]
pub struct EditOutcome {
	pub resolved: ResolvedObject,
	pub patch: PatchDocument,
	/// The object as returned by the API server after patching.
	pub patched: DynamicObject,
}

pub fn run(args: EditStatusArgs) -> Result<()> {
	let config = EditStatusConfig::from_args(&args)?;

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;

	let _telemetry = {
		let _entered = runtime.enter();
		telemetry::init(args.log_level).context("initializing logging")?
	};

	runtime.block_on(run_async(config))
}

async fn run_async(config: EditStatusConfig) -> Result<()> {
	let connection = ClusterConnection::connect(&config.connection)
		.await
		.context("connecting to cluster")?;
	let outcome = edit_status(&config, &connection, &config.edit_source).await?;

	tracing::info!(
		gvr = %outcome.resolved.resource_type,
		name = %config.spec.name,
		"status updated"
	);
	Ok(())
}

/// Run one edit against the cluster behind `connection`.
///
/// The patch is sent even when the edit changed nothing.
#[instrument(skip_all, fields(spec = %config.spec, cluster = connection.cluster_identifier()))]
pub async fn edit_status(
	config: &EditStatusConfig,
	connection: &ClusterConnection,
	session: &impl EditSession,
) -> Result<EditOutcome, EditStatusError> {
	let resolved = ResourceResolver::new(connection, config.explicit_scope)
		.resolve(&config.spec)
		.await?;
	let original = &resolved.snapshot.original_document;

	let document = yaml::to_yaml(original).map_err(EditError::Render)?;
	let edited = session.edit(&document)?;
	let edited = yaml::from_yaml(&edited).map_err(DiffError::Malformed)?;

	let patch = diff(original, &edited)?;
	if patch.is_empty() {
		tracing::info!(name = %config.spec.name, "no changes to status, sending empty patch");
	} else {
		tracing::debug!(patch = %patch.body, "computed merge patch");
	}

	let patched = StatusPatcher::new(connection)
		.apply(&resolved.snapshot.kind, &config.spec.name, &patch)
		.await?;

	Ok(EditOutcome {
		resolved,
		patch,
		patched,
	})
}
