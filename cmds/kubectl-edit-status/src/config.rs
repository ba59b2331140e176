//! Run configuration, assembled once from the command line and environment.

use crate::{
	commands::edit_status::EditStatusArgs,
	editor::{EditSource, EditorCommand},
	error::EditStatusError,
	k8s::{client::ConnectionOpts, resolve::PartialSpec, ResourceScope},
};

/// Everything an edit-status run needs to know. Not modified after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditStatusConfig {
	pub spec: PartialSpec,
	/// `Some` when the user forced the scope with `--namespaced`.
	pub explicit_scope: Option<ResourceScope>,
	pub edit_source: EditSource,
	pub connection: ConnectionOpts,
}

impl EditStatusConfig {
	/// Build the configuration from arguments and the process environment.
	pub fn from_args(args: &EditStatusArgs) -> Result<Self, EditStatusError> {
		Self::from_args_with_env(args, |name| std::env::var(name).ok())
	}

	/// Like [`EditStatusConfig::from_args`], with environment lookups going through `env`.
	pub fn from_args_with_env(
		args: &EditStatusArgs,
		env: impl Fn(&str) -> Option<String>,
	) -> Result<Self, EditStatusError> {
		let spec = PartialSpec::from_args(&args.resource)?;

		let edit_source = match &args.filename {
			Some(path) => EditSource::File(path.clone()),
			None => EditSource::Editor(EditorCommand::resolve(args.editor.as_deref(), env)?),
		};

		Ok(Self {
			spec,
			explicit_scope: args.namespaced.map(ResourceScope::from_namespaced),
			edit_source,
			connection: ConnectionOpts {
				kubeconfig: args.kubeconfig.clone(),
				context: args.context.clone(),
				namespace: args.namespace.clone(),
			},
		})
	}
}
