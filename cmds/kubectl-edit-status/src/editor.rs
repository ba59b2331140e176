//! Edit session: hand a document to the user and read back what they made of it.
//!
//! The document is written to a temporary file, an external editor is run
//! on it, and the file is read back once the editor exits. Alternatively a
//! pre-edited file is read directly and no editor is started.

use std::{
	fs, io,
	io::Write,
	path::{Path, PathBuf},
	process::Command,
};

use thiserror::Error;
use tracing::instrument;

/// Environment variable consulted first for the editor.
pub const ENV_KUBE_EDITOR: &str = "KUBE_EDITOR";
/// Environment variable consulted second for the editor.
pub const ENV_EDITOR: &str = "EDITOR";
/// Editor used when nothing else is configured.
pub const DEFAULT_EDITOR: &str = "vi";
/// Separates alternatives in an editor specification.
const EDITOR_SEPARATOR: char = ':';
const TEMP_FILE_PREFIX: &str = "kubectl-edit-status-";

/// Errors that can occur while editing a document.
#[derive(Debug, Error)]
pub enum EditError {
	#[error("resource editor not specified")]
	NoEditor,

	#[error("cannot convert object JSON to YAML")]
	Render(#[source] serde_yaml::Error),

	#[error("cannot create temp file")]
	TempFile(#[source] io::Error),

	#[error("cannot write marshaled YAML to file: {}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("cannot edit resource using editor. Command-line: {command:?}")]
	Spawn {
		command: String,
		#[source]
		source: io::Error,
	},

	#[error("cannot read edited object from file: {}", path.display())]
	ReadBack {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Something that lets the user change a document.
///
/// Editing is synchronous and blocks the calling thread until the user is
/// done. The pipeline runs it from `block_on` on the main thread; it must not
/// be called from a task spawned onto a runtime worker.
pub trait EditSession {
	/// Return the edited version of `document`.
	fn edit(&self, document: &str) -> Result<String, EditError>;
}

/// An editor program and its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
	pub program: String,
	pub args: Vec<String>,
}

impl EditorCommand {
	/// Split an editor command line on whitespace.
	pub fn parse(command_line: &str) -> Result<Self, EditError> {
		let mut parts = command_line.split_whitespace().map(String::from);
		let program = parts.next().ok_or(EditError::NoEditor)?;
		Ok(Self {
			program,
			args: parts.collect(),
		})
	}

	/// Pick the editor: the first non-blank entry of `override_spec`, else of
	/// `$KUBE_EDITOR`, else of `$EDITOR`, else [`DEFAULT_EDITOR`].
	///
	/// Each source may hold several `:`-separated alternatives.
	pub fn resolve(
		override_spec: Option<&str>,
		env: impl Fn(&str) -> Option<String>,
	) -> Result<Self, EditError> {
		let chosen = match override_spec {
			Some(spec) => first_entry(spec),
			None => [ENV_KUBE_EDITOR, ENV_EDITOR]
				.into_iter()
				.find_map(|var| env(var).as_deref().and_then(first_entry))
				.or_else(|| Some(DEFAULT_EDITOR.to_string())),
		};
		Self::parse(&chosen.ok_or(EditError::NoEditor)?)
	}

	fn command_for(&self, path: &Path) -> Command {
		let mut command = Command::new(&self.program);
		command.args(&self.args).arg(path);
		command
	}

	fn command_line(&self, path: &Path) -> String {
		let mut parts = vec![self.program.clone()];
		parts.extend(self.args.iter().cloned());
		parts.push(path.display().to_string());
		parts.join(" ")
	}
}

fn first_entry(spec: &str) -> Option<String> {
	spec.split(EDITOR_SEPARATOR)
		.map(str::trim)
		.find(|entry| !entry.is_empty())
		.map(String::from)
}

/// Where the edited document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditSource {
	/// Run an editor on a temporary copy of the document.
	Editor(EditorCommand),
	/// Use a document that was edited beforehand.
	File(PathBuf),
}

impl EditSession for EditSource {
	fn edit(&self, document: &str) -> Result<String, EditError> {
		match self {
			EditSource::Editor(editor) => edit_in_editor(editor, document),
			EditSource::File(path) => read_back(path),
		}
	}
}

/// Run `editor` on a temporary file holding `document`.
///
/// Blocks until the editor exits. A non-zero exit is not an error in itself,
/// the file is read back regardless.
#[instrument(skip_all, fields(program = %editor.program))]
fn edit_in_editor(editor: &EditorCommand, document: &str) -> Result<String, EditError> {
	let mut file = tempfile::Builder::new()
		.prefix(TEMP_FILE_PREFIX)
		.suffix(".yaml")
		.tempfile()
		.map_err(EditError::TempFile)?;
	let path = file.path().to_path_buf();

	file.write_all(document.as_bytes())
		.and_then(|()| file.as_file().sync_all())
		.map_err(|source| EditError::Write {
			path: path.clone(),
			source,
		})?;

	tracing::debug!(path = %path.display(), "starting editor");
	let status = editor
		.command_for(&path)
		.status()
		.map_err(|source| EditError::Spawn {
			command: editor.command_line(&path),
			source,
		})?;
	if !status.success() {
		tracing::warn!(%status, command = %editor.command_line(&path), "editor exited unsuccessfully");
	}

	// file is removed when `file` is dropped
	read_back(&path)
}

fn read_back(path: &Path) -> Result<String, EditError> {
	fs::read_to_string(path).map_err(|source| EditError::ReadBack {
		path: path.to_path_buf(),
		source,
	})
}
