//! Kubernetes cluster connection management.

use std::{path::PathBuf, time::Duration};

use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// Where to find the cluster and which namespace to work in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOpts {
	/// Kubeconfig file. The default lookup (`$KUBECONFIG`, `~/.kube/config`) when unset.
	pub kubeconfig: Option<PathBuf>,
	/// Context to use instead of the current context.
	pub context: Option<String>,
	/// Namespace to use instead of the context's namespace.
	pub namespace: Option<String>,
}

/// Represents a connection to a Kubernetes cluster.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	server_version: Info,
	namespace: String,
	/// Human-readable identifier for the cluster (context name or API server URL).
	cluster_identifier: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("cluster_identifier", &self.cluster_identifier)
			.field("namespace", &self.namespace)
			.field("server_version", &self.server_version)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect using the kubeconfig selected by `opts`.
	#[instrument(skip_all)]
	pub async fn connect(opts: &ConnectionOpts) -> Result<Self, ConnectionError> {
		let kubeconfig = match &opts.kubeconfig {
			Some(path) => Kubeconfig::read_from(path)?,
			None => Kubeconfig::read()?,
		};
		Self::from_kubeconfig(kubeconfig, opts).await
	}

	/// Connect using a provided kubeconfig.
	#[instrument(skip_all)]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		opts: &ConnectionOpts,
	) -> Result<Self, ConnectionError> {
		if let Some(context) = &opts.context {
			if !kubeconfig.contexts.iter().any(|c| &c.name == context) {
				return Err(ConnectionError::ContextNotFound(context.clone()));
			}
		}

		let context_name = opts
			.context
			.clone()
			.or_else(|| kubeconfig.current_context.clone());

		let mut config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: opts.context.clone(),
				..Default::default()
			},
		)
		.await?;

		let cluster_identifier = match context_name {
			Some(context) => format!("{}  (context:{})", config.cluster_url, context),
			None => config.cluster_url.to_string(),
		};

		if let Some(namespace) = &opts.namespace {
			config.default_namespace = namespace.clone();
		}
		let namespace = config.default_namespace.clone();

		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config)?;

		let server_version = client.apiserver_version().await?;

		tracing::debug!(
			cluster = %cluster_identifier,
			namespace = %namespace,
			server_version = %format!("{}.{}", server_version.major, server_version.minor),
			"connected to cluster"
		);

		Ok(Self {
			client,
			server_version,
			namespace,
			cluster_identifier,
		})
	}

	/// Get a reference to the underlying kube client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Get the server version.
	pub fn server_version(&self) -> &Info {
		&self.server_version
	}

	/// The namespace objects of namespaced resource types are looked up in.
	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Get the cluster identifier (API server URL and context name).
	pub fn cluster_identifier(&self) -> &str {
		&self.cluster_identifier
	}
}
