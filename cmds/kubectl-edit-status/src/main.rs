use anyhow::Result;
use clap::Parser;
use kubectl_edit_status::commands::edit_status::{self, EditStatusArgs};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

const EXAMPLES: &str = "\
Examples:
  # Edit the status of a deployment in the current namespace
  kubectl edit-status deployment my-app

  # Short names and group-qualified names work too
  kubectl edit-status mr/my-object
  kubectl edit-status myresources.example.com my-object

  # Skip scope discovery for a cluster-scoped custom resource
  kubectl edit-status --namespaced=false clusterwidgets my-widget

  # Apply a status edited beforehand
  kubectl edit-status deploy my-app -f status.yaml";

#[derive(Parser)]
#[command(name = "kubectl edit-status", bin_name = "kubectl edit-status")]
#[command(about = "Edit /status subresource", long_about = None)]
#[command(version, after_help = EXAMPLES)]
struct Cli {
	#[command(flatten)]
	args: EditStatusArgs,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	edit_status::run(cli.args)
}
