use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "sessiond")]
#[command(about = "Multi-tenant messaging session daemon")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file (defaults to <config dir>/sessiond/config.json when present)
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Address for the HTTP control surface
	#[arg(long, env = "SESSIOND_LISTEN", value_name = "ADDR")]
	pub listen: Option<String>,

	/// POST every session event to this URL
	#[arg(long, env = "SESSIOND_WEBHOOK_URL", value_name = "URL")]
	pub webhook_url: Option<String>,

	/// Serve the event stream on /ws
	#[arg(long, env = "SESSIOND_ENABLE_WEBSOCKET")]
	pub enable_websocket: bool,

	/// Directory holding one JSON record per session
	#[arg(long, env = "SESSIOND_STORE_DIR", value_name = "DIR", conflicts_with = "memory_store")]
	pub store_dir: Option<PathBuf>,

	/// Keep session records in memory only
	#[arg(long)]
	pub memory_store: bool,

	/// Driver program hosting the messaging client (one process per session)
	#[arg(long, env = "SESSIOND_DRIVER", value_name = "PROGRAM")]
	pub driver: Option<PathBuf>,

	/// Extra argument passed to the driver (repeatable)
	#[arg(long = "driver-arg", value_name = "ARG", allow_hyphen_values = true)]
	pub driver_args: Vec<String>,

	/// Cap on sessions starting at once during boot restore
	#[arg(long, value_name = "N")]
	pub max_concurrent_restores: Option<usize>,

	/// Continue with zero sessions when the store cannot be listed at boot
	#[arg(long)]
	pub degrade_restore: bool,
}
