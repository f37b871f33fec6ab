use anyhow::{Context, Result};
use clap::Parser;
use sessiond_cli::app::App;
use sessiond_cli::cli::Cli;
use sessiond_cli::{config, http, logging};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = run(cli).await {
		error!(target = "sessiond", error = %format!("{err:#}"), "sessiond failed");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<()> {
	let config = config::resolve(&cli)?;
	let app = App::from_config(&config)?;

	let report = app.manager.restore_all().await.context("boot restore failed")?;
	info!(
		target = "sessiond",
		started = report.started.len(),
		skipped = report.skipped.len(),
		"boot restore dispatched"
	);

	let addr = config.listen_addr()?;
	let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind to {addr}"))?;
	http::serve(listener, app, shutdown_signal()).await.context("server error")?;

	info!(target = "sessiond", "shut down cleanly");
	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		error!(target = "sessiond", error = %err, "failed to listen for ctrl-c; shutting down");
	}
	info!(target = "sessiond", "shutdown requested");
}
