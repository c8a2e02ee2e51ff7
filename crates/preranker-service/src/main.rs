use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use preranker_config::ConfigLoader;
use preranker_core::Engine;
use preranker_monitoring::{init_tracing, TracingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod server;

#[derive(Parser)]
#[command(name = "preranker")]
#[command(about = "Intent pre-ranking engine", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE")]
	config: Option<PathBuf>,

	#[arg(long, env = "PRERANKER_LOG_LEVEL", default_value = "info")]
	log_level: String,

	#[arg(long)]
	log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the pre-ranking engine
	Start,
	/// Validate the configuration file and exit
	Validate,
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();

	let tracing_config = TracingConfig::from_level_str(&cli.log_level).with_json_format(cli.log_json);
	if let Err(e) = init_tracing(tracing_config) {
		eprintln!("Failed to initialize tracing: {}", e);
	}

	let result = match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	};

	// Unrecoverable bootstrap failures exit non-zero; a clean shutdown is 0.
	if let Err(e) = result {
		error!(error = %e, "Service terminated with an error");
		std::process::exit(1);
	}
}

fn load_configuration(cli: &Cli) -> Result<preranker_config::EngineConfig> {
	match &cli.config {
		Some(path) => {
			ConfigLoader::from_env_and_file(Some(path)).context("Failed to load configuration")
		}
		None => preranker_config::load_config().context("Failed to load configuration"),
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	info!("Starting pre-ranking engine service");

	let config = load_configuration(&cli)?;
	info!(service = %config.service.name, "Configuration loaded");

	let api_config = config.api.clone();

	let engine = Engine::builder()
		.with_config(config)
		.build()
		.await
		.context("Failed to build engine")?;
	let engine = Arc::new(engine);

	engine.start().await.context("Failed to start engine")?;

	let http_handle = if api_config.enabled {
		let engine_for_api = engine.clone();
		Some(tokio::spawn(async move {
			if let Err(e) = server::start_server(api_config, engine_for_api).await {
				error!(error = %e, "HTTP server exited");
			}
		}))
	} else {
		None
	};

	info!("Service started");
	shutdown_signal().await;
	info!("Shutdown signal received, stopping");

	engine.shutdown().await.context("Failed to shutdown engine")?;

	if let Some(handle) = http_handle {
		handle.abort();
	}

	info!("Service stopped");
	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	let config = load_configuration(&cli)?;
	info!(service = %config.service.name, "Configuration is valid");
	info!(rpc_url = %config.chain.rpc_url, package_id = %config.chain.package_id, "Chain source");
	info!(endpoint = %config.blob.endpoint, "Blob store");
	info!(endpoint = %config.simulator.endpoint, "Simulator");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
