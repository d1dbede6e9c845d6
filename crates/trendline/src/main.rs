use anyhow::{Context, Result};
use clap::Parser;
use scout::TrendsClient;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use trendline::{pipeline, Cli, Settings};

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

  info!("Starting trendline v{}", env!("CARGO_PKG_VERSION"));

  let run = cli.run_config().context("Failed to load run configuration")?;
  let settings = Settings::from_env();
  let client = TrendsClient::new().context("Failed to build Trends client")?;

  info!(sink = %cli.sink, project = %settings.project_id, "Configuration loaded");
  pipeline::run(&client, &run, &settings, cli.sink).await
}
