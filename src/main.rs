mod app;
mod config;
mod controller;
mod dates;
mod event;
mod marketplace;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mkdash")]
#[command(about = "A terminal dashboard for marketplace sales analytics")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/mkdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Marketplace instance id to scope the dashboard to
  #[arg(short, long)]
  instance: Option<i64>,

  /// Start from the configured defaults instead of the saved session
  #[arg(long)]
  ignore_session: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // The terminal is taken over by the UI, so logs go to a file.
  let _log_guard = init_logging();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override instance if specified on command line
  if let Some(instance) = args.instance {
    config.marketplace.instance_id = Some(instance);
  }

  // Initialize and run the app
  let mut app = app::App::new(config, args.ignore_session)?;
  app.run().await?;

  Ok(())
}

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()?.join("mkdash").join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(log_dir, "mkdash.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}
