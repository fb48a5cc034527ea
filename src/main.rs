mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod listing;
mod logging;
mod query;
mod ui;

#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::{HttpClient, Services};
use crate::cache::{NoopStorage, SnapshotStorage, SqliteStorage};
use crate::event::EventHandler;
use crate::ui::feedback::{ModalConfirm, ToastNotify};

#[derive(Parser, Debug)]
#[command(name = "d9s")]
#[command(about = "A terminal UI for Drone CI, inspired by k9s")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/d9s/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Drone server url, overrides the config file
  #[arg(short, long)]
  server: Option<String>,

  /// Namespace the dashboard starts filtered to
  #[arg(short, long)]
  namespace: Option<String>,

  /// Do not read or write the on-disk snapshot cache
  #[arg(long)]
  no_cache: bool,

  /// Debug logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.verbose)?;

  let mut config = match (&args.server, &args.config) {
    // A server on the command line makes the config file optional
    (Some(url), None) => config::Config::load(None).unwrap_or_else(|_| config::Config::for_server(url)),
    _ => config::Config::load(args.config.as_deref())?,
  };
  if let Some(url) = args.server {
    config.server.url = url;
  }
  if args.namespace.is_some() {
    config.default_namespace = args.namespace;
  }
  if args.no_cache {
    config.cache.persist = false;
  }

  let token = match config::Config::get_api_token() {
    Ok(token) => Some(token),
    Err(e) => {
      warn!("{}", e);
      None
    }
  };

  let client = HttpClient::new(&config.server, token)?;
  info!(server = client.base_url(), "starting");

  let storage: Arc<dyn SnapshotStorage> = if config.cache.persist {
    Arc::new(SqliteStorage::open(config.cache.path.as_deref())?)
  } else {
    Arc::new(NoopStorage)
  };

  // Confirm and notify post into the event loop, so it must exist first
  let events = EventHandler::new(Duration::from_millis(250));
  let services = Services::new(
    Arc::new(client),
    storage,
    Arc::new(ModalConfirm::new(events.sender())),
    Arc::new(ToastNotify::new(events.sender())),
  );

  let mut app = app::App::new(config, services);
  app.run(events).await?;

  Ok(())
}
