use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use temp_relay::cli::{Cli, Commands};
use temp_relay::client::{FetchCoordinator, Poller};
use temp_relay::config::Config;
use temp_relay::error::Result;
use temp_relay::fetch::ReadingFetcher;
use temp_relay::history::{default_retention, HistoryStore};
use temp_relay::server::{self, AppState};
use temp_relay::storage::HistoryBlob;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::load(Path::new(&cli.config))?;

    match cli.command {
        Commands::Serve => serve(&config).await,
        Commands::Watch => watch(&config).await,
        Commands::Fetch => fetch_once(&config).await,
    }
}

async fn serve(config: &Config) -> Result<()> {
    let fetcher = ReadingFetcher::new(&config.upstream)?;
    let history = match &config.server.history_dir {
        Some(dir) => HistoryStore::with_persistence(default_retention(), HistoryBlob::new(dir)),
        None => HistoryStore::new(default_retention()),
    };

    let state = AppState {
        fetcher: Arc::new(fetcher),
        history: Arc::new(history),
    };
    server::serve(&config.server.bind_addr, state).await
}

async fn watch(config: &Config) -> Result<()> {
    let coordinator = Arc::new(FetchCoordinator::new(
        &config.client.endpoint,
        Duration::from_secs(config.client.request_timeout_secs),
    )?);

    let _poller = Poller::start(
        Arc::clone(&coordinator),
        Duration::from_secs(config.client.poll_interval_secs),
    );

    tokio::signal::ctrl_c().await?;
    Ok(())
}

async fn fetch_once(config: &Config) -> Result<()> {
    let fetcher = ReadingFetcher::new(&config.upstream)?;
    let reading = fetcher.fetch().await?;
    println!("inside:  {:.1} C", reading.inside);
    println!("outside: {:.1} C", reading.outside);
    Ok(())
}
