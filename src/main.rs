mod allocation;
mod calendar;
mod config;
mod error;
mod identity;
mod ledger;
mod models;
mod report;
mod run;
mod store;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = config::Config::load()?;
    init_tracing(&config)?;

    let args: Vec<String> = std::env::args().collect();
    let mut identity = identity::LocalIdentity::open(&config.session_path)
        .context("Failed to load session")?;

    if config.is_in_memory() {
        run::as_cli(&args, store::MemoryStore::new(), &mut identity)?;
    } else {
        let db = store::SqliteStore::open(&config.db_path)
            .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
        run::as_cli(&args, db, &mut identity)?;
    }
    Ok(())
}

fn init_tracing(config: &config::Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)
            .with_context(|| format!("Invalid log filter: {}", config.log_filter))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}
