mod aggregator;
mod client;
mod config;
mod crawler;
mod db;
mod directory;
mod discovery;
mod error;
mod pipeline;
mod queue;
mod solver;
mod state;
mod types;
mod wanted;

#[cfg(test)]
mod testkit;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::client::{CatalogClient, HttpCatalogClient};
use crate::config::Config;
use crate::db::{Repository, SqliteRepository};
use crate::error::{AppError, Result};
use crate::pipeline::{Pipeline, RunSettings};
use crate::solver::ProcessSolver;
use crate::state::MemoryRepository;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Storage ---
    let repo: Arc<dyn Repository> = if cfg.db_path == ":memory:" {
        warn!("DB_PATH is :memory:, nothing will be cached between runs");
        MemoryRepository::new()
    } else {
        let repo = SqliteRepository::open(&cfg.db_path).await?;
        info!("Database ready at {}", cfg.db_path);
        Arc::new(repo)
    };

    // --- Marketplace session ---
    let client = Arc::new(HttpCatalogClient::new(&cfg)?);
    info!(user = %cfg.username, "Logging in as {}", cfg.username);
    if !client.login(&cfg.username, &cfg.password).await? {
        return Err(AppError::Auth(format!("login rejected for {}", cfg.username)));
    }

    // --- Run ---
    info!(
        list_id = %cfg.wanted_list_id,
        concurrency = cfg.concurrency,
        cache_days = cfg.store_cache_days,
        "Planning wanted list {} ({} concurrent requests, {}d store cache)",
        cfg.wanted_list_id,
        cfg.concurrency,
        cfg.store_cache_days,
    );
    let solver = Arc::new(ProcessSolver::from_settings(&cfg.solver));
    let pipeline = Pipeline::new(repo, client, solver, RunSettings::from(&cfg));
    let summary = pipeline.run(&cfg.wanted_list_id).await?;

    info!(
        "Run complete: {} items, {} sellers, {} stores ({} cached, {} crawled), {} availability rows",
        summary.items,
        summary.sellers,
        summary.stores,
        summary.cache_hits,
        summary.crawled,
        summary.availability_rows,
    );
    if summary.failed_tasks > 0 {
        warn!(
            "{} remote tasks failed; their stores stay unstamped and are retried next run",
            summary.failed_tasks
        );
    }
    Ok(())
}
