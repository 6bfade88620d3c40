use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::aggregator::aggregate;
use crate::client::CatalogClient;
use crate::config::{Config, SolverSettings};
use crate::crawler::crawl_inventories;
use crate::db::Repository;
use crate::directory::resolve_stores;
use crate::discovery::discover_sellers;
use crate::error::Result;
use crate::queue::ConcurrencyLimit;
use crate::solver::{handoff, Solver};
use crate::wanted::synchronize;

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub concurrency: usize,
    pub cache_days: i64,
    pub request_timeout: Duration,
    pub solver: SolverSettings,
}

impl From<&Config> for RunSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            concurrency: cfg.concurrency,
            cache_days: cfg.store_cache_days,
            request_timeout: cfg.request_timeout,
            solver: cfg.solver.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub items: usize,
    pub sellers: usize,
    pub stores: usize,
    pub cache_hits: usize,
    pub crawled: usize,
    /// Searches and page fetches that failed
    pub failed_tasks: usize,
    pub availability_rows: usize,
}

/// One end-to-end pass over a wanted list. Every stage finishes before the
/// next one starts; all remote calls share one concurrency limit.
pub struct Pipeline {
    repo: Arc<dyn Repository>,
    client: Arc<dyn CatalogClient>,
    solver: Arc<dyn Solver>,
    limit: ConcurrencyLimit,
    settings: RunSettings,
}

impl Pipeline {
    pub fn new(
        repo: Arc<dyn Repository>,
        client: Arc<dyn CatalogClient>,
        solver: Arc<dyn Solver>,
        settings: RunSettings,
    ) -> Self {
        Self {
            limit: ConcurrencyLimit::new(settings.concurrency),
            repo,
            client,
            solver,
            settings,
        }
    }

    pub async fn run(&self, list_id: &str) -> Result<RunSummary> {
        let timeout = self.settings.request_timeout;
        let mut summary = RunSummary::default();
        debug!(list_id, permits = self.limit.max(), ?timeout, "Run started");

        let mut list = synchronize(self.repo.as_ref(), self.client.as_ref(), list_id).await?;
        summary.items = list.items.len();

        let discovery =
            discover_sellers(Arc::clone(&self.client), &self.limit, &list.items, timeout).await;
        summary.sellers = discovery.sellers.len();

        let stores = resolve_stores(
            self.repo.as_ref(),
            self.client.as_ref(),
            &self.limit,
            discovery.sellers.values(),
            timeout,
        )
        .await?;
        summary.stores = stores.len();

        let crawl = crawl_inventories(
            Arc::clone(&self.repo),
            Arc::clone(&self.client),
            &self.limit,
            list_id,
            &stores,
            self.settings.cache_days,
            timeout,
        )
        .await;
        summary.cache_hits = crawl.cache_hits;
        summary.crawled = crawl.crawled;
        summary.failed_tasks = discovery.failed_searches + crawl.failed;

        if summary.failed_tasks == 0 {
            list.fetched = Some(Utc::now());
            self.repo.save_wanted(&list).await?;
        }

        let inventories = self.repo.list_inventories(list_id).await?;
        let rows = aggregate(&inventories);
        summary.availability_rows = rows.len();
        info!(
            list_id,
            inventories = inventories.len(),
            rows = rows.len(),
            "Availability aggregated: {} rows from {} store inventories",
            rows.len(),
            inventories.len(),
        );

        handoff(&self.settings.solver, &list, &rows, self.solver.as_ref()).await?;
        Ok(summary)
    }
}
