use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::client::{with_deadline, CatalogClient};
use crate::config::INVENTORY_PAGE_SIZE;
use crate::db::Repository;
use crate::queue::{ConcurrencyLimit, TaskQueue};
use crate::types::Store;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlReport {
    /// Inventories still within the cache window, not fetched
    pub cache_hits: usize,
    /// Inventories fetched through their last page this run
    pub crawled: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
struct PageJob {
    store: Store,
    page: u32,
}

/// An inventory stamped at `fetched` is reused until `cache_days` have passed.
pub fn is_fresh(fetched: Option<DateTime<Utc>>, now: DateTime<Utc>, cache_days: i64) -> bool {
    match fetched {
        Some(at) => now - at < chrono::Duration::days(cache_days),
        None => false,
    }
}

/// Bring every store's inventory for `list_id` up to date.
///
/// Stale inventories are reset and re-crawled from page 1. Each page is saved
/// as soon as it arrives (page 1 replaces, later pages append) and a full
/// page queues the next one. The fetched stamp is written only after the
/// short final page, so a crawl cut off midway is never taken for a cache
/// hit on the next run.
pub async fn crawl_inventories(
    repo: Arc<dyn Repository>,
    client: Arc<dyn CatalogClient>,
    limit: &ConcurrencyLimit,
    list_id: &str,
    stores: &[Store],
    cache_days: i64,
    timeout: Duration,
) -> CrawlReport {
    let mut report = CrawlReport::default();
    let queue = TaskQueue::new("crawl", limit.clone());
    let now = Utc::now();

    for store in stores {
        let inventory = match repo.find_or_create_inventory(list_id, store).await {
            Ok(inv) => inv,
            Err(e) => {
                warn!(store = %store.username, "Cannot load inventory: {e}");
                report.failed += 1;
                continue;
            }
        };

        if is_fresh(inventory.fetched, now, cache_days) {
            debug!(store = %store.username, "Inventory cached");
            report.cache_hits += 1;
            continue;
        }

        if let Err(e) = repo.reset_inventory(list_id, &store.id).await {
            warn!(store = %store.username, "Cannot reset inventory: {e}");
            report.failed += 1;
            continue;
        }
        queue.push(PageJob {
            store: store.clone(),
            page: 1,
        });
    }

    let list_id = list_id.to_string();
    let drained = queue
        .drain(move |job, handle| {
            let repo = Arc::clone(&repo);
            let client = Arc::clone(&client);
            let list_id = list_id.clone();
            async move {
                let PageJob { store, page } = job;
                let items = with_deadline(
                    "inventory page",
                    timeout,
                    client.fetch_page(&list_id, &store.id, page),
                )
                .await?;

                if page == 1 {
                    repo.replace_inventory_items(&list_id, &store.id, &items).await?;
                } else {
                    repo.append_inventory_items(&list_id, &store.id, &items).await?;
                }
                debug!(store = %store.username, page, lots = items.len(), "Inventory page saved");

                if items.len() == INVENTORY_PAGE_SIZE {
                    handle.push(PageJob { store, page: page + 1 });
                    return Ok(None);
                }

                repo.stamp_inventory(&list_id, &store.id, Utc::now()).await?;
                Ok(Some(store.username))
            }
        })
        .await;

    // Only the last page of a store yields a name; a failed page ends its chain.
    report.crawled = drained.results.iter().flatten().count();
    report.failed += drained.failed;

    info!(
        cached = report.cache_hits,
        crawled = report.crawled,
        failed = report.failed,
        "Inventory crawl complete: {} cached, {} crawled, {} failed",
        report.cache_hits,
        report.crawled,
        report.failed,
    );
    report
}
