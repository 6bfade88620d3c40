use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::client::{with_deadline, CatalogClient};
use crate::queue::{ConcurrencyLimit, TaskQueue};
use crate::types::{StoreCandidate, WantedItem};

#[derive(Debug, Default)]
pub struct Discovery {
    /// username → latest observation
    pub sellers: BTreeMap<String, StoreCandidate>,
    pub failed_searches: usize,
}

/// Search every wanted item for sellers, at most `limit` searches in flight.
///
/// Results are merged after the queue drains, in wanted-list order, so when
/// two items see the same seller the later item's threshold wins regardless
/// of which search finished first. A failed search is logged by the queue
/// and contributes nothing.
pub async fn discover_sellers(
    client: Arc<dyn CatalogClient>,
    limit: &ConcurrencyLimit,
    items: &[WantedItem],
    timeout: Duration,
) -> Discovery {
    let queue = TaskQueue::new("discovery", limit.clone());
    queue.extend(items.iter().cloned().enumerate());

    let total = items.len();
    let drained = queue
        .drain(move |(idx, item), handle| {
            let client = Arc::clone(&client);
            async move {
                debug!(
                    item = %item.key(),
                    queued = handle.outstanding(),
                    "Search item {} ({}/{total})",
                    item.key(),
                    idx + 1,
                );
                let found = with_deadline("search", timeout, client.search(&item)).await?;
                Ok((idx, found))
            }
        })
        .await;

    let mut per_item: Vec<(usize, HashMap<String, StoreCandidate>)> = drained.results;
    per_item.sort_by_key(|(idx, _)| *idx);

    let mut sellers = BTreeMap::new();
    for (_, found) in per_item {
        sellers.extend(found);
    }

    info!(
        items = total,
        sellers = sellers.len(),
        failed = drained.failed,
        "Seller discovery complete: {} sellers from {total} items ({} searches failed)",
        sellers.len(),
        drained.failed,
    );

    Discovery {
        sellers,
        failed_searches: drained.failed,
    }
}
