use std::time::Duration;

use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use crate::client::{with_deadline, CatalogClient};
use crate::db::Repository;
use crate::error::Result;
use crate::queue::ConcurrencyLimit;
use crate::types::{Store, StoreCandidate};

/// Return the persisted store for a discovered seller. A seller seen for the
/// first time gets its internal id looked up; the threshold is refreshed
/// from the latest observation every time.
pub async fn upsert_store(
    repo: &dyn Repository,
    client: &dyn CatalogClient,
    candidate: &StoreCandidate,
    timeout: Duration,
) -> Result<Store> {
    match repo.find_store_by_username(&candidate.username).await? {
        Some(mut store) => {
            repo.update_store_min_buy(&store.username, candidate.min_buy)
                .await?;
            store.min_buy = candidate.min_buy;
            Ok(store)
        }
        None => {
            let id = with_deadline(
                "store id lookup",
                timeout,
                client.resolve_store_id(&candidate.username),
            )
            .await?;
            let store = Store {
                id,
                username: candidate.username.clone(),
                min_buy: candidate.min_buy,
            };
            repo.insert_store(&store).await?;
            debug!(store = %store.username, id = %store.id, "New store registered");
            Ok(store)
        }
    }
}

/// Map [`upsert_store`] over every candidate, sharing the run's concurrency
/// limit. The first seller whose id cannot be resolved fails the stage.
pub async fn resolve_stores<'a>(
    repo: &dyn Repository,
    client: &dyn CatalogClient,
    limit: &ConcurrencyLimit,
    candidates: impl IntoIterator<Item = &'a StoreCandidate>,
    timeout: Duration,
) -> Result<Vec<Store>> {
    let lookups = candidates.into_iter().map(|candidate| async move {
        let _permit = limit.acquire().await;
        upsert_store(repo, client, candidate, timeout)
            .await
            .inspect_err(|e| warn!(store = %candidate.username, "Store lookup failed: {e}"))
    });

    let stores = try_join_all(lookups).await?;
    info!(stores = stores.len(), "Stores resolved: {} ready", stores.len());
    Ok(stores)
}
