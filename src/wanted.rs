use tracing::info;

use crate::client::CatalogClient;
use crate::db::Repository;
use crate::error::Result;
use crate::types::{WantedItem, WantedList};

/// Bring the stored wanted list in line with the marketplace. When the item
/// set changed, every cached store inventory of the list is deleted before
/// the list is saved, so no crawl can pair the new items with old inventory.
pub async fn synchronize(
    repo: &dyn Repository,
    client: &dyn CatalogClient,
    list_id: &str,
) -> Result<WantedList> {
    info!(list_id, "Fetching wanted list {list_id}");
    let mut list = repo.find_or_create_wanted(list_id).await?;
    let fresh = client.wanted_items(list_id).await?;

    if item_set_changed(&list.items, &fresh) {
        let dropped = repo.delete_inventories(list_id).await?;
        info!(
            list_id,
            before = list.items.len(),
            after = fresh.len(),
            invalidated = dropped,
            "Wanted list changed: {} → {} items, {dropped} store inventories invalidated",
            list.items.len(),
            fresh.len(),
        );
        list.items = fresh;
        list.fetched = None;
    }

    repo.save_wanted(&list).await?;
    Ok(list)
}

/// Compares the `(key, quantity)` multisets, so a change in size is always
/// detected and so is an edit that keeps the size.
pub fn item_set_changed(stored: &[WantedItem], fresh: &[WantedItem]) -> bool {
    if stored.len() != fresh.len() {
        return true;
    }
    fingerprint(stored) != fingerprint(fresh)
}

fn fingerprint(items: &[WantedItem]) -> Vec<(String, u32)> {
    let mut keys: Vec<(String, u32)> = items.iter().map(|i| (i.key(), i.quantity)).collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryRepository;
    use crate::testkit::{wanted, MockCatalog};
    use crate::types::Store;
    use chrono::Utc;

    #[tokio::test]
    async fn first_sync_creates_and_fills_the_list() {
        let repo = MemoryRepository::new();
        let client = MockCatalog::new().with_wanted(vec![wanted("3001", 2), wanted("3002", 1)]);

        let list = synchronize(repo.as_ref(), &client, "42").await.unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(repo.find_or_create_wanted("42").await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn growing_item_set_invalidates_store_inventories() {
        let repo = MemoryRepository::new();
        let mut list = WantedList::new("42");
        list.items = vec![wanted("3001", 1), wanted("3002", 1), wanted("3003", 1)];
        list.fetched = Some(Utc::now());
        repo.save_wanted(&list).await.unwrap();

        let store = Store { id: "9".into(), username: "brickhouse".into(), min_buy: None };
        repo.insert_store(&store).await.unwrap();
        repo.find_or_create_inventory("42", &store).await.unwrap();

        let mut remote = list.items.clone();
        remote.push(wanted("3004", 1));
        let client = MockCatalog::new().with_wanted(remote);

        let synced = synchronize(repo.as_ref(), &client, "42").await.unwrap();
        assert_eq!(synced.items.len(), 4);
        assert!(synced.fetched.is_none());
        assert!(repo.list_inventories("42").await.unwrap().is_empty());
        assert!(repo.find_or_create_wanted("42").await.unwrap().fetched.is_none());
    }

    #[tokio::test]
    async fn unchanged_item_set_keeps_cache() {
        let repo = MemoryRepository::new();
        let mut list = WantedList::new("42");
        list.items = vec![wanted("3001", 1)];
        list.fetched = Some(Utc::now());
        repo.save_wanted(&list).await.unwrap();

        let store = Store { id: "9".into(), username: "brickhouse".into(), min_buy: None };
        repo.insert_store(&store).await.unwrap();
        repo.find_or_create_inventory("42", &store).await.unwrap();

        let client = MockCatalog::new().with_wanted(list.items.clone());
        let synced = synchronize(repo.as_ref(), &client, "42").await.unwrap();
        assert!(synced.fetched.is_some());
        assert_eq!(repo.list_inventories("42").await.unwrap().len(), 1);
    }

    #[test]
    fn same_size_edit_counts_as_change() {
        let a = vec![wanted("3001", 1), wanted("3002", 1)];
        let b = vec![wanted("3001", 1), wanted("3002", 5)];
        let reordered = vec![wanted("3002", 1), wanted("3001", 1)];
        assert!(item_set_changed(&a, &b));
        assert!(!item_set_changed(&a, &reordered));
    }

    #[tokio::test]
    async fn remote_failure_propagates() {
        let repo = MemoryRepository::new();
        let client = MockCatalog::new().failing_wanted();
        assert!(synchronize(repo.as_ref(), &client, "42").await.is_err());
    }
}
