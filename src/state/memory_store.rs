use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::types::{InventoryItem, Store, WantedList, WantedStoreInventory};

// ---------------------------------------------------------------------------
// InventoryDoc — one cached (list, store) inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct InventoryDoc {
    /// Creation order, used to list inventories deterministically
    seq: u64,
    items: Vec<InventoryItem>,
    fetched: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

/// In-process document store with the same semantics as the SQLite
/// repository. Each map entry is locked independently, so concurrent writes
/// to different (list, store) keys never contend.
#[derive(Default)]
pub struct MemoryRepository {
    /// list id → wanted list
    wanted: DashMap<String, WantedList>,
    /// username → store
    stores: DashMap<String, Store>,
    /// (list id, store id) → inventory
    inventories: DashMap<(String, String), InventoryDoc>,
    next_seq: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn store_by_id(&self, store_id: &str) -> Option<Store> {
        self.stores
            .iter()
            .find(|s| s.id == store_id)
            .map(|s| s.value().clone())
    }

    fn with_inventory<T>(
        &self,
        wanted_id: &str,
        store_id: &str,
        f: impl FnOnce(&mut InventoryDoc) -> T,
    ) -> Result<T> {
        let key = (wanted_id.to_string(), store_id.to_string());
        let mut doc = self.inventories.get_mut(&key).ok_or_else(|| {
            AppError::NotFound(format!("inventory of store {store_id} for wanted list {wanted_id}"))
        })?;
        Ok(f(&mut doc))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_or_create_wanted(&self, id: &str) -> Result<WantedList> {
        Ok(self
            .wanted
            .entry(id.to_string())
            .or_insert_with(|| WantedList::new(id))
            .clone())
    }

    async fn save_wanted(&self, list: &WantedList) -> Result<()> {
        self.wanted.insert(list.id.clone(), list.clone());
        Ok(())
    }

    async fn find_store_by_username(&self, username: &str) -> Result<Option<Store>> {
        Ok(self.stores.get(username).map(|s| s.value().clone()))
    }

    async fn insert_store(&self, store: &Store) -> Result<()> {
        self.stores
            .entry(store.username.clone())
            .and_modify(|existing| existing.min_buy = store.min_buy)
            .or_insert_with(|| store.clone());
        Ok(())
    }

    async fn update_store_min_buy(&self, username: &str, min_buy: Option<f64>) -> Result<()> {
        let mut store = self
            .stores
            .get_mut(username)
            .ok_or_else(|| AppError::NotFound(format!("store {username}")))?;
        store.min_buy = min_buy;
        Ok(())
    }

    async fn find_or_create_inventory(
        &self,
        wanted_id: &str,
        store: &Store,
    ) -> Result<WantedStoreInventory> {
        let doc = self
            .inventories
            .entry((wanted_id.to_string(), store.id.clone()))
            .or_insert_with(|| InventoryDoc {
                seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                items: Vec::new(),
                fetched: None,
            })
            .clone();
        Ok(WantedStoreInventory {
            wanted_id: wanted_id.to_string(),
            store: self.store_by_id(&store.id).unwrap_or_else(|| store.clone()),
            items: doc.items,
            fetched: doc.fetched,
        })
    }

    async fn reset_inventory(&self, wanted_id: &str, store_id: &str) -> Result<()> {
        self.with_inventory(wanted_id, store_id, |doc| {
            doc.items.clear();
            doc.fetched = None;
        })
    }

    async fn replace_inventory_items(
        &self,
        wanted_id: &str,
        store_id: &str,
        items: &[InventoryItem],
    ) -> Result<()> {
        self.with_inventory(wanted_id, store_id, |doc| doc.items = items.to_vec())
    }

    async fn append_inventory_items(
        &self,
        wanted_id: &str,
        store_id: &str,
        items: &[InventoryItem],
    ) -> Result<()> {
        self.with_inventory(wanted_id, store_id, |doc| doc.items.extend_from_slice(items))
    }

    async fn stamp_inventory(
        &self,
        wanted_id: &str,
        store_id: &str,
        fetched: DateTime<Utc>,
    ) -> Result<()> {
        self.with_inventory(wanted_id, store_id, |doc| doc.fetched = Some(fetched))
    }

    async fn delete_inventories(&self, wanted_id: &str) -> Result<u64> {
        let before = self.inventories.len();
        self.inventories.retain(|(list, _), _| list != wanted_id);
        Ok((before - self.inventories.len()) as u64)
    }

    async fn list_inventories(&self, wanted_id: &str) -> Result<Vec<WantedStoreInventory>> {
        let mut docs: Vec<(String, InventoryDoc)> = self
            .inventories
            .iter()
            .filter(|e| e.key().0 == wanted_id)
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect();
        docs.sort_by_key(|(_, doc)| doc.seq);

        docs.into_iter()
            .map(|(store_id, doc)| {
                let store = self
                    .store_by_id(&store_id)
                    .ok_or_else(|| AppError::NotFound(format!("store {store_id}")))?;
                Ok(WantedStoreInventory {
                    wanted_id: wanted_id.to_string(),
                    store,
                    items: doc.items,
                    fetched: doc.fetched,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Condition;

    fn store(id: &str, username: &str) -> Store {
        Store {
            id: id.to_string(),
            username: username.to_string(),
            min_buy: None,
        }
    }

    fn lot(number: &str) -> InventoryItem {
        InventoryItem {
            number: number.to_string(),
            color: None,
            quantity: 1,
            condition: Condition::Used,
            price: 1.0,
        }
    }

    #[tokio::test]
    async fn inventories_reflect_refreshed_min_buy() {
        let repo = MemoryRepository::new();
        let s = store("1", "brickhouse");
        repo.insert_store(&s).await.unwrap();
        repo.find_or_create_inventory("42", &s).await.unwrap();
        repo.update_store_min_buy("brickhouse", Some(25.0)).await.unwrap();

        let listed = repo.list_inventories("42").await.unwrap();
        assert_eq!(listed[0].store.min_buy, Some(25.0));
    }

    #[tokio::test]
    async fn insert_store_keeps_existing_identity() {
        let repo = MemoryRepository::new();
        repo.insert_store(&store("1", "brickhouse")).await.unwrap();
        repo.insert_store(&store("999", "brickhouse")).await.unwrap();
        let found = repo.find_store_by_username("brickhouse").await.unwrap().unwrap();
        assert_eq!(found.id, "1");
    }

    #[tokio::test]
    async fn delete_only_touches_one_list() {
        let repo = MemoryRepository::new();
        let s = store("1", "brickhouse");
        repo.insert_store(&s).await.unwrap();
        repo.find_or_create_inventory("42", &s).await.unwrap();
        repo.find_or_create_inventory("43", &s).await.unwrap();
        repo.append_inventory_items("43", "1", &[lot("3001")]).await.unwrap();

        assert_eq!(repo.delete_inventories("42").await.unwrap(), 1);
        let other = repo.list_inventories("43").await.unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].items.len(), 1);
    }
}
