pub mod models;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{InventoryItem, Store, WantedList, WantedStoreInventory};

pub use sqlite::SqliteRepository;

/// Keyed document store behind the pipeline. Every write touches a single
/// record (a list, a store, or one list+store inventory); nothing spans
/// records, so an interrupted run leaves each record individually consistent.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_or_create_wanted(&self, id: &str) -> Result<WantedList>;

    async fn save_wanted(&self, list: &WantedList) -> Result<()>;

    async fn find_store_by_username(&self, username: &str) -> Result<Option<Store>>;

    async fn insert_store(&self, store: &Store) -> Result<()>;

    /// Refresh the minimum-purchase threshold, leaving the identity untouched.
    async fn update_store_min_buy(&self, username: &str, min_buy: Option<f64>) -> Result<()>;

    async fn find_or_create_inventory(
        &self,
        wanted_id: &str,
        store: &Store,
    ) -> Result<WantedStoreInventory>;

    /// Drop cached items and the fetched stamp.
    async fn reset_inventory(&self, wanted_id: &str, store_id: &str) -> Result<()>;

    async fn replace_inventory_items(
        &self,
        wanted_id: &str,
        store_id: &str,
        items: &[InventoryItem],
    ) -> Result<()>;

    async fn append_inventory_items(
        &self,
        wanted_id: &str,
        store_id: &str,
        items: &[InventoryItem],
    ) -> Result<()>;

    async fn stamp_inventory(
        &self,
        wanted_id: &str,
        store_id: &str,
        fetched: DateTime<Utc>,
    ) -> Result<()>;

    /// Delete every inventory of a list. Returns how many were removed.
    async fn delete_inventories(&self, wanted_id: &str) -> Result<u64>;

    /// Inventories of a list in creation order, joined with current store data.
    async fn list_inventories(&self, wanted_id: &str) -> Result<Vec<WantedStoreInventory>>;
}
