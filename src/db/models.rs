//! Row types matching `migrations/`. Item sequences are stored as JSON
//! documents.

use chrono::{DateTime, Utc};
use sqlx::types::Json;

use crate::types::{InventoryItem, Store, WantedItem, WantedList, WantedStoreInventory};

#[derive(Debug, sqlx::FromRow)]
pub struct WantedListRow {
    pub id: String,
    pub items: Json<Vec<WantedItem>>,
    pub fetched: Option<DateTime<Utc>>,
}

impl From<WantedListRow> for WantedList {
    fn from(row: WantedListRow) -> Self {
        WantedList {
            id: row.id,
            items: row.items.0,
            fetched: row.fetched,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct StoreRow {
    pub id: String,
    pub username: String,
    pub min_buy: Option<f64>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Store {
            id: row.id,
            username: row.username,
            min_buy: row.min_buy,
        }
    }
}

/// `wanted_stores` joined with `stores`.
#[derive(Debug, sqlx::FromRow)]
pub struct InventoryRow {
    pub wanted_id: String,
    pub store_id: String,
    pub username: String,
    pub min_buy: Option<f64>,
    pub items: Json<Vec<InventoryItem>>,
    pub fetched: Option<DateTime<Utc>>,
}

impl From<InventoryRow> for WantedStoreInventory {
    fn from(row: InventoryRow) -> Self {
        WantedStoreInventory {
            wanted_id: row.wanted_id,
            store: Store {
                id: row.store_id,
                username: row.username,
                min_buy: row.min_buy,
            },
            items: row.items.0,
            fetched: row.fetched,
        }
    }
}
