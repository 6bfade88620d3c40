use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::db::models::{InventoryRow, StoreRow, WantedListRow};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::types::{InventoryItem, Store, WantedList, WantedStoreInventory};

const INVENTORY_SELECT: &str = r#"
    SELECT ws.wanted_id, ws.store_id, s.username, s.min_buy, ws.items, ws.fetched
    FROM wanted_stores ws
    JOIN stores s ON s.id = ws.store_id
"#;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn open(db_path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database; lives as long as the single pooled connection.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn load_items(&self, wanted_id: &str, store_id: &str) -> Result<Vec<InventoryItem>> {
        let items: Option<Json<Vec<InventoryItem>>> = sqlx::query_scalar(
            "SELECT items FROM wanted_stores WHERE wanted_id = ? AND store_id = ?",
        )
        .bind(wanted_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        items
            .map(|j| j.0)
            .ok_or_else(|| missing_inventory(wanted_id, store_id))
    }
}

fn missing_inventory(wanted_id: &str, store_id: &str) -> AppError {
    AppError::NotFound(format!("inventory of store {store_id} for wanted list {wanted_id}"))
}

fn expect_one(affected: u64, wanted_id: &str, store_id: &str) -> Result<()> {
    if affected == 0 {
        Err(missing_inventory(wanted_id, store_id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn find_or_create_wanted(&self, id: &str) -> Result<WantedList> {
        sqlx::query("INSERT OR IGNORE INTO wanted_lists (id) VALUES (?)")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let row: WantedListRow =
            sqlx::query_as("SELECT id, items, fetched FROM wanted_lists WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.into())
    }

    async fn save_wanted(&self, list: &WantedList) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wanted_lists (id, items, fetched) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                items = excluded.items,
                fetched = excluded.fetched
            "#,
        )
        .bind(&list.id)
        .bind(Json(&list.items))
        .bind(list.fetched)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_store_by_username(&self, username: &str) -> Result<Option<Store>> {
        let row: Option<StoreRow> =
            sqlx::query_as("SELECT id, username, min_buy FROM stores WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Store::from))
    }

    async fn insert_store(&self, store: &Store) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stores (id, username, min_buy) VALUES (?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET min_buy = excluded.min_buy
            "#,
        )
        .bind(&store.id)
        .bind(&store.username)
        .bind(store.min_buy)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_store_min_buy(&self, username: &str, min_buy: Option<f64>) -> Result<()> {
        let done = sqlx::query("UPDATE stores SET min_buy = ? WHERE username = ?")
            .bind(min_buy)
            .bind(username)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("store {username}")));
        }
        Ok(())
    }

    async fn find_or_create_inventory(
        &self,
        wanted_id: &str,
        store: &Store,
    ) -> Result<WantedStoreInventory> {
        sqlx::query("INSERT OR IGNORE INTO wanted_stores (wanted_id, store_id) VALUES (?, ?)")
            .bind(wanted_id)
            .bind(&store.id)
            .execute(&self.pool)
            .await?;
        let row: InventoryRow = sqlx::query_as(&format!(
            "{INVENTORY_SELECT} WHERE ws.wanted_id = ? AND ws.store_id = ?"
        ))
        .bind(wanted_id)
        .bind(&store.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn reset_inventory(&self, wanted_id: &str, store_id: &str) -> Result<()> {
        let done = sqlx::query(
            "UPDATE wanted_stores SET items = '[]', fetched = NULL WHERE wanted_id = ? AND store_id = ?",
        )
        .bind(wanted_id)
        .bind(store_id)
        .execute(&self.pool)
        .await?;
        expect_one(done.rows_affected(), wanted_id, store_id)
    }

    async fn replace_inventory_items(
        &self,
        wanted_id: &str,
        store_id: &str,
        items: &[InventoryItem],
    ) -> Result<()> {
        let done = sqlx::query("UPDATE wanted_stores SET items = ? WHERE wanted_id = ? AND store_id = ?")
            .bind(Json(items))
            .bind(wanted_id)
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        expect_one(done.rows_affected(), wanted_id, store_id)
    }

    async fn append_inventory_items(
        &self,
        wanted_id: &str,
        store_id: &str,
        items: &[InventoryItem],
    ) -> Result<()> {
        // Pages of one inventory are fetched one after another, so the
        // read-modify-write cannot race another append to the same row.
        let mut current = self.load_items(wanted_id, store_id).await?;
        current.extend_from_slice(items);
        self.replace_inventory_items(wanted_id, store_id, &current).await
    }

    async fn stamp_inventory(
        &self,
        wanted_id: &str,
        store_id: &str,
        fetched: DateTime<Utc>,
    ) -> Result<()> {
        let done = sqlx::query("UPDATE wanted_stores SET fetched = ? WHERE wanted_id = ? AND store_id = ?")
            .bind(fetched)
            .bind(wanted_id)
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        expect_one(done.rows_affected(), wanted_id, store_id)
    }

    async fn delete_inventories(&self, wanted_id: &str) -> Result<u64> {
        let done = sqlx::query("DELETE FROM wanted_stores WHERE wanted_id = ?")
            .bind(wanted_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn list_inventories(&self, wanted_id: &str) -> Result<Vec<WantedStoreInventory>> {
        let rows: Vec<InventoryRow> = sqlx::query_as(&format!(
            "{INVENTORY_SELECT} WHERE ws.wanted_id = ? ORDER BY ws.seq"
        ))
        .bind(wanted_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(WantedStoreInventory::from).collect())
    }
}
