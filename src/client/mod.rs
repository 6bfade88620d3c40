pub mod html;
pub mod http;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::types::{InventoryItem, StoreCandidate, WantedItem};

pub use http::HttpCatalogClient;

/// The marketplace operations the pipeline depends on.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Returns false when the marketplace rejects the credentials.
    async fn login(&self, username: &str, password: &str) -> Result<bool>;

    /// Current item set of a wanted list.
    async fn wanted_items(&self, list_id: &str) -> Result<Vec<WantedItem>>;

    /// Sellers offering `item`, keyed by username.
    async fn search(&self, item: &WantedItem) -> Result<HashMap<String, StoreCandidate>>;

    /// Marketplace-internal id of the seller `username`.
    async fn resolve_store_id(&self, username: &str) -> Result<String>;

    /// One page (1-based) of the seller's lots that match the wanted list.
    /// A full page holds [`crate::config::INVENTORY_PAGE_SIZE`] rows.
    async fn fetch_page(&self, list_id: &str, store_id: &str, page: u32)
        -> Result<Vec<InventoryItem>>;
}

/// Run one remote call under a deadline.
pub async fn with_deadline<T>(
    op: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            op,
            secs: limit.as_secs(),
        }),
    }
}
