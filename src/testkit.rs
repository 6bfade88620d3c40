//! Scripted collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::CatalogClient;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::solver::Solver;
use crate::types::{Condition, InventoryItem, StoreCandidate, WantedItem};

pub fn wanted(number: &str, quantity: u32) -> WantedItem {
    WantedItem {
        number: number.to_string(),
        color: Some("X".to_string()),
        quantity,
        condition: Some("X".to_string()),
    }
}

pub fn lot(number: &str, color: &str, condition: Condition, quantity: u32, price: f64) -> InventoryItem {
    InventoryItem {
        number: number.to_string(),
        color: Some(color.to_string()),
        quantity,
        condition,
        price,
    }
}

/// In-memory marketplace. Unknown stores have an empty catalog; every
/// username resolves to `id-<username>` unless scripted otherwise.
#[derive(Default)]
pub struct MockCatalog {
    wanted: Option<Vec<WantedItem>>,
    sellers: HashMap<String, Vec<StoreCandidate>>,
    failing_searches: HashSet<String>,
    failing_resolves: HashSet<String>,
    page_sizes: HashMap<String, Vec<usize>>,
    failing_pages: HashSet<(String, u32)>,
    observer: Option<Arc<dyn Repository>>,

    pub search_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub page_calls: Mutex<Vec<(String, u32)>>,
    /// For each page fetch: whether the inventory was already stamped
    pub stamped_before_fetch: Mutex<Vec<(u32, bool)>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wanted(mut self, items: Vec<WantedItem>) -> Self {
        self.wanted = Some(items);
        self
    }

    pub fn failing_wanted(mut self) -> Self {
        self.wanted = None;
        self
    }

    pub fn with_sellers(mut self, number: &str, sellers: &[(&str, Option<f64>)]) -> Self {
        self.sellers.insert(
            number.to_string(),
            sellers
                .iter()
                .map(|(username, min_buy)| StoreCandidate {
                    username: username.to_string(),
                    min_buy: *min_buy,
                })
                .collect(),
        );
        self
    }

    pub fn failing_search(mut self, number: &str) -> Self {
        self.failing_searches.insert(number.to_string());
        self
    }

    pub fn failing_resolve(mut self, username: &str) -> Self {
        self.failing_resolves.insert(username.to_string());
        self
    }

    /// Page `n` (1-based) of `store_id` returns `sizes[n - 1]` lots.
    pub fn with_pages(mut self, store_id: &str, sizes: &[usize]) -> Self {
        self.page_sizes.insert(store_id.to_string(), sizes.to_vec());
        self
    }

    pub fn failing_page(mut self, store_id: &str, page: u32) -> Self {
        self.failing_pages.insert((store_id.to_string(), page));
        self
    }

    pub fn observing(mut self, repo: Arc<dyn Repository>) -> Self {
        self.observer = Some(repo);
        self
    }

    pub fn page_call_count(&self) -> usize {
        self.page_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn login(&self, username: &str, password: &str) -> Result<bool> {
        Ok(!username.is_empty() && password == "secret")
    }

    async fn wanted_items(&self, list_id: &str) -> Result<Vec<WantedItem>> {
        self.wanted
            .clone()
            .ok_or_else(|| AppError::Parse(format!("wanted list {list_id} unavailable")))
    }

    async fn search(&self, item: &WantedItem) -> Result<HashMap<String, StoreCandidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_searches.contains(&item.number) {
            return Err(AppError::Status { status: 503, url: format!("search/{}", item.number) });
        }
        Ok(self
            .sellers
            .get(&item.number)
            .into_iter()
            .flatten()
            .map(|s| (s.username.clone(), s.clone()))
            .collect())
    }

    async fn resolve_store_id(&self, username: &str) -> Result<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_resolves.contains(username) {
            return Err(AppError::Parse(format!("no store id for {username}")));
        }
        Ok(format!("id-{username}"))
    }

    async fn fetch_page(&self, list_id: &str, store_id: &str, page: u32) -> Result<Vec<InventoryItem>> {
        self.page_calls.lock().unwrap().push((store_id.to_string(), page));

        if let Some(repo) = &self.observer {
            let stamped = repo
                .list_inventories(list_id)
                .await?
                .iter()
                .any(|inv| inv.store.id == store_id && inv.fetched.is_some());
            self.stamped_before_fetch.lock().unwrap().push((page, stamped));
        }

        if self.failing_pages.contains(&(store_id.to_string(), page)) {
            return Err(AppError::Status { status: 500, url: format!("{store_id}/{page}") });
        }

        let size = self
            .page_sizes
            .get(store_id)
            .and_then(|sizes| sizes.get((page as usize).checked_sub(1)?))
            .copied()
            .unwrap_or(0);
        Ok((0..size)
            .map(|i| lot(&format!("{}", 3000 + i), "1", Condition::New, 1, 0.10))
            .collect())
    }
}

/// Solver double that records the directories it was asked to solve and
/// exits with a scripted code.
pub struct RecordingSolver {
    exit_code: i32,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl RecordingSolver {
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Solver for RecordingSolver {
    async fn solve(&self, work_dir: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(work_dir.to_path_buf());
        match self.exit_code {
            0 => Ok(()),
            code => Err(AppError::Solver { code: Some(code) }),
        }
    }
}
