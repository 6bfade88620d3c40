use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const BASE_URL: &str = "https://www.bricklink.com";
pub const STORE_BASE_URL: &str = "https://store.bricklink.com";

/// Rows per store inventory page. A page with exactly this many rows means
/// another page may follow.
pub const INVENTORY_PAGE_SIZE: usize = 100;

/// Sentinel for "any color" / "any condition" in item keys.
pub const WILDCARD: &str = "X";

#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub wanted_list_id: String,
    pub log_level: String,
    pub db_path: String,
    pub base_url: String,
    pub store_base_url: String,
    /// Max remote calls in flight across every queue of a run (CONCURRENT_REQUESTS)
    pub concurrency: usize,
    /// Store inventories fetched within this many days are reused (STORE_CACHE_DAYS)
    pub store_cache_days: i64,
    /// Deadline for a single remote call (REQUEST_TIMEOUT_SECS)
    pub request_timeout: Duration,
    pub search: SearchSettings,
    pub solver: SolverSettings,
}

/// Filters sent with every seller search.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub country: String,
    pub region: String,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub program: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    /// Numeric tolerance handed to the solver as `S`
    pub tolerance: f64,
    pub max_sellers: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            country: "US".to_string(),
            region: "2".to_string(),
            page_size: 50,
        }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            program: "/usr/local/bin/Rscript".to_string(),
            args: vec!["simplex.R".to_string()],
            work_dir: PathBuf::from(".simplex"),
            tolerance: 2.0,
            max_sellers: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{key} must be set")))
        };
        let solver_defaults = SolverSettings::default();
        let search_defaults = SearchSettings::default();

        Ok(Self {
            username: required("BRICKLINK_USERNAME")?,
            password: required("BRICKLINK_PASSWORD")?,
            wanted_list_id: required("WANTED_LIST_ID")?,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: var("DB_PATH").unwrap_or_else(|| "planner.db".to_string()),
            base_url: var("BASE_URL").unwrap_or_else(|| BASE_URL.to_string()),
            store_base_url: var("STORE_BASE_URL").unwrap_or_else(|| STORE_BASE_URL.to_string()),
            concurrency: parse_or(&var, "CONCURRENT_REQUESTS", 5usize)?,
            store_cache_days: parse_or(&var, "STORE_CACHE_DAYS", 2i64)?,
            request_timeout: Duration::from_secs(parse_or(&var, "REQUEST_TIMEOUT_SECS", 30u64)?),
            search: SearchSettings {
                country: var("SEARCH_COUNTRY").unwrap_or(search_defaults.country),
                region: var("SEARCH_REGION").unwrap_or(search_defaults.region),
                page_size: parse_or(&var, "SEARCH_PAGE_SIZE", search_defaults.page_size)?,
            },
            solver: SolverSettings {
                program: var("SOLVER_PROGRAM").unwrap_or(solver_defaults.program),
                args: var("SOLVER_ARGS")
                    .map(|s| {
                        s.split(',')
                            .map(|a| a.trim().to_string())
                            .filter(|a| !a.is_empty())
                            .collect()
                    })
                    .unwrap_or(solver_defaults.args),
                work_dir: var("SOLVER_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(solver_defaults.work_dir),
                tolerance: parse_or(&var, "SOLVER_TOLERANCE", solver_defaults.tolerance)?,
                max_sellers: parse_or(&var, "MAX_SELLERS", solver_defaults.max_sellers)?,
            },
        })
        .and_then(Self::validated)
    }

    fn validated(self) -> Result<Self> {
        if self.concurrency == 0 {
            return Err(AppError::Config("CONCURRENT_REQUESTS must be at least 1".to_string()));
        }
        if self.store_cache_days < 0 {
            return Err(AppError::Config("STORE_CACHE_DAYS must not be negative".to_string()));
        }
        Ok(self)
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
