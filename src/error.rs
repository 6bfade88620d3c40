use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timed out after {secs}s waiting for {op}")]
    Timeout { op: &'static str, secs: u64 },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Solver exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Solver { code: Option<i32> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code for a fatal run error. Solver failures surface the
    /// solver's own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Solver { code: Some(code) } => *code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
