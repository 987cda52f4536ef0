use ferret_core::{FetchFailure, FetchStage};
use thiserror::Error;

/// Errors surfaced by the fetch layer and the pipeline.
#[derive(Error, Debug)]
pub enum FerretError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {method}")]
    HttpStatus { method: String, status: u16 },

    #[error("RPC error from {method} (code {code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("unexpected response shape from {method}: {detail}")]
    UnexpectedResponse { method: String, detail: String },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FerretError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FerretError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FerretError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            // -32429 is the rate-limit code used by Helius, -32005 by public RPC nodes
            FerretError::Rpc { code, .. } => matches!(*code, -32429 | -32005 | 429),
            FerretError::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FerretError>;

/// Error log entry for a wallet or token abandoned at `stage`.
pub fn fetch_failure(subject: &str, stage: FetchStage, err: &FerretError) -> FetchFailure {
    FetchFailure {
        subject: subject.to_string(),
        stage,
        error: err.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    }
}
