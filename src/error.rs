// src/error.rs
use thiserror::Error;

use crate::models::AssetId;

/// Failures inside a price-history tier. All of them mean "tier unavailable".
#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset unavailable: {0}")]
    DatasetUnavailable(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("no usable history for {asset}: {reason}")]
    NoUsableHistory { asset: AssetId, reason: String },

    #[error("worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unrecognised timestamp '{0}'")]
    Timestamp(String),

    #[error("cache entry for {found} stored under {expected}")]
    AssetMismatch { expected: AssetId, found: AssetId },
}

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("no valid price points for {0}")]
    Empty(AssetId),
}
