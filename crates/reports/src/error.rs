//! Report error types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while building or writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The window ends before it starts.
    #[error("Invalid report window: end {end} is before start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The report did not finish before its deadline.
    #[error("Report timed out after {0:?}")]
    Timeout(Duration),

    /// An error occurred in the catalog store.
    #[error("Store error: {0}")]
    Store(catalog_store::StoreError),

    /// Writing a report file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a report failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<catalog_store::StoreError> for ReportError {
    fn from(e: catalog_store::StoreError) -> Self {
        match e {
            catalog_store::StoreError::Timeout(limit) => ReportError::Timeout(limit),
            other => ReportError::Store(other),
        }
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
