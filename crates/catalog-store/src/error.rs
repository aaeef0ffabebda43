use std::time::Duration;

use thiserror::Error;

use crate::{ItemId, Money};

/// Errors that can occur when interacting with the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A point lookup or mutation referenced a row that does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A search matched nothing.
    #[error("no matching {0} found")]
    NoMatches(&'static str),

    /// An item does not have enough stock to satisfy a reservation.
    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// The total declared for an order differs from the sum of its lines.
    #[error("declared total {declared} does not match computed total {computed}")]
    TotalMismatch { declared: Money, computed: Money },

    /// A draft failed field validation.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The write conflicts with related rows or a concurrent change.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation did not finish before its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for catalog store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
