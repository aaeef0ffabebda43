//! Order engine error types.

use std::time::Duration;

use catalog_store::{CustomerId, ItemId, OrderId, OrderStatus, StoreError};
use thiserror::Error;

/// Errors that can occur while placing or managing orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request is malformed or its total does not add up.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The ordering customer does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// An ordered item does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// An ordered item does not have enough stock. Nothing was written.
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An order search matched nothing.
    #[error("No matching orders found")]
    NoMatches,

    /// The requested status change is not allowed from the current status.
    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The order changed concurrently.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The operation did not finish before its deadline.
    #[error("Order operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store failed.
    #[error("Persistence error: {0}")]
    Persistence(StoreError),
}

impl OrderError {
    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::CustomerNotFound(_) => "customer_not_found",
            OrderError::ItemNotFound(_) => "item_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::NotFound(_) => "not_found",
            OrderError::NoMatches => "no_matches",
            OrderError::InvalidStatusTransition { .. } => "invalid_transition",
            OrderError::Conflict(_) => "conflict",
            OrderError::Timeout(_) => "timeout",
            OrderError::Persistence(_) => "persistence",
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound {
                entity: "customer",
                id,
            } => OrderError::CustomerNotFound(CustomerId::new(id)),
            StoreError::NotFound { entity: "item", id } => OrderError::ItemNotFound(ItemId::new(id)),
            StoreError::NotFound {
                entity: "order",
                id,
            } => OrderError::NotFound(OrderId::new(id)),
            StoreError::InsufficientStock {
                item_id,
                requested,
                available,
            } => OrderError::InsufficientStock {
                item_id,
                requested,
                available,
            },
            StoreError::NoMatches(_) => OrderError::NoMatches,
            e @ StoreError::TotalMismatch { .. } => OrderError::Validation(e.to_string()),
            StoreError::Invalid(msg) => OrderError::Validation(msg),
            StoreError::Conflict(msg) => OrderError::Conflict(msg),
            StoreError::Timeout(limit) => OrderError::Timeout(limit),
            other => OrderError::Persistence(other),
        }
    }
}

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
