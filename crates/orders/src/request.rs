//! Order placement request.

use catalog_store::{CustomerId, ItemId, Money, NewOrderLine};
use serde::{Deserialize, Serialize};

use crate::{OrderError, Result};

/// One requested line of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub item_id: ItemId,
    pub quantity: u32,
}

impl From<OrderLineRequest> for NewOrderLine {
    fn from(line: OrderLineRequest) -> Self {
        NewOrderLine {
            item_id: line.item_id,
            quantity: line.quantity,
        }
    }
}

/// Request to place an order.
///
/// `declared_total` must equal the sum of current unit prices times
/// quantities; the engine recomputes it inside the atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,

    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,

    #[serde(rename = "total_cents")]
    pub declared_total: Money,
}

impl PlaceOrder {
    /// Creates a new request.
    pub fn new(customer_id: CustomerId, declared_total: Money) -> Self {
        Self {
            customer_id: Some(customer_id),
            lines: Vec::new(),
            declared_total,
        }
    }

    /// Adds a line to the request.
    pub fn line(mut self, item_id: ItemId, quantity: u32) -> Self {
        self.lines.push(OrderLineRequest { item_id, quantity });
        self
    }

    /// Checks the request shape without touching storage.
    ///
    /// Returns the customer to place the order for.
    pub fn validate(&self) -> Result<CustomerId> {
        if self.lines.is_empty() {
            return Err(OrderError::Validation("order has no lines".to_string()));
        }
        if !self.declared_total.is_positive() {
            return Err(OrderError::Validation(format!(
                "total {} must be greater than zero",
                self.declared_total
            )));
        }
        if let Some(line) = self.lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::Validation(format!(
                "quantity for item {} must be at least 1",
                line.item_id
            )));
        }
        self.customer_id
            .ok_or_else(|| OrderError::Validation("customer_id is required".to_string()))
    }
}
