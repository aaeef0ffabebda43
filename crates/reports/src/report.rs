//! Sales report records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use catalog_store::{ItemId, Money};

/// Quantity sold of one item within a report window.
///
/// Attributes come from the item as currently stored. When the item has
/// since been removed, title and price fall back to the purchase snapshot
/// and `removed` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSales {
    pub item_id: ItemId,
    pub title: String,
    pub published_at: Option<NaiveDate>,
    #[serde(rename = "price_cents")]
    pub price: Money,
    /// Current stock; `None` once the item is gone.
    pub available_quantity: Option<u32>,
    pub removed: bool,
    pub quantity_sold: u64,
}

/// Revenue and top sellers for orders created in `[window_start, window_end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesReport {
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[serde(rename = "total_revenue_cents")]
    pub total_revenue: Money,
    pub total_orders: u64,
    /// Sorted by quantity sold, highest first; ties by item id.
    pub top_selling_items: Vec<ItemSales>,
}

impl SalesReport {
    /// A report for a window containing no orders.
    pub fn empty(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        Self {
            generated_at: Utc::now(),
            window_start,
            window_end,
            total_revenue: Money::zero(),
            total_orders: 0,
            top_selling_items: Vec::new(),
        }
    }
}
