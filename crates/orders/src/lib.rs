//! Order placement for the catalog.
//!
//! [`OrderEngine::place_order`] validates a [`PlaceOrder`] request, checks the
//! customer, then commits the order header, its lines and every stock
//! reservation as one unit through [`catalog_store::CatalogStore::insert_order`].
//! Concurrent orders for the same item are serialized by the store, never by
//! a lock held here.

pub mod engine;
pub mod error;
pub mod request;

pub use engine::OrderEngine;
pub use error::{OrderError, Result};
pub use request::{OrderLineRequest, PlaceOrder};
