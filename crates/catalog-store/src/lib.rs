//! Authoritative storage for the catalog (items, authors, tags), customers and orders.
//!
//! The [`CatalogStore`] trait is the only way the rest of the system touches
//! persisted state. Two implementations are provided:
//! - [`InMemoryCatalogStore`] for tests and single-process deployments
//! - [`PostgresCatalogStore`] backed by a shared `sqlx` connection pool
//!
//! Stock-mutating operations are serialized per item by the store itself,
//! so callers never perform a separate read-then-write on quantities.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{AuthorId, CustomerId, ItemId, Money, OrderId};
pub use error::{Result, StoreError};
pub use memory::InMemoryCatalogStore;
pub use model::{
    Author, AuthorDraft, Customer, CustomerDraft, Item, ItemDraft, NewOrder, NewOrderLine, Order,
    OrderLine, OrderStatus, StockChange, Tag, order_total,
};
pub use postgres::PostgresCatalogStore;
pub use query::{AuthorSearch, CustomerSearch, ItemSearch, OrderSearch};
pub use store::{CatalogStore, CatalogStoreExt, with_deadline};
