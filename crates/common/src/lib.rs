//! Shared types used across the catalog, cache, order and report crates.

pub mod ids;
pub mod money;

pub use ids::{AuthorId, CustomerId, ItemId, OrderId};
pub use money::Money;
