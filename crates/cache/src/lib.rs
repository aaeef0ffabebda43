//! Read-through cache for catalog data.
//!
//! The cache is never the system of record. [`CachedCatalog`] reads with
//! cache-aside and invalidates affected keys after every successful write;
//! cache failures are logged and counted, then absorbed by falling back to
//! the [`catalog_store::CatalogStore`].

pub mod catalog;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use catalog::{CachedCatalog, invalidate};
pub use error::{CacheError, Result};
pub use memory::InMemoryCache;
pub use store::{Cache, CacheExt};
