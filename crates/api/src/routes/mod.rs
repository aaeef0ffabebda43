//! HTTP route handlers.

pub mod authors;
pub mod customers;
pub mod health;
pub mod items;
pub mod metrics;
pub mod orders;
pub mod reports;
