//! Read-only sales reporting over committed orders.
//!
//! Reports never consult the cache: they read orders and items straight from
//! the [`catalog_store::CatalogStore`].

pub mod aggregator;
pub mod daily;
pub mod error;
pub mod report;

pub use aggregator::ReportAggregator;
pub use daily::{DailyReportJob, report_file_name};
pub use error::{ReportError, Result};
pub use report::{ItemSales, SalesReport};
