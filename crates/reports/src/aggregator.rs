//! Sales aggregation over a time window.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use catalog_store::{
    CatalogStore, CatalogStoreExt, ItemId, Money, OrderLine, StoreError, with_deadline,
};

use crate::{ItemSales, ReportError, Result, SalesReport};

/// Default deadline for building one report.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds [`SalesReport`]s from committed orders.
///
/// Every order created inside the window counts, whatever its status.
pub struct ReportAggregator<S: CatalogStore> {
    store: S,
    timeout: Duration,
}

#[derive(Default)]
struct Tally {
    quantity: u64,
    // Snapshot of the most recent line, used when the item is gone.
    title: String,
    unit_price: Money,
}

impl<S: CatalogStore> ReportAggregator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the deadline applied to each report.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Builds the report for orders created in `[start, end)`.
    ///
    /// A window with `end < start` is rejected before any query runs. An
    /// empty window yields an empty report.
    #[tracing::instrument(skip(self))]
    pub async fn sales_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SalesReport> {
        if end < start {
            return Err(ReportError::InvalidWindow { start, end });
        }
        if end == start {
            return Ok(SalesReport::empty(start, end));
        }

        let report = with_deadline(self.timeout, self.build(start, end)).await?;
        metrics::counter!("reports_generated_total").increment(1);
        tracing::info!(
            orders = report.total_orders,
            revenue = %report.total_revenue,
            items = report.top_selling_items.len(),
            "sales report generated"
        );
        Ok(report)
    }

    async fn build(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> catalog_store::Result<SalesReport> {
        let orders = self.store.orders_between(start, end).await?;

        let total_revenue = Money::checked_sum(orders.iter().map(|o| o.total))
            .ok_or_else(|| StoreError::Invalid("report revenue overflows".to_string()))?;
        let mut tallies: HashMap<ItemId, Tally> = HashMap::new();
        for line in orders.iter().flat_map(|o| o.lines.iter()) {
            record(&mut tallies, line);
        }

        let mut top_selling_items = Vec::with_capacity(tallies.len());
        for (item_id, tally) in tallies {
            let sales = match self.store.find_item(item_id).await? {
                Some(item) => ItemSales {
                    item_id,
                    title: item.title,
                    published_at: item.published_at,
                    price: item.price,
                    available_quantity: Some(item.quantity),
                    removed: false,
                    quantity_sold: tally.quantity,
                },
                None => ItemSales {
                    item_id,
                    title: tally.title,
                    published_at: None,
                    price: tally.unit_price,
                    available_quantity: None,
                    removed: true,
                    quantity_sold: tally.quantity,
                },
            };
            top_selling_items.push(sales);
        }
        top_selling_items.sort_by(|a, b| {
            b.quantity_sold
                .cmp(&a.quantity_sold)
                .then(a.item_id.cmp(&b.item_id))
        });

        Ok(SalesReport {
            generated_at: Utc::now(),
            window_start: start,
            window_end: end,
            total_revenue,
            total_orders: orders.len() as u64,
            top_selling_items,
        })
    }
}

fn record(tallies: &mut HashMap<ItemId, Tally>, line: &OrderLine) {
    let tally = tallies.entry(line.item_id).or_default();
    tally.quantity += u64::from(line.quantity);
    tally.title.clone_from(&line.title);
    tally.unit_price = line.unit_price;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, title: &str, price: i64, quantity: u32) -> OrderLine {
        OrderLine {
            item_id: ItemId::new(id),
            title: title.to_string(),
            unit_price: Money::from_cents(price),
            quantity,
        }
    }

    #[test]
    fn tallies_accumulate_and_keep_latest_snapshot() {
        let mut tallies = HashMap::new();
        record(&mut tallies, &line(1, "Old title", 500, 2));
        record(&mut tallies, &line(1, "New title", 600, 3));
        record(&mut tallies, &line(2, "Other", 100, 1));

        let first = &tallies[&ItemId::new(1)];
        assert_eq!(first.quantity, 5);
        assert_eq!(first.title, "New title");
        assert_eq!(first.unit_price, Money::from_cents(600));
        assert_eq!(tallies[&ItemId::new(2)].quantity, 1);
    }
}
