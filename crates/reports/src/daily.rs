//! Periodic job writing yesterday's sales report to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use tokio::sync::watch;

use catalog_store::CatalogStore;

use crate::{ReportAggregator, Result, SalesReport};

/// File name of the report for `day`, e.g. `daily_report_20240131.json`.
pub fn report_file_name(day: NaiveDate) -> String {
    format!("daily_report_{}.json", day.format("%Y%m%d"))
}

/// Writes one report per UTC day into a directory.
pub struct DailyReportJob<S: CatalogStore> {
    aggregator: ReportAggregator<S>,
    dir: PathBuf,
    interval: Duration,
}

impl<S: CatalogStore> DailyReportJob<S> {
    pub fn new(aggregator: ReportAggregator<S>, dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            aggregator,
            dir: dir.into(),
            interval,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Builds the report for `[day 00:00, day+1 00:00)` UTC and writes it as
    /// pretty-printed JSON, creating the directory if needed.
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn write_report(&self, day: NaiveDate) -> Result<PathBuf> {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);
        let report = self.aggregator.sales_report(start, end).await?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(report_file_name(day));
        tokio::fs::write(&path, encode(&report)?).await?;

        tracing::info!(path = %path.display(), "daily report written");
        Ok(path)
    }

    /// Writes the report for the previous UTC day.
    pub async fn write_yesterday(&self) -> Result<PathBuf> {
        let today = Utc::now().date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        self.write_report(yesterday).await
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The first tick fires immediately. Failures are logged and the loop
    /// keeps going.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.interval, "daily report job started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.write_yesterday().await {
                        tracing::error!(error = %e, "failed to write daily report");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("daily report job stopped");
    }
}

fn encode(report: &SalesReport) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_uses_compact_date() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(report_file_name(day), "daily_report_20240131.json");
    }
}
