//! Sales report endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use catalog_store::CatalogStore;
use chrono::{NaiveDate, NaiveTime};
use reports::SalesReport;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

/// Calendar-day window; `end` is exclusive.
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// GET /api/reports?start=YYYY-MM-DD&end=YYYY-MM-DD
#[tracing::instrument(skip(state))]
pub async fn sales<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<SalesReport>, ApiError> {
    let start = query.start.and_time(NaiveTime::MIN).and_utc();
    let end = query.end.and_time(NaiveTime::MIN).and_utc();
    Ok(Json(state.reports.sales_report(start, end).await?))
}
