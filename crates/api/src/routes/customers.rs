//! Customer endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use catalog_store::{CatalogStore, Customer, CustomerDraft, CustomerId, CustomerSearch};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn list<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = if query.name.is_none() && query.email.is_none() {
        state.catalog.list_customers().await?
    } else {
        let criteria = CustomerSearch {
            name: query.name,
            email: query.email,
        };
        state.catalog.search_customers(&criteria).await?
    };
    Ok(Json(customers))
}

#[tracing::instrument(skip(state, draft))]
pub async fn create<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<CustomerDraft>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state.catalog.create_customer(draft).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

#[tracing::instrument(skip(state))]
pub async fn get<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.catalog.get_customer(CustomerId::new(id)).await?))
}

#[tracing::instrument(skip(state, draft))]
pub async fn update<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(draft): Json<CustomerDraft>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(
        state
            .catalog
            .update_customer(CustomerId::new(id), draft)
            .await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn delete<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_customer(CustomerId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
