//! Catalog item endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use catalog_store::{CatalogStore, Item, ItemDraft, ItemId, ItemSearch, Money, StockChange, Tag};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

/// Search filters accepted by `GET /api/items`. Prices are in cents.
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub title: Option<String>,
    pub author_first_name: Option<String>,
    pub author_last_name: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

impl ItemQuery {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author_first_name.is_none()
            && self.author_last_name.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }
}

impl From<ItemQuery> for ItemSearch {
    fn from(q: ItemQuery) -> Self {
        ItemSearch {
            title: q.title,
            author_first_name: q.author_first_name,
            author_last_name: q.author_last_name,
            min_price: q.min_price.map(Money::from_cents),
            max_price: q.max_price.map(Money::from_cents),
        }
    }
}

/// GET /api/items: lists every item, or searches when any filter is given.
#[tracing::instrument(skip(state))]
pub async fn list<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = if query.is_empty() {
        state.catalog.list_items().await?
    } else {
        state.catalog.search_items(&query.into()).await?
    };
    Ok(Json(items))
}

/// POST /api/items
#[tracing::instrument(skip(state, draft))]
pub async fn create<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<ItemDraft>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let item = state.catalog.create_item(draft).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/items/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<Item>, ApiError> {
    Ok(Json(state.catalog.get_item(ItemId::new(id)).await?))
}

/// PUT /api/items/{id}: replaces every mutable field.
#[tracing::instrument(skip(state, draft))]
pub async fn update<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(draft): Json<ItemDraft>,
) -> Result<Json<Item>, ApiError> {
    Ok(Json(state.catalog.update_item(ItemId::new(id), draft).await?))
}

/// DELETE /api/items/{id}: takes one unit out of stock, removing the item
/// when it was the last.
#[tracing::instrument(skip(state))]
pub async fn delete<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<StockChange>, ApiError> {
    Ok(Json(
        state.catalog.decrement_or_delete_item(ItemId::new(id)).await?,
    ))
}

/// GET /api/tags
pub async fn tags<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.catalog.list_tags().await?))
}
