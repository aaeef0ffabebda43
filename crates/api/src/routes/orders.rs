//! Order placement and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use catalog_store::{CatalogStore, Order, OrderId, OrderSearch, OrderStatus};
use orders::PlaceOrder;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub customer_name: Option<String>,
    pub status: Option<String>,
}

impl TryFrom<OrderQuery> for OrderSearch {
    type Error = ApiError;

    fn try_from(q: OrderQuery) -> Result<Self, Self::Error> {
        let status = q
            .status
            .as_deref()
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(OrderSearch {
            customer_name: q.customer_name,
            status,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// GET /api/orders: lists every order, or searches by customer name and status.
#[tracing::instrument(skip(state))]
pub async fn list<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = if query.customer_name.is_none() && query.status.is_none() {
        state.orders.list_orders().await?
    } else {
        let criteria = OrderSearch::try_from(query)?;
        state.orders.search_orders(&criteria).await?
    };
    Ok(Json(orders))
}

/// POST /api/orders: places an order, reserving stock for every line.
#[tracing::instrument(skip(state, request))]
pub async fn create<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.orders.place_order(request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.get_order(OrderId::new(id)).await?))
}

/// POST /api/orders/{id}/status
#[tracing::instrument(skip(state))]
pub async fn update_status<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(
        state
            .orders
            .update_status(OrderId::new(id), change.status)
            .await?,
    ))
}

/// DELETE /api/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.orders.delete_order(OrderId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
