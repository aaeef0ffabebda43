//! Author endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use catalog_store::{Author, AuthorDraft, AuthorId, AuthorSearch, CatalogStore};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct AuthorQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn list<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<AuthorQuery>,
) -> Result<Json<Vec<Author>>, ApiError> {
    let authors = if query.first_name.is_none() && query.last_name.is_none() {
        state.catalog.list_authors().await?
    } else {
        let criteria = AuthorSearch {
            first_name: query.first_name,
            last_name: query.last_name,
        };
        state.catalog.search_authors(&criteria).await?
    };
    Ok(Json(authors))
}

#[tracing::instrument(skip(state, draft))]
pub async fn create<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<AuthorDraft>,
) -> Result<(StatusCode, Json<Author>), ApiError> {
    let author = state.catalog.create_author(draft).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[tracing::instrument(skip(state))]
pub async fn get<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<Author>, ApiError> {
    Ok(Json(state.catalog.get_author(AuthorId::new(id)).await?))
}

#[tracing::instrument(skip(state, draft))]
pub async fn update<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(draft): Json<AuthorDraft>,
) -> Result<Json<Author>, ApiError> {
    Ok(Json(
        state.catalog.update_author(AuthorId::new(id), draft).await?,
    ))
}

/// DELETE /api/authors/{id}: fails with 409 while items still reference the author.
#[tracing::instrument(skip(state))]
pub async fn delete<S: CatalogStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_author(AuthorId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
