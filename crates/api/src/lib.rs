//! HTTP API server for the catalog, order engine and sales reports.
//!
//! Handlers are thin: they decode the request, call one service and map the
//! outcome to a status code. Structured logging comes from tracing and
//! Prometheus metrics are served at `/metrics`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use cache::{Cache, CachedCatalog};
use catalog_store::CatalogStore;
use metrics_exporter_prometheus::PrometheusHandle;
use orders::OrderEngine;
use reports::ReportAggregator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CatalogStore> {
    pub catalog: CachedCatalog<S>,
    pub orders: OrderEngine<S>,
    pub reports: ReportAggregator<S>,
}

/// Wires the services around one store and one cache.
pub fn create_state<S: CatalogStore + Clone + 'static>(
    store: S,
    cache: Arc<dyn Cache>,
    config: &Config,
) -> Arc<AppState<S>> {
    let catalog = CachedCatalog::new(store.clone(), cache.clone())
        .with_ttl(config.cache_ttl)
        .with_timeout(config.request_timeout);
    let orders = OrderEngine::new(store.clone(), cache).with_timeout(config.request_timeout);
    let reports = ReportAggregator::new(store).with_timeout(config.report_timeout);

    Arc::new(AppState {
        catalog,
        orders,
        reports,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CatalogStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    let api = Router::new()
        .route(
            "/items",
            get(routes::items::list::<S>).post(routes::items::create::<S>),
        )
        .route(
            "/items/{id}",
            get(routes::items::get::<S>)
                .put(routes::items::update::<S>)
                .delete(routes::items::delete::<S>),
        )
        .route("/tags", get(routes::items::tags::<S>))
        .route(
            "/authors",
            get(routes::authors::list::<S>).post(routes::authors::create::<S>),
        )
        .route(
            "/authors/{id}",
            get(routes::authors::get::<S>)
                .put(routes::authors::update::<S>)
                .delete(routes::authors::delete::<S>),
        )
        .route(
            "/customers",
            get(routes::customers::list::<S>).post(routes::customers::create::<S>),
        )
        .route(
            "/customers/{id}",
            get(routes::customers::get::<S>)
                .put(routes::customers::update::<S>)
                .delete(routes::customers::delete::<S>),
        )
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::delete::<S>),
        )
        .route(
            "/orders/{id}/status",
            post(routes::orders::update_status::<S>),
        )
        .route("/reports", get(routes::reports::sales::<S>));

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .nest("/api", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(from_fn(middleware::count_requests))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
