//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cache::InMemoryCache;
use catalog_store::InMemoryCatalogStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let state = api::create_state(
        InMemoryCatalogStore::new(),
        Arc::new(InMemoryCache::new()),
        &api::config::Config::default(),
    );
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Creates an author, a customer and one item; returns (customer_id, item_id).
async fn seed(app: &axum::Router, price_cents: i64, quantity: u32) -> (i64, i64) {
    let (status, author) = send(
        app,
        "POST",
        "/api/authors",
        Some(json!({ "first_name": "Ursula", "last_name": "Le Guin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, customer) = send(
        app,
        "POST",
        "/api/customers",
        Some(json!({ "name": "Shevek", "email": "shevek@anarres.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, item) = send(
        app,
        "POST",
        "/api/items",
        Some(json!({
            "title": "The Dispossessed",
            "author_id": author["id"],
            "tags": ["utopia", "classic"],
            "published_at": "1974-05-01",
            "price_cents": price_cents,
            "quantity": quantity
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        customer["id"].as_i64().unwrap(),
        item["id"].as_i64().unwrap(),
    )
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let app = setup();
        let (status, json) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["backend"], "memory");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = setup();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_requests_are_counted_by_route_template() {
        let app = setup();
        let (status, _) = send(&app, "GET", "/api/tags", None).await;
        assert_eq!(status, StatusCode::OK);
        send(&app, "GET", "/api/items/424242", None).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();

        let counted = |endpoint: &str| {
            body.lines().any(|line| {
                line.starts_with("http_requests_total{")
                    && line.contains(r#"method="GET""#)
                    && line.contains(&format!(r#"endpoint="{endpoint}""#))
            })
        };
        assert!(counted("/api/tags"), "{body}");
        assert!(counted("/api/items/{id}"), "{body}");
        assert!(!body.contains("/api/items/424242"));
    }
}

mod items {
    use super::*;

    #[tokio::test]
    async fn test_create_get_and_search_item() {
        let app = setup();
        let (_, item_id) = seed(&app, 1500, 3).await;

        let (status, item) = send(&app, "GET", &format!("/api/items/{item_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["title"], "The Dispossessed");
        assert_eq!(item["author"]["last_name"], "Le Guin");
        assert_eq!(item["price_cents"], 1500);

        let (status, found) = send(
            &app,
            "GET",
            "/api/items?title=dispossessed&min_price=1000&max_price=2000",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, none) = send(&app, "GET", "/api/items?max_price=100", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(none["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_missing_item_is_404() {
        let app = setup();
        let (status, json) = send(&app, "GET", "/api/items/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("999"));
    }

    #[tokio::test]
    async fn test_negative_price_is_rejected() {
        let app = setup();
        let (_, author) = send(
            &app,
            "POST",
            "/api/authors",
            Some(json!({ "first_name": "A", "last_name": "B" })),
        )
        .await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/items",
            Some(json!({
                "title": "Bad",
                "author_id": author["id"],
                "price_cents": -1,
                "quantity": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_decrements_then_removes() {
        let app = setup();
        let (_, item_id) = seed(&app, 1000, 2).await;
        let uri = format!("/api/items/{item_id}");

        let (status, change) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(change["outcome"], "decremented");
        assert_eq!(change["remaining"], 1);

        let (_, item) = send(&app, "GET", &uri, None).await;
        assert_eq!(item["quantity"], 1);

        let (_, change) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(change["outcome"], "removed");
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_author_in_use_cannot_be_deleted() {
        let app = setup();
        let (_, item_id) = seed(&app, 1000, 1).await;
        let (_, item) = send(&app, "GET", &format!("/api/items/{item_id}"), None).await;
        let author_id = item["author"]["id"].as_i64().unwrap();

        let (status, _) = send(&app, "DELETE", &format!("/api/authors/{author_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn test_place_order_reserves_stock() {
        let app = setup();
        let (customer_id, item_id) = seed(&app, 1000, 3).await;

        let (status, order) = send(
            &app,
            "POST",
            "/api/orders",
            Some(json!({
                "customer_id": customer_id,
                "lines": [{ "item_id": item_id, "quantity": 2 }],
                "total_cents": 2000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "Pending");
        assert_eq!(order["total_cents"], 2000);

        let (_, item) = send(&app, "GET", &format!("/api/items/{item_id}"), None).await;
        assert_eq!(item["quantity"], 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_400_and_writes_nothing() {
        let app = setup();
        let (customer_id, item_id) = seed(&app, 1000, 1).await;

        let (status, json) = send(
            &app,
            "POST",
            "/api/orders",
            Some(json!({
                "customer_id": customer_id,
                "lines": [{ "item_id": item_id, "quantity": 2 }],
                "total_cents": 2000
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));

        let (_, item) = send(&app, "GET", &format!("/api/items/{item_id}"), None).await;
        assert_eq!(item["quantity"], 1);
        let (_, orders) = send(&app, "GET", "/api/orders", None).await;
        assert!(orders.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_total_is_400() {
        let app = setup();
        let (customer_id, item_id) = seed(&app, 1000, 5).await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/orders",
            Some(json!({
                "customer_id": customer_id,
                "lines": [{ "item_id": item_id, "quantity": 1 }],
                "total_cents": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_lifecycle() {
        let app = setup();
        let (customer_id, item_id) = seed(&app, 1000, 5).await;
        let (_, order) = send(
            &app,
            "POST",
            "/api/orders",
            Some(json!({
                "customer_id": customer_id,
                "lines": [{ "item_id": item_id, "quantity": 1 }],
                "total_cents": 1000
            })),
        )
        .await;
        let order_id = order["id"].as_i64().unwrap();
        let status_uri = format!("/api/orders/{order_id}/status");

        let (status, updated) = send(
            &app,
            "POST",
            &status_uri,
            Some(json!({ "status": "Processing" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "Processing");

        let (status, _) = send(
            &app,
            "POST",
            &status_uri,
            Some(json!({ "status": "Completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, found) = send(
            &app,
            "GET",
            "/api/orders?customer_name=shev&status=processing",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", "/api/orders?status=lost", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", &format!("/api/orders/{order_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/api/orders/{order_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod reports {
    use super::*;

    #[tokio::test]
    async fn test_sales_report_for_today() {
        let app = setup();
        let (customer_id, item_id) = seed(&app, 1250, 5).await;
        send(
            &app,
            "POST",
            "/api/orders",
            Some(json!({
                "customer_id": customer_id,
                "lines": [{ "item_id": item_id, "quantity": 2 }],
                "total_cents": 2500
            })),
        )
        .await;

        let today = chrono::Utc::now().date_naive();
        let tomorrow = today + chrono::Duration::days(1);
        let (status, report) = send(
            &app,
            "GET",
            &format!("/api/reports?start={today}&end={tomorrow}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["total_orders"], 1);
        assert_eq!(report["total_revenue_cents"], 2500);
        assert_eq!(report["top_selling_items"][0]["quantity_sold"], 2);
        assert_eq!(report["top_selling_items"][0]["available_quantity"], 3);
    }

    #[tokio::test]
    async fn test_inverted_window_is_400() {
        let app = setup();
        let (status, json) = send(
            &app,
            "GET",
            "/api/reports?start=2024-02-02&end=2024-02-01",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().is_some());
    }
}
