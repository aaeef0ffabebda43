//! Request counting middleware.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Counts every request as `http_requests_total{method, endpoint}`.
///
/// The endpoint is the matched route template, so `/api/items/7` and
/// `/api/items/8` share one series. Unrouted requests count as `unmatched`.
pub async fn count_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |path| path.as_str().to_string());

    let response = next.run(req).await;
    metrics::counter!("http_requests_total", "method" => method, "endpoint" => endpoint)
        .increment(1);
    response
}
