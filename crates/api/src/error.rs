//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use catalog_store::StoreError;
use orders::OrderError;
use reports::ReportError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Catalog store error.
    Store(StoreError),
    /// Order engine error.
    Order(OrderError),
    /// Report error.
    Report(ReportError),
}

impl ApiError {
    /// Status code and message for this error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Store(err) => (store_status(err), err.to_string()),
            ApiError::Order(err) => (order_status(err), err.to_string()),
            ApiError::Report(err) => (report_status(err), err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } | StoreError::NoMatches(_) => StatusCode::NOT_FOUND,
        StoreError::InsufficientStock { .. }
        | StoreError::TotalMismatch { .. }
        | StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        StoreError::Database(_) | StoreError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn order_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::Validation(_)
        | OrderError::CustomerNotFound(_)
        | OrderError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        OrderError::ItemNotFound(_) | OrderError::NotFound(_) | OrderError::NoMatches => {
            StatusCode::NOT_FOUND
        }
        OrderError::InvalidStatusTransition { .. } | OrderError::Conflict(_) => {
            StatusCode::CONFLICT
        }
        OrderError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        OrderError::Persistence(store) => store_status(store),
    }
}

fn report_status(err: &ReportError) -> StatusCode {
    match err {
        ReportError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
        ReportError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        ReportError::Store(store) => store_status(store),
        ReportError::Io(_) | ReportError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::Report(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_store::{CustomerId, ItemId, OrderStatus};
    use std::time::Duration;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().status_and_message().0
    }

    #[test]
    fn test_store_errors() {
        assert_eq!(
            status(StoreError::NotFound {
                entity: "item",
                id: 1
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(StoreError::NoMatches("items")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::Invalid("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(StoreError::Conflict("in use".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(StoreError::Timeout(Duration::from_secs(1))),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn test_order_errors() {
        assert_eq!(
            status(OrderError::InsufficientStock {
                item_id: ItemId::new(1),
                requested: 2,
                available: 1
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(OrderError::CustomerNotFound(CustomerId::new(3))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(OrderError::ItemNotFound(ItemId::new(1))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(OrderError::InvalidStatusTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Cancelled
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(OrderError::Persistence(StoreError::Conflict("x".to_string()))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_report_errors() {
        let start = chrono::Utc::now();
        assert_eq!(
            status(ReportError::InvalidWindow {
                start,
                end: start - chrono::Duration::days(1)
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ReportError::Io(std::io::Error::other("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
