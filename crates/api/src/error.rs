//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use order::OrderError;
use payment::PaymentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client (malformed UUID, bad enum value).
    BadRequest(String),
    /// Inventory domain error.
    Inventory(InventoryError),
    /// Order domain error.
    Order(OrderError),
    /// Payment domain error.
    Payment(PaymentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Inventory(err) => inventory_error_to_response(err),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn inventory_error_to_response(err: InventoryError) -> (StatusCode, String) {
    match &err {
        InventoryError::ProductNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        InventoryError::NotEnoughQuantity { .. } => (StatusCode::CONFLICT, err.to_string()),
        InventoryError::OperationUnknown(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        InventoryError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    match &err {
        OrderError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        OrderError::NotFound(_) | OrderError::CouponNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        OrderError::CouponExpired(_)
        | OrderError::CouponNotActive(_)
        | OrderError::AlreadyCompleted(_)
        | OrderError::AlreadyCancelled(_)
        | OrderError::InvalidStatus { .. } => (StatusCode::CONFLICT, err.to_string()),
        OrderError::Database(_) | OrderError::Serialization(_) | OrderError::Messaging(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    match &err {
        PaymentError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PaymentError::AlreadyExists { .. }
        | PaymentError::PaymentAlreadyCompleted(_)
        | PaymentError::PaymentAlreadyPending(_)
        | PaymentError::InvalidPayment { .. } => (StatusCode::CONFLICT, err.to_string()),
        PaymentError::Billing(_)
        | PaymentError::Database(_)
        | PaymentError::Serialization(_)
        | PaymentError::Messaging(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}
