//! Payment lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use common::{OrderId, PaymentId, UserId};
use payment::{NewPayment, PaymentRepository, PaymentService};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Builds the payments sub-router.
pub fn router<R>(service: Arc<PaymentService<R>>) -> Router
where
    R: PaymentRepository + 'static,
{
    Router::new()
        .route("/payments", post(create::<R>))
        .route("/payments/{id}/status", get(status::<R>))
        .route("/payments/{id}/retry", post(retry::<R>))
        .route("/payments/{id}/confirm", post(confirm::<R>))
        .route("/payments/{id}/cancel", post(cancel::<R>))
        .with_state(service)
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub user_id: String,
    pub currency: String,
    pub total_price: f64,
    pub payment_method: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct UserRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct PaymentCreatedResponse {
    pub payment_id: String,
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub status: String,
}

// -- Handlers --

/// POST /payments — create a pending payment.
#[tracing::instrument(skip(service, req))]
pub async fn create<R: PaymentRepository>(
    State(service): State<Arc<PaymentService<R>>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(axum::http::StatusCode, Json<PaymentCreatedResponse>), ApiError> {
    let request = NewPayment {
        order_id: parse_uuid::<OrderId>(&req.order_id, "order id")?,
        user_id: parse_uuid::<UserId>(&req.user_id, "user id")?,
        currency: req
            .currency
            .parse()
            .map_err(|e: common::UnknownVariant| ApiError::BadRequest(e.to_string()))?,
        total_price: req.total_price,
        payment_method: req
            .payment_method
            .parse()
            .map_err(|e: common::UnknownVariant| ApiError::BadRequest(e.to_string()))?,
        description: req.description,
    };

    let payment = service.create_payment(request).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(PaymentCreatedResponse {
            payment_id: payment.id.to_string(),
        }),
    ))
}

/// GET /payments/:id/status?user_id= — payment status for its owner.
#[tracing::instrument(skip(service))]
pub async fn status<R: PaymentRepository>(
    State(service): State<Arc<PaymentService<R>>>,
    Path(id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let (payment_id, user_id) = parse_ids(&id, &query.user_id)?;
    let status = service.get_status(payment_id, user_id).await?;
    Ok(Json(PaymentStatusResponse {
        status: status.to_string(),
    }))
}

/// POST /payments/:id/retry — `cancelled|failed → pending`.
#[tracing::instrument(skip(service, req))]
pub async fn retry<R: PaymentRepository>(
    State(service): State<Arc<PaymentService<R>>>,
    Path(id): Path<String>,
    Json(req): Json<UserRequest>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let (payment_id, user_id) = parse_ids(&id, &req.user_id)?;
    let payment = service.retry_payment(payment_id, user_id).await?;
    Ok(Json(PaymentStatusResponse {
        status: payment.status.to_string(),
    }))
}

/// POST /payments/:id/confirm — `pending → completed`.
#[tracing::instrument(skip(service, req))]
pub async fn confirm<R: PaymentRepository>(
    State(service): State<Arc<PaymentService<R>>>,
    Path(id): Path<String>,
    Json(req): Json<UserRequest>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let (payment_id, user_id) = parse_ids(&id, &req.user_id)?;
    let payment = service.confirm_payment(payment_id, user_id).await?;
    Ok(Json(PaymentStatusResponse {
        status: payment.status.to_string(),
    }))
}

/// POST /payments/:id/cancel — `pending → cancelled`.
#[tracing::instrument(skip(service, req))]
pub async fn cancel<R: PaymentRepository>(
    State(service): State<Arc<PaymentService<R>>>,
    Path(id): Path<String>,
    Json(req): Json<UserRequest>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let (payment_id, user_id) = parse_ids(&id, &req.user_id)?;
    let payment = service.cancel_payment(payment_id, user_id).await?;
    Ok(Json(PaymentStatusResponse {
        status: payment.status.to_string(),
    }))
}

fn parse_ids(payment_id: &str, user_id: &str) -> Result<(PaymentId, UserId), ApiError> {
    Ok((
        parse_uuid::<PaymentId>(payment_id, "payment id")?,
        parse_uuid::<UserId>(user_id, "user id")?,
    ))
}

fn parse_uuid<T: From<uuid::Uuid>>(raw: &str, what: &str) -> Result<T, ApiError> {
    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid {what}: {e}")))?;
    Ok(T::from(uuid))
}
