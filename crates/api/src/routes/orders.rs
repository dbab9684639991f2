//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use order::{DeliveryUpdate, NewOrder, Order, OrderLine, OrderRepository, OrderService};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Builds the orders sub-router.
pub fn router<R>(service: Arc<OrderService<R>>) -> Router
where
    R: OrderRepository + 'static,
{
    Router::new()
        .route("/orders", post(create::<R>).get(list::<R>))
        .route(
            "/orders/{id}",
            get(get_order::<R>).put(update::<R>).delete(delete::<R>),
        )
        .route("/orders/{id}/complete", post(complete::<R>))
        .route("/orders/{id}/cancel", post(cancel::<R>))
        .with_state(service)
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub currency: String,
    pub total_price: f64,
    pub payment_method: String,
    pub delivery_method: String,
    pub delivery_address: String,
    pub delivery_date: DateTime<Utc>,
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub coupon: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u64,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub currency: String,
    pub total_price: f64,
    pub payment_method: String,
    pub delivery_method: String,
    pub delivery_address: String,
    pub delivery_date: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status.to_string(),
            currency: order.currency.to_string(),
            total_price: order.total_price,
            payment_method: order.payment_method.to_string(),
            delivery_method: order.delivery_method.to_string(),
            delivery_address: order.delivery_address,
            delivery_date: order.delivery_date,
            items: order
                .items
                .iter()
                .map(|line| OrderItemResponse {
                    product_id: line.product_id.to_string(),
                    quantity: line.quantity,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders — create a new order.
#[tracing::instrument(skip(service, req))]
pub async fn create<R: OrderRepository>(
    State(service): State<Arc<OrderService<R>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError> {
    let items = req
        .items
        .iter()
        .map(|item| {
            Ok(OrderLine {
                product_id: parse_uuid::<ProductId>(&item.product_id, "product id")?,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let request = NewOrder {
        user_id: parse_uuid::<UserId>(&req.user_id, "user id")?,
        currency: parse_enum(&req.currency)?,
        total_price: req.total_price,
        payment_method: parse_enum(&req.payment_method)?,
        delivery_method: parse_enum(&req.delivery_method)?,
        delivery_address: req.delivery_address,
        delivery_date: req.delivery_date,
        items,
        coupon: req.coupon,
    };

    let order = service.create_order(request).await?;
    Ok((axum::http::StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/:id — load one order.
#[tracing::instrument(skip(service))]
pub async fn get_order<R: OrderRepository>(
    State(service): State<Arc<OrderService<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_uuid::<OrderId>(&id, "order id")?;
    let order = service.get_order(order_id).await?;
    Ok(Json(order.into()))
}

/// GET /orders — list orders, optionally for one user.
#[tracing::instrument(skip(service))]
pub async fn list<R: OrderRepository>(
    State(service): State<Arc<OrderService<R>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id = query
        .user_id
        .as_deref()
        .map(|raw| parse_uuid::<UserId>(raw, "user id"))
        .transpose()?;
    let orders = service.list_orders(user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// PUT /orders/:id — update the delivery fields of a pending order.
#[tracing::instrument(skip(service, req))]
pub async fn update<R: OrderRepository>(
    State(service): State<Arc<OrderService<R>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_uuid::<OrderId>(&id, "order id")?;
    let update = DeliveryUpdate {
        delivery_address: req.delivery_address,
        delivery_method: req.delivery_method.as_deref().map(parse_enum).transpose()?,
        delivery_date: req.delivery_date,
    };
    let order = service.update_order(order_id, update).await?;
    Ok(Json(order.into()))
}

/// DELETE /orders/:id — remove an order.
#[tracing::instrument(skip(service))]
pub async fn delete<R: OrderRepository>(
    State(service): State<Arc<OrderService<R>>>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, ApiError> {
    let order_id = parse_uuid::<OrderId>(&id, "order id")?;
    service.delete_order(order_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// POST /orders/:id/complete — `paid → completed`.
#[tracing::instrument(skip(service))]
pub async fn complete<R: OrderRepository>(
    State(service): State<Arc<OrderService<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_uuid::<OrderId>(&id, "order id")?;
    let order = service.complete_order(order_id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/:id/cancel — user cancellation.
#[tracing::instrument(skip(service))]
pub async fn cancel<R: OrderRepository>(
    State(service): State<Arc<OrderService<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_uuid::<OrderId>(&id, "order id")?;
    let order = service.cancel_order(order_id).await?;
    Ok(Json(order.into()))
}

fn parse_uuid<T: From<uuid::Uuid>>(raw: &str, what: &str) -> Result<T, ApiError> {
    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid {what}: {e}")))?;
    Ok(T::from(uuid))
}

fn parse_enum<T>(raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = common::UnknownVariant>,
{
    raw.parse::<T>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}
