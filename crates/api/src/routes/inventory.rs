//! Inventory quantity endpoints.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use common::ProductId;
use inventory::{InventoryItem, InventoryRepository, InventoryService, QuantityLine};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Builds the inventory sub-router.
pub fn router<R>(service: Arc<InventoryService<R>>) -> Router
where
    R: InventoryRepository + 'static,
{
    Router::new()
        .route("/inventory/batch", post(set_items::<R>))
        .route("/inventory/reservable", post(is_reservable::<R>))
        .route("/inventory/{id}", get(get_item::<R>).post(set_item::<R>))
        .route("/inventory/{id}/{op}", post(unary::<R>))
        .with_state(service)
}

// -- Request types --

#[derive(Deserialize)]
pub struct SetItemRequest {
    pub quantity: u64,
    pub operation: String,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: u64,
}

#[derive(Deserialize)]
pub struct ItemLineRequest {
    pub product_id: String,
    pub quantity: u64,
}

#[derive(Deserialize)]
pub struct SetItemsRequest {
    pub items: Vec<ItemLineRequest>,
    pub operation: String,
}

#[derive(Deserialize)]
pub struct ReservableRequest {
    pub items: Vec<ItemLineRequest>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ItemResponse {
    pub product_id: String,
    pub available: u64,
    pub reserved: u64,
}

#[derive(Serialize)]
pub struct ReservableResponse {
    pub reservable: bool,
}

impl From<InventoryItem> for ItemResponse {
    fn from(item: InventoryItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            available: item.available,
            reserved: item.reserved,
        }
    }
}

// -- Handlers --

/// GET /inventory/:id — current (available, reserved) counts.
#[tracing::instrument(skip(service))]
pub async fn get_item<R: InventoryRepository>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let item = service.get_item(product_id).await?;
    Ok(Json(item.into()))
}

/// POST /inventory/:id — apply an operation given in wire form.
#[tracing::instrument(skip(service, req))]
pub async fn set_item<R: InventoryRepository>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(id): Path<String>,
    Json(req): Json<SetItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let item = service
        .set_item(product_id, req.quantity, &req.operation)
        .await?;
    Ok(Json(item.into()))
}

/// POST /inventory/:id/:op — unary quantity operation.
#[tracing::instrument(skip(service, req))]
pub async fn unary<R: InventoryRepository>(
    State(service): State<Arc<InventoryService<R>>>,
    Path((id, op)): Path<(String, String)>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    // Path segments use hyphens; the operation wire form uses underscores.
    let item = service
        .set_item(product_id, req.quantity, &op.replace('-', "_"))
        .await?;
    Ok(Json(item.into()))
}

/// POST /inventory/batch — apply one operation to many products atomically.
#[tracing::instrument(skip(service, req))]
pub async fn set_items<R: InventoryRepository>(
    State(service): State<Arc<InventoryService<R>>>,
    Json(req): Json<SetItemsRequest>,
) -> Result<axum::http::StatusCode, ApiError> {
    let lines = parse_lines(&req.items)?;
    service.set_items(&lines, &req.operation).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// POST /inventory/reservable — can every line be reserved right now?
#[tracing::instrument(skip(service, req))]
pub async fn is_reservable<R: InventoryRepository>(
    State(service): State<Arc<InventoryService<R>>>,
    Json(req): Json<ReservableRequest>,
) -> Result<Json<ReservableResponse>, ApiError> {
    let lines = parse_lines(&req.items)?;
    let reservable = service.is_reservable(&lines).await?;
    Ok(Json(ReservableResponse { reservable }))
}

fn parse_product_id(id: &str) -> Result<ProductId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid product id: {e}")))?;
    Ok(ProductId::from_uuid(uuid))
}

fn parse_lines(items: &[ItemLineRequest]) -> Result<Vec<QuantityLine>, ApiError> {
    items
        .iter()
        .map(|item| {
            Ok(QuantityLine {
                product_id: parse_product_id(&item.product_id)?,
                quantity: item.quantity,
            })
        })
        .collect()
}
