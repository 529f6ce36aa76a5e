// HTTP handlers for inventory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::error::ApiError;
use crate::inventory::models::{
    AdjustStockRequest, BulkAdjustRequest, BulkAdjustResponse, CreateProductRequest,
    InventoryLog, InventoryProductResponse, LogQuery, LowStockQuery, MovementRequest,
    QuantityRequest, SaleRequest,
};
use crate::inventory::stock_rules::{LogContext, LOW_STOCK_THRESHOLD};
use crate::AppState;

/// Handler for POST /api/inventory/products
#[utoipa::path(
    post,
    path = "/api/inventory/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product registered", body = InventoryProductResponse),
        (status = 400, description = "Invalid input data"),
        (status = 409, description = "SKU already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<InventoryProductResponse>), ApiError> {
    payload.validate()?;
    let product = state.inventory_tracker.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// Handler for GET /api/inventory/products/{id}
#[utoipa::path(
    get,
    path = "/api/inventory/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Inventory view", body = InventoryProductResponse),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InventoryProductResponse>, ApiError> {
    let product = state.inventory_tracker.get_product(id).await?;
    Ok(Json(product.into()))
}

/// Handler for PUT /api/inventory/products/{id}/stock
#[utoipa::path(
    put,
    path = "/api/inventory/products/{id}/stock",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = InventoryProductResponse),
        (status = 400, description = "Negative stock"),
        (status = 404, description = "Product not found"),
        (status = 422, description = "Inventory tracking disabled")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<Json<InventoryProductResponse>, ApiError> {
    payload.validate()?;
    let product = state
        .inventory_tracker
        .adjust_stock(id, payload.new_stock, payload.reason, payload.notes, Some(admin.user_id))
        .await?;
    Ok(Json(product.into()))
}

/// Handler for POST /api/inventory/bulk-update
/// Per-product failures are reported in `errors` and do not fail the request
#[utoipa::path(
    post,
    path = "/api/inventory/bulk-update",
    request_body = BulkAdjustRequest,
    responses(
        (status = 200, description = "Batch processed", body = BulkAdjustResponse),
        (status = 400, description = "Empty batch")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn bulk_adjust_stock(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<BulkAdjustRequest>,
) -> Result<Json<BulkAdjustResponse>, ApiError> {
    payload.validate()?;
    let response = state
        .inventory_tracker
        .bulk_adjust_stock(payload.updates, Some(admin.user_id))
        .await?;
    Ok(Json(response))
}

/// Handler for POST /api/inventory/products/{id}/reserve
#[utoipa::path(
    post,
    path = "/api/inventory/products/{id}/reserve",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Units reserved", body = InventoryProductResponse),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn reserve_stock(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuantityRequest>,
) -> Result<Json<InventoryProductResponse>, ApiError> {
    payload.validate()?;
    let product = state.inventory_tracker.reserve(id, payload.quantity).await?;
    Ok(Json(product.into()))
}

/// Handler for POST /api/inventory/products/{id}/release
#[utoipa::path(
    post,
    path = "/api/inventory/products/{id}/release",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Units released", body = InventoryProductResponse),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn release_stock(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuantityRequest>,
) -> Result<Json<InventoryProductResponse>, ApiError> {
    payload.validate()?;
    let product = state.inventory_tracker.release(id, payload.quantity).await?;
    Ok(Json(product.into()))
}

/// Handler for POST /api/inventory/products/{id}/sale
#[utoipa::path(
    post,
    path = "/api/inventory/products/{id}/sale",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = SaleRequest,
    responses(
        (status = 200, description = "Sale confirmed", body = InventoryProductResponse),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn confirm_sale(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaleRequest>,
) -> Result<Json<InventoryProductResponse>, ApiError> {
    payload.validate()?;
    let product = state
        .inventory_tracker
        .confirm_sale(id, payload.quantity, payload.order_id, Some(admin.user_id))
        .await?;
    Ok(Json(product.into()))
}

/// Handler for POST /api/inventory/products/{id}/movements
#[utoipa::path(
    post,
    path = "/api/inventory/products/{id}/movements",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = MovementRequest,
    responses(
        (status = 200, description = "Movement recorded", body = InventoryProductResponse),
        (status = 404, description = "Product not found"),
        (status = 422, description = "Inventory tracking disabled")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MovementRequest>,
) -> Result<Json<InventoryProductResponse>, ApiError> {
    payload.validate()?;
    let context = LogContext {
        reason: payload.reason,
        notes: payload.notes,
        performed_by: Some(admin.user_id),
        related_order: payload.related_order,
    };
    let product = state
        .inventory_tracker
        .record_movement(id, payload.kind, payload.quantity, context)
        .await?;
    Ok(Json(product.into()))
}

/// Handler for GET /api/inventory/products/{id}/logs
#[utoipa::path(
    get,
    path = "/api/inventory/products/{id}/logs",
    params(("id" = Uuid, Path, description = "Product id"), LogQuery),
    responses(
        (status = 200, description = "Inventory log, newest first", body = Vec<InventoryLog>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn list_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<InventoryLog>>, ApiError> {
    Ok(Json(state.inventory_tracker.list_logs(id, query.limit).await?))
}

/// Handler for GET /api/inventory/low-stock
#[utoipa::path(
    get,
    path = "/api/inventory/low-stock",
    params(LowStockQuery),
    responses(
        (status = 200, description = "Tracked products at or below the threshold", body = Vec<InventoryProductResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<InventoryProductResponse>>, ApiError> {
    let threshold = query.threshold.unwrap_or(LOW_STOCK_THRESHOLD);
    let products = state.inventory_tracker.low_stock(threshold).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}
