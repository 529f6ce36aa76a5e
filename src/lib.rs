// Storefront Rules API
//
// Coupon validation and redemption plus inventory stock tracking, served over
// axum with PostgreSQL persistence.

pub mod auth;
pub mod config;
pub mod coupons;
pub mod db;
pub mod error;
pub mod inventory;
pub mod metrics;

use axum::{
    extract::{FromRef, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use auth::{AdminUser, TokenService};
use coupons::{CouponService, CouponStore};
use inventory::{InventoryStore, InventoryTracker};
use metrics::{EngineMetrics, MetricsSummary};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        coupons::handlers::create_coupon,
        coupons::handlers::list_coupons,
        coupons::handlers::get_coupon,
        coupons::handlers::update_coupon,
        coupons::handlers::delete_coupon,
        coupons::handlers::validate_coupon,
        coupons::handlers::redeem_coupon,
        inventory::handlers::create_product,
        inventory::handlers::get_product,
        inventory::handlers::adjust_stock,
        inventory::handlers::bulk_adjust_stock,
        inventory::handlers::reserve_stock,
        inventory::handlers::release_stock,
        inventory::handlers::confirm_sale,
        inventory::handlers::record_movement,
        inventory::handlers::list_logs,
        inventory::handlers::low_stock,
        get_metrics,
    ),
    components(schemas(
        coupons::Coupon,
        coupons::CouponRedemption,
        coupons::CouponType,
        coupons::CreateCouponRequest,
        coupons::UpdateCouponRequest,
        coupons::ValidateCouponRequest,
        coupons::CouponValidationResponse,
        coupons::RedeemCouponRequest,
        coupons::RedemptionResponse,
        inventory::models::CreateProductRequest,
        inventory::models::AdjustStockRequest,
        inventory::models::BulkStockUpdate,
        inventory::models::BulkAdjustRequest,
        inventory::models::BulkAdjustFailure,
        inventory::models::BulkAdjustResponse,
        inventory::models::QuantityRequest,
        inventory::models::SaleRequest,
        inventory::models::MovementRequest,
        inventory::models::InventoryProductResponse,
        inventory::InventoryLog,
        inventory::InventoryLogType,
        inventory::MovementKind,
        inventory::StockStatus,
        MetricsSummary,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "coupons", description = "Coupon administration, validation and redemption"),
        (name = "inventory", description = "Stock tracking, reservations and inventory log"),
        (name = "metrics", description = "Engine counters")
    ),
    info(
        title = "Storefront Rules API",
        version = "1.0.0",
        description = "Coupon rules and inventory stock tracking"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coupon_service: CouponService,
    pub inventory_tracker: InventoryTracker,
    pub token_service: Arc<TokenService>,
    pub metrics: EngineMetrics,
}

impl AppState {
    /// Wire both engines to their stores with one shared metrics registry
    pub fn new(
        coupon_store: Arc<dyn CouponStore>,
        inventory_store: Arc<dyn InventoryStore>,
        token_service: Arc<TokenService>,
    ) -> Self {
        let metrics = EngineMetrics::new();
        Self {
            coupon_service: CouponService::new(coupon_store, metrics.clone()),
            inventory_tracker: InventoryTracker::new(inventory_store, metrics.clone()),
            token_service,
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.token_service.clone()
    }
}

/// Handler for GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Handler for GET /api/metrics
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Engine counters", body = MetricsSummary),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = [])),
    tag = "metrics"
)]
async fn get_metrics(State(state): State<AppState>, _admin: AdminUser) -> Json<MetricsSummary> {
    Json(state.metrics.summary())
}

/// Creates and configures the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/api/metrics", get(get_metrics))
        // Coupons
        .route(
            "/api/coupons",
            post(coupons::handlers::create_coupon).get(coupons::handlers::list_coupons),
        )
        .route("/api/coupons/validate", post(coupons::handlers::validate_coupon))
        .route(
            "/api/coupons/:id",
            get(coupons::handlers::get_coupon)
                .put(coupons::handlers::update_coupon)
                .delete(coupons::handlers::delete_coupon),
        )
        .route("/api/coupons/:id/redeem", post(coupons::handlers::redeem_coupon))
        // Inventory
        .route("/api/inventory/products", post(inventory::handlers::create_product))
        .route("/api/inventory/products/:id", get(inventory::handlers::get_product))
        .route("/api/inventory/products/:id/stock", put(inventory::handlers::adjust_stock))
        .route("/api/inventory/bulk-update", post(inventory::handlers::bulk_adjust_stock))
        .route("/api/inventory/products/:id/reserve", post(inventory::handlers::reserve_stock))
        .route("/api/inventory/products/:id/release", post(inventory::handlers::release_stock))
        .route("/api/inventory/products/:id/sale", post(inventory::handlers::confirm_sale))
        .route(
            "/api/inventory/products/:id/movements",
            post(inventory::handlers::record_movement),
        )
        .route("/api/inventory/products/:id/logs", get(inventory::handlers::list_logs))
        .route("/api/inventory/low-stock", get(inventory::handlers::low_stock))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
