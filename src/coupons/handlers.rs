// HTTP handlers for coupon endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::coupons::models::{
    Coupon, CouponValidationResponse, CreateCouponRequest, RedeemCouponRequest,
    RedemptionResponse, UpdateCouponRequest, ValidateCouponRequest,
};
use crate::error::ApiError;
use crate::AppState;

/// Handler for POST /api/coupons
#[utoipa::path(
    post,
    path = "/api/coupons",
    request_body = CreateCouponRequest,
    responses(
        (status = 201, description = "Coupon created", body = Coupon),
        (status = 400, description = "Invalid coupon definition"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Coupon code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    payload.validate()?;

    let coupon = state
        .coupon_service
        .create_coupon(payload, Some(admin.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Handler for GET /api/coupons
#[utoipa::path(
    get,
    path = "/api/coupons",
    responses(
        (status = 200, description = "All coupons, newest first", body = Vec<Coupon>),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Coupon>>, ApiError> {
    Ok(Json(state.coupon_service.list_coupons().await?))
}

/// Handler for GET /api/coupons/{id}
#[utoipa::path(
    get,
    path = "/api/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    responses(
        (status = 200, description = "Coupon found", body = Coupon),
        (status = 404, description = "Coupon not found")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Coupon>, ApiError> {
    Ok(Json(state.coupon_service.get_coupon(id).await?))
}

/// Handler for PUT /api/coupons/{id}
/// Only the fields present in the body are changed
#[utoipa::path(
    put,
    path = "/api/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    request_body = UpdateCouponRequest,
    responses(
        (status = 200, description = "Coupon updated", body = Coupon),
        (status = 400, description = "Invalid coupon definition"),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Coupon code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponRequest>,
) -> Result<Json<Coupon>, ApiError> {
    payload.validate()?;
    Ok(Json(state.coupon_service.update_coupon(id, payload).await?))
}

/// Handler for DELETE /api/coupons/{id}
#[utoipa::path(
    delete,
    path = "/api/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.coupon_service.delete_coupon(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/coupons/validate
/// Checks a code against the caller's cart; a rejected coupon still returns 200
#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Validation outcome", body = CouponValidationResponse),
        (status = 404, description = "Unknown coupon code")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<Json<CouponValidationResponse>, ApiError> {
    payload.validate()?;
    Ok(Json(
        state
            .coupon_service
            .validate_coupon(user.user_id, payload)
            .await?,
    ))
}

/// Handler for POST /api/coupons/{id}/redeem
#[utoipa::path(
    post,
    path = "/api/coupons/{id}/redeem",
    params(("id" = Uuid, Path, description = "Coupon id")),
    request_body = RedeemCouponRequest,
    responses(
        (status = 200, description = "Redemption recorded", body = RedemptionResponse),
        (status = 400, description = "Coupon not applicable"),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Usage limit reached or already used")
    ),
    security(("bearer_auth" = [])),
    tag = "coupons"
)]
pub async fn redeem_coupon(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RedeemCouponRequest>,
) -> Result<Json<RedemptionResponse>, ApiError> {
    payload.validate()?;
    Ok(Json(
        state
            .coupon_service
            .redeem_coupon(id, user.user_id, payload.order_amount)
            .await?,
    ))
}
