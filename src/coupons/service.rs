use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coupons::engine::{CartContext, CouponEngine};
use crate::coupons::error::CouponError;
use crate::coupons::models::{
    normalize_code, Coupon, CouponValidationResponse, CreateCouponRequest, RedemptionResponse,
    UpdateCouponRequest, ValidateCouponRequest,
};
use crate::coupons::store::CouponStore;
use crate::metrics::EngineMetrics;

/// Service for coupon administration, validation and redemption
#[derive(Clone)]
pub struct CouponService {
    store: Arc<dyn CouponStore>,
    metrics: EngineMetrics,
}

impl CouponService {
    pub fn new(store: Arc<dyn CouponStore>, metrics: EngineMetrics) -> Self {
        Self { store, metrics }
    }

    /// Create a coupon on behalf of an administrator
    ///
    /// The code is normalized before the uniqueness check, so `save50` and
    /// `SAVE50 ` collide.
    pub async fn create_coupon(
        &self,
        request: CreateCouponRequest,
        created_by: Option<i32>,
    ) -> Result<Coupon, CouponError> {
        let now = Utc::now();
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: normalize_code(&request.code),
            description: request.description,
            coupon_type: request.coupon_type,
            value: request.value,
            min_purchase: request.min_purchase.unwrap_or(Decimal::ZERO),
            max_discount: request.max_discount,
            usage_limit: request.usage_limit,
            used_count: 0,
            valid_from: request.valid_from.unwrap_or(now),
            valid_until: request.valid_until,
            applicable_products: request.applicable_products,
            applicable_categories: request.applicable_categories,
            is_active: request.is_active,
            used_by: Vec::new(),
            allowed_users: request.allowed_users,
            limit_to_first_purchase: request.limit_to_first_purchase,
            created_by,
            created_at: now,
            updated_at: now,
        };

        CouponEngine::check_definition(&coupon)?;

        let coupon = self.store.insert(coupon).await?;
        info!("Created coupon {} ({})", coupon.code, coupon.id);
        Ok(coupon)
    }

    pub async fn list_coupons(&self) -> Result<Vec<Coupon>, CouponError> {
        let coupons = self.store.list().await?;
        debug!("Retrieved {} coupons", coupons.len());
        Ok(coupons)
    }

    pub async fn get_coupon(&self, id: Uuid) -> Result<Coupon, CouponError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| CouponError::NotFound(id.to_string()))
    }

    /// Apply a partial update and re-check the resulting definition
    ///
    /// The check runs on the locked row, so a limit can't be lowered below
    /// redemptions written concurrently.
    pub async fn update_coupon(
        &self,
        id: Uuid,
        request: UpdateCouponRequest,
    ) -> Result<Coupon, CouponError> {
        let coupon = self
            .store
            .update(
                id,
                Box::new(move |coupon: &mut Coupon| {
                    request.apply_to(coupon);
                    CouponEngine::check_definition(coupon)
                }),
            )
            .await?;
        info!("Updated coupon {} ({})", coupon.code, coupon.id);
        Ok(coupon)
    }

    pub async fn delete_coupon(&self, id: Uuid) -> Result<(), CouponError> {
        if !self.store.delete(id).await? {
            return Err(CouponError::NotFound(id.to_string()));
        }
        info!("Deleted coupon {}", id);
        Ok(())
    }

    /// Check a code against a cart without recording anything
    ///
    /// A failed rule is not an error: the response carries `valid = false`
    /// with every reason. Only an unknown code is an error.
    pub async fn validate_coupon(
        &self,
        user_id: i32,
        request: ValidateCouponRequest,
    ) -> Result<CouponValidationResponse, CouponError> {
        let _timer = self.metrics.start_coupon_validation();
        let code = normalize_code(&request.code);

        let coupon = self
            .store
            .find_by_code(&code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.clone()))?;

        let cart = CartContext {
            user_id,
            cart_total: request.cart_total,
            product_ids: request.product_ids,
            category_ids: request.category_ids,
        };
        let validation = CouponEngine::validate(&coupon, &cart, Utc::now());
        self.metrics.record_coupon_validation(validation.valid);

        if !validation.valid {
            debug!(
                "Coupon {} rejected for user {}: {:?}",
                coupon.code, user_id, validation.errors
            );
            return Ok(CouponValidationResponse {
                valid: false,
                coupon_id: coupon.id,
                code: coupon.code,
                message: validation.first_error().map(str::to_string),
                errors: validation.errors,
                discount: None,
                final_amount: None,
            });
        }

        let discount = CouponEngine::calculate_discount(&coupon, cart.cart_total);
        Ok(CouponValidationResponse {
            valid: true,
            coupon_id: coupon.id,
            code: coupon.code,
            errors: Vec::new(),
            message: None,
            discount: Some(discount),
            final_amount: Some(cart.cart_total - discount),
        })
    }

    /// Record a redemption for `user_id`
    ///
    /// Limit and one-per-user checks run inside the store's critical section,
    /// so concurrent redemptions cannot overrun `usage_limit`.
    pub async fn redeem_coupon(
        &self,
        coupon_id: Uuid,
        user_id: i32,
        order_amount: Decimal,
    ) -> Result<RedemptionResponse, CouponError> {
        let outcome = self
            .store
            .redeem(
                coupon_id,
                Box::new(move |coupon: &Coupon| {
                    CouponEngine::check_redemption(coupon, user_id, order_amount, Utc::now())
                }),
            )
            .await
            .map_err(|e| {
                if matches!(e, CouponError::RedemptionConflict(_) | CouponError::ValidationFailed(_)) {
                    warn!("Redemption of coupon {} by user {} refused: {}", coupon_id, user_id, e);
                }
                e
            })?;

        self.metrics.record_coupon_redemption();
        info!(
            "User {} redeemed coupon {} for {} off {}",
            user_id, outcome.coupon.code, outcome.redemption.discount_amount, order_amount
        );

        Ok(RedemptionResponse {
            coupon_id: outcome.coupon.id,
            code: outcome.coupon.code,
            discount: outcome.redemption.discount_amount,
            final_amount: order_amount - outcome.redemption.discount_amount,
            used_count: outcome.coupon.used_count,
        })
    }
}
