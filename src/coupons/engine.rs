// Coupon Engine
//
// Pure rule evaluation for coupons: eligibility checks against a cart,
// discount arithmetic, and the checks that gate a redemption write.
// Nothing here touches storage; stores call into it while holding the row.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::coupons::error::CouponError;
use crate::coupons::models::{Coupon, CouponRedemption, CouponType};

pub const MSG_INACTIVE: &str = "Coupon is not active";
pub const MSG_EXPIRED: &str = "Coupon has expired";
pub const MSG_USAGE_LIMIT: &str = "Coupon usage limit reached";
pub const MSG_ALREADY_USED: &str = "You have already used this coupon";
pub const MSG_PRODUCTS: &str = "Coupon is not applicable to products in cart";
pub const MSG_CATEGORIES: &str = "Coupon is not applicable to categories in cart";

/// What the caller is trying to apply a coupon to
#[derive(Debug, Clone)]
pub struct CartContext {
    pub user_id: i32,
    pub cart_total: Decimal,
    pub product_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
}

/// Result of evaluating every eligibility rule
#[derive(Debug, Clone, PartialEq)]
pub struct CouponValidation {
    pub valid: bool,
    /// All failed rules, in evaluation order
    pub errors: Vec<String>,
}

impl CouponValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

fn min_purchase_message(min: Decimal) -> String {
    format!("Minimum purchase amount of {} required", min)
}

fn overlaps(restriction: &[Uuid], cart: &[Uuid]) -> bool {
    restriction.iter().any(|id| cart.contains(id))
}

/// Coupon rule evaluation
pub struct CouponEngine;

impl CouponEngine {
    /// Evaluate every eligibility rule and collect all failures
    pub fn validate(coupon: &Coupon, cart: &CartContext, now: DateTime<Utc>) -> CouponValidation {
        let mut errors = Vec::new();

        if !coupon.is_active {
            errors.push(MSG_INACTIVE.to_string());
        }
        if now > coupon.valid_until {
            errors.push(MSG_EXPIRED.to_string());
        }
        if coupon.usage_exhausted() {
            errors.push(MSG_USAGE_LIMIT.to_string());
        }
        if cart.cart_total < coupon.min_purchase {
            errors.push(min_purchase_message(coupon.min_purchase));
        }
        if coupon.has_been_used_by(cart.user_id) {
            errors.push(MSG_ALREADY_USED.to_string());
        }
        if !coupon.applicable_products.is_empty()
            && !overlaps(&coupon.applicable_products, &cart.product_ids)
        {
            errors.push(MSG_PRODUCTS.to_string());
        }
        if !coupon.applicable_categories.is_empty()
            && !overlaps(&coupon.applicable_categories, &cart.category_ids)
        {
            errors.push(MSG_CATEGORIES.to_string());
        }

        CouponValidation::from_errors(errors)
    }

    /// Discount for `cart_total`, always within `[0, cart_total]`
    ///
    /// Percentage coupons are capped at `max_discount`; the result is
    /// rounded to cents (half a cent rounds up) before the final clamp.
    pub fn calculate_discount(coupon: &Coupon, cart_total: Decimal) -> Decimal {
        let raw = match coupon.coupon_type {
            CouponType::Percentage => {
                let discount = cart_total * coupon.value / Decimal::ONE_HUNDRED;
                match coupon.max_discount {
                    Some(cap) => discount.min(cap),
                    None => discount,
                }
            }
            CouponType::Fixed => coupon.value,
        };

        raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .min(cart_total)
            .max(Decimal::ZERO)
    }

    /// Checks run on the locked row right before a redemption is written
    ///
    /// Limit and one-per-user violations are conflicts; the remaining rules
    /// that can be judged without a cart come back as validation failures.
    pub fn check_redemption(
        coupon: &Coupon,
        user_id: i32,
        order_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CouponRedemption, CouponError> {
        if coupon.usage_exhausted() {
            return Err(CouponError::RedemptionConflict(MSG_USAGE_LIMIT.to_string()));
        }
        if coupon.has_been_used_by(user_id) {
            return Err(CouponError::RedemptionConflict(MSG_ALREADY_USED.to_string()));
        }

        let mut errors = Vec::new();
        if !coupon.is_active {
            errors.push(MSG_INACTIVE.to_string());
        }
        if now > coupon.valid_until {
            errors.push(MSG_EXPIRED.to_string());
        }
        if order_amount < coupon.min_purchase {
            errors.push(min_purchase_message(coupon.min_purchase));
        }
        if !errors.is_empty() {
            return Err(CouponError::ValidationFailed(errors));
        }

        Ok(CouponRedemption {
            user_id,
            used_at: now,
            order_amount,
            discount_amount: Self::calculate_discount(coupon, order_amount),
        })
    }

    /// Cross-field checks on a coupon definition (create and update)
    pub fn check_definition(coupon: &Coupon) -> Result<(), CouponError> {
        if coupon.code.is_empty() {
            return Err(CouponError::InvalidDefinition("Code must not be blank".to_string()));
        }
        if coupon.value < Decimal::ZERO {
            return Err(CouponError::InvalidDefinition("Value must not be negative".to_string()));
        }
        if coupon.coupon_type == CouponType::Percentage && coupon.value > Decimal::ONE_HUNDRED {
            return Err(CouponError::InvalidDefinition(
                "Percentage value must not exceed 100".to_string(),
            ));
        }
        if coupon.valid_until <= coupon.valid_from {
            return Err(CouponError::InvalidDefinition(
                "valid_until must be after valid_from".to_string(),
            ));
        }
        if let Some(limit) = coupon.usage_limit {
            if limit < 1 {
                return Err(CouponError::InvalidDefinition(
                    "Usage limit must be at least 1".to_string(),
                ));
            }
            if coupon.used_count > limit {
                return Err(CouponError::InvalidDefinition(format!(
                    "Usage limit {} is below the {} redemptions already made",
                    limit, coupon.used_count
                )));
            }
        }
        Ok(())
    }
}
