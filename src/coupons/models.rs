use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// How a coupon's `value` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CouponType {
    /// `value` is a percentage of the cart total (0..=100)
    Percentage,
    /// `value` is a currency amount taken off the cart total
    Fixed,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Percentage => "percentage",
            CouponType::Fixed => "fixed",
        }
    }
}

impl std::fmt::Display for CouponType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded use of a coupon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CouponRedemption {
    #[schema(example = 42)]
    pub user_id: i32,
    pub used_at: DateTime<Utc>,
    #[schema(value_type = String, example = "200.00")]
    pub order_amount: Decimal,
    #[schema(value_type = String, example = "50.00")]
    pub discount_amount: Decimal,
}

/// Discount coupon with its redemption history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    /// Upper-cased and trimmed; unique across coupons
    #[schema(example = "SAVE50")]
    pub code: String,
    pub description: Option<String>,
    pub coupon_type: CouponType,
    #[schema(value_type = String, example = "50")]
    pub value: Decimal,
    #[schema(value_type = String, example = "100")]
    pub min_purchase: Decimal,
    #[schema(value_type = Option<String>, example = "30")]
    pub max_discount: Option<Decimal>,
    /// Absent means unlimited
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Empty means every product qualifies
    pub applicable_products: Vec<Uuid>,
    /// Empty means every category qualifies
    pub applicable_categories: Vec<Uuid>,
    pub is_active: bool,
    pub used_by: Vec<CouponRedemption>,
    /// Stored and returned, not enforced
    pub allowed_users: Vec<i32>,
    /// Stored and returned, not enforced
    pub limit_to_first_purchase: bool,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn has_been_used_by(&self, user_id: i32) -> bool {
        self.used_by.iter().any(|r| r.user_id == user_id)
    }

    pub fn usage_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.used_count >= limit)
    }
}

/// Normalize a coupon code for storage and lookup
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative");
        err.message = Some(Cow::from("Value must not be negative"));
        return Err(err);
    }
    Ok(())
}

/// Keep an explicit `null` as `Some(None)` so updates can clear a field
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn non_blank(code: &str) -> Result<(), ValidationError> {
    if code.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::from("Code must not be blank"));
        return Err(err);
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

/// Request DTO for creating a coupon
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCouponRequest {
    #[validate(
        length(min = 1, max = 50, message = "Code must be between 1 and 50 characters"),
        custom = "non_blank"
    )]
    #[schema(example = "save50")]
    pub code: String,
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: Option<String>,
    pub coupon_type: CouponType,
    #[validate(custom = "non_negative")]
    #[schema(value_type = String, example = "50")]
    pub value: Decimal,
    #[validate(custom = "non_negative")]
    #[schema(value_type = Option<String>, example = "100")]
    pub min_purchase: Option<Decimal>,
    #[validate(custom = "non_negative")]
    #[schema(value_type = Option<String>)]
    pub max_discount: Option<Decimal>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,
    /// Defaults to now
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub applicable_products: Vec<Uuid>,
    #[serde(default)]
    pub applicable_categories: Vec<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub allowed_users: Vec<i32>,
    #[serde(default)]
    pub limit_to_first_purchase: bool,
}

/// Request DTO for a partial coupon update
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCouponRequest {
    #[validate(
        length(min = 1, max = 50, message = "Code must be between 1 and 50 characters"),
        custom = "non_blank"
    )]
    pub code: Option<String>,
    /// `null` clears the description
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
    pub coupon_type: Option<CouponType>,
    #[validate(custom = "non_negative")]
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    #[validate(custom = "non_negative")]
    #[schema(value_type = Option<String>)]
    pub min_purchase: Option<Decimal>,
    /// `null` removes the cap
    #[validate(custom = "non_negative")]
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, nullable)]
    pub max_discount: Option<Option<Decimal>>,
    /// `null` makes the coupon unlimited
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>, nullable)]
    pub usage_limit: Option<Option<i32>>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub applicable_products: Option<Vec<Uuid>>,
    pub applicable_categories: Option<Vec<Uuid>>,
    pub is_active: Option<bool>,
    pub allowed_users: Option<Vec<i32>>,
    pub limit_to_first_purchase: Option<bool>,
}

impl UpdateCouponRequest {
    /// Copy every provided field onto `coupon`; explicit nulls clear optional fields
    pub fn apply_to(self, coupon: &mut Coupon) {
        if let Some(code) = self.code {
            coupon.code = normalize_code(&code);
        }
        if let Some(description) = self.description {
            coupon.description = description;
        }
        if let Some(coupon_type) = self.coupon_type {
            coupon.coupon_type = coupon_type;
        }
        if let Some(value) = self.value {
            coupon.value = value;
        }
        if let Some(min_purchase) = self.min_purchase {
            coupon.min_purchase = min_purchase;
        }
        if let Some(max_discount) = self.max_discount {
            coupon.max_discount = max_discount;
        }
        if let Some(usage_limit) = self.usage_limit {
            coupon.usage_limit = usage_limit;
        }
        if let Some(valid_from) = self.valid_from {
            coupon.valid_from = valid_from;
        }
        if let Some(valid_until) = self.valid_until {
            coupon.valid_until = valid_until;
        }
        if let Some(products) = self.applicable_products {
            coupon.applicable_products = products;
        }
        if let Some(categories) = self.applicable_categories {
            coupon.applicable_categories = categories;
        }
        if let Some(is_active) = self.is_active {
            coupon.is_active = is_active;
        }
        if let Some(allowed_users) = self.allowed_users {
            coupon.allowed_users = allowed_users;
        }
        if let Some(first_purchase) = self.limit_to_first_purchase {
            coupon.limit_to_first_purchase = first_purchase;
        }
    }
}

/// Request DTO for checking a code against a cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    #[schema(example = "SAVE50")]
    pub code: String,
    #[validate(custom = "non_negative")]
    #[schema(value_type = String, example = "200.00")]
    pub cart_total: Decimal,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

/// Outcome of checking a code against a cart
///
/// `discount` and `final_amount` are only present when the coupon applies.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponValidationResponse {
    pub valid: bool,
    pub coupon_id: Uuid,
    pub code: String,
    pub errors: Vec<String>,
    /// First error, if any
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub final_amount: Option<Decimal>,
}

/// Request DTO for redeeming a coupon against an order
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RedeemCouponRequest {
    #[validate(custom = "non_negative")]
    #[schema(value_type = String, example = "200.00")]
    pub order_amount: Decimal,
}

/// Result of a successful redemption
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedemptionResponse {
    pub coupon_id: Uuid,
    pub code: String,
    #[schema(value_type = String)]
    pub discount: Decimal,
    #[schema(value_type = String)]
    pub final_amount: Decimal,
    pub used_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupons::engine::test_support::sample_coupon;
    use rust_decimal_macros::dec;

    fn create_request() -> CreateCouponRequest {
        CreateCouponRequest {
            code: " save50 ".to_string(),
            description: None,
            coupon_type: CouponType::Fixed,
            value: dec!(50),
            min_purchase: Some(dec!(100)),
            max_discount: None,
            usage_limit: Some(10),
            valid_from: None,
            valid_until: Utc::now() + chrono::Duration::days(7),
            applicable_products: vec![],
            applicable_categories: vec![],
            is_active: true,
            allowed_users: vec![],
            limit_to_first_purchase: false,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  save50 "), "SAVE50");
        assert_eq!(normalize_code("Summer-Sale"), "SUMMER-SALE");
    }

    #[test]
    fn test_valid_create_request() {
        assert!(create_request().validate().is_ok());
    }

    #[test]
    fn test_negative_value_rejected() {
        let mut request = create_request();
        request.value = dec!(-1);
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("value"));
    }

    #[test]
    fn test_zero_usage_limit_rejected() {
        let mut request = create_request();
        request.usage_limit = Some(0);
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("usage_limit"));
    }

    #[test]
    fn test_blank_code_rejected() {
        let mut request = create_request();
        request.code = "   ".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_update_null_clears_optional_limits() {
        let json = serde_json::json!({
            "usage_limit": null,
            "max_discount": null,
            "description": null
        });
        let request: UpdateCouponRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.usage_limit, Some(None));
        assert_eq!(request.max_discount, Some(None));
        assert!(request.validate().is_ok());

        let mut coupon = sample_coupon();
        coupon.usage_limit = Some(3);
        coupon.max_discount = Some(dec!(5));
        coupon.description = Some("Launch offer".to_string());
        request.apply_to(&mut coupon);

        assert_eq!(coupon.usage_limit, None);
        assert_eq!(coupon.max_discount, None);
        assert_eq!(coupon.description, None);
    }

    #[test]
    fn test_update_absent_fields_leave_coupon_unchanged() {
        let request: UpdateCouponRequest =
            serde_json::from_value(serde_json::json!({ "is_active": false })).unwrap();
        assert_eq!(request.usage_limit, None);

        let mut coupon = sample_coupon();
        coupon.usage_limit = Some(3);
        request.apply_to(&mut coupon);

        assert_eq!(coupon.usage_limit, Some(3));
        assert!(!coupon.is_active);
    }

    #[test]
    fn test_update_zero_usage_limit_rejected() {
        let request = UpdateCouponRequest {
            usage_limit: Some(Some(0)),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_coupon_type_serde() {
        assert_eq!(serde_json::to_string(&CouponType::Percentage).unwrap(), "\"percentage\"");
        let parsed: CouponType = serde_json::from_str("\"fixed\"").unwrap();
        assert_eq!(parsed, CouponType::Fixed);
    }

    #[test]
    fn test_is_active_defaults_to_true() {
        let json = serde_json::json!({
            "code": "X",
            "coupon_type": "fixed",
            "value": "5",
            "valid_until": "2030-01-01T00:00:00Z"
        });
        let request: CreateCouponRequest = serde_json::from_value(json).unwrap();
        assert!(request.is_active);
        assert!(request.applicable_products.is_empty());
    }
}
