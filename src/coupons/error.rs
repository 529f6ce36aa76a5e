use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::ApiError;

/// Error types for coupon operations
#[derive(Debug, thiserror::Error)]
pub enum CouponError {
    #[error("Coupon not found: {0}")]
    NotFound(String),

    /// Business rules rejected the coupon; the first entry is the primary reason
    #[error("Coupon validation failed: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    #[error("Invalid coupon definition: {0}")]
    InvalidDefinition(String),

    #[error("Coupon code '{0}' already exists")]
    DuplicateCode(String),

    /// Usage limit or one-per-user rule hit at redemption time
    #[error("{0}")]
    RedemptionConflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<CouponError> for ApiError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::NotFound(id) => ApiError::NotFound {
                resource: "Coupon".to_string(),
                id,
            },
            CouponError::ValidationFailed(errors) => ApiError::BadRequest {
                message: errors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Coupon validation failed".to_string()),
                details: Some(json!({ "errors": errors })),
            },
            CouponError::InvalidDefinition(message) => ApiError::BadRequest {
                message,
                details: None,
            },
            CouponError::DuplicateCode(code) => ApiError::Conflict {
                message: format!("Coupon code '{}' already exists", code),
                details: None,
            },
            CouponError::RedemptionConflict(message) => ApiError::Conflict {
                message,
                details: None,
            },
            CouponError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}

impl IntoResponse for CouponError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (CouponError::NotFound("SAVE50".into()), StatusCode::NOT_FOUND),
            (
                CouponError::ValidationFailed(vec!["Coupon has expired".into()]),
                StatusCode::BAD_REQUEST,
            ),
            (CouponError::InvalidDefinition("bad".into()), StatusCode::BAD_REQUEST),
            (CouponError::DuplicateCode("SAVE50".into()), StatusCode::CONFLICT),
            (
                CouponError::RedemptionConflict("Coupon usage limit reached".into()),
                StatusCode::CONFLICT,
            ),
            (CouponError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_validation_failed_uses_first_error_as_message() {
        let err = CouponError::ValidationFailed(vec![
            "Coupon is not active".into(),
            "Coupon has expired".into(),
        ]);
        match ApiError::from(err) {
            ApiError::BadRequest { message, details } => {
                assert_eq!(message, "Coupon is not active");
                assert_eq!(details.unwrap()["errors"].as_array().unwrap().len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
