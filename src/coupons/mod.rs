// Coupon module
// Coupon administration, cart validation, discount arithmetic and redemption

pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod store;

pub use engine::{CartContext, CouponEngine, CouponValidation};
pub use error::CouponError;
pub use models::{
    Coupon, CouponRedemption, CouponType, CouponValidationResponse, CreateCouponRequest,
    RedeemCouponRequest, RedemptionResponse, UpdateCouponRequest, ValidateCouponRequest,
};
pub use repository::PgCouponRepository;
pub use service::CouponService;
pub use store::{CouponStore, InMemoryCouponStore};
