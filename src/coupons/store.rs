// Coupon storage seam
//
// Services talk to `CouponStore`; Postgres backs production and the in-memory
// store backs tests and local runs. Both serialize redemptions per coupon.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::coupons::error::CouponError;
use crate::coupons::models::{Coupon, CouponRedemption};

/// Decides a redemption against the current (locked) coupon state
pub type RedemptionFn =
    Box<dyn FnOnce(&Coupon) -> Result<CouponRedemption, CouponError> + Send>;

/// Edits the definition of the current (locked) coupon
pub type EditFn = Box<dyn FnOnce(&mut Coupon) -> Result<(), CouponError> + Send>;

/// Coupon after a redemption was written, plus the record appended
#[derive(Debug, Clone)]
pub struct RedemptionOutcome {
    pub coupon: Coupon,
    pub redemption: CouponRedemption,
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Insert a new coupon; `DuplicateCode` if the code is taken
    async fn insert(&self, coupon: Coupon) -> Result<Coupon, CouponError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, CouponError>;

    /// Look up by an already normalized code
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, CouponError>;

    /// All coupons, newest first
    async fn list(&self) -> Result<Vec<Coupon>, CouponError>;

    /// Lock the coupon, let `edit` change its definition, then write it
    ///
    /// `edit` sees the stored redemption state and may reject the change;
    /// `used_count` and `used_by` are written back as stored.
    async fn update(&self, id: Uuid, edit: EditFn) -> Result<Coupon, CouponError>;

    /// Returns false when no coupon had that id
    async fn delete(&self, id: Uuid) -> Result<bool, CouponError>;

    /// Lock the coupon, let `decide` judge it, then append the redemption and
    /// bump `used_count` in the same critical section
    async fn redeem(&self, id: Uuid, decide: RedemptionFn)
        -> Result<RedemptionOutcome, CouponError>;
}

/// In-process coupon store guarded by a single async mutex
#[derive(Default)]
pub struct InMemoryCouponStore {
    coupons: Mutex<HashMap<Uuid, Coupon>>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn code_taken(coupons: &HashMap<Uuid, Coupon>, code: &str, except: Option<Uuid>) -> bool {
    coupons
        .values()
        .any(|c| c.code == code && Some(c.id) != except)
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn insert(&self, coupon: Coupon) -> Result<Coupon, CouponError> {
        let mut coupons = self.coupons.lock().await;
        if code_taken(&coupons, &coupon.code, None) {
            return Err(CouponError::DuplicateCode(coupon.code));
        }
        coupons.insert(coupon.id, coupon.clone());
        Ok(coupon)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, CouponError> {
        Ok(self.coupons.lock().await.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, CouponError> {
        let coupons = self.coupons.lock().await;
        Ok(coupons.values().find(|c| c.code == code).cloned())
    }

    async fn list(&self) -> Result<Vec<Coupon>, CouponError> {
        let mut all: Vec<Coupon> = self.coupons.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn update(&self, id: Uuid, edit: EditFn) -> Result<Coupon, CouponError> {
        let mut coupons = self.coupons.lock().await;
        let current = coupons
            .get(&id)
            .ok_or_else(|| CouponError::NotFound(id.to_string()))?;

        let mut next = current.clone();
        edit(&mut next)?;
        next.id = id;
        next.used_count = current.used_count;
        next.used_by = current.used_by.clone();
        next.updated_at = Utc::now();

        if code_taken(&coupons, &next.code, Some(id)) {
            return Err(CouponError::DuplicateCode(next.code));
        }
        coupons.insert(id, next.clone());
        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, CouponError> {
        Ok(self.coupons.lock().await.remove(&id).is_some())
    }

    async fn redeem(
        &self,
        id: Uuid,
        decide: RedemptionFn,
    ) -> Result<RedemptionOutcome, CouponError> {
        let mut coupons = self.coupons.lock().await;
        let coupon = coupons
            .get_mut(&id)
            .ok_or_else(|| CouponError::NotFound(id.to_string()))?;

        let redemption = decide(coupon)?;
        coupon.used_by.push(redemption.clone());
        coupon.used_count += 1;
        coupon.updated_at = redemption.used_at;

        Ok(RedemptionOutcome {
            coupon: coupon.clone(),
            redemption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupons::engine::test_support::sample_coupon;
    use crate::coupons::engine::CouponEngine;
    use rust_decimal_macros::dec;

    fn redemption_for(user_id: i32) -> RedemptionFn {
        Box::new(move |_coupon: &Coupon| {
            Ok(CouponRedemption {
                user_id,
                used_at: Utc::now(),
                order_amount: dec!(100),
                discount_amount: dec!(10),
            })
        })
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_code() {
        let store = InMemoryCouponStore::new();
        store.insert(sample_coupon()).await.unwrap();

        let result = store.insert(sample_coupon()).await;
        assert!(matches!(result, Err(CouponError::DuplicateCode(code)) if code == "SAVE50"));
    }

    #[tokio::test]
    async fn test_update_preserves_redemption_state() {
        let store = InMemoryCouponStore::new();
        let coupon = store.insert(sample_coupon()).await.unwrap();

        store.redeem(coupon.id, redemption_for(5)).await.unwrap();

        let updated = store
            .update(
                coupon.id,
                Box::new(|c: &mut Coupon| {
                    c.description = Some("Spring sale".to_string());
                    c.used_count = 0;
                    Ok(())
                }),
            )
            .await
            .unwrap();

        assert_eq!(updated.description.as_deref(), Some("Spring sale"));
        assert_eq!(updated.used_count, 1);
        assert_eq!(updated.used_by.len(), 1);
    }

    #[tokio::test]
    async fn test_update_edit_sees_current_usage() {
        let store = InMemoryCouponStore::new();
        let coupon = store.insert(sample_coupon()).await.unwrap();
        store.redeem(coupon.id, redemption_for(5)).await.unwrap();
        store.redeem(coupon.id, redemption_for(6)).await.unwrap();

        let result = store
            .update(
                coupon.id,
                Box::new(|c: &mut Coupon| {
                    c.usage_limit = Some(1);
                    CouponEngine::check_definition(c)
                }),
            )
            .await;
        assert!(matches!(result, Err(CouponError::InvalidDefinition(_))));

        let stored = store.find_by_id(coupon.id).await.unwrap().unwrap();
        assert_eq!(stored.usage_limit, coupon.usage_limit);
        assert_eq!(stored.used_count, 2);
    }

    #[tokio::test]
    async fn test_update_rejects_taken_code() {
        let store = InMemoryCouponStore::new();
        store.insert(sample_coupon()).await.unwrap();
        let mut other = sample_coupon();
        other.code = "OTHER".to_string();
        let other = store.insert(other).await.unwrap();

        let result = store
            .update(
                other.id,
                Box::new(|c: &mut Coupon| {
                    c.code = "SAVE50".to_string();
                    Ok(())
                }),
            )
            .await;
        assert!(matches!(result, Err(CouponError::DuplicateCode(code)) if code == "SAVE50"));
    }

    #[tokio::test]
    async fn test_update_missing_coupon() {
        let store = InMemoryCouponStore::new();
        let result = store.update(Uuid::new_v4(), Box::new(|_: &mut Coupon| Ok(()))).await;
        assert!(matches!(result, Err(CouponError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_redeem_missing_coupon() {
        let store = InMemoryCouponStore::new();
        let result = store.redeem(Uuid::new_v4(), redemption_for(1)).await;
        assert!(matches!(result, Err(CouponError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejected_redemption_leaves_coupon_untouched() {
        let store = InMemoryCouponStore::new();
        let coupon = store.insert(sample_coupon()).await.unwrap();

        let result = store
            .redeem(
                coupon.id,
                Box::new(|_: &Coupon| Err(CouponError::RedemptionConflict("no".into()))),
            )
            .await;
        assert!(result.is_err());

        let stored = store.find_by_id(coupon.id).await.unwrap().unwrap();
        assert_eq!(stored.used_count, 0);
        assert!(stored.used_by.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryCouponStore::new();
        let coupon = store.insert(sample_coupon()).await.unwrap();

        assert!(store.delete(coupon.id).await.unwrap());
        assert!(!store.delete(coupon.id).await.unwrap());
        assert!(store.find_by_code("SAVE50").await.unwrap().is_none());
    }
}
