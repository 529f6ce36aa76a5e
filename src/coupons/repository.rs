use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::coupons::error::CouponError;
use crate::coupons::models::{Coupon, CouponRedemption, CouponType};
use crate::coupons::store::{CouponStore, EditFn, RedemptionFn, RedemptionOutcome};

const COUPON_COLUMNS: &str = r#"
    id, code, description, coupon_type, value, min_purchase, max_discount,
    usage_limit, used_count, valid_from, valid_until, applicable_products,
    applicable_categories, is_active, allowed_users, limit_to_first_purchase,
    created_by, created_at, updated_at
"#;

/// Row shape of the `coupons` table; redemptions live in their own table
#[derive(Debug, FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    description: Option<String>,
    coupon_type: CouponType,
    value: Decimal,
    min_purchase: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: Option<i32>,
    used_count: i32,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    applicable_products: Vec<Uuid>,
    applicable_categories: Vec<Uuid>,
    is_active: bool,
    allowed_users: Vec<i32>,
    limit_to_first_purchase: bool,
    created_by: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CouponRow {
    fn into_coupon(self, used_by: Vec<CouponRedemption>) -> Coupon {
        Coupon {
            id: self.id,
            code: self.code,
            description: self.description,
            coupon_type: self.coupon_type,
            value: self.value,
            min_purchase: self.min_purchase,
            max_discount: self.max_discount,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            applicable_products: self.applicable_products,
            applicable_categories: self.applicable_categories,
            is_active: self.is_active,
            used_by,
            allowed_users: self.allowed_users,
            limit_to_first_purchase: self.limit_to_first_purchase,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RedemptionRow {
    coupon_id: Uuid,
    #[sqlx(flatten)]
    redemption: CouponRedemption,
}

async fn fetch_redemptions<'e, E>(
    executor: E,
    coupon_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<CouponRedemption>>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, RedemptionRow>(
        r#"
        SELECT coupon_id, user_id, used_at, order_amount, discount_amount
        FROM coupon_redemptions
        WHERE coupon_id = ANY($1)
        ORDER BY used_at
        "#,
    )
    .bind(coupon_ids)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<CouponRedemption>> = HashMap::new();
    for row in rows {
        grouped.entry(row.coupon_id).or_default().push(row.redemption);
    }
    Ok(grouped)
}

fn map_unique_violation(err: sqlx::Error, code: &str) -> CouponError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            CouponError::DuplicateCode(code.to_string())
        }
        _ => CouponError::Database(err),
    }
}

/// Repository for coupons backed by PostgreSQL
#[derive(Clone)]
pub struct PgCouponRepository {
    pool: PgPool,
}

impl PgCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_redemptions(&self, rows: Vec<CouponRow>) -> Result<Vec<Coupon>, CouponError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut redemptions = fetch_redemptions(&self.pool, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let used_by = redemptions.remove(&row.id).unwrap_or_default();
                row.into_coupon(used_by)
            })
            .collect())
    }
}

#[async_trait]
impl CouponStore for PgCouponRepository {
    async fn insert(&self, coupon: Coupon) -> Result<Coupon, CouponError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r#"
            INSERT INTO coupons (
                id, code, description, coupon_type, value, min_purchase, max_discount,
                usage_limit, used_count, valid_from, valid_until, applicable_products,
                applicable_categories, is_active, allowed_users, limit_to_first_purchase,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(coupon.coupon_type)
        .bind(coupon.value)
        .bind(coupon.min_purchase)
        .bind(coupon.max_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(&coupon.applicable_products)
        .bind(&coupon.applicable_categories)
        .bind(coupon.is_active)
        .bind(&coupon.allowed_users)
        .bind(coupon.limit_to_first_purchase)
        .bind(coupon.created_by)
        .bind(coupon.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &coupon.code))?;

        Ok(row.into_coupon(Vec::new()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, CouponError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {} FROM coupons WHERE id = $1",
            COUPON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_redemptions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, CouponError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {} FROM coupons WHERE code = $1",
            COUPON_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_redemptions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Coupon>, CouponError> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {} FROM coupons ORDER BY created_at DESC",
            COUPON_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        self.attach_redemptions(rows).await
    }

    async fn update(&self, id: Uuid, edit: EditFn) -> Result<Coupon, CouponError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {} FROM coupons WHERE id = $1 FOR UPDATE",
            COUPON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CouponError::NotFound(id.to_string()))?;

        let mut used_by = fetch_redemptions(&mut *tx, &[id]).await?;
        let mut coupon = row.into_coupon(used_by.remove(&id).unwrap_or_default());

        // Dropping `tx` on error rolls back and releases the row lock
        edit(&mut coupon)?;

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r#"
            UPDATE coupons
            SET code = $2, description = $3, coupon_type = $4, value = $5,
                min_purchase = $6, max_discount = $7, usage_limit = $8,
                valid_from = $9, valid_until = $10, applicable_products = $11,
                applicable_categories = $12, is_active = $13, allowed_users = $14,
                limit_to_first_purchase = $15, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(id)
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(coupon.coupon_type)
        .bind(coupon.value)
        .bind(coupon.min_purchase)
        .bind(coupon.max_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(&coupon.applicable_products)
        .bind(&coupon.applicable_categories)
        .bind(coupon.is_active)
        .bind(&coupon.allowed_users)
        .bind(coupon.limit_to_first_purchase)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &coupon.code))?;

        tx.commit().await?;

        Ok(row.into_coupon(coupon.used_by))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, CouponError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn redeem(
        &self,
        id: Uuid,
        decide: RedemptionFn,
    ) -> Result<RedemptionOutcome, CouponError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {} FROM coupons WHERE id = $1 FOR UPDATE",
            COUPON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CouponError::NotFound(id.to_string()))?;

        let mut used_by = fetch_redemptions(&mut *tx, &[id]).await?;
        let coupon = row.into_coupon(used_by.remove(&id).unwrap_or_default());

        // Dropping `tx` on error rolls back and releases the row lock
        let redemption = decide(&coupon)?;

        sqlx::query(
            r#"
            INSERT INTO coupon_redemptions (coupon_id, user_id, used_at, order_amount, discount_amount)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(redemption.user_id)
        .bind(redemption.used_at)
        .bind(redemption.order_amount)
        .bind(redemption.discount_amount)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query_as::<_, CouponRow>(&format!(
            r#"
            UPDATE coupons
            SET used_count = used_count + 1, updated_at = $2
            WHERE id = $1
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(id)
        .bind(redemption.used_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut history = coupon.used_by;
        history.push(redemption.clone());

        Ok(RedemptionOutcome {
            coupon: updated.into_coupon(history),
            redemption,
        })
    }
}
