use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::inventory::error::InventoryError;
use crate::inventory::models::{InventoryLog, InventoryProduct};
use crate::inventory::store::{InventoryStore, MutationResult, StockMutationFn};

const PRODUCT_COLUMNS: &str = r#"
    id, name, sku, category_id, stock, reserved_stock, stock_status,
    track_inventory, allow_backorder, created_at, updated_at
"#;

const LOG_COLUMNS: &str = r#"
    id, product_id, log_type, quantity_change, previous_stock, new_stock,
    reason, notes, performed_by, related_order, created_at
"#;

/// Repository for product inventory backed by PostgreSQL
#[derive(Clone)]
pub struct PgInventoryRepository {
    pool: PgPool,
}

impl PgInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryStore for PgInventoryRepository {
    async fn insert_product(
        &self,
        product: InventoryProduct,
    ) -> Result<InventoryProduct, InventoryError> {
        sqlx::query_as::<_, InventoryProduct>(&format!(
            r#"
            INSERT INTO products (
                id, name, sku, category_id, stock, reserved_stock, stock_status,
                track_inventory, allow_backorder, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.category_id)
        .bind(product.stock)
        .bind(product.reserved_stock)
        .bind(product.stock_status)
        .bind(product.track_inventory)
        .bind(product.allow_backorder)
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                InventoryError::DuplicateSku(product.sku.clone())
            }
            _ => InventoryError::Database(e),
        })
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<InventoryProduct>, InventoryError> {
        let product = sqlx::query_as::<_, InventoryProduct>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn modify(
        &self,
        id: Uuid,
        mutation: StockMutationFn,
        now: DateTime<Utc>,
    ) -> Result<MutationResult, InventoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, InventoryProduct>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InventoryError::ProductNotFound(id))?;

        let mut next = current.clone();
        let outcome = mutation(&mut next)?;

        if next != current {
            next = sqlx::query_as::<_, InventoryProduct>(&format!(
                r#"
                UPDATE products
                SET stock = $2, reserved_stock = $3, stock_status = $4, updated_at = $5
                WHERE id = $1
                RETURNING {}
                "#,
                PRODUCT_COLUMNS
            ))
            .bind(id)
            .bind(next.stock)
            .bind(next.reserved_stock)
            .bind(next.stock_status)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        }

        let log = match outcome.log {
            Some(draft) => {
                let log = draft.into_log(id, now);
                let stored = sqlx::query_as::<_, InventoryLog>(&format!(
                    r#"
                    INSERT INTO inventory_logs (
                        id, product_id, log_type, quantity_change, previous_stock, new_stock,
                        reason, notes, performed_by, related_order, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    RETURNING {}
                    "#,
                    LOG_COLUMNS
                ))
                .bind(log.id)
                .bind(log.product_id)
                .bind(log.log_type)
                .bind(log.quantity_change)
                .bind(log.previous_stock)
                .bind(log.new_stock)
                .bind(&log.reason)
                .bind(&log.notes)
                .bind(log.performed_by)
                .bind(log.related_order)
                .bind(log.created_at)
                .fetch_one(&mut *tx)
                .await?;
                Some(stored)
            }
            None => None,
        };

        tx.commit().await?;

        Ok(MutationResult {
            product: next,
            log,
            clamped: outcome.clamped,
        })
    }

    async fn list_logs(
        &self,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InventoryLog>, InventoryError> {
        let logs = sqlx::query_as::<_, InventoryLog>(&format!(
            r#"
            SELECT {}
            FROM inventory_logs
            WHERE product_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
            LOG_COLUMNS
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn list_low_stock(&self, threshold: i32) -> Result<Vec<InventoryProduct>, InventoryError> {
        let products = sqlx::query_as::<_, InventoryProduct>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE track_inventory AND stock <= $1
            ORDER BY stock, name
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}
