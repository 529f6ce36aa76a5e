// Inventory Tracker
//
// Stock operations for products: absolute adjustments, reservations for
// in-flight orders, sales, and other audited movements. Each operation is a
// single serialized mutation through the store; the arithmetic lives in
// `stock_rules`.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::inventory::error::InventoryError;
use crate::inventory::models::{
    BulkAdjustFailure, BulkAdjustResponse, BulkStockUpdate, CreateProductRequest, InventoryLog,
    InventoryProduct, MovementKind, OrderLineItem,
};
use crate::inventory::stock_rules::{stock_status_for, LogContext, StockRules};
use crate::inventory::store::{InventoryStore, MutationResult, StockMutationFn};
use crate::metrics::EngineMetrics;

/// Default and maximum page sizes for the inventory log
pub const DEFAULT_LOG_LIMIT: i64 = 50;
pub const MAX_LOG_LIMIT: i64 = 500;

/// Inventory tracker over a product store
#[derive(Clone)]
pub struct InventoryTracker {
    store: Arc<dyn InventoryStore>,
    metrics: EngineMetrics,
}

impl InventoryTracker {
    pub fn new(store: Arc<dyn InventoryStore>, metrics: EngineMetrics) -> Self {
        Self { store, metrics }
    }

    async fn apply(
        &self,
        product_id: Uuid,
        operation: &'static str,
        mutation: StockMutationFn,
    ) -> Result<MutationResult, InventoryError> {
        let _timer = self.metrics.start_stock_operation();
        let result = self.store.modify(product_id, mutation, Utc::now()).await?;

        if result.clamped {
            self.metrics.record_floor_clamp();
            warn!(
                "{} on product {} clamped a counter (stock={}, reserved={})",
                operation, product_id, result.product.stock, result.product.reserved_stock
            );
        }
        Ok(result)
    }

    /// Register a product's inventory fields
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<InventoryProduct, InventoryError> {
        if request.stock < 0 {
            return Err(InventoryError::InvalidQuantity(format!(
                "Stock must not be negative, got {}",
                request.stock
            )));
        }

        let now = Utc::now();
        let product = InventoryProduct {
            id: Uuid::new_v4(),
            name: request.name,
            sku: request.sku,
            category_id: request.category_id,
            stock: request.stock,
            reserved_stock: 0,
            stock_status: stock_status_for(request.stock),
            track_inventory: request.track_inventory,
            allow_backorder: request.allow_backorder,
            created_at: now,
            updated_at: now,
        };

        let product = self.store.insert_product(product).await?;
        info!("Registered product {} ({}) with stock {}", product.sku, product.id, product.stock);
        Ok(product)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<InventoryProduct, InventoryError> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))
    }

    /// Set stock to an absolute value and log a manual adjustment
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        new_stock: i32,
        reason: Option<String>,
        notes: Option<String>,
        performed_by: Option<i32>,
    ) -> Result<InventoryProduct, InventoryError> {
        let context = LogContext {
            reason,
            notes,
            performed_by,
            related_order: None,
        };
        let result = self
            .apply(
                product_id,
                "Stock adjustment",
                Box::new(move |p: &mut InventoryProduct| StockRules::adjust(p, new_stock, context)),
            )
            .await?;

        self.metrics.record_stock_adjustment();
        info!(
            "Adjusted stock of product {} to {} ({})",
            product_id, result.product.stock, result.product.stock_status
        );
        Ok(result.product)
    }

    /// Apply each adjustment independently; failures are collected, not fatal
    pub async fn bulk_adjust_stock(
        &self,
        updates: Vec<BulkStockUpdate>,
        performed_by: Option<i32>,
    ) -> Result<BulkAdjustResponse, InventoryError> {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for update in updates {
            match self
                .adjust_stock(
                    update.product_id,
                    update.new_stock,
                    update.reason,
                    update.notes,
                    performed_by,
                )
                .await
            {
                Ok(product) => results.push(product.into()),
                Err(InventoryError::Database(e)) => return Err(InventoryError::Database(e)),
                Err(e) => {
                    debug!("Bulk adjustment of {} failed: {}", update.product_id, e);
                    errors.push(BulkAdjustFailure {
                        product_id: update.product_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Bulk stock adjustment: {} applied, {} failed",
            results.len(),
            errors.len()
        );
        Ok(BulkAdjustResponse { results, errors })
    }

    /// Hold units for an in-flight order
    ///
    /// Untracked products succeed without change. No log row is written.
    pub async fn reserve(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<InventoryProduct, InventoryError> {
        let result = self
            .apply(
                product_id,
                "Reservation",
                Box::new(move |p: &mut InventoryProduct| StockRules::reserve(p, quantity)),
            )
            .await;

        match result {
            Ok(result) => {
                self.metrics.record_reservation(true);
                debug!("Reserved {} of product {}", quantity, product_id);
                Ok(result.product)
            }
            Err(e) => {
                if let InventoryError::InsufficientStock { available, .. } = &e {
                    self.metrics.record_reservation(false);
                    warn!(
                        "Reservation of {} for product {} refused: {} available",
                        quantity, product_id, available
                    );
                }
                Err(e)
            }
        }
    }

    /// Return reserved units; floors at zero
    pub async fn release(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<InventoryProduct, InventoryError> {
        let result = self
            .apply(
                product_id,
                "Release",
                Box::new(move |p: &mut InventoryProduct| StockRules::release(p, quantity)),
            )
            .await?;

        self.metrics.record_release();
        debug!("Released {} of product {}", quantity, product_id);
        Ok(result.product)
    }

    /// Consume units for a paid order and log the sale
    pub async fn confirm_sale(
        &self,
        product_id: Uuid,
        quantity: i32,
        order_id: Uuid,
        performed_by: Option<i32>,
    ) -> Result<InventoryProduct, InventoryError> {
        let context = LogContext {
            reason: Some(format!("Order {}", order_id)),
            notes: None,
            performed_by,
            related_order: Some(order_id),
        };
        let result = self
            .apply(
                product_id,
                "Sale",
                Box::new(move |p: &mut InventoryProduct| StockRules::confirm_sale(p, quantity, context)),
            )
            .await?;

        self.metrics.record_sale();
        info!(
            "Confirmed sale of {} x product {} for order {}",
            quantity, product_id, order_id
        );
        Ok(result.product)
    }

    /// Record a return, restock, damage or loss
    pub async fn record_movement(
        &self,
        product_id: Uuid,
        kind: MovementKind,
        quantity: i32,
        context: LogContext,
    ) -> Result<InventoryProduct, InventoryError> {
        let result = self
            .apply(
                product_id,
                "Stock movement",
                Box::new(move |p: &mut InventoryProduct| {
                    StockRules::record_movement(p, kind, quantity, context)
                }),
            )
            .await?;

        self.metrics.record_stock_movement();
        info!(
            "Recorded {:?} of {} for product {}; stock now {}",
            kind, quantity, product_id, result.product.stock
        );
        Ok(result.product)
    }

    /// Reserve every line of an order or none of them
    ///
    /// On the first failure, lines already reserved are released again and
    /// the failure is returned.
    pub async fn reserve_items(&self, items: &[OrderLineItem]) -> Result<(), InventoryError> {
        let mut reserved: Vec<&OrderLineItem> = Vec::with_capacity(items.len());

        for item in items {
            if let Err(e) = self.reserve(item.product_id, item.quantity).await {
                for done in reserved.iter().rev() {
                    if let Err(release_err) = self.release(done.product_id, done.quantity).await {
                        warn!(
                            "Failed to roll back reservation of {} for product {}: {}",
                            done.quantity, done.product_id, release_err
                        );
                    }
                }
                return Err(e);
            }
            reserved.push(item);
        }

        Ok(())
    }

    /// Confirm the sale of every line of an order
    pub async fn confirm_order(
        &self,
        order_id: Uuid,
        items: &[OrderLineItem],
        performed_by: Option<i32>,
    ) -> Result<Vec<InventoryProduct>, InventoryError> {
        let mut products = Vec::with_capacity(items.len());
        for item in items {
            products.push(
                self.confirm_sale(item.product_id, item.quantity, order_id, performed_by)
                    .await?,
            );
        }
        Ok(products)
    }

    /// Log rows for a product, newest first
    pub async fn list_logs(
        &self,
        product_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<InventoryLog>, InventoryError> {
        self.get_product(product_id).await?;
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
        self.store.list_logs(product_id, limit).await
    }

    /// Tracked products whose stock is at or below `threshold`
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<InventoryProduct>, InventoryError> {
        let products = self.store.list_low_stock(threshold).await?;
        debug!("{} products at or below {}", products.len(), threshold);
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::models::{InventoryLogType, StockStatus};
    use crate::inventory::store::InMemoryInventoryStore;

    fn tracker() -> InventoryTracker {
        InventoryTracker::new(Arc::new(InMemoryInventoryStore::new()), EngineMetrics::new())
    }

    fn create_request(sku: &str, stock: i32) -> CreateProductRequest {
        CreateProductRequest {
            name: format!("Product {}", sku),
            sku: sku.to_string(),
            category_id: None,
            stock,
            track_inventory: true,
            allow_backorder: false,
        }
    }

    async fn product(tracker: &InventoryTracker, sku: &str, stock: i32) -> InventoryProduct {
        tracker.create_product(create_request(sku, stock)).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_product_derives_status() {
        let tracker = tracker();
        assert_eq!(product(&tracker, "A", 0).await.stock_status, StockStatus::OutOfStock);
        assert_eq!(product(&tracker, "B", 20).await.stock_status, StockStatus::LowStock);
        assert_eq!(product(&tracker, "C", 21).await.stock_status, StockStatus::InStock);
    }

    #[tokio::test]
    async fn test_adjust_stock_writes_log() {
        let tracker = tracker();
        let p = product(&tracker, "A", 10).await;

        let updated = tracker
            .adjust_stock(p.id, 40, Some("recount".into()), None, Some(1))
            .await
            .unwrap();
        assert_eq!(updated.stock, 40);
        assert_eq!(updated.stock_status, StockStatus::InStock);

        let logs = tracker.list_logs(p.id, None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log_type, InventoryLogType::ManualAdjustment);
        assert_eq!(logs[0].previous_stock, 10);
        assert_eq!(logs[0].new_stock, 40);
        assert_eq!(logs[0].quantity_change, 30);
        assert_eq!(logs[0].performed_by, Some(1));
        assert_eq!(logs[0].reason.as_deref(), Some("recount"));
    }

    #[tokio::test]
    async fn test_adjust_untracked_rejected() {
        let tracker = tracker();
        let mut request = create_request("U", 5);
        request.track_inventory = false;
        let p = tracker.create_product(request).await.unwrap();

        let result = tracker.adjust_stock(p.id, 10, None, None, None).await;
        assert!(matches!(result, Err(InventoryError::TrackingDisabled(_))));
    }

    #[tokio::test]
    async fn test_bulk_adjust_collects_failures() {
        let tracker = tracker();
        let a = product(&tracker, "A", 1).await;
        let b = product(&tracker, "B", 2).await;
        let missing = Uuid::new_v4();

        let update = |product_id, new_stock| BulkStockUpdate {
            product_id,
            new_stock,
            reason: None,
            notes: None,
        };
        let response = tracker
            .bulk_adjust_stock(vec![update(a.id, 10), update(missing, 5), update(b.id, 30)], Some(1))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].product_id, missing);
        assert_eq!(tracker.get_product(b.id).await.unwrap().stock, 30);
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let tracker = tracker();
        let p = product(&tracker, "A", 10).await;

        let reserved = tracker.reserve(p.id, 4).await.unwrap();
        assert_eq!(reserved.reserved_stock, 4);
        assert_eq!(reserved.available(), 6);

        let released = tracker.release(p.id, 4).await.unwrap();
        assert_eq!(released.reserved_stock, 0);

        assert!(tracker.list_logs(p.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reserve_insufficient_reports_counts() {
        let tracker = tracker();
        let p = product(&tracker, "A", 5).await;

        match tracker.reserve(p.id, 6).await {
            Err(InventoryError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_reservations_only_one_wins() {
        let tracker = tracker();
        let p = product(&tracker, "A", 10).await;

        let (first, second) = tokio::join!(tracker.reserve(p.id, 6), tracker.reserve(p.id, 6));

        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(tracker.get_product(p.id).await.unwrap().reserved_stock, 6);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_across_tasks() {
        let tracker = tracker();
        let p = product(&tracker, "A", 10).await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let tracker = tracker.clone();
                let id = p.id;
                tokio::spawn(async move { tracker.reserve(id, 3).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 3);
        assert_eq!(tracker.get_product(p.id).await.unwrap().reserved_stock, 9);
    }

    #[tokio::test]
    async fn test_release_clamp_counts_metric() {
        let metrics = EngineMetrics::new();
        let tracker = InventoryTracker::new(Arc::new(InMemoryInventoryStore::new()), metrics.clone());
        let p = product(&tracker, "A", 10).await;

        let released = tracker.release(p.id, 3).await.unwrap();
        assert_eq!(released.reserved_stock, 0);
        assert_eq!(metrics.summary().floor_clamps, 1);
    }

    #[tokio::test]
    async fn test_confirm_sale_logs_related_order() {
        let tracker = tracker();
        let p = product(&tracker, "A", 25).await;
        let order_id = Uuid::new_v4();

        tracker.reserve(p.id, 6).await.unwrap();
        let sold = tracker.confirm_sale(p.id, 6, order_id, Some(2)).await.unwrap();

        assert_eq!(sold.stock, 19);
        assert_eq!(sold.reserved_stock, 0);
        assert_eq!(sold.stock_status, StockStatus::LowStock);

        let logs = tracker.list_logs(p.id, None).await.unwrap();
        assert_eq!(logs[0].log_type, InventoryLogType::Sale);
        assert_eq!(logs[0].related_order, Some(order_id));
        assert_eq!(logs[0].quantity_change, -6);
        assert_eq!(logs[0].new_stock, logs[0].previous_stock + logs[0].quantity_change);
    }

    #[tokio::test]
    async fn test_untracked_sale_is_noop() {
        let tracker = tracker();
        let mut request = create_request("U", 3);
        request.track_inventory = false;
        let p = tracker.create_product(request).await.unwrap();

        let after = tracker.confirm_sale(p.id, 10, Uuid::new_v4(), None).await.unwrap();
        assert_eq!(after.stock, 3);
        assert!(tracker.list_logs(p.id, None).await.unwrap().is_empty());

        let reserved = tracker.reserve(p.id, 100).await.unwrap();
        assert_eq!(reserved.reserved_stock, 0);
    }

    #[tokio::test]
    async fn test_record_movement() {
        let tracker = tracker();
        let p = product(&tracker, "A", 5).await;

        let restocked = tracker
            .record_movement(
                p.id,
                MovementKind::Restock,
                20,
                LogContext {
                    reason: Some("Supplier delivery".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(restocked.stock, 25);

        let lost = tracker
            .record_movement(p.id, MovementKind::Loss, 2, LogContext::default())
            .await
            .unwrap();
        assert_eq!(lost.stock, 23);

        let logs = tracker.list_logs(p.id, None).await.unwrap();
        assert_eq!(logs[0].log_type, InventoryLogType::Loss);
        assert_eq!(logs[1].log_type, InventoryLogType::Restock);
    }

    #[tokio::test]
    async fn test_reserve_items_all_or_nothing() {
        let tracker = tracker();
        let a = product(&tracker, "A", 10).await;
        let b = product(&tracker, "B", 1).await;

        let items = [
            OrderLineItem { product_id: a.id, quantity: 4 },
            OrderLineItem { product_id: b.id, quantity: 2 },
        ];
        let result = tracker.reserve_items(&items).await;

        assert!(matches!(result, Err(InventoryError::InsufficientStock { .. })));
        assert_eq!(tracker.get_product(a.id).await.unwrap().reserved_stock, 0);
        assert_eq!(tracker.get_product(b.id).await.unwrap().reserved_stock, 0);
    }

    #[tokio::test]
    async fn test_confirm_order_consumes_every_line() {
        let tracker = tracker();
        let a = product(&tracker, "A", 10).await;
        let b = product(&tracker, "B", 30).await;
        let order_id = Uuid::new_v4();
        let items = [
            OrderLineItem { product_id: a.id, quantity: 2 },
            OrderLineItem { product_id: b.id, quantity: 5 },
        ];

        tracker.reserve_items(&items).await.unwrap();
        let products = tracker.confirm_order(order_id, &items, None).await.unwrap();

        assert_eq!(products[0].stock, 8);
        assert_eq!(products[1].stock, 25);
        assert!(products.iter().all(|p| p.reserved_stock == 0));
        for item in &items {
            let logs = tracker.list_logs(item.product_id, None).await.unwrap();
            assert_eq!(logs[0].related_order, Some(order_id));
        }
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        let tracker = tracker();
        product(&tracker, "A", 3).await;
        product(&tracker, "B", 50).await;
        product(&tracker, "C", 20).await;
        let mut untracked = create_request("U", 0);
        untracked.track_inventory = false;
        tracker.create_product(untracked).await.unwrap();

        let low = tracker.low_stock(20).await.unwrap();
        let skus: Vec<&str> = low.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_unknown_product_errors() {
        let tracker = tracker();
        let id = Uuid::new_v4();

        assert!(matches!(tracker.get_product(id).await, Err(InventoryError::ProductNotFound(_))));
        assert!(matches!(tracker.reserve(id, 1).await, Err(InventoryError::ProductNotFound(_))));
        assert!(matches!(tracker.list_logs(id, None).await, Err(InventoryError::ProductNotFound(_))));
    }
}
