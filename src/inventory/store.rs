// Inventory storage seam
//
// Every change to a product's counters goes through `modify`, which holds the
// product exclusively from read to write and appends the log row in the
// same critical section.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::inventory::error::InventoryError;
use crate::inventory::models::{InventoryLog, InventoryProduct};
use crate::inventory::stock_rules::StockMutation;

/// Rule applied to the locked product
pub type StockMutationFn =
    Box<dyn FnOnce(&mut InventoryProduct) -> Result<StockMutation, InventoryError> + Send>;

/// Product as written, the log row appended (if any) and whether a floor applied
#[derive(Debug, Clone)]
pub struct MutationResult {
    pub product: InventoryProduct,
    pub log: Option<InventoryLog>,
    pub clamped: bool,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a product; `DuplicateSku` if the SKU is taken
    async fn insert_product(&self, product: InventoryProduct)
        -> Result<InventoryProduct, InventoryError>;

    async fn find_product(&self, id: Uuid) -> Result<Option<InventoryProduct>, InventoryError>;

    /// Serialized read-modify-write of one product
    ///
    /// `mutation` works on a copy; nothing is written when it fails.
    async fn modify(
        &self,
        id: Uuid,
        mutation: StockMutationFn,
        now: DateTime<Utc>,
    ) -> Result<MutationResult, InventoryError>;

    /// Newest first
    async fn list_logs(&self, product_id: Uuid, limit: i64)
        -> Result<Vec<InventoryLog>, InventoryError>;

    /// Tracked products with stock at or below `threshold`, lowest first
    async fn list_low_stock(&self, threshold: i32) -> Result<Vec<InventoryProduct>, InventoryError>;
}

#[derive(Default)]
struct InventoryState {
    products: HashMap<Uuid, InventoryProduct>,
    logs: Vec<InventoryLog>,
}

/// In-process inventory store guarded by a single async mutex
#[derive(Default)]
pub struct InMemoryInventoryStore {
    state: Mutex<InventoryState>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert_product(
        &self,
        product: InventoryProduct,
    ) -> Result<InventoryProduct, InventoryError> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(InventoryError::DuplicateSku(product.sku));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<InventoryProduct>, InventoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn modify(
        &self,
        id: Uuid,
        mutation: StockMutationFn,
        now: DateTime<Utc>,
    ) -> Result<MutationResult, InventoryError> {
        let mut state = self.state.lock().await;
        let current = state
            .products
            .get(&id)
            .ok_or(InventoryError::ProductNotFound(id))?;

        let mut next = current.clone();
        let outcome = mutation(&mut next)?;
        if next != *current {
            next.updated_at = now;
        }

        let log = outcome.log.map(|draft| draft.into_log(id, now));
        if let Some(log) = &log {
            state.logs.push(log.clone());
        }
        state.products.insert(id, next.clone());

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
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .rev()
            .filter(|log| log.product_id == product_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_low_stock(&self, threshold: i32) -> Result<Vec<InventoryProduct>, InventoryError> {
        let state = self.state.lock().await;
        let mut low: Vec<InventoryProduct> = state
            .products
            .values()
            .filter(|p| p.track_inventory && p.stock <= threshold)
            .cloned()
            .collect();
        low.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        Ok(low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::stock_rules::{test_support::product, LogContext, StockRules};

    #[tokio::test]
    async fn test_failed_mutation_writes_nothing() {
        let store = InMemoryInventoryStore::new();
        let p = store.insert_product(product(5, 0)).await.unwrap();

        let result = store
            .modify(p.id, Box::new(|p: &mut InventoryProduct| StockRules::reserve(p, 6)), Utc::now())
            .await;
        assert!(matches!(result, Err(InventoryError::InsufficientStock { .. })));

        let stored = store.find_product(p.id).await.unwrap().unwrap();
        assert_eq!(stored, p);
    }

    #[tokio::test]
    async fn test_logs_newest_first_with_limit() {
        let store = InMemoryInventoryStore::new();
        let p = store.insert_product(product(5, 0)).await.unwrap();

        for n in [10, 20, 30] {
            store
                .modify(
                    p.id,
                    Box::new(move |p: &mut InventoryProduct| StockRules::adjust(p, n, LogContext::default())),
                    Utc::now(),
                )
                .await
                .unwrap();
        }

        let logs = store.list_logs(p.id, 2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].new_stock, 30);
        assert_eq!(logs[1].new_stock, 20);
    }

    #[tokio::test]
    async fn test_modify_unknown_product() {
        let store = InMemoryInventoryStore::new();
        let id = Uuid::new_v4();
        let result = store
            .modify(id, Box::new(|p: &mut InventoryProduct| StockRules::release(p, 1)), Utc::now())
            .await;
        assert!(matches!(result, Err(InventoryError::ProductNotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let store = InMemoryInventoryStore::new();
        let p = store.insert_product(product(5, 0)).await.unwrap();
        let mut clash = product(1, 0);
        clash.sku = p.sku.clone();

        assert!(matches!(
            store.insert_product(clash).await,
            Err(InventoryError::DuplicateSku(_))
        ));
    }
}
