// Stock Rules
//
// Pure arithmetic on a product's inventory counters. Every function here
// runs against the locked row inside a store's critical section and either
// mutates the product and describes the log row to append, or returns an
// error without touching it.

use uuid::Uuid;

use crate::inventory::error::InventoryError;
use crate::inventory::models::{
    InventoryLogType, InventoryProduct, LogDraft, MovementKind, StockStatus,
};

/// Stock at or below this (and above zero) is reported as Low Stock
pub const LOW_STOCK_THRESHOLD: i32 = 20;

/// Status bucket for a stock count
pub fn stock_status_for(stock: i32) -> StockStatus {
    if stock <= 0 {
        StockStatus::OutOfStock
    } else if stock <= LOW_STOCK_THRESHOLD {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// What a rule did to the product
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StockMutation {
    /// Row to append to the inventory log, if the change is audited
    pub log: Option<LogDraft>,
    /// A counter would have gone negative, or reservations outgrew stock,
    /// and was clamped
    pub clamped: bool,
}

impl StockMutation {
    fn unchanged() -> Self {
        Self::default()
    }
}

fn require_positive(quantity: i32) -> Result<(), InventoryError> {
    if quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(format!(
            "Quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

/// Subtract with a floor at zero; the flag reports whether the floor applied
fn floored_sub(current: i32, quantity: i32) -> (i32, bool) {
    let next = current.saturating_sub(quantity);
    if next < 0 {
        (0, true)
    } else {
        (next, false)
    }
}

/// Without backorders reservations never exceed stock; cap them after stock shrinks
fn cap_reserved(product: &mut InventoryProduct) -> bool {
    if !product.allow_backorder && product.reserved_stock > product.stock {
        product.reserved_stock = product.stock;
        return true;
    }
    false
}

/// Author metadata carried onto the log row
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub performed_by: Option<i32>,
    pub related_order: Option<Uuid>,
}

impl LogContext {
    fn apply(self, draft: LogDraft) -> LogDraft {
        draft
            .reason(self.reason)
            .notes(self.notes)
            .performed_by(self.performed_by)
            .related_order(self.related_order)
    }
}

/// Stock rule set
pub struct StockRules;

impl StockRules {
    /// Set stock to an absolute value
    ///
    /// Lowering stock below the reserved count caps the reservations at the
    /// new stock unless the product allows backorders.
    pub fn adjust(
        product: &mut InventoryProduct,
        new_stock: i32,
        context: LogContext,
    ) -> Result<StockMutation, InventoryError> {
        if !product.track_inventory {
            return Err(InventoryError::TrackingDisabled(product.id));
        }
        if new_stock < 0 {
            return Err(InventoryError::InvalidQuantity(format!(
                "Stock must not be negative, got {}",
                new_stock
            )));
        }

        let previous = product.stock;
        product.stock = new_stock;
        product.stock_status = stock_status_for(new_stock);
        let clamped = cap_reserved(product);

        Ok(StockMutation {
            log: Some(context.apply(LogDraft::new(
                InventoryLogType::ManualAdjustment,
                previous,
                new_stock,
            ))),
            clamped,
        })
    }

    /// Hold `quantity` units for an in-flight order
    pub fn reserve(
        product: &mut InventoryProduct,
        quantity: i32,
    ) -> Result<StockMutation, InventoryError> {
        require_positive(quantity)?;
        if !product.track_inventory {
            return Ok(StockMutation::unchanged());
        }

        let available = product.available();
        if available < quantity && !product.allow_backorder {
            return Err(InventoryError::InsufficientStock {
                product_id: product.id,
                available: available.max(0),
                requested: quantity,
            });
        }

        product.reserved_stock = product
            .reserved_stock
            .checked_add(quantity)
            .ok_or_else(|| InventoryError::InvalidQuantity("Reservation overflows".to_string()))?;
        Ok(StockMutation::unchanged())
    }

    /// Give back previously reserved units
    pub fn release(
        product: &mut InventoryProduct,
        quantity: i32,
    ) -> Result<StockMutation, InventoryError> {
        require_positive(quantity)?;
        if !product.track_inventory {
            return Ok(StockMutation::unchanged());
        }

        let (reserved, clamped) = floored_sub(product.reserved_stock, quantity);
        product.reserved_stock = reserved;
        Ok(StockMutation { log: None, clamped })
    }

    /// Consume reserved units for a paid order
    ///
    /// Both counters are floored at zero. The log row records the stock that
    /// was actually written, so a clamped sale logs a smaller change.
    pub fn confirm_sale(
        product: &mut InventoryProduct,
        quantity: i32,
        context: LogContext,
    ) -> Result<StockMutation, InventoryError> {
        require_positive(quantity)?;
        if !product.track_inventory {
            return Ok(StockMutation::unchanged());
        }

        let previous = product.stock;
        let (stock, stock_clamped) = floored_sub(product.stock, quantity);
        let (reserved, reserved_clamped) = floored_sub(product.reserved_stock, quantity);

        product.stock = stock;
        product.reserved_stock = reserved;
        product.stock_status = stock_status_for(stock);

        Ok(StockMutation {
            log: Some(context.apply(LogDraft::new(InventoryLogType::Sale, previous, stock))),
            clamped: stock_clamped || reserved_clamped,
        })
    }

    /// Record a return, restock, damage or loss
    pub fn record_movement(
        product: &mut InventoryProduct,
        kind: MovementKind,
        quantity: i32,
        context: LogContext,
    ) -> Result<StockMutation, InventoryError> {
        require_positive(quantity)?;
        if !product.track_inventory {
            return Err(InventoryError::TrackingDisabled(product.id));
        }

        let previous = product.stock;
        let (stock, clamped) = if kind.adds_stock() {
            let stock = previous
                .checked_add(quantity)
                .ok_or_else(|| InventoryError::InvalidQuantity("Stock overflows".to_string()))?;
            (stock, false)
        } else {
            floored_sub(previous, quantity)
        };

        product.stock = stock;
        product.stock_status = stock_status_for(stock);
        let reserved_capped = cap_reserved(product);

        Ok(StockMutation {
            log: Some(context.apply(LogDraft::new(kind.log_type(), previous, stock))),
            clamped: clamped || reserved_capped,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::Utc;

    pub fn product(stock: i32, reserved: i32) -> InventoryProduct {
        let now = Utc::now();
        InventoryProduct {
            id: Uuid::new_v4(),
            name: "House Blend 1kg".to_string(),
            sku: format!("HB-{}", Uuid::new_v4().simple()),
            category_id: None,
            stock,
            reserved_stock: reserved,
            stock_status: stock_status_for(stock),
            track_inventory: true,
            allow_backorder: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::product;
    use super::*;

    #[test]
    fn test_stock_status_boundaries() {
        assert_eq!(stock_status_for(-3), StockStatus::OutOfStock);
        assert_eq!(stock_status_for(0), StockStatus::OutOfStock);
        assert_eq!(stock_status_for(1), StockStatus::LowStock);
        assert_eq!(stock_status_for(20), StockStatus::LowStock);
        assert_eq!(stock_status_for(21), StockStatus::InStock);
    }

    #[test]
    fn test_adjust_logs_manual_adjustment() {
        let mut p = product(10, 0);
        let mutation = StockRules::adjust(
            &mut p,
            40,
            LogContext {
                reason: Some("recount".into()),
                performed_by: Some(1),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(p.stock, 40);
        assert_eq!(p.stock_status, StockStatus::InStock);
        let log = mutation.log.unwrap();
        assert_eq!(log.log_type(), InventoryLogType::ManualAdjustment);
        assert_eq!(log.quantity_change(), 30);
    }

    #[test]
    fn test_adjust_rejects_negative_and_untracked() {
        let mut p = product(10, 0);
        assert!(matches!(
            StockRules::adjust(&mut p, -1, LogContext::default()),
            Err(InventoryError::InvalidQuantity(_))
        ));
        assert_eq!(p.stock, 10);

        p.track_inventory = false;
        assert!(matches!(
            StockRules::adjust(&mut p, 5, LogContext::default()),
            Err(InventoryError::TrackingDisabled(_))
        ));
    }

    #[test]
    fn test_reserve_within_available() {
        let mut p = product(10, 4);
        StockRules::reserve(&mut p, 6).unwrap();
        assert_eq!(p.reserved_stock, 10);
        assert_eq!(p.stock, 10);
    }

    #[test]
    fn test_reserve_insufficient() {
        let mut p = product(10, 4);
        match StockRules::reserve(&mut p, 7) {
            Err(InventoryError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 6);
                assert_eq!(requested, 7);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(p.reserved_stock, 4);
    }

    #[test]
    fn test_reserve_backorder_allowed() {
        let mut p = product(2, 0);
        p.allow_backorder = true;
        StockRules::reserve(&mut p, 5).unwrap();
        assert_eq!(p.reserved_stock, 5);
        assert_eq!(p.available(), -3);
    }

    #[test]
    fn test_untracked_reserve_is_noop() {
        let mut p = product(0, 0);
        p.track_inventory = false;
        let before = p.clone();
        let mutation = StockRules::reserve(&mut p, 50).unwrap();
        assert_eq!(p, before);
        assert!(mutation.log.is_none());
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut p = product(10, 2);
        let mutation = StockRules::release(&mut p, 5).unwrap();
        assert_eq!(p.reserved_stock, 0);
        assert!(mutation.clamped);

        let mut q = product(10, 5);
        assert!(!StockRules::release(&mut q, 5).unwrap().clamped);
    }

    #[test]
    fn test_confirm_sale() {
        let mut p = product(10, 3);
        let order = Uuid::new_v4();
        let mutation = StockRules::confirm_sale(
            &mut p,
            3,
            LogContext {
                related_order: Some(order),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(p.stock, 7);
        assert_eq!(p.reserved_stock, 0);
        assert_eq!(p.stock_status, StockStatus::LowStock);
        assert!(!mutation.clamped);

        let log = mutation.log.unwrap().into_log(p.id, chrono::Utc::now());
        assert_eq!(log.log_type, InventoryLogType::Sale);
        assert_eq!(log.previous_stock, 10);
        assert_eq!(log.new_stock, 7);
        assert_eq!(log.quantity_change, -3);
        assert_eq!(log.related_order, Some(order));
    }

    #[test]
    fn test_confirm_sale_clamped_logs_actual_change() {
        let mut p = product(2, 0);
        let mutation = StockRules::confirm_sale(&mut p, 5, LogContext::default()).unwrap();

        assert_eq!(p.stock, 0);
        assert_eq!(p.stock_status, StockStatus::OutOfStock);
        assert!(mutation.clamped);
        assert_eq!(mutation.log.unwrap().quantity_change(), -2);
    }

    #[test]
    fn test_movements() {
        let mut p = product(10, 0);
        StockRules::record_movement(&mut p, MovementKind::Restock, 15, LogContext::default()).unwrap();
        assert_eq!(p.stock, 25);
        assert_eq!(p.stock_status, StockStatus::InStock);

        let mutation =
            StockRules::record_movement(&mut p, MovementKind::Damage, 30, LogContext::default())
                .unwrap();
        assert_eq!(p.stock, 0);
        assert!(mutation.clamped);
        assert_eq!(mutation.log.unwrap().log_type(), InventoryLogType::Damage);
    }

    #[test]
    fn test_adjust_below_reserved_caps_reservations() {
        let mut p = product(10, 8);
        let mutation = StockRules::adjust(&mut p, 2, LogContext::default()).unwrap();

        assert_eq!(p.stock, 2);
        assert_eq!(p.reserved_stock, 2);
        assert_eq!(p.available(), 0);
        assert!(mutation.clamped);
        assert_eq!(mutation.log.unwrap().quantity_change(), -8);
    }

    #[test]
    fn test_adjust_below_reserved_with_backorder_keeps_reservations() {
        let mut p = product(10, 8);
        p.allow_backorder = true;
        let mutation = StockRules::adjust(&mut p, 2, LogContext::default()).unwrap();

        assert_eq!(p.reserved_stock, 8);
        assert!(!mutation.clamped);
    }

    #[test]
    fn test_damage_below_reserved_caps_reservations() {
        let mut p = product(10, 8);
        let mutation =
            StockRules::record_movement(&mut p, MovementKind::Damage, 9, LogContext::default())
                .unwrap();

        assert_eq!(p.stock, 1);
        assert_eq!(p.reserved_stock, 1);
        assert!(mutation.clamped);
        assert_eq!(mutation.log.unwrap().quantity_change(), -9);
    }

    #[test]
    fn test_non_positive_quantities_rejected() {
        let mut p = product(10, 0);
        assert!(StockRules::reserve(&mut p, 0).is_err());
        assert!(StockRules::release(&mut p, -1).is_err());
        assert!(StockRules::confirm_sale(&mut p, 0, LogContext::default()).is_err());
    }
}
