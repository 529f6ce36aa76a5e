// Engine metrics
//
// Counts coupon and inventory operations, rule rejections and floor clamps,
// and times the hot paths so slow operations show up in the logs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

/// Performance threshold for slow operations (100ms)
const SLOW_OPERATION_THRESHOLD_MS: u64 = 100;

/// Shared counters for both engines
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    // Coupon engine
    coupon_validations: AtomicU64,
    coupon_rejections: AtomicU64,
    coupon_redemptions: AtomicU64,

    // Inventory tracker
    reservations: AtomicU64,
    reservation_rejections: AtomicU64,
    releases: AtomicU64,
    sales: AtomicU64,
    stock_adjustments: AtomicU64,
    stock_movements: AtomicU64,

    // Floor-and-continue clamps; each one is a caller-side accounting error
    floor_clamps: AtomicU64,

    // Timing (microseconds)
    total_validation_time_us: AtomicU64,
    total_stock_time_us: AtomicU64,
    timed_validations: AtomicU64,
    timed_stock_operations: AtomicU64,
    slow_operations: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn record_coupon_validation(&self, valid: bool) {
        self.inner.coupon_validations.fetch_add(1, Ordering::Relaxed);
        if !valid {
            self.inner.coupon_rejections.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_coupon_redemption(&self) {
        self.inner.coupon_redemptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reservation(&self, succeeded: bool) {
        if succeeded {
            self.inner.reservations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.reservation_rejections.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_release(&self) {
        self.inner.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sale(&self) {
        self.inner.sales.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stock_adjustment(&self) {
        self.inner.stock_adjustments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stock_movement(&self) {
        self.inner.stock_movements.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a counter was clamped (floored at zero or capped at stock)
    pub fn record_floor_clamp(&self) {
        self.inner.floor_clamps.fetch_add(1, Ordering::Relaxed);
    }

    /// Start timing a coupon validation
    pub fn start_coupon_validation(&self) -> OperationTimer {
        OperationTimer::new(OperationType::CouponValidation, self.clone())
    }

    /// Start timing a stock mutation
    pub fn start_stock_operation(&self) -> OperationTimer {
        OperationTimer::new(OperationType::StockOperation, self.clone())
    }

    fn record_duration(&self, operation_type: OperationType, duration: Duration) {
        let micros = duration.as_micros() as u64;
        match operation_type {
            OperationType::CouponValidation => {
                self.inner.timed_validations.fetch_add(1, Ordering::Relaxed);
                self.inner.total_validation_time_us.fetch_add(micros, Ordering::Relaxed);
            }
            OperationType::StockOperation => {
                self.inner.timed_stock_operations.fetch_add(1, Ordering::Relaxed);
                self.inner.total_stock_time_us.fetch_add(micros, Ordering::Relaxed);
            }
        }

        if duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS {
            self.inner.slow_operations.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow {:?}: {}ms", operation_type, duration.as_millis());
        }
    }

    fn average_ms(total_us: &AtomicU64, count: &AtomicU64) -> f64 {
        let count = count.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            (total_us.load(Ordering::Relaxed) as f64 / count as f64) / 1000.0
        }
    }

    /// Get metrics summary
    pub fn summary(&self) -> MetricsSummary {
        let inner = &self.inner;
        MetricsSummary {
            coupon_validations: inner.coupon_validations.load(Ordering::Relaxed),
            coupon_rejections: inner.coupon_rejections.load(Ordering::Relaxed),
            coupon_redemptions: inner.coupon_redemptions.load(Ordering::Relaxed),
            reservations: inner.reservations.load(Ordering::Relaxed),
            reservation_rejections: inner.reservation_rejections.load(Ordering::Relaxed),
            releases: inner.releases.load(Ordering::Relaxed),
            sales: inner.sales.load(Ordering::Relaxed),
            stock_adjustments: inner.stock_adjustments.load(Ordering::Relaxed),
            stock_movements: inner.stock_movements.load(Ordering::Relaxed),
            floor_clamps: inner.floor_clamps.load(Ordering::Relaxed),
            avg_validation_time_ms: Self::average_ms(
                &inner.total_validation_time_us,
                &inner.timed_validations,
            ),
            avg_stock_operation_time_ms: Self::average_ms(
                &inner.total_stock_time_us,
                &inner.timed_stock_operations,
            ),
            slow_operations: inner.slow_operations.load(Ordering::Relaxed),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let s = self.summary();
        tracing::info!(
            "Engine metrics:\n\
             Coupons: {} validations ({} rejected), {} redemptions, avg {:.2}ms\n\
             Inventory: {} reservations ({} rejected), {} releases, {} sales, {} adjustments, {} movements, avg {:.2}ms\n\
             Floor clamps: {}, slow operations: {}",
            s.coupon_validations,
            s.coupon_rejections,
            s.coupon_redemptions,
            s.avg_validation_time_ms,
            s.reservations,
            s.reservation_rejections,
            s.releases,
            s.sales,
            s.stock_adjustments,
            s.stock_movements,
            s.avg_stock_operation_time_ms,
            s.floor_clamps,
            s.slow_operations,
        );
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of operation being timed
#[derive(Debug, Clone, Copy)]
enum OperationType {
    CouponValidation,
    StockOperation,
}

/// Records the elapsed time of an operation when dropped
pub struct OperationTimer {
    start: Instant,
    operation_type: OperationType,
    metrics: EngineMetrics,
}

impl OperationTimer {
    fn new(operation_type: OperationType, metrics: EngineMetrics) -> Self {
        Self {
            start: Instant::now(),
            operation_type,
            metrics,
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        self.metrics
            .record_duration(self.operation_type, self.start.elapsed());
    }
}

/// Snapshot of the engine counters
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsSummary {
    pub coupon_validations: u64,
    pub coupon_rejections: u64,
    pub coupon_redemptions: u64,
    pub reservations: u64,
    pub reservation_rejections: u64,
    pub releases: u64,
    pub sales: u64,
    pub stock_adjustments: u64,
    pub stock_movements: u64,
    pub floor_clamps: u64,
    pub avg_validation_time_ms: f64,
    pub avg_stock_operation_time_ms: f64,
    pub slow_operations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let summary = EngineMetrics::new().summary();
        assert_eq!(summary.coupon_validations, 0);
        assert_eq!(summary.floor_clamps, 0);
        assert_eq!(summary.avg_validation_time_ms, 0.0);
    }

    #[test]
    fn test_coupon_counters() {
        let metrics = EngineMetrics::new();
        metrics.record_coupon_validation(true);
        metrics.record_coupon_validation(false);
        metrics.record_coupon_redemption();

        let summary = metrics.summary();
        assert_eq!(summary.coupon_validations, 2);
        assert_eq!(summary.coupon_rejections, 1);
        assert_eq!(summary.coupon_redemptions, 1);
    }

    #[test]
    fn test_reservation_counters() {
        let metrics = EngineMetrics::new();
        metrics.record_reservation(true);
        metrics.record_reservation(false);
        metrics.record_reservation(false);
        metrics.record_floor_clamp();

        let summary = metrics.summary();
        assert_eq!(summary.reservations, 1);
        assert_eq!(summary.reservation_rejections, 2);
        assert_eq!(summary.floor_clamps, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = EngineMetrics::new();
        let other = metrics.clone();
        other.record_sale();
        assert_eq!(metrics.summary().sales, 1);
    }

    #[test]
    fn test_operation_timer() {
        let metrics = EngineMetrics::new();
        {
            let _timer = metrics.start_coupon_validation();
            thread::sleep(Duration::from_millis(10));
        }

        assert!(metrics.summary().avg_validation_time_ms >= 10.0);
    }

    #[test]
    fn test_slow_operation_detection() {
        let metrics = EngineMetrics::new();
        {
            let _timer = metrics.start_stock_operation();
            thread::sleep(Duration::from_millis(150));
        }

        assert_eq!(metrics.summary().slow_operations, 1);
    }
}
