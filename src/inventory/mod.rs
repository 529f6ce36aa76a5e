// Inventory module
// Stock counters, reservations, sales and the append-only inventory log

pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod stock_rules;
pub mod store;
pub mod tracker;

pub use error::InventoryError;
pub use models::{
    InventoryLog, InventoryLogType, InventoryProduct, InventoryProductResponse, MovementKind,
    OrderLineItem, StockStatus,
};
pub use repository::PgInventoryRepository;
pub use stock_rules::{stock_status_for, LOW_STOCK_THRESHOLD};
pub use store::{InMemoryInventoryStore, InventoryStore};
pub use tracker::InventoryTracker;
