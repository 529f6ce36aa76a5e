use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Derived availability bucket shown to shoppers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text")]
pub enum StockStatus {
    #[serde(rename = "In Stock")]
    #[sqlx(rename = "In Stock")]
    InStock,
    #[serde(rename = "Low Stock")]
    #[sqlx(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    #[sqlx(rename = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of stock movement recorded in the inventory log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InventoryLogType {
    ManualAdjustment,
    Sale,
    Return,
    Restock,
    Damage,
    Loss,
}

/// Movements an operator can record besides adjustments and sales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Return,
    Restock,
    Damage,
    Loss,
}

impl MovementKind {
    /// Return and restock add units; damage and loss remove them
    pub fn adds_stock(&self) -> bool {
        matches!(self, MovementKind::Return | MovementKind::Restock)
    }

    pub fn log_type(&self) -> InventoryLogType {
        match self {
            MovementKind::Return => InventoryLogType::Return,
            MovementKind::Restock => InventoryLogType::Restock,
            MovementKind::Damage => InventoryLogType::Damage,
            MovementKind::Loss => InventoryLogType::Loss,
        }
    }
}

/// Inventory fields of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InventoryProduct {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub category_id: Option<Uuid>,
    /// Authoritative sellable count
    pub stock: i32,
    /// Units held by in-flight orders
    pub reserved_stock: i32,
    pub stock_status: StockStatus,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryProduct {
    /// Units that can still be reserved; negative once backorders pile up
    pub fn available(&self) -> i32 {
        self.stock - self.reserved_stock
    }
}

/// Append-only record of a stock change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InventoryLog {
    pub id: Uuid,
    pub product_id: Uuid,
    pub log_type: InventoryLogType,
    /// Always `new_stock - previous_stock`
    pub quantity_change: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub performed_by: Option<i32>,
    pub related_order: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Log entry described by the stock rules before it is persisted
///
/// `quantity_change` is not settable: it is derived from the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDraft {
    log_type: InventoryLogType,
    previous_stock: i32,
    new_stock: i32,
    reason: Option<String>,
    notes: Option<String>,
    performed_by: Option<i32>,
    related_order: Option<Uuid>,
}

impl LogDraft {
    pub fn new(log_type: InventoryLogType, previous_stock: i32, new_stock: i32) -> Self {
        Self {
            log_type,
            previous_stock,
            new_stock,
            reason: None,
            notes: None,
            performed_by: None,
            related_order: None,
        }
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn performed_by(mut self, performed_by: Option<i32>) -> Self {
        self.performed_by = performed_by;
        self
    }

    pub fn related_order(mut self, related_order: Option<Uuid>) -> Self {
        self.related_order = related_order;
        self
    }

    pub fn log_type(&self) -> InventoryLogType {
        self.log_type
    }

    pub fn quantity_change(&self) -> i32 {
        self.new_stock - self.previous_stock
    }

    /// Materialize the row for `product_id`
    pub fn into_log(self, product_id: Uuid, created_at: DateTime<Utc>) -> InventoryLog {
        InventoryLog {
            id: Uuid::new_v4(),
            product_id,
            log_type: self.log_type,
            quantity_change: self.new_stock - self.previous_stock,
            previous_stock: self.previous_stock,
            new_stock: self.new_stock,
            reason: self.reason,
            notes: self.notes,
            performed_by: self.performed_by,
            related_order: self.related_order,
            created_at,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Request DTO for registering a product's inventory fields
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    #[schema(example = "Ethiopian Yirgacheffe 250g")]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "SKU must be between 1 and 64 characters"))]
    #[schema(example = "ETH-YIR-250")]
    pub sku: String,
    pub category_id: Option<Uuid>,
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub track_inventory: bool,
    #[serde(default)]
    pub allow_backorder: bool,
}

/// Request DTO for setting a product's stock to an absolute value
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdjustStockRequest {
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    #[schema(example = 40)]
    pub new_stock: i32,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// One entry of a bulk adjustment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkStockUpdate {
    pub product_id: Uuid,
    pub new_stock: i32,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BulkAdjustRequest {
    #[validate(length(min = 1, message = "At least one update is required"))]
    pub updates: Vec<BulkStockUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkAdjustFailure {
    pub product_id: Uuid,
    pub error: String,
}

/// Per-entry outcome of a bulk adjustment; failures never abort the batch
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkAdjustResponse {
    pub results: Vec<InventoryProductResponse>,
    pub errors: Vec<BulkAdjustFailure>,
}

/// Request DTO for reserve and release
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct QuantityRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    #[schema(example = 2)]
    pub quantity: i32,
}

/// Request DTO for confirming a sale
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaleRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub order_id: Uuid,
}

/// Request DTO for recording a return, restock, damage or loss
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct MovementRequest {
    pub kind: MovementKind,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub related_order: Option<Uuid>,
}

/// One product line of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Product inventory view with derived fields
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryProductResponse {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub category_id: Option<Uuid>,
    pub stock: i32,
    /// Mirror of `stock` kept for older clients
    pub quantity: i32,
    pub reserved_stock: i32,
    pub available: i32,
    pub stock_status: StockStatus,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryProduct> for InventoryProductResponse {
    fn from(product: InventoryProduct) -> Self {
        Self {
            available: product.available(),
            quantity: product.stock,
            id: product.id,
            name: product.name,
            sku: product.sku,
            category_id: product.category_id,
            stock: product.stock,
            reserved_stock: product.reserved_stock,
            stock_status: product.stock_status,
            track_inventory: product.track_inventory,
            allow_backorder: product.allow_backorder,
            updated_at: product.updated_at,
        }
    }
}

/// Query parameters for the inventory log
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    /// Maximum rows, newest first (default 50, max 500)
    pub limit: Option<i64>,
}

/// Query parameters for the low stock report
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LowStockQuery {
    /// Products with stock at or below this value (default 20)
    pub threshold: Option<i32>,
}
