use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub stock_level: i32,
    pub reserved_stock: i32,
    pub reorder_threshold: i32,
    pub cost_price: f64,
    pub price: f64,
    pub supplier_id: Uuid,
    pub image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub stock_level: i32,
    pub reserved_stock: i32,
    pub reorder_threshold: i32,
    pub cost_price: f64,
    pub price: f64,
    pub supplier_id: Uuid,
    pub image_url: String,
}

/// Kinds of ledger entries. `InitialStock` is written only by product
/// creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    InitialStock,
    Restock,
    Sale,
    Adjustment,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialStock => "initial_stock",
            Self::Restock => "restock",
            Self::Sale => "sale",
            Self::Adjustment => "adjustment",
        }
    }
}

/// Append-only ledger row; `quantity` is the signed change to stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: String,
    pub quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Result of trying to apply a movement to a product's stock.
#[derive(Debug)]
pub enum StockOutcome {
    Applied(Product, StockMovement),
    ProductNotFound,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSupplier {
    pub name: String,
    pub contact_email: Option<String>,
}
