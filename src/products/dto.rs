use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldError;
use crate::products::repo_types::{MovementType, NewProduct, Product, StockMovement};

#[derive(Debug, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub category: String,
    pub stock_level: i32,
    #[serde(default)]
    pub reserved_stock: i32,
    pub reorder_threshold: i32,
    pub cost_price: f64,
    pub price: f64,
    pub supplier_id: Uuid,
    pub image_url: Option<String>,
}

impl ProductCreate {
    pub fn validate(self) -> Result<NewProduct, Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "must not be blank"));
        }
        if self.category.trim().is_empty() {
            errors.push(FieldError::new("category", "must not be blank"));
        }
        if self.stock_level < 0 {
            errors.push(FieldError::new("stock_level", "must not be negative"));
        }
        if self.reserved_stock < 0 {
            errors.push(FieldError::new("reserved_stock", "must not be negative"));
        } else if self.reserved_stock > self.stock_level {
            errors.push(FieldError::new("reserved_stock", "must not exceed stock_level"));
        }
        if self.reorder_threshold < 0 {
            errors.push(FieldError::new("reorder_threshold", "must not be negative"));
        }
        for (field, value) in [("cost_price", self.cost_price), ("price", self.price)] {
            if !value.is_finite() || value < 0.0 {
                errors.push(FieldError::new(field, "must be a non-negative number"));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewProduct {
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            stock_level: self.stock_level,
            reserved_stock: self.reserved_stock,
            reorder_threshold: self.reorder_threshold,
            cost_price: self.cost_price,
            price: self.price,
            supplier_id: self.supplier_id,
            image_url: self.image_url.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AddProductResponse {
    pub message: &'static str,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct UploadImageResponse {
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub movement_type: MovementType,
    pub quantity: i32,
}

impl MovementRequest {
    /// Signed change to apply to stock.
    pub fn delta(&self) -> Result<i32, FieldError> {
        match self.movement_type {
            MovementType::InitialStock => Err(FieldError::new(
                "movement_type",
                "initial_stock is recorded only when a product is created",
            )),
            MovementType::Restock if self.quantity > 0 => Ok(self.quantity),
            MovementType::Sale if self.quantity > 0 => Ok(-self.quantity),
            MovementType::Restock | MovementType::Sale => {
                Err(FieldError::new("quantity", "must be positive"))
            }
            MovementType::Adjustment if self.quantity != 0 => Ok(self.quantity),
            MovementType::Adjustment => Err(FieldError::new("quantity", "must not be zero")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub product: Product,
    pub movement: StockMovement,
}

#[derive(Debug, Deserialize)]
pub struct SupplierCreate {
    pub name: String,
    pub contact_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}
