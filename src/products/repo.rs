use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::RepoResult;
use crate::products::repo_types::{
    MovementType, NewProduct, NewSupplier, Product, StockMovement, StockOutcome, Supplier,
};

#[async_trait]
pub trait InventoryRepo: Send + Sync {
    /// Fails with `UniqueViolation` on a duplicate name.
    async fn create_supplier(&self, new: NewSupplier) -> RepoResult<Supplier>;
    async fn list_suppliers(&self) -> RepoResult<Vec<Supplier>>;

    /// Inserts the product and its `initial_stock` ledger entry in one
    /// transaction. Fails with `ForeignKeyViolation` for an unknown supplier.
    async fn create_product(&self, new: NewProduct) -> RepoResult<(Product, StockMovement)>;
    async fn list_products(&self, limit: i64, offset: i64) -> RepoResult<Vec<Product>>;
    async fn product_exists(&self, id: Uuid) -> RepoResult<bool>;

    /// Adds `delta` to the stock level unless it would drop below the
    /// reserved stock or past `i32::MAX`, appending the ledger entry in the
    /// same transaction.
    async fn apply_movement(
        &self,
        product_id: Uuid,
        kind: MovementType,
        delta: i32,
    ) -> RepoResult<StockOutcome>;
    async fn list_movements(&self, product_id: Uuid) -> RepoResult<Vec<StockMovement>>;
}

const PRODUCT_COLUMNS: &str = "id, name, category, stock_level, reserved_stock, reorder_threshold, \
     cost_price, price, supplier_id, image_url, created_at, updated_at";

#[derive(Clone)]
pub struct PgInventoryRepo {
    db: PgPool,
}

impl PgInventoryRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn insert_movement_tx(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    kind: MovementType,
    quantity: i32,
) -> RepoResult<StockMovement> {
    let movement = sqlx::query_as::<_, StockMovement>(
        r#"
        INSERT INTO stock_movements (id, product_id, movement_type, quantity)
        VALUES ($1, $2, $3, $4)
        RETURNING id, product_id, movement_type, quantity, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(kind.as_str())
    .bind(quantity)
    .fetch_one(&mut **tx)
    .await?;
    Ok(movement)
}

#[async_trait]
impl InventoryRepo for PgInventoryRepo {
    async fn create_supplier(&self, new: NewSupplier) -> RepoResult<Supplier> {
        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (id, name, contact_email)
            VALUES ($1, $2, $3)
            RETURNING id, name, contact_email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.contact_email)
        .fetch_one(&self.db)
        .await?;
        Ok(supplier)
    }

    async fn list_suppliers(&self) -> RepoResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, contact_email, created_at FROM suppliers ORDER BY name ASC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create_product(&self, new: NewProduct) -> RepoResult<(Product, StockMovement)> {
        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (id, name, category, stock_level, reserved_stock,
                                  reorder_threshold, cost_price, price, supplier_id, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.category)
        .bind(new.stock_level)
        .bind(new.reserved_stock)
        .bind(new.reorder_threshold)
        .bind(new.cost_price)
        .bind(new.price)
        .bind(new.supplier_id)
        .bind(&new.image_url)
        .fetch_one(&mut *tx)
        .await?;

        let movement =
            insert_movement_tx(&mut tx, product.id, MovementType::InitialStock, product.stock_level)
                .await?;

        tx.commit().await?;
        Ok((product, movement))
    }

    async fn list_products(&self, limit: i64, offset: i64) -> RepoResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
              FROM products
             ORDER BY created_at DESC
             LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn product_exists(&self, id: Uuid) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(exists)
    }

    async fn apply_movement(
        &self,
        product_id: Uuid,
        kind: MovementType,
        delta: i32,
    ) -> RepoResult<StockOutcome> {
        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
               SET stock_level = stock_level + $2, updated_at = now()
             WHERE id = $1
               AND stock_level::bigint + $2 BETWEEN reserved_stock AND 2147483647
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(product) = product else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                    .bind(product_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Ok(if exists {
                StockOutcome::Insufficient
            } else {
                StockOutcome::ProductNotFound
            });
        };

        let movement = insert_movement_tx(&mut tx, product_id, kind, delta).await?;
        tx.commit().await?;
        Ok(StockOutcome::Applied(product, movement))
    }

    async fn list_movements(&self, product_id: Uuid) -> RepoResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, quantity, created_at
              FROM stock_movements
             WHERE product_id = $1
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
