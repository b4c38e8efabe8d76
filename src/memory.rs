//! In-process repositories for tests. Every method takes the single lock
//! once, so each call is atomic just like its Postgres counterpart.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::UserRepo,
    repo_types::{NewResetToken, NewUser, User},
    reset::ResetNotifier,
};
use crate::db::{RepoError, RepoResult};
use crate::photos::repo::{NewPhoto, Photo, PhotoRepo};
use crate::products::{
    repo::InventoryRepo,
    repo_types::{
        MovementType, NewProduct, NewSupplier, Product, StockMovement, StockOutcome, Supplier,
    },
};

struct ResetRow {
    user_id: Uuid,
    token_hash: String,
    expires_at: OffsetDateTime,
    consumed: bool,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    resets: Vec<ResetRow>,
    suppliers: Vec<Supplier>,
    products: Vec<Product>,
    movements: Vec<StockMovement>,
    photos: Vec<Photo>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.lock().photos.clone()
    }
}

fn movement(product_id: Uuid, kind: MovementType, quantity: i32) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4(),
        product_id,
        movement_type: kind.as_str().to_string(),
        quantity,
        created_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let t = self.lock();
        Ok(t.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, new: NewUser<'_>) -> RepoResult<User> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(new.email)) {
            return Err(RepoError::UniqueViolation("users_email_key".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.to_string(),
            username: new.username.to_string(),
            password_hash: new.password_hash.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn replace_reset_token(&self, token: NewResetToken<'_>) -> RepoResult<()> {
        let mut t = self.lock();
        for row in t.resets.iter_mut().filter(|r| r.user_id == token.user_id) {
            row.consumed = true;
        }
        t.resets.push(ResetRow {
            user_id: token.user_id,
            token_hash: token.token_hash.to_string(),
            expires_at: token.expires_at,
            consumed: false,
        });
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> RepoResult<Option<Uuid>> {
        let mut t = self.lock();
        let Some(row) = t
            .resets
            .iter_mut()
            .find(|r| r.token_hash == token_hash && !r.consumed && r.expires_at > now)
        else {
            return Ok(None);
        };
        row.consumed = true;
        let user_id = row.user_id;
        if let Some(user) = t.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = new_password_hash.to_string();
            user.updated_at = now;
        }
        Ok(Some(user_id))
    }
}

#[async_trait]
impl InventoryRepo for MemoryStore {
    async fn create_supplier(&self, new: NewSupplier) -> RepoResult<Supplier> {
        let mut t = self.lock();
        if t.suppliers.iter().any(|s| s.name == new.name) {
            return Err(RepoError::UniqueViolation("suppliers_name_key".into()));
        }
        let supplier = Supplier {
            id: Uuid::new_v4(),
            name: new.name,
            contact_email: new.contact_email,
            created_at: OffsetDateTime::now_utc(),
        };
        t.suppliers.push(supplier.clone());
        Ok(supplier)
    }

    async fn list_suppliers(&self) -> RepoResult<Vec<Supplier>> {
        let mut rows = self.lock().suppliers.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn create_product(&self, new: NewProduct) -> RepoResult<(Product, StockMovement)> {
        let mut t = self.lock();
        if !t.suppliers.iter().any(|s| s.id == new.supplier_id) {
            return Err(RepoError::ForeignKeyViolation("products_supplier_id_fkey".into()));
        }
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            category: new.category,
            stock_level: new.stock_level,
            reserved_stock: new.reserved_stock,
            reorder_threshold: new.reorder_threshold,
            cost_price: new.cost_price,
            price: new.price,
            supplier_id: new.supplier_id,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
        };
        let seed = movement(product.id, MovementType::InitialStock, product.stock_level);
        t.products.push(product.clone());
        t.movements.push(seed.clone());
        Ok((product, seed))
    }

    async fn list_products(&self, limit: i64, offset: i64) -> RepoResult<Vec<Product>> {
        let t = self.lock();
        Ok(t.products
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn product_exists(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.lock().products.iter().any(|p| p.id == id))
    }

    async fn apply_movement(
        &self,
        product_id: Uuid,
        kind: MovementType,
        delta: i32,
    ) -> RepoResult<StockOutcome> {
        let mut t = self.lock();
        let Some(product) = t.products.iter_mut().find(|p| p.id == product_id) else {
            return Ok(StockOutcome::ProductNotFound);
        };
        match product.stock_level.checked_add(delta) {
            Some(level) if level >= product.reserved_stock => {
                product.stock_level = level;
                product.updated_at = OffsetDateTime::now_utc();
            }
            _ => return Ok(StockOutcome::Insufficient),
        }
        let product = product.clone();
        let entry = movement(product_id, kind, delta);
        t.movements.push(entry.clone());
        Ok(StockOutcome::Applied(product, entry))
    }

    async fn list_movements(&self, product_id: Uuid) -> RepoResult<Vec<StockMovement>> {
        let t = self.lock();
        Ok(t.movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PhotoRepo for MemoryStore {
    async fn insert_photo(&self, new: NewPhoto<'_>) -> anyhow::Result<Photo> {
        let photo = Photo {
            id: Uuid::new_v4(),
            url: new.url.to_string(),
            approved: new.approved,
            uploaded_by: new.uploaded_by,
            category: new.category.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().photos.push(photo.clone());
        Ok(photo)
    }
}

/// Keeps every issued reset token instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingNotifier {
    pub fn last_token(&self) -> Option<String> {
        self.sent
            .lock()
            .expect("notifier poisoned")
            .last()
            .map(|(_, token)| token.clone())
    }
}

#[axum::async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn send_reset_token(&self, user: &User, token: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .expect("notifier poisoned")
            .push((user.id, token.to_string()));
        Ok(())
    }
}
