use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::RepoError;
use crate::error::{AppError, AppResult};
use crate::photos::repo::NewPhoto;
use crate::products::repo_types::{
    MovementType, NewProduct, NewSupplier, Product, StockMovement, StockOutcome, Supplier,
};
use crate::state::AppState;

/// Replaces spaces with underscores. Names that could escape the static
/// directory are refused.
pub fn sanitize_filename(name: &str) -> AppResult<String> {
    let safe = name.replace(' ', "_");
    if safe.is_empty()
        || safe == "."
        || safe == ".."
        || safe.contains(&['/', '\\', '\0'][..])
    {
        return Err(AppError::field("file", "invalid filename"));
    }
    Ok(safe)
}

/// Writes the file, then records the photo. The two steps are not atomic:
/// a failure after the write leaves the file without a row.
pub async fn upload_image(
    st: &AppState,
    filename: &str,
    body: Bytes,
    uploaded_by: Option<Uuid>,
) -> AppResult<String> {
    let key = sanitize_filename(filename)?;
    st.storage
        .put_object(&key, body)
        .await
        .with_context(|| format!("store upload {key}"))
        .map_err(AppError::Storage)?;

    let url = st.storage.public_url(&key);
    let photo = st
        .photos
        .insert_photo(NewPhoto {
            url: &url,
            approved: true,
            uploaded_by,
            category: None,
        })
        .await?;

    info!(photo_id = %photo.id, %url, "photo uploaded");
    Ok(url)
}

pub async fn add_product(st: &AppState, new: NewProduct) -> AppResult<Product> {
    let supplier_id = new.supplier_id;
    let (product, movement) = match st.inventory.create_product(new).await {
        Ok(created) => created,
        Err(RepoError::ForeignKeyViolation(_)) => {
            warn!(%supplier_id, "product for unknown supplier");
            return Err(AppError::field("supplier_id", "unknown supplier"));
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        product_id = %product.id,
        movement_id = %movement.id,
        stock_level = product.stock_level,
        "product added"
    );
    Ok(product)
}

pub async fn record_movement(
    st: &AppState,
    product_id: Uuid,
    kind: MovementType,
    delta: i32,
) -> AppResult<(Product, StockMovement)> {
    match st.inventory.apply_movement(product_id, kind, delta).await? {
        StockOutcome::Applied(product, movement) => {
            info!(
                %product_id,
                kind = kind.as_str(),
                delta,
                stock_level = product.stock_level,
                "stock movement recorded"
            );
            Ok((product, movement))
        }
        StockOutcome::ProductNotFound => Err(AppError::NotFound("Product")),
        StockOutcome::Insufficient => {
            warn!(%product_id, delta, "movement would drop stock below reserved");
            Err(AppError::InsufficientStock)
        }
    }
}

pub async fn list_movements(st: &AppState, product_id: Uuid) -> AppResult<Vec<StockMovement>> {
    if !st.inventory.product_exists(product_id).await? {
        return Err(AppError::NotFound("Product"));
    }
    Ok(st.inventory.list_movements(product_id).await?)
}

pub async fn create_supplier(st: &AppState, new: NewSupplier) -> AppResult<Supplier> {
    match st.inventory.create_supplier(new).await {
        Ok(s) => {
            info!(supplier_id = %s.id, name = %s.name, "supplier created");
            Ok(s)
        }
        Err(RepoError::UniqueViolation(_)) => Err(AppError::field("name", "supplier already exists")),
        Err(e) => Err(e.into()),
    }
}
