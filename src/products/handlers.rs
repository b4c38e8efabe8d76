use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::MaybeAuthUser,
    error::{AppError, AppJson, AppMultipart, AppPath, AppQuery, AppResult},
    products::{
        dto::{
            AddProductResponse, MovementRequest, MovementResponse, Pagination, ProductCreate,
            SupplierCreate, UploadImageResponse,
        },
        repo_types::{NewSupplier, Product, StockMovement, Supplier},
        services,
    },
    state::AppState,
};

const FILE_FIELDS: [&str; 2] = ["uploaded_file", "file"];

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(20 * 1024 * 1024)), // 20MB
        )
        .route("/products/add", post(add_product))
        .route("/products", get(list_products))
        .route(
            "/products/:id/movements",
            get(list_movements).post(record_movement),
        )
}

pub fn supplier_routes() -> Router<AppState> {
    Router::new().route("/suppliers", get(list_suppliers).post(create_supplier))
}

/// POST /products/upload-image (multipart, one file in `uploaded_file`)
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    AppMultipart(mut mp): AppMultipart,
) -> AppResult<Json<UploadImageResponse>> {
    while let Some(field) = mp.next_field().await? {
        if !field.name().is_some_and(|n| FILE_FIELDS.contains(&n)) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        let image_url = services::upload_image(&state, &filename, data, user_id).await?;
        return Ok(Json(UploadImageResponse { image_url }));
    }
    Err(AppError::field("uploaded_file", "file is required"))
}

#[instrument(skip(state, payload))]
pub async fn add_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ProductCreate>,
) -> AppResult<Json<AddProductResponse>> {
    let new = payload.validate().map_err(AppError::Validation)?;
    let product = services::add_product(&state, new).await?;
    Ok(Json(AddProductResponse {
        message: "Product added successfully",
        product,
    }))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(p): AppQuery<Pagination>,
) -> AppResult<Json<Vec<Product>>> {
    let (limit, offset) = p.clamped();
    Ok(Json(state.inventory.list_products(limit, offset).await?))
}

#[instrument(skip(state, payload))]
pub async fn record_movement(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<MovementRequest>,
) -> AppResult<Json<MovementResponse>> {
    let delta = payload.delta().map_err(|e| AppError::Validation(vec![e]))?;
    let (product, movement) =
        services::record_movement(&state, id, payload.movement_type, delta).await?;
    Ok(Json(MovementResponse { product, movement }))
}

#[instrument(skip(state))]
pub async fn list_movements(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    Ok(Json(services::list_movements(&state, id).await?))
}

#[instrument(skip(state))]
pub async fn list_suppliers(State(state): State<AppState>) -> AppResult<Json<Vec<Supplier>>> {
    Ok(Json(state.inventory.list_suppliers().await?))
}

#[instrument(skip(state, payload))]
pub async fn create_supplier(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SupplierCreate>,
) -> AppResult<Json<Supplier>> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::field("name", "must not be blank"));
    }
    let supplier = services::create_supplier(
        &state,
        NewSupplier {
            name,
            contact_email: payload.contact_email,
        },
    )
    .await?;
    Ok(Json(supplier))
}
