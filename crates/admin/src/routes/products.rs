//! Catalog route handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::ProductId;
use bazaar_core::models::{Product, ProductDraft};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::products::{self, ImageUpload, StockAdjustment};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

/// GET /api/products
pub async fn index(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(products::list(state.backend()).await?))
}

/// GET /api/products/{id}
pub async fn show(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(products::get(state.backend(), id).await?))
}

/// POST /api/products
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = products::create(state.backend(), draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>> {
    Ok(Json(products::update(state.backend(), id, draft).await?))
}

/// POST /api/products/{id}/activate
pub async fn activate(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(products::set_active(state.backend(), id, true).await?))
}

/// POST /api/products/{id}/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(products::set_active(state.backend(), id, false).await?))
}

fn bad_form(err: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid upload: {err}"))
}

/// Upload one photo from the `image` part of a multipart form.
///
/// POST /api/products/{id}/images
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    mut form: Multipart,
) -> Result<Json<Product>> {
    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("image").to_owned();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field.bytes().await.map_err(bad_form)?;
        let upload = ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        };
        return Ok(Json(products::add_image(state.backend(), id, upload).await?));
    }
    Err(AppError::BadRequest("Missing image part".to_owned()))
}

/// DELETE /api/products/{id}/images
pub async fn remove_image(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
    Json(image): Json<ImageRef>,
) -> Result<Json<Product>> {
    Ok(Json(
        products::remove_image(state.backend(), id, &image.url).await?,
    ))
}

/// POST /api/products/{id}/stock
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<Json<Product>> {
    Ok(Json(
        products::adjust_stock(state.backend(), id, adjustment).await?,
    ))
}
