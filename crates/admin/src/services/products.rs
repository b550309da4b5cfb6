//! Catalog editing for the back office.
//!
//! Drafts are validated in `bazaar-core` before anything is written. Unlike
//! review photos, a failed product image upload fails the request.

use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use bazaar_core::ProductId;
use bazaar_core::models::{Product, ProductDraft};
use bazaar_platform::repositories::ProductRepository;
use bazaar_platform::{Backend, RepositoryError};

use crate::error::AppError;

/// Storage bucket for product photos.
pub const PRODUCT_BUCKET: &str = "product-images";

/// Largest accepted product photo.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// A photo uploaded from the back office.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Units to add (positive) or write off (negative).
    pub delta: i64,
}

/// Every product, hidden ones included, newest first.
///
/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend) -> Result<Vec<Product>, AppError> {
    Ok(ProductRepository::new(backend).list(false).await?)
}

/// # Errors
///
/// Returns `AppError::NotFound` for an unknown product.
pub async fn get(backend: &dyn Backend, id: ProductId) -> Result<Product, AppError> {
    ProductRepository::new(backend)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_owned()))
}

fn validated(draft: ProductDraft) -> Result<ProductDraft, AppError> {
    draft
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// # Errors
///
/// Returns `AppError::BadRequest` if the draft is invalid.
#[instrument(skip(backend, draft), fields(name = %draft.name))]
pub async fn create(backend: &dyn Backend, draft: ProductDraft) -> Result<Product, AppError> {
    let draft = validated(draft)?;
    let product = ProductRepository::new(backend).create(&draft).await?;
    info!(product_id = %product.id, "Product created");
    Ok(product)
}

/// Replace a product's editable fields.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the draft is invalid and
/// `AppError::NotFound` for an unknown product.
#[instrument(skip(backend, draft))]
pub async fn update(
    backend: &dyn Backend,
    id: ProductId,
    draft: ProductDraft,
) -> Result<Product, AppError> {
    let draft = validated(draft)?;
    let product = ProductRepository::new(backend)
        .update(id, &draft)
        .await
        .map_err(not_found)?;
    info!(product_id = %id, "Product updated");
    Ok(product)
}

/// Show or hide a product in the storefront.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown product.
#[instrument(skip(backend))]
pub async fn set_active(backend: &dyn Backend, id: ProductId, active: bool) -> Result<Product, AppError> {
    let product = ProductRepository::new(backend)
        .set_active(id, active)
        .await
        .map_err(not_found)?;
    info!(product_id = %id, active, "Product visibility changed");
    Ok(product)
}

fn upload_path(id: ProductId, file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect();
    format!("{id}/{}-{name}", Uuid::new_v4().simple())
}

/// Upload a photo and append it to the product's gallery.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a non-image or oversized file,
/// `AppError::NotFound` for an unknown product and `AppError::Repository`
/// if storage rejects the upload.
#[instrument(skip(backend, image), fields(file = %image.file_name, bytes = image.bytes.len()))]
pub async fn add_image(
    backend: &dyn Backend,
    id: ProductId,
    image: ImageUpload,
) -> Result<Product, AppError> {
    if !image.content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Only image files can be uploaded".to_owned()));
    }
    if image.bytes.is_empty() || image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::BadRequest(format!(
            "Images must be between 1 byte and {} MB",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    let repo = ProductRepository::new(backend);
    let mut images = stored_images(&repo, id).await?;
    let url = backend
        .upload(
            PRODUCT_BUCKET,
            &upload_path(id, &image.file_name),
            image.bytes,
            &image.content_type,
        )
        .await
        .map_err(RepositoryError::from)?;

    images.push(url);
    let product = repo.set_images(id, &images).await?;
    info!(product_id = %id, count = product.images.len(), "Product image added");
    Ok(product)
}

/// Drop one image URL from the gallery. The stored file is left in place.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the product or the image is unknown.
pub async fn remove_image(backend: &dyn Backend, id: ProductId, url: &str) -> Result<Product, AppError> {
    let repo = ProductRepository::new(backend);
    let images = stored_images(&repo, id).await?;
    if !images.iter().any(|i| i == url) {
        return Err(AppError::NotFound("Image".to_owned()));
    }
    let images: Vec<String> = images.into_iter().filter(|i| i != url).collect();
    Ok(repo.set_images(id, &images).await?)
}

// Edits start from the stored list; the placeholder is display-only.
async fn stored_images(repo: &ProductRepository<'_>, id: ProductId) -> Result<Vec<String>, AppError> {
    repo.stored_images(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_owned()))
}

/// Correct stock by a signed amount, e.g. after a stock take.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a zero delta and
/// `AppError::Repository(InsufficientStock)` if stock would go negative.
#[instrument(skip(backend))]
pub async fn adjust_stock(
    backend: &dyn Backend,
    id: ProductId,
    adjustment: StockAdjustment,
) -> Result<Product, AppError> {
    if adjustment.delta == 0 {
        return Err(AppError::BadRequest("Stock change must not be zero".to_owned()));
    }
    let product = ProductRepository::new(backend)
        .adjust_stock(id, adjustment.delta)
        .await
        .map_err(not_found)?;
    info!(product_id = %id, delta = adjustment.delta, stock = product.stock, "Stock adjusted");
    Ok(product)
}

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Product".to_owned()),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::Money;
    use bazaar_platform::MemoryBackend;
    use bazaar_platform::conversions::PLACEHOLDER_IMAGE;

    use super::*;
    use crate::services::fixtures::draft;

    fn photo(content_type: &str) -> ImageUpload {
        ImageUpload {
            file_name: "front view.png".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0x89, 0x50, 0x4E, 0x47],
        }
    }

    #[tokio::test]
    async fn test_create_update_and_hide() {
        let backend = MemoryBackend::new();
        let product = create(&backend, draft("  Cardamom ", 250, 10)).await.unwrap();
        assert_eq!(product.name, "Cardamom");

        let mut edit = draft("Green Cardamom", 260, 10);
        edit.original_price = Some(Money::from_rupees(300));
        let updated = update(&backend, product.id, edit).await.unwrap();
        assert_eq!(updated.price, Money::from_rupees(260));
        assert_eq!(updated.discount_percent(), Some(13));

        let hidden = set_active(&backend, product.id, false).await.unwrap();
        assert!(!hidden.is_active);
        assert_eq!(list(&backend).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_draft_rejected() {
        let backend = MemoryBackend::new();
        let mut bad = draft("Saffron", 900, 1);
        bad.original_price = Some(Money::from_rupees(100));
        let err = create(&backend, bad).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = update(&backend, ProductId::random(), draft("Saffron", 900, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_image_upload_appends() {
        let backend = MemoryBackend::new();
        let product = create(&backend, draft("Clove", 120, 4)).await.unwrap();

        let with_one = add_image(&backend, product.id, photo("image/png")).await.unwrap();
        assert_eq!(with_one.images.len(), 1);
        let url = with_one.images[0].clone();

        let err = add_image(&backend, product.id, photo("application/pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let emptied = remove_image(&backend, product.id, &url).await.unwrap();
        assert_eq!(emptied.images, vec![PLACEHOLDER_IMAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_placeholder_never_stored() {
        let backend = MemoryBackend::new();
        let product = create(&backend, draft("Clove", 120, 4)).await.unwrap();
        assert_eq!(product.images, vec![PLACEHOLDER_IMAGE.to_string()]);
        let repo = ProductRepository::new(&backend);

        let with_one = add_image(&backend, product.id, photo("image/png")).await.unwrap();
        assert_eq!(with_one.images.len(), 1);
        assert_ne!(with_one.images[0], PLACEHOLDER_IMAGE);
        assert_eq!(repo.stored_images(product.id).await.unwrap().unwrap(), with_one.images);

        let err = remove_image(&backend, product.id, PLACEHOLDER_IMAGE).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        remove_image(&backend, product.id, &with_one.images[0]).await.unwrap();
        assert!(repo.stored_images(product.id).await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_upload_fails_request() {
        let backend = MemoryBackend::new();
        backend.fail_uploads(true);
        let product = create(&backend, draft("Clove", 120, 4)).await.unwrap();

        let err = add_image(&backend, product.id, photo("image/jpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));
        let stored = ProductRepository::new(&backend)
            .stored_images(product.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_stock_adjustment() {
        let backend = MemoryBackend::new();
        let product = create(&backend, draft("Pepper", 80, 3)).await.unwrap();

        let restocked = adjust_stock(&backend, product.id, StockAdjustment { delta: 7 })
            .await
            .unwrap();
        assert_eq!(restocked.stock, 10);

        let err = adjust_stock(&backend, product.id, StockAdjustment { delta: -11 })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Repository(RepositoryError::InsufficientStock { available: 10, .. })
        ));

        let err = adjust_stock(&backend, product.id, StockAdjustment { delta: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_upload_path_is_sanitised() {
        let path = upload_path(ProductId::random(), "../x y.png");
        assert!(path.ends_with("-..-x-y.png"));
        assert_eq!(path.matches('/').count(), 1);
    }
}
