//! Product reviews and rating summaries.
//!
//! One review per customer per product. Photos go to object storage first;
//! a failed upload drops that photo but still saves the review.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bazaar_core::models::review::validate_comment;
use bazaar_core::models::{Rating, RatingSummary, Review};
use bazaar_core::{ProductId, ReviewId, UserId};
use bazaar_platform::repositories::{ProductRepository, ReviewRepository};
use bazaar_platform::{Backend, RepositoryError};

use crate::error::AppError;

/// Storage bucket for review photos.
pub const REVIEW_BUCKET: &str = "review-images";

/// Photos accepted per review.
pub const MAX_REVIEW_IMAGES: usize = 5;

/// A photo attached to a review submission.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A review as submitted by the customer.
#[derive(Debug, Clone, Default)]
pub struct ReviewSubmission {
    pub rating: u8,
    pub comment: String,
    pub images: Vec<ImageUpload>,
}

/// Reviews of one product with their aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReviews {
    pub summary: RatingSummary,
    pub reviews: Vec<Review>,
}

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend, product_id: ProductId) -> Result<ProductReviews, AppError> {
    let reviews = ReviewRepository::new(backend)
        .list_for_product(product_id)
        .await?;
    let summary = RatingSummary::from_ratings(reviews.iter().map(|r| r.rating));
    Ok(ProductReviews { summary, reviews })
}

fn upload_path(product_id: ProductId, user_id: UserId, file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect();
    format!("{product_id}/{user_id}/{}-{name}", Uuid::new_v4().simple())
}

/// Upload what we can; failures are logged and skipped.
async fn upload_images(
    backend: &dyn Backend,
    product_id: ProductId,
    user_id: UserId,
    images: Vec<ImageUpload>,
) -> Vec<String> {
    let mut urls = Vec::with_capacity(images.len());
    for image in images {
        let path = upload_path(product_id, user_id, &image.file_name);
        match backend
            .upload(REVIEW_BUCKET, &path, image.bytes, &image.content_type)
            .await
        {
            Ok(url) => urls.push(url),
            Err(err) => {
                warn!(%product_id, file = %image.file_name, error = %err, "Review image upload failed");
            }
        }
    }
    urls
}

/// Save a customer's review of a product.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an out-of-range rating, an overlong
/// comment or too many photos, `AppError::NotFound` for an unknown product
/// and `AppError::Conflict` if the customer already reviewed it.
#[instrument(skip(backend, submission), fields(rating = submission.rating))]
pub async fn create(
    backend: &dyn Backend,
    user_id: UserId,
    product_id: ProductId,
    submission: ReviewSubmission,
) -> Result<Review, AppError> {
    let rating = Rating::new(submission.rating).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let comment =
        validate_comment(&submission.comment).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if submission.images.len() > MAX_REVIEW_IMAGES {
        return Err(AppError::BadRequest(format!(
            "At most {MAX_REVIEW_IMAGES} photos per review"
        )));
    }

    ProductRepository::new(backend)
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_owned()))?;

    let reviews = ReviewRepository::new(backend);
    if reviews.find(user_id, product_id).await?.is_some() {
        return Err(already_reviewed());
    }

    let images = upload_images(backend, product_id, user_id, submission.images).await;
    let review = reviews
        .create(&Review {
            id: ReviewId::random(),
            product_id,
            user_id,
            rating,
            comment,
            images,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => already_reviewed(),
            other => other.into(),
        })?;

    info!(review_id = %review.id, %product_id, "Review saved");
    Ok(review)
}

fn already_reviewed() -> AppError {
    AppError::Conflict("You have already reviewed this product".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_platform::MemoryBackend;
    use rust_decimal::Decimal;

    use super::*;
    use crate::services::fixtures::{draft, seed_product};

    fn photo() -> ImageUpload {
        ImageUpload {
            file_name: "my photo.jpg".to_owned(),
            content_type: "image/jpeg".to_owned(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    fn submission(rating: u8) -> ReviewSubmission {
        ReviewSubmission {
            rating,
            comment: "Fresh and well packed".to_owned(),
            images: vec![photo()],
        }
    }

    #[tokio::test]
    async fn test_one_review_per_product() {
        let backend = MemoryBackend::new();
        let product = seed_product(&backend, draft("Honey", 300, 5)).await;
        let user = UserId::random();

        let review = create(&backend, user, product.id, submission(4)).await.unwrap();
        assert_eq!(review.images.len(), 1);

        let err = create(&backend, user, product.id, submission(5)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        create(&backend, UserId::random(), product.id, submission(5))
            .await
            .unwrap();
        let listed = list(&backend, product.id).await.unwrap();
        assert_eq!(listed.summary.count, 2);
        assert_eq!(listed.summary.average, Decimal::new(45, 1));
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_review() {
        let backend = MemoryBackend::new();
        backend.fail_uploads(true);
        let product = seed_product(&backend, draft("Honey", 300, 5)).await;

        let review = create(&backend, UserId::random(), product.id, submission(3))
            .await
            .unwrap();
        assert!(review.images.is_empty());
        assert_eq!(list(&backend, product.id).await.unwrap().reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_rating_out_of_range() {
        let backend = MemoryBackend::new();
        let product = seed_product(&backend, draft("Honey", 300, 5)).await;
        let err = create(&backend, UserId::random(), product.id, submission(6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let backend = MemoryBackend::new();
        let err = create(&backend, UserId::random(), ProductId::random(), submission(4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_upload_path_is_sanitised() {
        let path = upload_path(ProductId::random(), UserId::random(), "../a b.png");
        assert!(path.ends_with("-..-a-b.png"));
        assert_eq!(path.matches('/').count(), 2);
    }
}
