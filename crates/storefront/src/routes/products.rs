//! Catalog and review route handlers.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use bazaar_core::ProductId;
use bazaar_core::models::{Product, ProductFilter, Review};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::reviews::{self, ImageUpload, ProductReviews, ReviewSubmission};
use crate::state::AppState;

/// Product page data.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub related: Vec<Product>,
    pub reviews: ProductReviews,
}

/// List active products.
///
/// GET /api/products?category=&`min_price`=&`max_price`=&search=&sort=
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().search(&filter).await?))
}

/// GET /api/products/categories
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.catalog().categories().await?))
}

/// Product detail with related products and reviews.
///
/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let product = state
        .catalog()
        .product(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product".to_owned()))?;
    let related = state.catalog().related(&product).await?;
    let reviews = reviews::list(state.backend(), id).await?;
    Ok(Json(ProductDetail {
        product,
        related,
        reviews,
    }))
}

/// GET /api/products/{id}/reviews
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductReviews>> {
    Ok(Json(reviews::list(state.backend(), id).await?))
}

fn bad_form(err: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid review form: {err}"))
}

/// Read a review from `multipart/form-data`: `rating`, `comment` and any
/// number of `images` file parts.
async fn read_submission(mut form: Multipart) -> Result<ReviewSubmission> {
    let mut submission = ReviewSubmission::default();
    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "rating" => {
                let text = field.text().await.map_err(bad_form)?;
                submission.rating = text.trim().parse().map_err(bad_form)?;
            }
            "comment" => submission.comment = field.text().await.map_err(bad_form)?,
            "images" => {
                let file_name = field.file_name().unwrap_or("photo").to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await.map_err(bad_form)?;
                if !bytes.is_empty() {
                    submission.images.push(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(submission)
}

/// Review a product.
///
/// POST /api/products/{id}/reviews (multipart)
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    form: Multipart,
) -> Result<(StatusCode, Json<Review>)> {
    let submission = read_submission(form).await?;
    let review = reviews::create(state.backend(), user.id, id, submission).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
