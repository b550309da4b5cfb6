//! Product reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, ReviewId, UserId};

/// A star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("rating must be between 1 and 5")]
    Rating,
    #[error("comment must be at most {0} characters")]
    CommentTooLong(usize),
}

impl Rating {
    /// # Errors
    ///
    /// Returns [`ReviewError::Rating`] outside `1..=5`.
    pub const fn new(stars: u8) -> Result<Self, ReviewError> {
        if stars >= 1 && stars <= 5 {
            Ok(Self(stars))
        } else {
            Err(ReviewError::Rating)
        }
    }

    #[must_use]
    pub const fn stars(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ReviewError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

pub const MAX_COMMENT_LEN: usize = 2000;

/// A customer review of a product. One per user per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: Rating,
    pub comment: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Trim a review comment and enforce the length limit.
///
/// # Errors
///
/// Returns [`ReviewError::CommentTooLong`] past [`MAX_COMMENT_LEN`].
pub fn validate_comment(comment: &str) -> Result<String, ReviewError> {
    let comment = comment.trim();
    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(ReviewError::CommentTooLong(MAX_COMMENT_LEN));
    }
    Ok(comment.to_owned())
}

/// Aggregate of a product's ratings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RatingSummary {
    pub count: u32,
    /// Mean rating to one decimal place, zero when there are no reviews.
    pub average: Decimal,
    /// Counts for 1 through 5 stars.
    pub histogram: [u32; 5],
}

impl RatingSummary {
    #[must_use]
    pub fn from_ratings<I: IntoIterator<Item = Rating>>(ratings: I) -> Self {
        let mut summary = Self::default();
        let mut total: u32 = 0;
        for rating in ratings {
            summary.count += 1;
            total += u32::from(rating.0);
            summary.histogram[usize::from(rating.0 - 1)] += 1;
        }
        if summary.count > 0 {
            summary.average = (Decimal::from(total) / Decimal::from(summary.count)).round_dp(1);
        }
        summary
    }
}
