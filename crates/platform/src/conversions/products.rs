//! Product row conversion with placeholder filling.

use chrono::{DateTime, Utc};
use tracing::warn;

use bazaar_core::models::{Product, ProductDraft};
use bazaar_core::{Money, ProductId};

use crate::rows::ProductRow;

/// Image shown for products without one.
pub const PLACEHOLDER_IMAGE: &str = "/images/placeholder-product.png";
const PLACEHOLDER_NAME: &str = "Untitled product";
const PLACEHOLDER_CATEGORY: &str = "Uncategorized";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Convert a raw row, filling gaps so the catalog can always render it.
#[must_use]
pub fn product_from_row(row: ProductRow) -> Product {
    let price = row.price.map_or(Money::ZERO, Money::new);
    let price = if price.is_negative() {
        warn!(product_id = %row.id, "Negative price in products row; showing as zero");
        Money::ZERO
    } else {
        price
    };

    // The struck-through price only makes sense above the selling price.
    let original_price = row
        .original_price
        .map(Money::new)
        .filter(|original| *original > price);

    let stock = row
        .stock
        .map_or(0, |s| u32::try_from(s.max(0)).unwrap_or(u32::MAX));

    let mut images: Vec<String> = row
        .images
        .unwrap_or_default()
        .into_iter()
        .filter(|url| !url.trim().is_empty())
        .collect();
    if images.is_empty() {
        images.push(PLACEHOLDER_IMAGE.to_owned());
    }

    Product {
        id: row.id,
        name: non_blank(row.name).unwrap_or_else(|| PLACEHOLDER_NAME.to_owned()),
        description: row.description.unwrap_or_default(),
        category: non_blank(row.category).unwrap_or_else(|| PLACEHOLDER_CATEGORY.to_owned()),
        price,
        original_price,
        stock,
        images,
        is_active: row.is_active.unwrap_or(true),
        created_at: row.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    }
}

/// Row for a validated draft.
#[must_use]
pub fn product_to_row(id: ProductId, draft: &ProductDraft, created_at: DateTime<Utc>) -> ProductRow {
    ProductRow {
        id,
        name: Some(draft.name.clone()),
        description: Some(draft.description.clone()),
        category: Some(draft.category.clone()),
        price: Some(draft.price.amount()),
        original_price: draft.original_price.map(|m| m.amount()),
        stock: Some(i64::from(draft.stock)),
        images: Some(
            draft
                .images
                .iter()
                .filter(|url| *url != PLACEHOLDER_IMAGE)
                .cloned()
                .collect(),
        ),
        is_active: Some(draft.is_active),
        created_at: Some(created_at),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn bare(id: ProductId) -> ProductRow {
        ProductRow {
            id,
            name: None,
            description: None,
            category: Some("  ".to_string()),
            price: None,
            original_price: None,
            stock: Some(-3),
            images: Some(vec![String::new()]),
            is_active: None,
            created_at: None,
        }
    }

    #[test]
    fn test_placeholders_fill_missing_columns() {
        let product = product_from_row(bare(ProductId::random()));
        assert_eq!(product.name, PLACEHOLDER_NAME);
        assert_eq!(product.category, PLACEHOLDER_CATEGORY);
        assert_eq!(product.images, vec![PLACEHOLDER_IMAGE.to_string()]);
        assert_eq!(product.stock, 0);
        assert_eq!(product.price, Money::ZERO);
        assert!(product.is_active);
    }

    #[test]
    fn test_original_price_below_price_dropped() {
        let mut row = bare(ProductId::random());
        row.price = Some(Decimal::from(100));
        row.original_price = Some(Decimal::from(80));
        assert_eq!(product_from_row(row).original_price, None);
    }

    #[test]
    fn test_draft_round_trips_through_row() {
        let draft = ProductDraft {
            name: "Jaggery".to_string(),
            description: "Organic".to_string(),
            category: "Grocery".to_string(),
            price: Money::from_rupees(80),
            original_price: Some(Money::from_rupees(100)),
            stock: 12,
            images: vec!["https://cdn/j.png".to_string()],
            is_active: true,
        };
        let id = ProductId::random();
        let product = product_from_row(product_to_row(id, &draft, Utc::now()));
        assert_eq!(product.id, id);
        assert_eq!(product.stock, 12);
        assert_eq!(product.discount_percent(), Some(20));
    }

    #[test]
    fn test_placeholder_echoed_back_is_not_stored() {
        let draft = ProductDraft {
            name: "Jaggery".to_string(),
            description: String::new(),
            category: "Grocery".to_string(),
            price: Money::from_rupees(80),
            original_price: None,
            stock: 1,
            images: vec![PLACEHOLDER_IMAGE.to_string()],
            is_active: true,
        };
        let row = product_to_row(ProductId::random(), &draft, Utc::now());
        assert_eq!(row.images, Some(Vec::new()));
    }
}
