//! Catalog products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::types::{Money, ProductId};

/// A product as shown in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Money,
    /// Pre-discount price, shown struck through when higher than `price`.
    pub original_price: Option<Money>,
    pub stock: u32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whole-number discount off `original_price`, if there is one.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u32> {
        let original = self.original_price?;
        if original <= self.price || original.is_zero() {
            return None;
        }
        let off = (original.amount() - self.price.amount()) * Decimal::ONE_HUNDRED
            / original.amount();
        off.round().to_u32()
    }

    /// `true` if at least `quantity` units can be sold.
    #[must_use]
    pub const fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    /// First image, used for thumbnails and order snapshots.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// `true` if the product can be added to a cart.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.is_active && self.stock > 0
    }
}

/// Why a product draft was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("product name is required")]
    MissingName,
    #[error("category is required")]
    MissingCategory,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("original price must be at least the selling price")]
    OriginalBelowPrice,
}

/// Fields an admin submits to create or replace a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Money,
    #[serde(default)]
    pub original_price: Option<Money>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl ProductDraft {
    /// Trim text fields and check the price invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError`] for a blank name or category, a negative
    /// price or an original price below the selling price.
    pub fn validate(mut self) -> Result<Self, ProductError> {
        self.name = self.name.trim().to_owned();
        self.category = self.category.trim().to_owned();
        self.description = self.description.trim().to_owned();
        if self.name.is_empty() {
            return Err(ProductError::MissingName);
        }
        if self.category.is_empty() {
            return Err(ProductError::MissingCategory);
        }
        if self.price.is_negative() {
            return Err(ProductError::NegativePrice);
        }
        if self.original_price.is_some_and(|original| original < self.price) {
            return Err(ProductError::OriginalBelowPrice);
        }
        Ok(self)
    }
}

/// Catalog sort orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

/// Catalog listing filters. Empty fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    /// Case-insensitive match on name and description.
    pub search: Option<String>,
    #[serde(default)]
    pub in_stock_only: bool,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductFilter {
    /// `true` if an active product passes every filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active {
            return false;
        }
        if let Some(category) = self.category.as_deref()
            && !product.category.eq_ignore_ascii_case(category)
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min)
            || self.max_price.is_some_and(|max| product.price > max)
        {
            return false;
        }
        if self.in_stock_only && product.stock == 0 {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product.description.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }

    /// Filter and sort a product list.
    #[must_use]
    pub fn apply(&self, products: &[Product]) -> Vec<Product> {
        let mut out: Vec<Product> = products
            .iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect();
        match self.sort {
            ProductSort::Newest => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::PriceAsc => out.sort_by(|a, b| a.price.cmp(&b.price)),
            ProductSort::PriceDesc => out.sort_by(|a, b| b.price.cmp(&a.price)),
            ProductSort::Name => out.sort_by_key(|p| p.name.to_lowercase()),
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(name: &str, price: i64, stock: u32) -> Product {
        Product {
            id: ProductId::random(),
            name: name.to_string(),
            description: String::new(),
            category: "Grocery".to_string(),
            price: Money::from_rupees(price),
            original_price: None,
            stock,
            images: vec![],
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_percent() {
        let mut p = product("Rice", 75, 3);
        assert_eq!(p.discount_percent(), None);
        p.original_price = Some(Money::from_rupees(100));
        assert_eq!(p.discount_percent(), Some(25));
    }

    #[test]
    fn test_draft_validation() {
        let draft = ProductDraft {
            name: "  Tea ".to_string(),
            description: String::new(),
            category: "Beverages".to_string(),
            price: Money::from_rupees(120),
            original_price: Some(Money::from_rupees(100)),
            stock: 5,
            images: vec![],
            is_active: true,
        };
        assert_eq!(
            draft.clone().validate(),
            Err(ProductError::OriginalBelowPrice)
        );

        let ok = ProductDraft {
            original_price: None,
            ..draft
        }
        .validate()
        .unwrap();
        assert_eq!(ok.name, "Tea");
    }

    #[test]
    fn test_filter_and_sort() {
        let mut cheap = product("Salt", 20, 10);
        cheap.description = "Iodised sea salt".to_string();
        let dear = product("Saffron", 900, 0);
        let mut other = product("Soap", 40, 4);
        other.category = "Household".to_string();
        let all = vec![cheap.clone(), dear.clone(), other];

        let filter = ProductFilter {
            category: Some("grocery".to_string()),
            sort: ProductSort::PriceDesc,
            ..ProductFilter::default()
        };
        let names: Vec<_> = filter.apply(&all).into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Saffron", "Salt"]);

        let filter = ProductFilter {
            search: Some("SEA".to_string()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.apply(&all), vec![cheap]);

        let filter = ProductFilter {
            in_stock_only: true,
            max_price: Some(Money::from_rupees(30)),
            ..ProductFilter::default()
        };
        assert_eq!(filter.apply(&all).len(), 1);
    }

    #[test]
    fn test_inactive_products_never_match() {
        let mut p = product("Hidden", 10, 1);
        p.is_active = false;
        assert!(!ProductFilter::default().matches(&p));
    }
}
