//! Seed the catalog and coupons from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Kashmiri Saffron
//!     description: One gram, grade A
//!     category: Spices
//!     price: "899.00"
//!     original_price: "999.00"
//!     stock: 25
//! coupons:
//!   - code: SAVE10
//!     description: Ten percent off
//!     rule: { kind: percent, value: "10", max_discount: null }
//!     min_purchase: "300.00"
//! ```
//!
//! Everything goes through the same validation as the back office. Products
//! whose name already exists and coupons whose code is taken are skipped,
//! so the command can be re-run.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{info, warn};

use bazaar_admin::error::AppError;
use bazaar_admin::services::promotions::{self, CouponForm};
use bazaar_admin::services::products;
use bazaar_core::models::ProductDraft;
use bazaar_platform::Backend;

use super::CliError;

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<ProductDraft>,
    #[serde(default)]
    pub coupons: Vec<CouponForm>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products_created: usize,
    pub coupons_created: usize,
    pub skipped: usize,
}

/// Read `path` and seed its contents.
///
/// # Errors
///
/// Returns `CliError` if the file cannot be read or parsed, or a row is
/// rejected.
pub async fn from_file(backend: &dyn Backend, path: &str) -> Result<SeedSummary, CliError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_owned(),
            source,
        })?;
    let file: SeedFile = serde_yaml::from_str(&content)?;
    info!(
        path,
        products = file.products.len(),
        coupons = file.coupons.len(),
        "Parsed seed file"
    );
    seed(backend, file).await
}

/// Insert the products and coupons of a parsed seed file.
///
/// # Errors
///
/// Returns `CliError::Rejected` for an invalid product or coupon.
pub async fn seed(backend: &dyn Backend, file: SeedFile) -> Result<SeedSummary, CliError> {
    let mut summary = SeedSummary::default();

    let mut names: HashSet<String> = products::list(backend)
        .await?
        .into_iter()
        .map(|p| p.name.to_lowercase())
        .collect();
    for draft in file.products {
        if !names.insert(draft.name.trim().to_lowercase()) {
            info!(name = %draft.name, "Product exists, skipping");
            summary.skipped += 1;
            continue;
        }
        products::create(backend, draft).await?;
        summary.products_created += 1;
    }

    for form in file.coupons {
        let code = form.code.clone();
        match promotions::create_coupon(backend, form).await {
            Ok(_) => summary.coupons_created += 1,
            Err(AppError::Conflict(_)) => {
                warn!(%code, "Coupon code taken, skipping");
                summary.skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_platform::MemoryBackend;
    use bazaar_platform::repositories::CouponRepository;

    use super::*;

    const SEED: &str = r#"
products:
  - name: Kashmiri Saffron
    description: One gram, grade A
    category: Spices
    price: "899.00"
    original_price: "999.00"
    stock: 25
    images: []
    is_active: true
  - name: Darjeeling Tea
    description: First flush, 250 g
    category: Beverages
    price: "450.00"
    original_price: null
    stock: 40
    images: []
    is_active: true
coupons:
  - code: save10
    description: Ten percent off
    rule: { kind: percent, value: "10", max_discount: null }
    min_purchase: "300.00"
"#;

    #[tokio::test]
    async fn test_seed_is_rerunnable() {
        let backend = MemoryBackend::new();

        let first = seed(&backend, serde_yaml::from_str(SEED).unwrap())
            .await
            .unwrap();
        assert_eq!(
            first,
            SeedSummary {
                products_created: 2,
                coupons_created: 1,
                skipped: 0,
            }
        );
        let coupon = CouponRepository::new(&backend)
            .find_by_code("SAVE10")
            .await
            .unwrap();
        assert!(coupon.is_some());

        let second = seed(&backend, serde_yaml::from_str(SEED).unwrap())
            .await
            .unwrap();
        assert_eq!(second.skipped, 3);
        assert_eq!(second.products_created + second.coupons_created, 0);
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let backend = MemoryBackend::new();
        let file: SeedFile = serde_yaml::from_str(
            r#"
products:
  - name: ""
    description: nameless
    category: Spices
    price: "10.00"
    original_price: null
    stock: 1
    images: []
    is_active: true
"#,
        )
        .unwrap();

        let err = seed(&backend, file).await.unwrap_err();
        assert!(matches!(err, CliError::Rejected(AppError::BadRequest(_))));
    }
}
