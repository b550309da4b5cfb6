//! Catalog reads with a short-lived cache.
//!
//! The active product list and single products are cached for 5 minutes
//! with `moka`. Cart and checkout never read through here: they load
//! current prices and stock straight from the platform.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use bazaar_core::ProductId;
use bazaar_core::models::{Product, ProductFilter};
use bazaar_platform::Backend;
use bazaar_platform::RepositoryError;
use bazaar_platform::repositories::ProductRepository;

/// How long catalog reads are served from memory.
pub const CATALOG_TTL: Duration = Duration::from_secs(300);

/// Products shown next to a product page.
const RELATED_LIMIT: usize = 4;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    ActiveProducts,
    Product(ProductId),
}

#[derive(Debug, Clone)]
enum CacheValue {
    Products(Arc<Vec<Product>>),
    Product(Box<Product>),
}

/// Cached catalog access.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    backend: Arc<dyn Backend>,
    cache: Cache<CacheKey, CacheValue>,
}

impl Catalog {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(CATALOG_TTL)
            .build();
        Self {
            inner: Arc::new(CatalogInner { backend, cache }),
        }
    }

    fn products_repo(&self) -> ProductRepository<'_> {
        ProductRepository::new(self.inner.backend.as_ref())
    }

    /// Every active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the platform read fails.
    #[instrument(skip(self))]
    pub async fn active_products(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::ActiveProducts).await
        {
            debug!("Cache hit for product list");
            return Ok(products);
        }

        let products = Arc::new(self.products_repo().list(true).await?);
        self.inner
            .cache
            .insert(
                CacheKey::ActiveProducts,
                CacheValue::Products(Arc::clone(&products)),
            )
            .await;
        Ok(products)
    }

    /// Filtered and sorted listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the platform read fails.
    pub async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        Ok(filter.apply(&self.active_products().await?))
    }

    /// A product visible to shoppers. Inactive products read as missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the platform read fails.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let Some(product) = self.products_repo().get(id).await? else {
            return Ok(None);
        };
        if !product.is_active {
            return Ok(None);
        }
        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(Some(product))
    }

    /// Distinct categories of active products, sorted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the platform read fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let mut categories: Vec<String> = self
            .active_products()
            .await?
            .iter()
            .map(|p| p.category.clone())
            .collect();
        categories.sort_unstable_by_key(|c| c.to_lowercase());
        categories.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        Ok(categories)
    }

    /// Other products in the same category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the platform read fails.
    pub async fn related(&self, product: &Product) -> Result<Vec<Product>, RepositoryError> {
        let filter = ProductFilter {
            category: Some(product.category.clone()),
            ..ProductFilter::default()
        };
        Ok(self
            .search(&filter)
            .await?
            .into_iter()
            .filter(|p| p.id != product.id)
            .take(RELATED_LIMIT)
            .collect())
    }

    /// Drop everything cached.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}
