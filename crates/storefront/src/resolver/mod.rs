//! Cache-first entity resolution with in-flight coalescing.
//!
//! Every screen that needs a product by id goes through one shared
//! [`EntityResolver`]:
//!
//! 1. A cache hit returns immediately, without I/O.
//! 2. Otherwise, if a fetch for the id is already in flight, the caller
//!    awaits that same fetch.
//! 3. Otherwise a fetch is started and registered; on completion the result
//!    is written to the cache, the registration is removed and every waiter
//!    receives the same value.
//! 4. Failures are never cached. The registration is removed so the next
//!    call retries, and the error is handed to every waiter.

mod coalesce;

use std::sync::Arc;

use basketry_core::{Category, Product, ProductId, VariantRef};
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, CatalogApi, SharedError};
use crate::cache::CatalogCache;
use coalesce::{Coalescer, Joined};

/// Shared resolver for catalog entities.
///
/// Cheaply cloneable via `Arc`; clones share the same in-flight registry.
#[derive(Clone)]
pub struct EntityResolver {
    inner: Arc<EntityResolverInner>,
}

struct EntityResolverInner {
    cache: CatalogCache,
    api: Arc<dyn CatalogApi>,
    products: Coalescer<ProductId, Option<Product>>,
    variants: Coalescer<ProductId, Vec<VariantRef>>,
}

impl EntityResolver {
    /// Create a resolver over the shared cache.
    #[must_use]
    pub fn new(cache: CatalogCache, api: Arc<dyn CatalogApi>) -> Self {
        Self {
            inner: Arc::new(EntityResolverInner {
                cache,
                api,
                products: Coalescer::default(),
                variants: Coalescer::default(),
            }),
        }
    }

    /// The cache this resolver reads through.
    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }

    /// Resolve a product by id.
    ///
    /// Returns `Ok(None)` when the service reports that the product does
    /// not exist. Neither outcome is cached negatively.
    ///
    /// # Errors
    ///
    /// Returns the shared fetch error; every concurrent waiter receives the
    /// same error.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn resolve(&self, id: &ProductId) -> Result<Option<Product>, SharedError> {
        if let Some(product) = self.inner.cache.get(id) {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let cache = self.inner.cache.clone();
        let api = Arc::clone(&self.inner.api);
        let key = id.clone();
        let joined = self.inner.products.join_or_start(
            id,
            || self.inner.cache.get(id).map(Some),
            move || async move {
                let fetched = api
                    .product(&key)
                    .await
                    .inspect_err(|e| warn!(product_id = %key, error = %e, "Product fetch failed"))?;
                match &fetched {
                    Some(product) => cache.upsert(product.clone()),
                    None => debug!(product_id = %key, "Product not found"),
                }
                Ok(fetched)
            },
        );

        match joined {
            Joined::Ready(product) => Ok(product),
            Joined::Pending(fetch) => fetch.await,
        }
    }

    /// Resolve the variants of a product.
    ///
    /// Always asks the service (stock changes), coalescing concurrent calls
    /// for the same product. The result is indexed in the cache so variant
    /// references can be joined back to their product.
    ///
    /// # Errors
    ///
    /// Returns the shared fetch error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn variants_for(&self, product_id: &ProductId) -> Result<Vec<VariantRef>, SharedError> {
        let cache = self.inner.cache.clone();
        let api = Arc::clone(&self.inner.api);
        let key = product_id.clone();
        let joined = self.inner.variants.join_or_start(
            product_id,
            || None,
            move || async move {
                let variants = api.variants_by_product(&key).await?;
                cache.upsert_variants(variants.iter().cloned());
                Ok(variants)
            },
        );

        match joined {
            Joined::Ready(variants) => Ok(variants),
            Joined::Pending(fetch) => fetch.await,
        }
    }

    /// Reload the category list and replace the cached one.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; the cached list is kept.
    #[instrument(skip(self))]
    pub async fn refresh_categories(&self) -> Result<Vec<Category>, ApiError> {
        let categories = self.inner.api.categories().await?;
        self.inner.cache.upsert_categories(categories.clone());
        Ok(categories)
    }

    /// Number of product and variant fetches currently outstanding.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.products.len() + self.inner.variants.len()
    }
}
