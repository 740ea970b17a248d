//! Normalized in-memory catalog store.
//!
//! Products and variants are keyed by id in `moka` caches; the category list
//! and per-filter pagination cursors sit beside them. All reads are
//! synchronous and never perform I/O. The store is shared for the lifetime
//! of the app, and every mutation goes through the methods below.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use basketry_core::{Category, CategoryId, Product, ProductId, VariantId, VariantRef};
use moka::sync::Cache;
use tracing::debug;

use crate::pagination::{FilterKey, PageCursor};
use crate::sync::lock;

/// Eviction policy for cached products and variants.
///
/// The default keeps every entry for the lifetime of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum number of cached products.
    pub max_products: Option<u64>,
    /// Time after which a cached snapshot is dropped.
    pub ttl: Option<Duration>,
}

/// Shared catalog cache.
///
/// Cheaply cloneable via `Arc`; every clone sees the same entries.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CatalogCacheInner>,
}

struct CatalogCacheInner {
    products: Cache<ProductId, Product>,
    variants: Cache<VariantId, VariantRef>,
    categories: Mutex<Vec<Category>>,
    cursors: Mutex<HashMap<FilterKey, PageCursor>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl CatalogCache {
    /// Create an empty cache with the given eviction policy.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        let mut products = Cache::builder();
        let mut variants = Cache::builder();
        if let Some(max) = policy.max_products {
            products = products.max_capacity(max);
        }
        if let Some(ttl) = policy.ttl {
            products = products.time_to_live(ttl);
            variants = variants.time_to_live(ttl);
        }

        Self {
            inner: Arc::new(CatalogCacheInner {
                products: products.build(),
                variants: variants.build(),
                categories: Mutex::new(Vec::new()),
                cursors: Mutex::new(HashMap::new()),
            }),
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Cached product snapshot, if any.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<Product> {
        self.inner.products.get(id)
    }

    /// Whether a product is cached.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.inner.products.contains_key(id)
    }

    /// Insert or replace one product (last write wins).
    pub fn upsert(&self, product: Product) {
        self.inner.products.insert(product.id.clone(), product);
    }

    /// Merge a batch of products, replacing existing entries by id.
    ///
    /// Returns the number of products written.
    pub fn upsert_many(&self, products: impl IntoIterator<Item = Product>) -> usize {
        let mut count = 0;
        for product in products {
            self.upsert(product);
            count += 1;
        }
        debug!(count, "Upserted products");
        count
    }

    /// Drop one cached product.
    pub fn invalidate(&self, id: &ProductId) {
        self.inner.products.invalidate(id);
    }

    /// Number of cached products.
    #[must_use]
    pub fn product_count(&self) -> u64 {
        self.inner.products.run_pending_tasks();
        self.inner.products.entry_count()
    }

    // =========================================================================
    // Variants
    // =========================================================================

    /// Cached variant, if any.
    #[must_use]
    pub fn variant(&self, id: &VariantId) -> Option<VariantRef> {
        self.inner.variants.get(id)
    }

    /// Index a batch of variants by id.
    pub fn upsert_variants(&self, variants: impl IntoIterator<Item = VariantRef>) {
        for variant in variants {
            self.inner
                .variants
                .insert(variant.variant_id.clone(), variant);
        }
    }

    /// Product a variant belongs to, if the variant is known.
    #[must_use]
    pub fn product_for_variant(&self, id: &VariantId) -> Option<ProductId> {
        self.variant(id).map(|v| v.product_id)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Replace the category list wholesale.
    pub fn upsert_categories(&self, categories: Vec<Category>) {
        debug!(count = categories.len(), "Replaced categories");
        *lock(&self.inner.categories) = categories;
    }

    /// Snapshot of the category list.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        lock(&self.inner.categories).clone()
    }

    /// Look up one category.
    #[must_use]
    pub fn category(&self, id: &CategoryId) -> Option<Category> {
        lock(&self.inner.categories)
            .iter()
            .find(|c| &c.id == id)
            .cloned()
    }

    // =========================================================================
    // Pagination cursors
    // =========================================================================

    /// Last recorded cursor for a filter.
    #[must_use]
    pub fn cursor(&self, filter: &FilterKey) -> Option<PageCursor> {
        lock(&self.inner.cursors).get(filter).copied()
    }

    /// Record the cursor for a filter.
    pub fn set_cursor(&self, filter: FilterKey, cursor: PageCursor) {
        lock(&self.inner.cursors).insert(filter, cursor);
    }

    /// Drop every cached entity and cursor.
    pub fn clear(&self) {
        self.inner.products.invalidate_all();
        self.inner.variants.invalidate_all();
        self.inner.products.run_pending_tasks();
        self.inner.variants.run_pending_tasks();
        lock(&self.inner.categories).clear();
        lock(&self.inner.cursors).clear();
    }
}
