//! Incremental product list loading per filter.
//!
//! ```text
//! Idle ─▶ Loading ─▶ Loaded(has_more) ─▶ LoadingMore ─▶ Loaded ─▶ … ─▶ End
//!            │                                  │
//!            ▼                                  └─(error)─▶ Loaded
//!          Failed
//! ```
//!
//! Changing the filter (or refreshing) resets to page 1 and advances the
//! generation, so a page still in flight for the previous filter is dropped
//! when it lands.

use std::fmt;
use std::sync::{Arc, Mutex};

use basketry_core::{CategoryId, Product, ProductId};
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, CatalogApi, ProductPage, ProductQuery};
use crate::cache::CatalogCache;
use crate::generation::{Generation, GenerationCounter};
use crate::sync::lock;

/// Identifies one product listing (all products, or one category).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterKey {
    category: Option<CategoryId>,
}

impl FilterKey {
    /// Unfiltered listing.
    #[must_use]
    pub const fn all() -> Self {
        Self { category: None }
    }

    /// Listing restricted to one category.
    #[must_use]
    pub const fn category(id: CategoryId) -> Self {
        Self { category: Some(id) }
    }

    #[must_use]
    pub const fn category_id(&self) -> Option<&CategoryId> {
        self.category.as_ref()
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(id) => write!(f, "category:{id}"),
            None => f.write_str("all"),
        }
    }
}

/// Last page applied for a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub has_more: bool,
}

/// Listing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    Loading,
    Loaded { has_more: bool },
    LoadingMore,
    End,
    /// The first page failed; `refresh` retries.
    Failed,
}

impl PageState {
    /// Whether a request is outstanding.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading | Self::LoadingMore)
    }
}

/// Result of a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was appended. `received` counts every item in the
    /// response, including any skipped as malformed.
    Applied { received: usize, has_more: bool },
    /// `load_more` was called while not in `Loaded` with more pages.
    Ignored,
    /// The listing was reset while the request was in flight.
    Stale,
}

/// Drives page-by-page loading of the product list.
///
/// Cheaply cloneable via `Arc`; clones drive the same listing.
#[derive(Clone)]
pub struct PaginationController {
    inner: Arc<PaginationInner>,
}

struct PaginationInner {
    cache: CatalogCache,
    api: Arc<dyn CatalogApi>,
    page_size: u32,
    generations: GenerationCounter,
    listing: Mutex<Listing>,
}

struct Listing {
    filter: FilterKey,
    page: u32,
    state: PageState,
    items: Vec<ProductId>,
}

impl PaginationController {
    /// Create an idle controller for `filter`. A zero page size is raised to 1.
    #[must_use]
    pub fn new(
        cache: CatalogCache,
        api: Arc<dyn CatalogApi>,
        page_size: u32,
        filter: FilterKey,
    ) -> Self {
        Self {
            inner: Arc::new(PaginationInner {
                cache,
                api,
                page_size: page_size.max(1),
                generations: GenerationCounter::new(),
                listing: Mutex::new(Listing {
                    filter,
                    page: 0,
                    state: PageState::Idle,
                    items: Vec::new(),
                }),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> PageState {
        lock(&self.inner.listing).state
    }

    /// Last requested page number (0 before the first load).
    #[must_use]
    pub fn page(&self) -> u32 {
        lock(&self.inner.listing).page
    }

    #[must_use]
    pub fn filter(&self) -> FilterKey {
        lock(&self.inner.listing).filter.clone()
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.inner.generations.current()
    }

    /// Loaded products in listing order, read from the cache.
    ///
    /// Entries evicted from the cache since they were loaded are skipped.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        let ids = lock(&self.inner.listing).items.clone();
        ids.iter().filter_map(|id| self.inner.cache.get(id)).collect()
    }

    /// Switch to another filter and load its first page.
    ///
    /// # Errors
    ///
    /// Returns the request error; the listing is left in `Failed`.
    #[instrument(skip(self), fields(filter = %filter))]
    pub async fn set_filter(&self, filter: FilterKey) -> Result<PageOutcome, ApiError> {
        let (generation, query) = {
            let mut listing = lock(&self.inner.listing);
            listing.filter = filter;
            self.reset(&mut listing)
        };
        self.fetch(generation, query).await
    }

    /// Reload the current filter from page 1.
    ///
    /// # Errors
    ///
    /// Returns the request error; the listing is left in `Failed`.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<PageOutcome, ApiError> {
        let (generation, query) = {
            let mut listing = lock(&self.inner.listing);
            self.reset(&mut listing)
        };
        self.fetch(generation, query).await
    }

    /// Load the next page if the listing has more.
    ///
    /// # Errors
    ///
    /// Returns the request error; the listing returns to `Loaded` so the
    /// call can be retried.
    #[instrument(skip(self))]
    pub async fn load_more(&self) -> Result<PageOutcome, ApiError> {
        let (generation, query) = {
            let mut listing = lock(&self.inner.listing);
            if listing.state != (PageState::Loaded { has_more: true }) {
                debug!(state = ?listing.state, "Ignoring load_more");
                return Ok(PageOutcome::Ignored);
            }
            listing.state = PageState::LoadingMore;
            listing.page += 1;
            (
                self.inner.generations.current(),
                self.query(&listing),
            )
        };
        self.fetch(generation, query).await
    }

    fn reset(&self, listing: &mut Listing) -> (Generation, ProductQuery) {
        let generation = self.inner.generations.advance();
        listing.page = 1;
        listing.items.clear();
        listing.state = PageState::Loading;
        (generation, self.query(listing))
    }

    fn query(&self, listing: &Listing) -> ProductQuery {
        ProductQuery {
            category: listing.filter.category.clone(),
            page: listing.page,
            limit: self.inner.page_size,
        }
    }

    async fn fetch(
        &self,
        generation: Generation,
        query: ProductQuery,
    ) -> Result<PageOutcome, ApiError> {
        let result = self.inner.api.list_products(&query).await;

        let mut listing = lock(&self.inner.listing);
        if !self.inner.generations.is_current(generation) {
            debug!(%generation, page = query.page, "Discarding stale page");
            return Ok(PageOutcome::Stale);
        }

        let ProductPage { products, received } = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(page = query.page, error = %e, "Page load failed");
                if query.page <= 1 {
                    listing.state = PageState::Failed;
                } else {
                    listing.page -= 1;
                    listing.state = PageState::Loaded { has_more: true };
                }
                return Err(e);
            }
        };

        // A short response ends the listing; skipped items still count.
        let has_more = received >= self.inner.page_size as usize;
        for product in &products {
            if !listing.items.contains(&product.id) {
                listing.items.push(product.id.clone());
            }
        }
        self.inner.cache.upsert_many(products);
        listing.state = if has_more {
            PageState::Loaded { has_more }
        } else {
            PageState::End
        };
        self.inner.cache.set_cursor(
            listing.filter.clone(),
            PageCursor {
                page: listing.page,
                has_more,
            },
        );
        debug!(page = listing.page, received, has_more, "Applied page");

        Ok(PageOutcome::Applied { received, has_more })
    }
}
