//! Shared data layer handle.

use std::sync::Arc;

use basketry_core::{Category, UserId};

use crate::api::{
    ApiError, CartApi, CatalogApi, RestClient, SessionProvider, StaticSession, WishlistApi,
};
use crate::cache::CatalogCache;
use crate::cart::CartStore;
use crate::config::StorefrontConfig;
use crate::enrichment::EnrichmentPipeline;
use crate::pagination::{FilterKey, PaginationController};
use crate::resolver::EntityResolver;
use crate::wishlist::WishlistStore;

/// Service implementations backing a [`Storefront`].
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn CatalogApi>,
    pub cart: Arc<dyn CartApi>,
    pub wishlist: Arc<dyn WishlistApi>,
}

impl Services {
    /// Every service served by one REST client.
    #[must_use]
    pub fn rest(client: &RestClient) -> Self {
        Self {
            catalog: Arc::new(client.clone()),
            cart: Arc::new(client.clone()),
            wishlist: Arc::new(client.clone()),
        }
    }
}

/// Data layer state shared across screens.
///
/// This struct is cheaply cloneable via `Arc`. Every component it hands out
/// reads and writes the same [`CatalogCache`] and shares one
/// [`EntityResolver`], so a fetch started by one screen is joined by any
/// other screen asking for the same product.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    cache: CatalogCache,
    services: Services,
    resolver: EntityResolver,
}

impl Storefront {
    /// Connect to the REST service, authenticating with the configured
    /// static token (if any).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let session = config
            .api_token
            .clone()
            .map_or_else(StaticSession::anonymous, StaticSession::new);
        Self::with_session(config, Arc::new(session))
    }

    /// Connect to the REST service with an app-supplied session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_session(
        config: StorefrontConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, ApiError> {
        let client = RestClient::new(&config, session)?;
        Ok(Self::with_services(config, Services::rest(&client)))
    }

    /// Assemble the data layer over arbitrary service implementations.
    #[must_use]
    pub fn with_services(config: StorefrontConfig, services: Services) -> Self {
        let cache = CatalogCache::new(config.cache);
        let resolver = EntityResolver::new(cache.clone(), Arc::clone(&services.catalog));

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                cache,
                services,
                resolver,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the shared catalog cache.
    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }

    /// Get a reference to the shared entity resolver.
    #[must_use]
    pub fn resolver(&self) -> &EntityResolver {
        &self.inner.resolver
    }

    /// Enrichment pipeline over the shared resolver.
    #[must_use]
    pub fn pipeline(&self) -> EnrichmentPipeline {
        EnrichmentPipeline::new(self.inner.resolver.clone())
    }

    /// A new product listing for `filter`, sized by the configured page size.
    #[must_use]
    pub fn pagination(&self, filter: FilterKey) -> PaginationController {
        PaginationController::new(
            self.inner.cache.clone(),
            Arc::clone(&self.inner.services.catalog),
            self.inner.config.page_size,
            filter,
        )
    }

    /// A cart store for `user`. Call [`CartStore::load`] to fill it.
    #[must_use]
    pub fn cart(&self, user: UserId) -> CartStore {
        CartStore::new(
            user,
            self.inner.cache.clone(),
            Arc::clone(&self.inner.services.cart),
        )
    }

    /// A wishlist store for `user`. Call [`WishlistStore::load`] to fill it.
    #[must_use]
    pub fn wishlist(&self, user: UserId) -> WishlistStore {
        WishlistStore::new(user, Arc::clone(&self.inner.services.wishlist))
    }

    /// Reload the category list into the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn refresh_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.inner.resolver.refresh_categories().await
    }
}
