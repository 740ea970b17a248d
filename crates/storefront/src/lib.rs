//! Basketry storefront data layer.
//!
//! Caches catalog entities fetched from the storefront REST service,
//! hydrates thin references into display records and keeps optimistic cart
//! and wishlist mutations consistent with server-confirmed state.
//!
//! # Architecture
//!
//! - [`cache::CatalogCache`] - normalized in-memory product/category store
//! - [`resolver::EntityResolver`] - cache-first lookups, one fetch per id in flight
//! - [`enrichment::EnrichmentPipeline`] - order-preserving batch hydration
//! - [`pagination::PaginationController`] - page-by-page listing per filter
//! - [`cart::CartStore`] / [`wishlist::WishlistStore`] - optimistic mutations
//! - [`state::Storefront`] - wires all of the above to one cache and client
//!
//! # Example
//!
//! ```rust,ignore
//! use basketry_storefront::{FilterKey, Storefront, StorefrontConfig};
//!
//! let storefront = Storefront::new(StorefrontConfig::from_env()?)?;
//! let listing = storefront.pagination(FilterKey::all());
//! listing.refresh().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod cart;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod generation;
pub mod pagination;
pub mod resolver;
pub mod state;
mod sync;
pub mod telemetry;
pub mod wishlist;

pub use api::{ApiError, ProductPage, RestClient, SessionProvider, SharedError, StaticSession};
pub use cache::{CachePolicy, CatalogCache};
pub use cart::{CartStore, QuantityChange, Subtotal};
pub use config::{ConfigError, StorefrontConfig};
pub use enrichment::EnrichmentPipeline;
pub use error::StoreError;
pub use generation::{Generation, GenerationCounter};
pub use pagination::{FilterKey, PageCursor, PageOutcome, PageState, PaginationController};
pub use resolver::EntityResolver;
pub use state::{Services, Storefront};
pub use wishlist::{WishlistAdd, WishlistStore};
