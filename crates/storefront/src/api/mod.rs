//! Storefront REST service boundary.
//!
//! # Architecture
//!
//! - The remote catalog/cart/wishlist service is the source of truth
//! - Components depend on the async traits below, never on `reqwest` directly
//! - [`RestClient`] implements every trait over HTTP + JSON
//! - Payloads are decoded permissively and validated in [`conversions`];
//!   malformed entities become [`ApiError::Malformed`]
//!
//! # Example
//!
//! ```rust,ignore
//! use basketry_storefront::api::{CatalogApi, RestClient, StaticSession};
//!
//! let client = RestClient::new(&config, Arc::new(StaticSession::anonymous()))?;
//! let product = client.product(&ProductId::parse("p1")?).await?;
//! ```

pub mod conversions;
mod rest;

#[cfg(test)]
pub(crate) mod fake;

use std::sync::Arc;

use async_trait::async_trait;
use basketry_core::{
    CartLine, CartLineId, Category, CategoryId, Product, ProductId, UserId, VariantId,
    VariantRef, WishlistEntry, WishlistId,
};
use reqwest::StatusCode;
use secrecy::SecretString;
use thiserror::Error;

pub use rest::RestClient;

/// Errors that can occur when talking to the storefront service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server rejected a create because the resource already exists.
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// Payload decoded but failed validation.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Configured base URL cannot carry path segments.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Background fetch task panicked or was aborted.
    #[error("Fetch task aborted: {0}")]
    TaskAborted(String),
}

impl ApiError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) | Self::TaskAborted(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Parse(_)
            | Self::NotFound(_)
            | Self::Duplicate(_)
            | Self::Malformed(_)
            | Self::InvalidBaseUrl(_) => false,
        }
    }
}

/// Error handed to every waiter of a coalesced fetch.
pub type SharedError = Arc<ApiError>;

/// Query for one page of the product list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<CategoryId>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

/// One page of the product list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPage {
    /// Products that passed validation, in response order.
    pub products: Vec<Product>,
    /// Items in the response, counting any skipped as malformed.
    pub received: usize,
}

impl From<Vec<Product>> for ProductPage {
    fn from(products: Vec<Product>) -> Self {
        Self {
            received: products.len(),
            products,
        }
    }
}

/// Catalog reads: products, variants and categories.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// `GET /products?categoryID=&page=&limit=`
    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError>;

    /// `GET /products/:id`; `Ok(None)` when the product does not exist.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, ApiError>;

    /// `GET /productvariant/byproduct/:productId`
    async fn variants_by_product(&self, id: &ProductId) -> Result<Vec<VariantRef>, ApiError>;

    /// `GET /category`
    async fn categories(&self) -> Result<Vec<Category>, ApiError>;
}

/// Cart mutations.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// `GET /cart?userID=`
    async fn cart(&self, user: &UserId) -> Result<Vec<CartLine>, ApiError>;

    /// `POST /cart`
    async fn add_to_cart(
        &self,
        user: &UserId,
        variant: &VariantId,
        quantity: u32,
    ) -> Result<CartLine, ApiError>;

    /// `PATCH /cart/:id/increase`
    async fn increase(&self, id: &CartLineId) -> Result<CartLine, ApiError>;

    /// `PATCH /cart/:id/decrease`
    async fn decrease(&self, id: &CartLineId) -> Result<CartLine, ApiError>;

    /// `DELETE /cart/:id`
    async fn remove(&self, id: &CartLineId) -> Result<(), ApiError>;
}

/// Wishlist mutations.
#[async_trait]
pub trait WishlistApi: Send + Sync {
    /// `GET /wishlist?userID=`
    async fn wishlist(&self, user: &UserId) -> Result<Vec<WishlistEntry>, ApiError>;

    /// `POST /wishlist`; [`ApiError::Duplicate`] when already present.
    async fn add_to_wishlist(
        &self,
        user: &UserId,
        product: &ProductId,
    ) -> Result<WishlistEntry, ApiError>;

    /// `DELETE /wishlist/:id`
    async fn remove_from_wishlist(&self, id: &WishlistId) -> Result<(), ApiError>;
}

/// Source of the shopper's session token.
///
/// Session storage lives outside this crate; the client asks for the token
/// on every request so refreshed tokens are picked up transparently.
pub trait SessionProvider: Send + Sync {
    /// Current bearer token, if signed in.
    fn bearer_token(&self) -> Option<SecretString>;
}

/// Session with a fixed token (or none).
#[derive(Clone, Default)]
pub struct StaticSession {
    token: Option<SecretString>,
}

impl StaticSession {
    /// Session that sends the given token.
    #[must_use]
    pub const fn new(token: SecretString) -> Self {
        Self { token: Some(token) }
    }

    /// Session without credentials.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { token: None }
    }
}

impl SessionProvider for StaticSession {
    fn bearer_token(&self) -> Option<SecretString> {
        self.token.clone()
    }
}
