//! REST client implementation over `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use basketry_core::{
    CartLine, CartLineId, Category, Product, ProductId, UserId, VariantId, VariantRef,
    WishlistEntry, WishlistId,
};
use reqwest::{Method, StatusCode, header};
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use super::conversions::{
    convert_cart_line, convert_category, convert_list, convert_product, convert_variant,
    convert_wishlist_entry, decode_one, extract_items,
};
use super::{
    ApiError, CartApi, CatalogApi, ProductPage, ProductQuery, SessionProvider, WishlistApi,
};
use crate::config::StorefrontConfig;

/// Characters of an error body kept for logs and error messages.
const ERROR_BODY_PREVIEW: usize = 200;

// =============================================================================
// RestClient
// =============================================================================

/// Client for the storefront REST service.
///
/// Cheap to clone; all clones share one connection pool. The session token
/// is read from the [`SessionProvider`] on every request.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<dyn SessionProvider>,
}

impl RestClient {
    /// Create a new REST client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL
    /// cannot carry path segments.
    pub fn new(
        config: &StorefrontConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, ApiError> {
        if config.api_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(config.api_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RestClientInner {
                client,
                base_url: config.api_url.clone(),
                session,
            }),
        })
    }

    /// Build an endpoint URL from path segments and query pairs.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Send a request and return the response body of a successful call.
    ///
    /// `resource` names the target for `NotFound`/`Duplicate` errors.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        resource: &str,
    ) -> Result<String, ApiError> {
        let mut request = self
            .inner
            .client
            .request(method.clone(), url)
            .header(header::ACCEPT, "application/json");

        if let Some(token) = self.inner.session.bearer_token() {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        match status {
            StatusCode::NOT_FOUND => return Err(ApiError::NotFound(resource.to_string())),
            StatusCode::CONFLICT => return Err(ApiError::Duplicate(resource.to_string())),
            _ => {}
        }

        if !status.is_success() {
            let preview = response_text
                .chars()
                .take(ERROR_BODY_PREVIEW)
                .collect::<String>();
            tracing::error!(
                %method,
                status = %status,
                body = %preview,
                "Storefront API returned non-success status"
            );
            return Err(ApiError::Status {
                status,
                body: preview,
            });
        }

        debug!(%method, status = %status, bytes = response_text.len(), "Storefront API call");
        Ok(response_text)
    }

    async fn get(&self, url: Url, resource: &str) -> Result<String, ApiError> {
        self.execute(Method::GET, url, None, resource).await
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogApi for RestClient {
    #[instrument(skip(self), fields(page = query.page, limit = query.limit))]
    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(category) = &query.category {
            params.insert(0, ("categoryID", category.to_string()));
        }
        let url = self.endpoint(&["products"], &params)?;
        let body = self.get(url, "products").await?;
        let items = extract_items(&body, "products")?;
        let received = items.len();
        Ok(ProductPage {
            products: convert_list(items, convert_product, "product"),
            received,
        })
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, ApiError> {
        let url = self.endpoint(&["products", id.as_str()], &[])?;
        match self.get(url, &format!("product {id}")).await {
            Ok(body) => decode_one(&body, convert_product).map(Some),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn variants_by_product(&self, id: &ProductId) -> Result<Vec<VariantRef>, ApiError> {
        let url = self.endpoint(&["productvariant", "byproduct", id.as_str()], &[])?;
        match self.get(url, &format!("variants of {id}")).await {
            Ok(body) => Ok(convert_list(
                extract_items(&body, "variants")?,
                convert_variant,
                "variant",
            )),
            Err(ApiError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let url = self.endpoint(&["category"], &[])?;
        let body = self.get(url, "categories").await?;
        Ok(convert_list(
            extract_items(&body, "categories")?,
            convert_category,
            "category",
        ))
    }
}

// =============================================================================
// Cart
// =============================================================================

#[async_trait]
impl CartApi for RestClient {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn cart(&self, user: &UserId) -> Result<Vec<CartLine>, ApiError> {
        let url = self.endpoint(&["cart"], &[("userID", user.to_string())])?;
        let body = self.get(url, "cart").await?;
        Ok(convert_list(
            extract_items(&body, "cart")?,
            convert_cart_line,
            "cart line",
        ))
    }

    #[instrument(skip(self), fields(user_id = %user, variant_id = %variant))]
    async fn add_to_cart(
        &self,
        user: &UserId,
        variant: &VariantId,
        quantity: u32,
    ) -> Result<CartLine, ApiError> {
        let url = self.endpoint(&["cart"], &[])?;
        let body = json!({
            "userID": user,
            "variantID": variant,
            "quantity": quantity,
        });
        let body = self
            .execute(Method::POST, url, Some(body), &format!("cart line for {variant}"))
            .await?;
        decode_one(&body, convert_cart_line)
    }

    #[instrument(skip(self), fields(cart_line_id = %id))]
    async fn increase(&self, id: &CartLineId) -> Result<CartLine, ApiError> {
        let url = self.endpoint(&["cart", id.as_str(), "increase"], &[])?;
        let body = self
            .execute(Method::PATCH, url, None, &format!("cart line {id}"))
            .await?;
        decode_one(&body, convert_cart_line)
    }

    #[instrument(skip(self), fields(cart_line_id = %id))]
    async fn decrease(&self, id: &CartLineId) -> Result<CartLine, ApiError> {
        let url = self.endpoint(&["cart", id.as_str(), "decrease"], &[])?;
        let body = self
            .execute(Method::PATCH, url, None, &format!("cart line {id}"))
            .await?;
        decode_one(&body, convert_cart_line)
    }

    #[instrument(skip(self), fields(cart_line_id = %id))]
    async fn remove(&self, id: &CartLineId) -> Result<(), ApiError> {
        let url = self.endpoint(&["cart", id.as_str()], &[])?;
        self.execute(Method::DELETE, url, None, &format!("cart line {id}"))
            .await
            .map(drop)
    }
}

// =============================================================================
// Wishlist
// =============================================================================

#[async_trait]
impl WishlistApi for RestClient {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn wishlist(&self, user: &UserId) -> Result<Vec<WishlistEntry>, ApiError> {
        let url = self.endpoint(&["wishlist"], &[("userID", user.to_string())])?;
        let body = self.get(url, "wishlist").await?;
        Ok(convert_list(
            extract_items(&body, "wishlist")?,
            convert_wishlist_entry,
            "wishlist entry",
        ))
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    async fn add_to_wishlist(
        &self,
        user: &UserId,
        product: &ProductId,
    ) -> Result<WishlistEntry, ApiError> {
        let url = self.endpoint(&["wishlist"], &[])?;
        let body = json!({
            "userID": user,
            "productID": product,
        });
        let body = self
            .execute(Method::POST, url, Some(body), &format!("wishlist entry for {product}"))
            .await?;
        decode_one(&body, convert_wishlist_entry)
    }

    #[instrument(skip(self), fields(wishlist_id = %id))]
    async fn remove_from_wishlist(&self, id: &WishlistId) -> Result<(), ApiError> {
        let url = self.endpoint(&["wishlist", id.as_str()], &[])?;
        self.execute(Method::DELETE, url, None, &format!("wishlist entry {id}"))
            .await
            .map(drop)
    }
}
