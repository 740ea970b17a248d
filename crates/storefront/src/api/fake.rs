//! In-memory service fakes for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use basketry_core::{
    CartLine, CartLineId, Category, CategoryId, Price, Product, ProductId, UserId, VariantId,
    VariantRef, WishlistEntry, WishlistId,
};
use reqwest::StatusCode;
use tokio::sync::{mpsc, oneshot, watch};

use super::{ApiError, CartApi, CatalogApi, ProductPage, ProductQuery, WishlistApi};

// =============================================================================
// Builders
// =============================================================================

pub(crate) fn pid(id: &str) -> ProductId {
    ProductId::parse(id).unwrap()
}

pub(crate) fn vid(id: &str) -> VariantId {
    VariantId::parse(id).unwrap()
}

pub(crate) fn lid(id: &str) -> CartLineId {
    CartLineId::parse(id).unwrap()
}

pub(crate) fn user() -> UserId {
    UserId::parse("u1").unwrap()
}

pub(crate) fn product(id: &str, price: i64) -> Product {
    Product {
        id: pid(id),
        category_id: None,
        name: format!("Product {id}"),
        description: String::new(),
        price: Price::from(price),
        images: vec![format!("https://cdn.example.com/{id}.jpg")],
        videos: Vec::new(),
        rating: 4.5,
        active: true,
    }
}

pub(crate) fn product_in(id: &str, price: i64, category: &str) -> Product {
    Product {
        category_id: Some(CategoryId::parse(category).unwrap()),
        ..product(id, price)
    }
}

pub(crate) fn category(id: &str) -> Category {
    Category {
        id: CategoryId::parse(id).unwrap(),
        name: id.to_uppercase(),
        icon_ref: None,
        description: String::new(),
        active: true,
    }
}

pub(crate) fn variant(variant_id: &str, product_id: &str, stock: u32) -> VariantRef {
    VariantRef {
        variant_id: vid(variant_id),
        product_id: pid(product_id),
        color: Some("black".to_string()),
        size: Some("M".to_string()),
        stock,
    }
}

pub(crate) fn cart_line(id: &str, variant: VariantRef, quantity: u32) -> CartLine {
    CartLine {
        cart_line_id: lid(id),
        variant,
        quantity,
        selected: true,
    }
}

pub(crate) fn unavailable() -> ApiError {
    ApiError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "unavailable".to_string(),
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Holds fake responses back until released.
#[derive(Clone)]
pub(crate) struct Gate {
    open: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub(crate) fn closed() -> Self {
        let (open, _) = watch::channel(false);
        Self {
            open: Arc::new(open),
        }
    }

    pub(crate) fn release(&self) {
        self.open.send_replace(true);
    }

    pub(crate) async fn pass(&self) {
        let mut rx = self.open.subscribe();
        rx.wait_for(|open| *open).await.unwrap();
    }
}

async fn pass(gate: Option<&Gate>) {
    if let Some(gate) = gate {
        gate.pass().await;
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
pub(crate) struct FakeCatalog {
    products: Vec<Product>,
    variants: Vec<VariantRef>,
    categories: Vec<Category>,
    failing: Mutex<HashSet<String>>,
    delays: HashMap<String, Duration>,
    gate: Option<Gate>,
    fail_lists: AtomicBool,
    product_calls: AtomicUsize,
    variant_calls: AtomicUsize,
    queries: Mutex<Vec<ProductQuery>>,
}

impl FakeCatalog {
    pub(crate) fn with_products(mut self, products: impl IntoIterator<Item = Product>) -> Self {
        self.products.extend(products);
        self
    }

    pub(crate) fn with_variants(mut self, variants: impl IntoIterator<Item = VariantRef>) -> Self {
        self.variants.extend(variants);
        self
    }

    pub(crate) fn with_categories(
        mut self,
        categories: impl IntoIterator<Item = Category>,
    ) -> Self {
        self.categories.extend(categories);
        self
    }

    /// `product(id)` fails with a 503 until healed.
    pub(crate) fn failing(self, id: &str) -> Self {
        self.failing.lock().unwrap().insert(id.to_string());
        self
    }

    pub(crate) fn delayed(mut self, id: &str, millis: u64) -> Self {
        self.delays
            .insert(id.to_string(), Duration::from_millis(millis));
        self
    }

    pub(crate) fn gated(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn heal(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    pub(crate) fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn product_calls(&self) -> usize {
        self.product_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn variant_calls(&self) -> usize {
        self.variant_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> Vec<ProductQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        self.queries.lock().unwrap().push(query.clone());
        pass(self.gate.as_ref()).await;
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let skip = (query.page.saturating_sub(1) * query.limit) as usize;
        let page: Vec<Product> = self
            .products
            .iter()
            .filter(|p| query.category.is_none() || p.category_id == query.category)
            .skip(skip)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(page.into())
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Product>, ApiError> {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(id.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        pass(self.gate.as_ref()).await;
        if self.failing.lock().unwrap().contains(id.as_str()) {
            return Err(unavailable());
        }
        Ok(self.products.iter().find(|p| &p.id == id).cloned())
    }

    async fn variants_by_product(&self, id: &ProductId) -> Result<Vec<VariantRef>, ApiError> {
        self.variant_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self
            .variants
            .iter()
            .filter(|v| &v.product_id == id)
            .cloned()
            .collect())
    }

    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        Ok(self.categories.clone())
    }
}

type PageReply = oneshot::Sender<Result<ProductPage, ApiError>>;

/// Catalog whose list responses are answered by the test, in any order.
pub(crate) struct ScriptedCatalog {
    requests: mpsc::UnboundedSender<(ProductQuery, PageReply)>,
}

impl ScriptedCatalog {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<(ProductQuery, PageReply)>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }
}

#[async_trait]
impl CatalogApi for ScriptedCatalog {
    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        let (reply, response) = oneshot::channel();
        self.requests.send((query.clone(), reply)).unwrap();
        response
            .await
            .unwrap_or_else(|_| Err(ApiError::TaskAborted("reply dropped".to_string())))
    }

    async fn product(&self, _id: &ProductId) -> Result<Option<Product>, ApiError> {
        Ok(None)
    }

    async fn variants_by_product(&self, _id: &ProductId) -> Result<Vec<VariantRef>, ApiError> {
        Ok(Vec::new())
    }

    async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Default)]
pub(crate) struct FakeCart {
    lines: Mutex<Vec<CartLine>>,
    variants: Vec<VariantRef>,
    fail: AtomicBool,
    gate: Mutex<Option<Gate>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCart {
    pub(crate) fn with_lines(self, lines: impl IntoIterator<Item = CartLine>) -> Self {
        self.lines.lock().unwrap().extend(lines);
        self
    }

    pub(crate) fn with_variants(mut self, variants: impl IntoIterator<Item = VariantRef>) -> Self {
        self.variants.extend(variants);
        self
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Hold every later response until the gate opens.
    pub(crate) fn hold(&self, gate: Gate) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    /// Stop holding responses that start from now on.
    pub(crate) fn unhold(&self) {
        *self.gate.lock().unwrap() = None;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        let gate = self.gate.lock().unwrap().clone();
        pass(gate.as_ref()).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn adjust(&self, id: &CartLineId, delta: i64) -> Result<CartLine, ApiError> {
        let mut lines = self.lines.lock().unwrap();
        let line = lines
            .iter_mut()
            .find(|l| &l.cart_line_id == id)
            .ok_or_else(|| ApiError::NotFound(format!("cart line {id}")))?;
        line.quantity = u32::try_from(i64::from(line.quantity) + delta).unwrap();
        Ok(line.clone())
    }
}

#[async_trait]
impl CartApi for FakeCart {
    async fn cart(&self, _user: &UserId) -> Result<Vec<CartLine>, ApiError> {
        self.enter("cart".to_string()).await?;
        Ok(self.lines.lock().unwrap().clone())
    }

    async fn add_to_cart(
        &self,
        _user: &UserId,
        variant: &VariantId,
        quantity: u32,
    ) -> Result<CartLine, ApiError> {
        self.enter(format!("add {variant}")).await?;
        let mut lines = self.lines.lock().unwrap();
        if let Some(line) = lines.iter_mut().find(|l| &l.variant.variant_id == variant) {
            line.quantity += quantity;
            return Ok(line.clone());
        }
        let known = self
            .variants
            .iter()
            .find(|v| &v.variant_id == variant)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("variant {variant}")))?;
        let line = cart_line(&format!("c{}", lines.len() + 1), known, quantity);
        lines.push(line.clone());
        Ok(line)
    }

    async fn increase(&self, id: &CartLineId) -> Result<CartLine, ApiError> {
        self.enter(format!("increase {id}")).await?;
        self.adjust(id, 1)
    }

    async fn decrease(&self, id: &CartLineId) -> Result<CartLine, ApiError> {
        self.enter(format!("decrease {id}")).await?;
        self.adjust(id, -1)
    }

    async fn remove(&self, id: &CartLineId) -> Result<(), ApiError> {
        self.enter(format!("remove {id}")).await?;
        self.lines.lock().unwrap().retain(|l| &l.cart_line_id != id);
        Ok(())
    }
}

// =============================================================================
// Wishlist
// =============================================================================

#[derive(Default)]
pub(crate) struct FakeWishlist {
    entries: Mutex<Vec<WishlistEntry>>,
    fail: AtomicBool,
    fail_reads: AtomicBool,
    gate: Mutex<Option<Gate>>,
    next_id: AtomicUsize,
    posts: AtomicUsize,
    deletes: AtomicUsize,
}

impl FakeWishlist {
    /// Entries the server already holds.
    pub(crate) fn with_entries(self, entries: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
        self.entries
            .lock()
            .unwrap()
            .extend(entries.into_iter().map(|(id, product)| WishlistEntry {
                wishlist_id: WishlistId::parse(id).unwrap(),
                product_id: pid(product),
            }));
        self
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail only `GET /wishlist`; mutations still go through.
    pub(crate) fn set_failing_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn hold(&self, gate: Gate) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub(crate) fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub(crate) fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub(crate) fn server_entries(&self) -> Vec<WishlistEntry> {
        self.entries.lock().unwrap().clone()
    }

    async fn enter(&self) -> Result<(), ApiError> {
        let gate = self.gate.lock().unwrap().clone();
        pass(gate.as_ref()).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl WishlistApi for FakeWishlist {
    async fn wishlist(&self, _user: &UserId) -> Result<Vec<WishlistEntry>, ApiError> {
        if self.fail.load(Ordering::SeqCst) || self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.server_entries())
    }

    async fn add_to_wishlist(
        &self,
        _user: &UserId,
        product: &ProductId,
    ) -> Result<WishlistEntry, ApiError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|e| &e.product_id == product) {
            return Err(ApiError::Duplicate(format!("wishlist entry for {product}")));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = WishlistEntry {
            wishlist_id: WishlistId::parse(&format!("srv{n}")).unwrap(),
            product_id: product.clone(),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn remove_from_wishlist(&self, id: &WishlistId) -> Result<(), ApiError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| &e.wishlist_id != id);
        if entries.len() == before {
            return Err(ApiError::NotFound(format!("wishlist entry {id}")));
        }
        Ok(())
    }
}
