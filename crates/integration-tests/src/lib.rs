//! Integration tests for the Basketry storefront data layer.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p basketry-integration-tests
//! ```
//!
//! The tests need no external services: [`FakeService`] serves the storefront
//! REST contract from memory on an ephemeral local port. Fixtures are stored
//! as raw JSON so tests can seed the loose wire shapes (`_id`, `productID`,
//! string prices) and malformed records the client must tolerate.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use basketry_storefront::StorefrontConfig;
use serde_json::{Value, json};
use url::Url;

/// In-memory state of the fake service.
#[derive(Default)]
pub struct ServiceState {
    pub products: Vec<Value>,
    pub variants: Vec<Value>,
    pub categories: Vec<Value>,
    pub cart: Vec<Value>,
    pub wishlist: Vec<Value>,
    /// When set, every mutating request (POST/PATCH/DELETE) fails with it.
    pub fail_mutations: Option<StatusCode>,
    /// When set, every request is rejected with `429` and this `Retry-After`.
    pub rate_limit: Option<u64>,
    /// Method and path of every request received, in order.
    pub requests: Vec<String>,
    /// `Authorization` header of the last request.
    pub last_authorization: Option<String>,
    next_id: u64,
}

impl ServiceState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

type Shared = Arc<Mutex<ServiceState>>;

/// A running fake storefront service.
pub struct FakeService {
    pub base_url: Url,
    state: Shared,
}

impl FakeService {
    /// Start the service on `127.0.0.1` with an ephemeral port.
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake service");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake service error");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/api/")).expect("Invalid base URL"),
            state,
        }
    }

    /// Lock the service state to seed fixtures or inspect requests.
    pub fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap()
    }

    /// Client configuration pointing at this service.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig::new(self.base_url.clone())
    }

    /// Requests received so far whose description starts with `prefix`.
    #[must_use]
    pub fn requests_matching(&self, prefix: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Product in the service's wire shape.
#[must_use]
pub fn product_json(id: &str, price: &str, category: Option<&str>) -> Value {
    json!({
        "_id": id,
        "categoryID": category,
        "name": format!("Product {id}"),
        "description": "",
        "price": price,
        "images": [format!("https://cdn.example.com/{id}.jpg")],
        "videos": [],
        "rating": 4.0,
        "active": true,
    })
}

/// Variant in the service's wire shape.
#[must_use]
pub fn variant_json(id: &str, product: &str, stock: u32) -> Value {
    json!({
        "_id": id,
        "productID": product,
        "color": "black",
        "size": "M",
        "stock": stock,
    })
}

/// Cart line in the service's wire shape.
#[must_use]
pub fn cart_line_json(id: &str, variant: Value, quantity: u32) -> Value {
    json!({
        "_id": id,
        "productVariant": variant,
        "quantity": quantity,
        "selected": true,
    })
}

/// Wishlist entry in the service's wire shape.
#[must_use]
pub fn wishlist_json(id: &str, product: &str) -> Value {
    json!({ "_id": id, "productID": product })
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/productvariant/byproduct/{id}", get(variants_by_product))
        .route("/category", get(categories))
        .route("/cart", get(get_cart).post(add_to_cart))
        .route("/cart/{id}", delete(remove_cart_line))
        .route("/cart/{id}/{direction}", patch(adjust_cart_line))
        .route("/wishlist", get(get_wishlist).post(add_to_wishlist))
        .route("/wishlist/{id}", delete(remove_wishlist_entry));

    Router::new().nest("/api", api).with_state(state)
}

/// Record the request and apply injected failures.
fn enter<'a>(
    state: &'a Shared,
    headers: &HeaderMap,
    request: String,
    mutating: bool,
) -> Result<MutexGuard<'a, ServiceState>, Response> {
    let mut guard = state.lock().unwrap();
    guard.requests.push(request);
    guard.last_authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    if let Some(retry_after) = guard.rate_limit {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after.to_string())],
        )
            .into_response());
    }
    if mutating && let Some(status) = guard.fail_mutations {
        return Err((status, "injected failure").into_response());
    }
    Ok(guard)
}

fn id_of(value: &Value) -> Option<&str> {
    value
        .get("_id")
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()
}

async fn list_products(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let guard = match enter(&state, &headers, "GET /products".to_string(), false) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);
    let category = query.get("categoryID");

    let products: Vec<Value> = guard
        .products
        .iter()
        .filter(|p| {
            category.is_none_or(|c| {
                p.get("categoryID").and_then(Value::as_str) == Some(c.as_str())
            })
        })
        .skip(page.saturating_sub(1) * limit)
        .take(limit)
        .cloned()
        .collect();
    Json(json!({ "products": products })).into_response()
}

async fn get_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let guard = match enter(&state, &headers, format!("GET /products/{id}"), false) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    guard
        .products
        .iter()
        .find(|p| id_of(p) == Some(id.as_str()))
        .map_or_else(not_found, |p| Json(p.clone()).into_response())
}

async fn variants_by_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let guard = match enter(&state, &headers, format!("GET /productvariant/{id}"), false) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let variants: Vec<Value> = guard
        .variants
        .iter()
        .filter(|v| v.get("productID").and_then(Value::as_str) == Some(id.as_str()))
        .cloned()
        .collect();
    Json(variants).into_response()
}

async fn categories(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match enter(&state, &headers, "GET /category".to_string(), false) {
        Ok(guard) => Json(guard.categories.clone()).into_response(),
        Err(response) => response,
    }
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match enter(&state, &headers, "GET /cart".to_string(), false) {
        Ok(guard) => Json(guard.cart.clone()).into_response(),
        Err(response) => response,
    }
}

async fn add_to_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = match enter(&state, &headers, "POST /cart".to_string(), true) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let variant_id = body["variantID"].as_str().unwrap_or_default().to_string();
    let quantity = body["quantity"].as_u64().unwrap_or(1);

    if let Some(line) = guard
        .cart
        .iter_mut()
        .find(|l| id_of(&l["productVariant"]) == Some(variant_id.as_str()))
    {
        let total = line["quantity"].as_u64().unwrap_or(0) + quantity;
        line["quantity"] = json!(total);
        return Json(line.clone()).into_response();
    }

    let Some(variant) = guard
        .variants
        .iter()
        .find(|v| id_of(v) == Some(variant_id.as_str()))
        .cloned()
    else {
        return not_found();
    };
    let id = guard.next_id("line");
    let line = json!({
        "_id": id,
        "productVariant": variant,
        "quantity": quantity,
        "selected": true,
    });
    guard.cart.push(line.clone());
    (StatusCode::CREATED, Json(line)).into_response()
}

async fn adjust_cart_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((id, direction)): Path<(String, String)>,
) -> Response {
    let mut guard = match enter(&state, &headers, format!("PATCH /cart/{id}/{direction}"), true) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Some(line) = guard
        .cart
        .iter_mut()
        .find(|l| id_of(l) == Some(id.as_str()))
    else {
        return not_found();
    };
    let quantity = line["quantity"].as_u64().unwrap_or(1);
    let stock = line["productVariant"]["stock"].as_u64().unwrap_or(0);
    let quantity = match direction.as_str() {
        "increase" if quantity < stock => quantity + 1,
        "decrease" if quantity > 1 => quantity - 1,
        "increase" | "decrease" => {
            return (StatusCode::UNPROCESSABLE_ENTITY, "quantity out of range").into_response();
        }
        _ => return not_found(),
    };
    line["quantity"] = json!(quantity);
    Json(line.clone()).into_response()
}

async fn remove_cart_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut guard = match enter(&state, &headers, format!("DELETE /cart/{id}"), true) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let before = guard.cart.len();
    guard.cart.retain(|l| id_of(l) != Some(id.as_str()));
    if guard.cart.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn get_wishlist(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match enter(&state, &headers, "GET /wishlist".to_string(), false) {
        Ok(guard) => Json(json!({ "wishlist": guard.wishlist.clone() })).into_response(),
        Err(response) => response,
    }
}

async fn add_to_wishlist(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = match enter(&state, &headers, "POST /wishlist".to_string(), true) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let product = body["productID"].as_str().unwrap_or_default().to_string();
    if guard
        .wishlist
        .iter()
        .any(|e| e["productID"].as_str() == Some(product.as_str()))
    {
        return (StatusCode::CONFLICT, "already in wishlist").into_response();
    }
    let id = guard.next_id("wish");
    let entry = wishlist_json(&id, &product);
    guard.wishlist.push(entry.clone());
    (StatusCode::CREATED, Json(entry)).into_response()
}

async fn remove_wishlist_entry(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut guard = match enter(&state, &headers, format!("DELETE /wishlist/{id}"), true) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let before = guard.wishlist.len();
    guard.wishlist.retain(|e| id_of(e) != Some(id.as_str()));
    if guard.wishlist.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}
