//! Wire payload decoding and validation.
//!
//! The storefront service is loosely typed: ids arrive as `id` or `_id`,
//! foreign keys as `productId` or `productID`, and optional fields may be
//! missing entirely. Each payload is first decoded into a permissive `Raw*`
//! form, then validated into the strict domain type. Anything that fails
//! validation is rejected as [`ApiError::Malformed`] rather than silently
//! accepted.

use basketry_core::{
    CartLine, CartLineId, Category, CategoryId, Price, Product, ProductId, VariantId, VariantRef,
    WishlistEntry, WishlistId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::ApiError;

// =============================================================================
// Raw payloads
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategory {
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "icon")]
    pub icon_ref: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    #[serde(alias = "categoryID")]
    pub category_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    pub rating: Option<f64>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVariant {
    #[serde(alias = "variantID")]
    pub variant_id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    #[serde(alias = "productID")]
    pub product_id: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartLine {
    pub cart_line_id: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    #[serde(alias = "productVariant")]
    pub variant: Option<RawVariant>,
    pub quantity: Option<i64>,
    pub selected: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWishlistEntry {
    pub wishlist_id: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    #[serde(alias = "productID")]
    pub product_id: Option<String>,
}

// =============================================================================
// Validation
// =============================================================================

fn required<T>(value: Option<T>, entity: &str, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Malformed(format!("{entity} is missing `{field}`")))
}

/// First id spelling present; a payload may carry `id` next to `_id`.
fn any_id<const N: usize>(spellings: [Option<String>; N]) -> Option<String> {
    spellings.into_iter().flatten().next()
}

fn parse_id<T, E: std::fmt::Display>(
    raw: Option<String>,
    parse: impl FnOnce(&str) -> Result<T, E>,
    entity: &str,
    field: &str,
) -> Result<T, ApiError> {
    let raw = required(raw, entity, field)?;
    parse(&raw).map_err(|e| ApiError::Malformed(format!("{entity} has invalid `{field}`: {e}")))
}

/// Validate a category payload.
///
/// # Errors
///
/// Returns [`ApiError::Malformed`] if the id or name is missing or invalid.
pub fn convert_category(raw: RawCategory) -> Result<Category, ApiError> {
    let id = parse_id(any_id([raw.id, raw.mongo_id]), CategoryId::parse, "category", "id")?;
    let name = required(raw.name, "category", "name")?;
    Ok(Category {
        id,
        name,
        icon_ref: raw.icon_ref.filter(|s| !s.is_empty()),
        description: raw.description.unwrap_or_default(),
        active: raw.active.unwrap_or(true),
    })
}

/// Validate a product payload.
///
/// # Errors
///
/// Returns [`ApiError::Malformed`] if the id, name or price is missing or
/// invalid, the price is negative, or the rating is not a finite number.
pub fn convert_product(raw: RawProduct) -> Result<Product, ApiError> {
    let id = parse_id(any_id([raw.id, raw.mongo_id]), ProductId::parse, "product", "id")?;
    let name = required(raw.name, "product", "name")?;
    let price = Price::new(required(raw.price, "product", "price")?);
    if price.is_negative() {
        return Err(ApiError::Malformed(format!(
            "product {id} has negative price {price}"
        )));
    }
    let rating = raw.rating.unwrap_or(0.0);
    if !rating.is_finite() {
        return Err(ApiError::Malformed(format!(
            "product {id} has non-finite rating"
        )));
    }
    let category_id = raw
        .category_id
        .filter(|s| !s.is_empty())
        .map(|s| CategoryId::parse(&s))
        .transpose()
        .map_err(|e| ApiError::Malformed(format!("product {id} has invalid `categoryId`: {e}")))?;

    Ok(Product {
        id,
        category_id,
        name,
        description: raw.description.unwrap_or_default(),
        price,
        images: raw.images,
        videos: raw.videos,
        rating,
        active: raw.active.unwrap_or(true),
    })
}

/// Validate a variant payload.
///
/// # Errors
///
/// Returns [`ApiError::Malformed`] if an id is missing or invalid or the
/// stock is missing or negative.
pub fn convert_variant(raw: RawVariant) -> Result<VariantRef, ApiError> {
    let variant_id = parse_id(
        any_id([raw.variant_id, raw.mongo_id]),
        VariantId::parse,
        "variant",
        "variantId",
    )?;
    let product_id = parse_id(raw.product_id, ProductId::parse, "variant", "productId")?;
    let stock = required(raw.stock, "variant", "stock")?;
    let stock = u32::try_from(stock)
        .map_err(|_| ApiError::Malformed(format!("variant {variant_id} has stock {stock}")))?;
    Ok(VariantRef {
        variant_id,
        product_id,
        color: raw.color,
        size: raw.size,
        stock,
    })
}

/// Validate a cart line payload.
///
/// Lines arrive selected unless the payload says otherwise.
///
/// # Errors
///
/// Returns [`ApiError::Malformed`] if the id or variant is invalid or the
/// quantity is below one.
pub fn convert_cart_line(raw: RawCartLine) -> Result<CartLine, ApiError> {
    let cart_line_id = parse_id(
        any_id([raw.cart_line_id, raw.id, raw.mongo_id]),
        CartLineId::parse,
        "cart line",
        "id",
    )?;
    let variant = convert_variant(required(raw.variant, "cart line", "variant")?)?;
    let quantity = required(raw.quantity, "cart line", "quantity")?;
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| {
            ApiError::Malformed(format!("cart line {cart_line_id} has quantity {quantity}"))
        })?;
    Ok(CartLine {
        cart_line_id,
        variant,
        quantity,
        selected: raw.selected.unwrap_or(true),
    })
}

/// Validate a wishlist entry payload.
///
/// # Errors
///
/// Returns [`ApiError::Malformed`] if either id is missing or invalid.
pub fn convert_wishlist_entry(raw: RawWishlistEntry) -> Result<WishlistEntry, ApiError> {
    let wishlist_id = parse_id(
        any_id([raw.wishlist_id, raw.id, raw.mongo_id]),
        WishlistId::parse,
        "wishlist entry",
        "id",
    )?;
    let product_id = parse_id(raw.product_id, ProductId::parse, "wishlist entry", "productId")?;
    Ok(WishlistEntry {
        wishlist_id,
        product_id,
    })
}

/// Pull the item array out of a list response.
///
/// List endpoints answer either with a bare array or with an envelope such
/// as `{ "products": [...] }`.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] if the body is not JSON, or
/// [`ApiError::Malformed`] if it holds neither shape.
pub fn extract_items(body: &str, key: &str) -> Result<Vec<serde_json::Value>, ApiError> {
    match serde_json::from_str(body)? {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(mut envelope) => match envelope.remove(key) {
            Some(serde_json::Value::Array(items)) => Ok(items),
            Some(serde_json::Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(ApiError::Malformed(format!("`{key}` is not an array"))),
        },
        _ => Err(ApiError::Malformed(format!(
            "expected an array or an object with `{key}`"
        ))),
    }
}

/// Decode and validate a single entity.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] if the body is not valid JSON for `R`, or the
/// validation error from `convert`.
pub fn decode_one<R, T>(
    body: &str,
    convert: impl FnOnce(R) -> Result<T, ApiError>,
) -> Result<T, ApiError>
where
    R: DeserializeOwned,
{
    convert(serde_json::from_str(body)?)
}

/// Validate a list of entities, skipping items that fail.
///
/// One malformed product must not hide the rest of a page, so each item is
/// decoded independently and failures are logged.
pub fn convert_list<R, T>(
    items: Vec<serde_json::Value>,
    convert: impl Fn(R) -> Result<T, ApiError>,
    entity: &str,
) -> Vec<T>
where
    R: DeserializeOwned,
{
    items
        .into_iter()
        .filter_map(|item| {
            match serde_json::from_value::<R>(item)
                .map_err(ApiError::from)
                .and_then(&convert)
            {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(entity, error = %e, "Skipping malformed list item");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw<R: DeserializeOwned>(value: serde_json::Value) -> R {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_convert_product_accepts_mongo_style_ids() {
        let product = convert_product(raw(json!({
            "_id": "p1",
            "categoryID": "c1",
            "name": "Linen Shirt",
            "price": 100000,
            "images": ["a.jpg", "b.jpg"],
            "rating": 4.5
        })))
        .unwrap();

        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.category_id.unwrap().as_str(), "c1");
        assert_eq!(product.price, Price::from(100_000));
        assert_eq!(product.images, vec!["a.jpg", "b.jpg"]);
        assert!(product.active);
        assert!(product.description.is_empty());
    }

    #[test]
    fn test_convert_accepts_id_next_to_mongo_id() {
        let product = convert_product(raw(json!({
            "_id": "p1",
            "id": "p1",
            "name": "Linen Shirt",
            "price": 10
        })))
        .unwrap();
        assert_eq!(product.id.as_str(), "p1");

        let line = convert_cart_line(raw(json!({
            "_id": "c1",
            "id": "c1",
            "productVariant": {"_id": "v1", "variantId": "v1", "productID": "p1", "stock": 2},
            "quantity": 1
        })))
        .unwrap();
        assert_eq!(line.cart_line_id.as_str(), "c1");
        assert_eq!(line.variant.variant_id.as_str(), "v1");

        let entry = convert_wishlist_entry(raw(json!({
            "_id": "w1",
            "id": "w1",
            "productID": "p1"
        })))
        .unwrap();
        assert_eq!(entry.wishlist_id.as_str(), "w1");

        let category =
            convert_category(raw(json!({"_id": "c1", "id": "c1", "name": "Shoes"}))).unwrap();
        assert_eq!(category.id.as_str(), "c1");
    }

    #[test]
    fn test_convert_product_rejects_missing_price() {
        let err = convert_product(raw(json!({"id": "p1", "name": "Shirt"}))).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(msg) if msg.contains("price")));
    }

    #[test]
    fn test_convert_product_rejects_negative_price() {
        let err =
            convert_product(raw(json!({"id": "p1", "name": "Shirt", "price": -5}))).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_convert_product_rejects_invalid_id() {
        let err =
            convert_product(raw(json!({"id": "", "name": "Shirt", "price": 5}))).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(msg) if msg.contains("invalid `id`")));
    }

    #[test]
    fn test_convert_variant_rejects_negative_stock() {
        let err = convert_variant(raw(json!({
            "_id": "v1",
            "productID": "p1",
            "stock": -1
        })))
        .unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_convert_cart_line() {
        let line = convert_cart_line(raw(json!({
            "_id": "c1",
            "productVariant": {"_id": "v1", "productId": "p1", "color": "red", "stock": 4},
            "quantity": 2
        })))
        .unwrap();
        assert_eq!(line.cart_line_id.as_str(), "c1");
        assert_eq!(line.variant.stock, 4);
        assert_eq!(line.quantity, 2);
        assert!(line.selected);
    }

    #[test]
    fn test_convert_cart_line_rejects_zero_quantity() {
        let err = convert_cart_line(raw(json!({
            "id": "c1",
            "variant": {"variantId": "v1", "productId": "p1", "stock": 4},
            "quantity": 0
        })))
        .unwrap_err();
        assert!(matches!(err, ApiError::Malformed(msg) if msg.contains("quantity")));
    }

    #[test]
    fn test_convert_wishlist_entry() {
        let entry =
            convert_wishlist_entry(raw(json!({"_id": "w1", "productID": "p9"}))).unwrap();
        assert_eq!(entry.wishlist_id.as_str(), "w1");
        assert_eq!(entry.product_id.as_str(), "p9");
    }

    #[test]
    fn test_convert_category_defaults() {
        let category = convert_category(raw(json!({"_id": "c1", "name": "Shoes", "icon": ""})))
            .unwrap();
        assert!(category.active);
        assert!(category.icon_ref.is_none());
    }

    #[test]
    fn test_convert_list_skips_malformed_items() {
        let items = vec![
            json!({"id": "p1", "name": "A", "price": 1}),
            json!({"id": "p2", "name": "B", "price": "not a number"}),
            json!({"id": "p3", "price": 3}),
            json!({"id": "p4", "name": "D", "price": "4.50"}),
        ];
        let products = convert_list(items, convert_product, "product");
        let ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p4"]);
    }

    #[test]
    fn test_extract_items_accepts_bare_array_and_envelope() {
        assert_eq!(extract_items("[1, 2]", "products").unwrap().len(), 2);
        assert_eq!(
            extract_items(r#"{"products": [1, 2, 3]}"#, "products")
                .unwrap()
                .len(),
            3
        );
        assert!(extract_items(r#"{"other": 1}"#, "products").unwrap().is_empty());
        assert!(matches!(
            extract_items(r#"{"products": 5}"#, "products"),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_one_reports_parse_errors() {
        let err = decode_one("{not json", convert_product).unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }
}
