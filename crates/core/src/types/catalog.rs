//! Catalog entities: categories, products and variants.

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId, VariantId};
use super::price::Price;

/// Product category.
///
/// Immutable once loaded; the category list is replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Icon URL or asset name.
    pub icon_ref: Option<String>,
    pub description: String,
    pub active: bool,
}

/// A catalog product.
///
/// Keyed uniquely by `id`; a later snapshot replaces an earlier one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Image URLs in display order.
    pub images: Vec<String>,
    /// Video URLs in display order.
    pub videos: Vec<String>,
    /// Average review rating (0.0 when unrated).
    pub rating: f64,
    pub active: bool,
}

impl Product {
    /// First image, used as the thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Thin variant record (color/size/stock) that joins back to its product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRef {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Units available; upper bound for any cart line quantity.
    pub stock: u32,
}
