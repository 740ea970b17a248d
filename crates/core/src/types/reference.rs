//! Thin references and their hydrated views.
//!
//! Cart and order lines carry only an ID until display time. A
//! [`ThinReference`] names the entity; a [`HydratedView`] is what the
//! enrichment pass produces for it. Views are recomputed per render and
//! never persisted.

use serde::{Deserialize, Serialize};

use super::cart::{CartLine, WishlistEntry};
use super::catalog::Product;
use super::id::{ProductId, VariantId};
use super::status::{HydrationStatus, ReferenceKind};

/// Name shown for a reference that could not be hydrated.
pub const PLACEHOLDER_NAME: &str = "Product unavailable";

/// Image shown for a reference that could not be hydrated.
pub const PLACEHOLDER_IMAGE: &str = "asset://placeholder-product.png";

/// An id-only pointer to a product or variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ThinReference {
    Product(ProductId),
    Variant(VariantId),
}

impl ThinReference {
    /// Which entity kind this reference points at.
    #[must_use]
    pub const fn kind(&self) -> ReferenceKind {
        match self {
            Self::Product(_) => ReferenceKind::Product,
            Self::Variant(_) => ReferenceKind::Variant,
        }
    }

    /// The raw ID string.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Product(id) => id.as_str(),
            Self::Variant(id) => id.as_str(),
        }
    }
}

impl From<ProductId> for ThinReference {
    fn from(id: ProductId) -> Self {
        Self::Product(id)
    }
}

impl From<VariantId> for ThinReference {
    fn from(id: VariantId) -> Self {
        Self::Variant(id)
    }
}

impl From<&CartLine> for ThinReference {
    fn from(line: &CartLine) -> Self {
        Self::Variant(line.variant.variant_id.clone())
    }
}

impl From<&WishlistEntry> for ThinReference {
    fn from(entry: &WishlistEntry) -> Self {
        Self::Product(entry.product_id.clone())
    }
}

/// A thin reference paired with its resolved product, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedView {
    pub reference: ThinReference,
    pub product: Option<Product>,
    pub status: HydrationStatus,
}

impl HydratedView {
    /// View served from the cache.
    #[must_use]
    pub const fn hit(reference: ThinReference, product: Product) -> Self {
        Self {
            reference,
            product: Some(product),
            status: HydrationStatus::Hit,
        }
    }

    /// View resolved over the network.
    #[must_use]
    pub const fn fetched(reference: ThinReference, product: Product) -> Self {
        Self {
            reference,
            product: Some(product),
            status: HydrationStatus::Fetched,
        }
    }

    /// View for a reference that could not be hydrated.
    #[must_use]
    pub const fn missing(reference: ThinReference) -> Self {
        Self {
            reference,
            product: None,
            status: HydrationStatus::Missing,
        }
    }

    /// Product name, or the placeholder name when missing.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.product
            .as_ref()
            .map_or(PLACEHOLDER_NAME, |p| p.name.as_str())
    }

    /// First product image, or the placeholder image when missing or imageless.
    #[must_use]
    pub fn display_image(&self) -> &str {
        self.product
            .as_ref()
            .and_then(Product::thumbnail)
            .unwrap_or(PLACEHOLDER_IMAGE)
    }
}
