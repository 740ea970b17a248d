//! Cart lines and wishlist entries.

use serde::{Deserialize, Serialize};

use super::catalog::VariantRef;
use super::id::{CartLineId, ProductId, WishlistId};

/// A line in the shopper's cart.
///
/// `1 <= quantity <= variant.stock` holds after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub cart_line_id: CartLineId,
    pub variant: VariantRef,
    pub quantity: u32,
    /// Included in the checkout subtotal.
    pub selected: bool,
}

impl CartLine {
    /// Whether another unit can be added without exceeding stock.
    #[must_use]
    pub const fn can_increase(&self) -> bool {
        self.quantity < self.variant.stock
    }

    /// Whether a unit can be removed without dropping below one.
    #[must_use]
    pub const fn can_decrease(&self) -> bool {
        self.quantity > 1
    }
}

/// Wishlist membership of a single product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub wishlist_id: WishlistId,
    pub product_id: ProductId,
}
