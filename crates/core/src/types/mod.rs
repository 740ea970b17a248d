//! Core types for the Basketry storefront data layer.
//!
//! This module provides type-safe wrappers and entity records for the
//! catalog, cart and wishlist domains.

pub mod cart;
pub mod catalog;
pub mod id;
pub mod price;
pub mod reference;
pub mod status;

pub use cart::{CartLine, WishlistEntry};
pub use catalog::{Category, Product, VariantRef};
pub use id::*;
pub use price::Price;
pub use reference::{HydratedView, PLACEHOLDER_IMAGE, PLACEHOLDER_NAME, ThinReference};
pub use status::*;
