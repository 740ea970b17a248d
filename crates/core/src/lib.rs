//! Basketry Core - Shared types library.
//!
//! This crate provides the domain types used by the storefront data layer:
//! - Type-safe string IDs for every server-assigned identity
//! - Catalog entities (`Category`, `Product`, `VariantRef`)
//! - Cart lines and wishlist entries
//! - Thin references and the hydrated views produced from them
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no caches, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, statuses and entity records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
