//! Newtype IDs for type-safe entity references.
//!
//! Every entity identity in the storefront service is an opaque string
//! assigned by the server. Use the `define_id!` macro to create type-safe
//! wrappers that prevent accidentally mixing IDs from different entity types.

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidId {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character that cannot appear in a URL path segment.
    #[error("id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Maximum length of any ID.
pub const MAX_ID_LENGTH: usize = 128;

/// Validate the shape shared by all IDs.
///
/// IDs are interpolated into request paths (`/cart/:id/increase`), so they
/// must be non-empty and free of whitespace, `/`, `?` and `#`.
///
/// # Errors
///
/// Returns an error if the input is empty, too long, or contains a
/// character that cannot appear in a path segment.
pub fn validate_id(s: &str) -> Result<(), InvalidId> {
    if s.is_empty() {
        return Err(InvalidId::Empty);
    }
    if s.len() > MAX_ID_LENGTH {
        return Err(InvalidId::TooLong { max: MAX_ID_LENGTH });
    }
    if let Some(c) = s
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#'))
    {
        return Err(InvalidId::InvalidCharacter(c));
    }
    Ok(())
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` as a plain string, validated on the way in
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `parse()`, `as_str()`, `into_inner()`
/// - `Display`, `FromStr`, `AsRef<str>` and `TryFrom<String>`
///
/// # Example
///
/// ```rust
/// # use basketry_core::define_id;
/// define_id!(ShelfId);
/// define_id!(BinId);
///
/// let shelf = ShelfId::parse("s-1").unwrap();
/// let bin = BinId::parse("s-1").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: ShelfId = bin;
/// # let _ = (shelf, bin);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an ID from a string.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is not a valid ID.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::InvalidId> {
                $crate::types::id::validate_id(s)?;
                Ok(Self(s.to_owned()))
            }

            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the ID and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::InvalidId;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::types::id::InvalidId;

            fn try_from(s: String) -> ::core::result::Result<Self, Self::Error> {
                $crate::types::id::validate_id(&s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(CategoryId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(CartLineId);

/// Wishlist entry ID.
///
/// Unlike the other IDs, a wishlist ID may be a *placeholder* generated
/// locally while the server has not yet assigned the real one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WishlistId(String);

impl WishlistId {
    /// Prefix that marks a locally generated placeholder ID.
    pub const PLACEHOLDER_PREFIX: &'static str = "local-";

    /// Parse a server-assigned wishlist ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid ID.
    pub fn parse(s: &str) -> Result<Self, InvalidId> {
        validate_id(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Generate a fresh placeholder ID for an unconfirmed entry.
    #[must_use]
    pub fn placeholder() -> Self {
        Self(format!("{}{}", Self::PLACEHOLDER_PREFIX, uuid::Uuid::new_v4()))
    }

    /// Whether this ID was generated locally and never confirmed.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(Self::PLACEHOLDER_PREFIX)
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WishlistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WishlistId {
    type Error = InvalidId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_id(&s)?;
        Ok(Self(s))
    }
}

impl From<WishlistId> for String {
    fn from(id: WishlistId) -> Self {
        id.0
    }
}

impl AsRef<str> for WishlistId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
