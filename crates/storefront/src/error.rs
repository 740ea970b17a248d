//! Store-level error handling with Sentry integration.
//!
//! Network failures surface as [`ApiError`]; the cart and wishlist stores
//! wrap them in [`StoreError`] so callers can tell a rolled-back optimistic
//! change apart from a plain failed call.

use basketry_core::{CartLineId, WishlistId};
use thiserror::Error;

use crate::api::ApiError;

/// Errors returned by [`CartStore`](crate::cart::CartStore) and
/// [`WishlistStore`](crate::wishlist::WishlistStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The server rejected an optimistic change; local state was restored.
    #[error("{operation} rolled back: {source}")]
    Rollback {
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    /// No cart line with this id is held locally.
    #[error("Unknown cart line: {0}")]
    UnknownCartLine(CartLineId),

    /// No wishlist entry with this id is held locally.
    #[error("Unknown wishlist entry: {0}")]
    UnknownWishlistEntry(WishlistId),

    /// The entry has not been confirmed by the server yet.
    #[error("Wishlist entry {0} is not confirmed yet")]
    Unconfirmed(WishlistId),

    /// A non-optimistic call failed; local state is unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl StoreError {
    /// Whether local state was restored after a failed optimistic change.
    #[must_use]
    pub const fn is_rollback(&self) -> bool {
        matches!(self, Self::Rollback { .. })
    }

    /// Underlying service error, if any.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Rollback { source, .. } | Self::Api(source) => Some(source),
            Self::UnknownCartLine(_) | Self::UnknownWishlistEntry(_) | Self::Unconfirmed(_) => {
                None
            }
        }
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Log a rollback and capture it to Sentry, returning the error to surface.
pub(crate) fn rollback(operation: &'static str, source: ApiError) -> StoreError {
    let error = StoreError::Rollback { operation, source };
    let event_id = sentry::capture_error(&error);
    tracing::warn!(
        error = %error,
        sentry_event_id = %event_id,
        "Optimistic change rolled back"
    );
    error
}
