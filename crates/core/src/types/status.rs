//! Status enums for hydration and optimistic mutation.

use serde::{Deserialize, Serialize};

/// How a thin reference was hydrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationStatus {
    /// Served synchronously from the catalog cache.
    Hit,
    /// Fetched from the network during this hydration pass.
    Fetched,
    /// Could not be hydrated; display fallbacks apply.
    Missing,
}

impl HydrationStatus {
    /// Whether a product is available for display.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Hit | Self::Fetched)
    }
}

impl std::fmt::Display for HydrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Fetched => write!(f, "fetched"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Lifecycle of a cart line or wishlist entry under optimistic mutation.
///
/// `Confirmed -> Pending -> Confirmed | RolledBack`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    /// Local state matches the last server response.
    #[default]
    Confirmed,
    /// At least one optimistic mutation awaits a server response.
    Pending,
    /// The last mutation was rejected and local state was restored.
    RolledBack,
}

/// Which entity a thin reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Product,
    Variant,
}
