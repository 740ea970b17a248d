//! Optimistic wishlist store.
//!
//! At most one entry per product. `add` inserts a placeholder entry before
//! the request goes out, so a second `add` for the same product finds it and
//! never reaches the network.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use basketry_core::{LineState, ProductId, UserId, WishlistEntry, WishlistId};
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, WishlistApi};
use crate::error::{Result, StoreError, rollback};
use crate::sync::lock;

/// Outcome of [`WishlistStore::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistAdd {
    /// A new entry was created (or the server already held one).
    Added(WishlistId),
    /// The product was already in the local wishlist; nothing was sent.
    AlreadyPresent(WishlistId),
}

impl WishlistAdd {
    #[must_use]
    pub const fn id(&self) -> &WishlistId {
        match self {
            Self::Added(id) | Self::AlreadyPresent(id) => id,
        }
    }
}

struct Entry {
    entry: WishlistEntry,
    state: LineState,
}

/// A shopper's wishlist.
///
/// Cheaply cloneable via `Arc`; clones share the same entries.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistInner>,
}

struct WishlistInner {
    user: UserId,
    api: Arc<dyn WishlistApi>,
    entries: Mutex<Vec<Entry>>,
}

impl WishlistStore {
    #[must_use]
    pub fn new(user: UserId, api: Arc<dyn WishlistApi>) -> Self {
        Self {
            inner: Arc::new(WishlistInner {
                user,
                api,
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Replace local entries with the server's wishlist.
    ///
    /// Server duplicates for a product are dropped (first wins). Adds still
    /// awaiting confirmation are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] if the request fails; local entries are kept.
    #[instrument(skip(self), fields(user_id = %self.inner.user))]
    pub async fn load(&self) -> Result<usize> {
        let server = self.inner.api.wishlist(&self.inner.user).await?;

        let mut seen = HashSet::new();
        let mut loaded: Vec<Entry> = server
            .into_iter()
            .filter(|e| seen.insert(e.product_id.clone()))
            .map(|entry| Entry {
                entry,
                state: LineState::Confirmed,
            })
            .collect();

        let mut entries = lock(&self.inner.entries);
        let pending = entries.drain(..).filter(|e| {
            e.entry.wishlist_id.is_placeholder() && !seen.contains(&e.entry.product_id)
        });
        loaded.extend(pending);
        *entries = loaded;
        debug!(count = entries.len(), "Loaded wishlist");
        Ok(entries.len())
    }

    /// Add a product, optimistically.
    ///
    /// A server duplicate report counts as success; the wishlist is re-read
    /// to adopt the server's id. If that re-read fails, the entry keeps its
    /// placeholder id and stays pending until the next [`load`](Self::load).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rollback`] if the server rejects the add; the
    /// placeholder entry is removed.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn add(&self, product: &ProductId) -> Result<WishlistAdd> {
        let placeholder = {
            let mut entries = lock(&self.inner.entries);
            if let Some(existing) = entries.iter().find(|e| &e.entry.product_id == product) {
                debug!(wishlist_id = %existing.entry.wishlist_id, "Already in wishlist");
                return Ok(WishlistAdd::AlreadyPresent(
                    existing.entry.wishlist_id.clone(),
                ));
            }
            let placeholder = WishlistId::placeholder();
            entries.push(Entry {
                entry: WishlistEntry {
                    wishlist_id: placeholder.clone(),
                    product_id: product.clone(),
                },
                state: LineState::Pending,
            });
            placeholder
        };

        match self
            .inner
            .api
            .add_to_wishlist(&self.inner.user, product)
            .await
        {
            Ok(confirmed) => {
                self.confirm(&placeholder, product, confirmed.wishlist_id.clone());
                Ok(WishlistAdd::Added(confirmed.wishlist_id))
            }
            Err(ApiError::Duplicate(_)) => {
                debug!("Server already holds product");
                match self.adopt_server_id(product).await {
                    Some(id) => {
                        self.confirm(&placeholder, product, id.clone());
                        Ok(WishlistAdd::Added(id))
                    }
                    // Stays pending until the next load brings the server entry.
                    None => Ok(WishlistAdd::Added(placeholder)),
                }
            }
            Err(e) => {
                lock(&self.inner.entries)
                    .retain(|entry| entry.entry.wishlist_id != placeholder);
                Err(rollback("wishlist add", e))
            }
        }
    }

    /// Remove an entry, optimistically.
    ///
    /// A server "not found" counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unconfirmed`] for a placeholder id,
    /// [`StoreError::UnknownWishlistEntry`] for an id not held locally and
    /// [`StoreError::Rollback`] if the server rejects the removal (the entry
    /// is restored at its original position).
    #[instrument(skip(self), fields(wishlist_id = %id))]
    pub async fn remove(&self, id: &WishlistId) -> Result<()> {
        if id.is_placeholder() {
            return Err(StoreError::Unconfirmed(id.clone()));
        }
        let (index, removed) = {
            let mut entries = lock(&self.inner.entries);
            let index = entries
                .iter()
                .position(|e| &e.entry.wishlist_id == id)
                .ok_or_else(|| StoreError::UnknownWishlistEntry(id.clone()))?;
            (index, entries.remove(index))
        };

        match self.inner.api.remove_from_wishlist(id).await {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => {
                let mut entries = lock(&self.inner.entries);
                if !entries
                    .iter()
                    .any(|entry| entry.entry.product_id == removed.entry.product_id)
                {
                    let index = index.min(entries.len());
                    entries.insert(
                        index,
                        Entry {
                            state: LineState::RolledBack,
                            ..removed
                        },
                    );
                }
                drop(entries);
                Err(rollback("wishlist remove", e))
            }
        }
    }

    /// Add the product if absent, remove it if present.
    ///
    /// Returns whether the product is in the wishlist afterwards.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying add or remove.
    pub async fn toggle(&self, product: &ProductId) -> Result<bool> {
        match self.id_for(product) {
            Some(id) => self.remove(&id).await.map(|()| false),
            None => self.add(product).await.map(|_| true),
        }
    }

    async fn adopt_server_id(&self, product: &ProductId) -> Option<WishlistId> {
        match self.inner.api.wishlist(&self.inner.user).await {
            Ok(server) => {
                let id = server
                    .into_iter()
                    .find(|e| &e.product_id == product)
                    .map(|e| e.wishlist_id);
                if id.is_none() {
                    warn!(product_id = %product, "Duplicate reported but entry not listed");
                }
                id
            }
            Err(e) => {
                warn!(product_id = %product, error = %e, "Could not re-read wishlist");
                None
            }
        }
    }

    fn confirm(&self, placeholder: &WishlistId, product: &ProductId, id: WishlistId) {
        let mut entries = lock(&self.inner.entries);
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| &e.entry.wishlist_id == placeholder)
        {
            entry.entry.wishlist_id = id;
            entry.state = LineState::Confirmed;
        } else if !entries.iter().any(|e| &e.entry.product_id == product) {
            entries.push(Entry {
                entry: WishlistEntry {
                    wishlist_id: id,
                    product_id: product.clone(),
                },
                state: LineState::Confirmed,
            });
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    #[must_use]
    pub fn contains(&self, product: &ProductId) -> bool {
        lock(&self.inner.entries)
            .iter()
            .any(|e| &e.entry.product_id == product)
    }

    /// Wishlist id for a product (a placeholder while unconfirmed).
    #[must_use]
    pub fn id_for(&self, product: &ProductId) -> Option<WishlistId> {
        lock(&self.inner.entries)
            .iter()
            .find(|e| &e.entry.product_id == product)
            .map(|e| e.entry.wishlist_id.clone())
    }

    #[must_use]
    pub fn state(&self, product: &ProductId) -> Option<LineState> {
        lock(&self.inner.entries)
            .iter()
            .find(|e| &e.entry.product_id == product)
            .map(|e| e.state)
    }

    #[must_use]
    pub fn entries(&self) -> Vec<WishlistEntry> {
        lock(&self.inner.entries)
            .iter()
            .map(|e| e.entry.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.inner.entries).is_empty()
    }
}
