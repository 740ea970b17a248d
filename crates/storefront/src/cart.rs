//! Optimistic cart store.
//!
//! Quantity changes and removals are applied locally first and reconciled
//! with the server response. Each line tracks how many of its mutations are
//! still outstanding: a failed mutation reverses only its own ±1, and the
//! server's copy of a line is adopted once nothing newer is pending. A
//! mutation that lands after the line was reloaded leaves the loaded copy
//! alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use basketry_core::{CartLine, CartLineId, LineState, Price, UserId, VariantRef};
use tracing::{debug, instrument};

use crate::api::{ApiError, CartApi};
use crate::cache::CatalogCache;
use crate::error::{Result, StoreError, rollback};
use crate::sync::lock;

/// Outcome of a quantity mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// The line now holds this quantity.
    Updated(u32),
    /// The requested quantity would exceed stock; nothing was sent.
    StockExceeded { stock: u32 },
    /// The line is already at quantity 1 (or 0 was requested); nothing was sent.
    AtMinimum,
}

/// Checkout subtotal over the selected lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subtotal {
    pub amount: Price,
    /// Selected lines whose product is not cached, so carry no price.
    pub unpriced_lines: usize,
}

struct Entry {
    line: CartLine,
    state: LineState,
    pending: u32,
    /// Load that produced this entry.
    epoch: u64,
}

impl Entry {
    const fn confirmed(line: CartLine, epoch: u64) -> Self {
        Self {
            line,
            state: LineState::Confirmed,
            pending: 0,
            epoch,
        }
    }
}

/// A shopper's cart.
///
/// Cheaply cloneable via `Arc`; clones share the same lines.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartInner>,
}

struct CartInner {
    user: UserId,
    cache: CatalogCache,
    api: Arc<dyn CartApi>,
    entries: Mutex<Vec<Entry>>,
    loads: AtomicU64,
}

impl CartStore {
    #[must_use]
    pub fn new(user: UserId, cache: CatalogCache, api: Arc<dyn CartApi>) -> Self {
        Self {
            inner: Arc::new(CartInner {
                user,
                cache,
                api,
                entries: Mutex::new(Vec::new()),
                loads: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.inner.user
    }

    /// Replace local lines with the server's cart.
    ///
    /// Lines already held keep their local selection. Mutations still in
    /// flight no longer touch the reloaded lines.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] if the request fails; local lines are kept.
    #[instrument(skip(self), fields(user_id = %self.inner.user))]
    pub async fn load(&self) -> Result<usize> {
        let lines = self.inner.api.cart(&self.inner.user).await?;
        self.inner
            .cache
            .upsert_variants(lines.iter().map(|l| l.variant.clone()));

        let mut entries = lock(&self.inner.entries);
        let epoch = self.inner.loads.fetch_add(1, Ordering::SeqCst) + 1;
        let loaded = lines
            .into_iter()
            .map(|mut line| {
                if let Some(known) = entries
                    .iter()
                    .find(|e| e.line.cart_line_id == line.cart_line_id)
                {
                    line.selected = known.line.selected;
                }
                Entry::confirmed(line, epoch)
            })
            .collect::<Vec<_>>();
        *entries = loaded;
        debug!(count = entries.len(), "Loaded cart");
        Ok(entries.len())
    }

    /// Add units of a variant, merging into an existing line server-side.
    ///
    /// Not optimistic: the line id comes from the server.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Api`] if the request fails.
    #[instrument(skip(self, variant), fields(variant_id = %variant.variant_id))]
    pub async fn add(&self, variant: &VariantRef, quantity: u32) -> Result<QuantityChange> {
        if quantity == 0 {
            return Ok(QuantityChange::AtMinimum);
        }
        let held = lock(&self.inner.entries)
            .iter()
            .find(|e| e.line.variant.variant_id == variant.variant_id)
            .map_or(0, |e| e.line.quantity);
        if held.saturating_add(quantity) > variant.stock {
            return Ok(QuantityChange::StockExceeded {
                stock: variant.stock,
            });
        }

        let line = self
            .inner
            .api
            .add_to_cart(&self.inner.user, &variant.variant_id, quantity)
            .await?;
        self.inner.cache.upsert_variants([line.variant.clone()]);

        let quantity = line.quantity;
        let mut entries = lock(&self.inner.entries);
        match entries
            .iter_mut()
            .find(|e| e.line.cart_line_id == line.cart_line_id)
        {
            Some(entry) => {
                let selected = entry.line.selected;
                entry.line = line;
                entry.line.selected = selected;
                if entry.pending == 0 {
                    entry.state = LineState::Confirmed;
                }
            }
            None => entries.push(Entry::confirmed(
                line,
                self.inner.loads.load(Ordering::SeqCst),
            )),
        }
        Ok(QuantityChange::Updated(quantity))
    }

    /// Add one unit, optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rollback`] if the server rejects the change and
    /// [`StoreError::UnknownCartLine`] for an id not held locally.
    #[instrument(skip(self), fields(cart_line_id = %id))]
    pub async fn increase(&self, id: &CartLineId) -> Result<QuantityChange> {
        let epoch = {
            let mut entries = lock(&self.inner.entries);
            let entry = find_mut(&mut entries, id)?;
            if !entry.line.can_increase() {
                return Ok(QuantityChange::StockExceeded {
                    stock: entry.line.variant.stock,
                });
            }
            entry.line.quantity += 1;
            entry.begin()
        };

        let result = self.inner.api.increase(id).await;
        self.settle(id, epoch, "increase", 1, result)
    }

    /// Remove one unit, optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rollback`] if the server rejects the change and
    /// [`StoreError::UnknownCartLine`] for an id not held locally.
    #[instrument(skip(self), fields(cart_line_id = %id))]
    pub async fn decrease(&self, id: &CartLineId) -> Result<QuantityChange> {
        let epoch = {
            let mut entries = lock(&self.inner.entries);
            let entry = find_mut(&mut entries, id)?;
            if !entry.line.can_decrease() {
                return Ok(QuantityChange::AtMinimum);
            }
            entry.line.quantity -= 1;
            entry.begin()
        };

        let result = self.inner.api.decrease(id).await;
        self.settle(id, epoch, "decrease", -1, result)
    }

    /// Remove a line, optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rollback`] if the server rejects the removal
    /// (the line is restored at its original position) and
    /// [`StoreError::UnknownCartLine`] for an id not held locally.
    #[instrument(skip(self), fields(cart_line_id = %id))]
    pub async fn remove(&self, id: &CartLineId) -> Result<()> {
        let (index, removed) = {
            let mut entries = lock(&self.inner.entries);
            let index = entries
                .iter()
                .position(|e| &e.line.cart_line_id == id)
                .ok_or_else(|| StoreError::UnknownCartLine(id.clone()))?;
            (index, entries.remove(index))
        };

        match self.inner.api.remove(id).await {
            Ok(()) => {
                debug!("Removed cart line");
                Ok(())
            }
            Err(e) => {
                let mut entries = lock(&self.inner.entries);
                if !entries.iter().any(|entry| &entry.line.cart_line_id == id) {
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
                Err(rollback("remove", e))
            }
        }
    }

    fn settle(
        &self,
        id: &CartLineId,
        epoch: u64,
        operation: &'static str,
        delta: i64,
        result: std::result::Result<CartLine, ApiError>,
    ) -> Result<QuantityChange> {
        let mut entries = lock(&self.inner.entries);
        let Some(entry) = entries
            .iter_mut()
            .find(|e| &e.line.cart_line_id == id && e.epoch == epoch)
        else {
            // Removed or reloaded while the mutation was in flight.
            drop(entries);
            return match result {
                Ok(line) => Ok(QuantityChange::Updated(line.quantity)),
                Err(e) => Err(rollback(operation, e)),
            };
        };
        entry.pending = entry.pending.saturating_sub(1);

        match result {
            Ok(line) => {
                if entry.pending == 0 {
                    let selected = entry.line.selected;
                    entry.line = line;
                    entry.line.selected = selected;
                    entry.state = LineState::Confirmed;
                }
                Ok(QuantityChange::Updated(entry.line.quantity))
            }
            Err(e) => {
                let reverted = i64::from(entry.line.quantity) - delta;
                let max = i64::from(entry.line.variant.stock.max(1));
                entry.line.quantity = u32::try_from(reverted.clamp(1, max)).unwrap_or(1);
                entry.state = if entry.pending == 0 {
                    LineState::RolledBack
                } else {
                    LineState::Pending
                };
                drop(entries);
                Err(rollback(operation, e))
            }
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select every line for checkout.
    pub fn select_all(&self) {
        for entry in lock(&self.inner.entries).iter_mut() {
            entry.line.selected = true;
        }
    }

    /// Deselect every line.
    pub fn clear_selection(&self) {
        for entry in lock(&self.inner.entries).iter_mut() {
            entry.line.selected = false;
        }
    }

    /// Flip one line's selection, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownCartLine`] for an id not held locally.
    pub fn toggle_select(&self, id: &CartLineId) -> Result<bool> {
        let mut entries = lock(&self.inner.entries);
        let entry = find_mut(&mut entries, id)?;
        entry.line.selected = !entry.line.selected;
        Ok(entry.line.selected)
    }

    /// Sum of `price × quantity` over selected lines with a cached product.
    #[must_use]
    pub fn selected_subtotal(&self) -> Subtotal {
        let entries = lock(&self.inner.entries);
        let mut subtotal = Subtotal {
            amount: Price::ZERO,
            unpriced_lines: 0,
        };
        for line in entries.iter().map(|e| &e.line).filter(|l| l.selected) {
            match self.inner.cache.get(&line.variant.product_id) {
                Some(product) => {
                    subtotal.amount = subtotal.amount + product.price.times(line.quantity);
                }
                None => subtotal.unpriced_lines += 1,
            }
        }
        subtotal
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        lock(&self.inner.entries)
            .iter()
            .map(|e| e.line.clone())
            .collect()
    }

    #[must_use]
    pub fn line(&self, id: &CartLineId) -> Option<CartLine> {
        lock(&self.inner.entries)
            .iter()
            .find(|e| &e.line.cart_line_id == id)
            .map(|e| e.line.clone())
    }

    #[must_use]
    pub fn line_state(&self, id: &CartLineId) -> Option<LineState> {
        lock(&self.inner.entries)
            .iter()
            .find(|e| &e.line.cart_line_id == id)
            .map(|e| e.state)
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

impl Entry {
    /// Mark a mutation outstanding; returns the entry's epoch.
    const fn begin(&mut self) -> u64 {
        self.pending += 1;
        self.state = LineState::Pending;
        self.epoch
    }
}

fn find_mut<'a>(entries: &'a mut [Entry], id: &CartLineId) -> Result<&'a mut Entry> {
    entries
        .iter_mut()
        .find(|e| &e.line.cart_line_id == id)
        .ok_or_else(|| StoreError::UnknownCartLine(id.clone()))
}
