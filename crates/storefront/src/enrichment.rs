//! Order-preserving hydration of thin references.
//!
//! Cache hits are filled in synchronously. Everything else is resolved
//! concurrently through the [`EntityResolver`], and each result is written
//! back into the slot of the reference it came from, so completion order
//! never affects output order. A failed reference becomes a `missing` view;
//! the batch as a whole never fails.

use basketry_core::{HydratedView, ProductId, ThinReference};
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::generation::{Generation, GenerationCounter};
use crate::resolver::EntityResolver;

/// Turns lists of thin references into display-ready views.
#[derive(Clone)]
pub struct EnrichmentPipeline {
    resolver: EntityResolver,
}

impl EnrichmentPipeline {
    #[must_use]
    pub const fn new(resolver: EntityResolver) -> Self {
        Self { resolver }
    }

    /// Hydrate `refs`, returning one view per reference in input order.
    #[instrument(skip_all, fields(count = refs.len()))]
    pub async fn hydrate(&self, refs: &[ThinReference]) -> Vec<HydratedView> {
        let cache = self.resolver.cache();
        let mut slots: Vec<Option<HydratedView>> = vec![None; refs.len()];
        let mut pending: Vec<(usize, &ThinReference, ProductId)> = Vec::new();

        for (index, (slot, reference)) in slots.iter_mut().zip(refs).enumerate() {
            let product_id = match reference {
                ThinReference::Product(id) => id.clone(),
                ThinReference::Variant(id) => match cache.product_for_variant(id) {
                    Some(product_id) => product_id,
                    None => {
                        debug!(variant_id = %id, "Unknown variant");
                        *slot = Some(HydratedView::missing(reference.clone()));
                        continue;
                    }
                },
            };
            match cache.get(&product_id) {
                Some(product) => *slot = Some(HydratedView::hit(reference.clone(), product)),
                None => pending.push((index, reference, product_id)),
            }
        }

        let resolutions = pending
            .into_iter()
            .map(|(index, reference, product_id)| async move {
                let view = match self.resolver.resolve(&product_id).await {
                    Ok(Some(product)) => HydratedView::fetched(reference.clone(), product),
                    Ok(None) => HydratedView::missing(reference.clone()),
                    Err(e) => {
                        warn!(product_id = %product_id, error = %e, "Hydration failed");
                        HydratedView::missing(reference.clone())
                    }
                };
                (index, view)
            });

        for (index, view) in join_all(resolutions).await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(view);
            }
        }

        slots
            .into_iter()
            .zip(refs)
            .map(|(slot, reference)| {
                slot.unwrap_or_else(|| HydratedView::missing(reference.clone()))
            })
            .collect()
    }

    /// Hydrate `refs` on behalf of a request context.
    ///
    /// Returns `None` if `generation` was superseded while the batch was
    /// resolving; the caller should drop the result.
    pub async fn hydrate_current(
        &self,
        counter: &GenerationCounter,
        generation: Generation,
        refs: &[ThinReference],
    ) -> Option<Vec<HydratedView>> {
        let views = self.hydrate(refs).await;
        if counter.is_current(generation) {
            Some(views)
        } else {
            debug!(%generation, "Discarding stale hydration");
            None
        }
    }
}
