//! In-flight fetch coalescing.
//!
//! At most one fetch per key is outstanding at any instant. The map check and
//! the registration of a new fetch happen under one synchronous lock, with no
//! `.await` in between, so two near-simultaneous callers can never both start
//! a fetch. Fetches run on spawned tasks: a caller that drops its future does
//! not cancel the fetch for the remaining waiters.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::api::{ApiError, SharedError};
use crate::sync::lock;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, SharedError>>>;
type InFlightMap<K, V> = Arc<Mutex<HashMap<K, SharedFetch<V>>>>;

/// Outcome of [`Coalescer::join_or_start`].
pub(crate) enum Joined<V> {
    /// The value was available without waiting.
    Ready(V),
    /// Await this to receive the shared result.
    Pending(SharedFetch<V>),
}

/// Registry of in-flight fetches keyed by entity id.
pub(crate) struct Coalescer<K, V> {
    in_flight: InFlightMap<K, V>,
}

impl<K, V> Default for Coalescer<K, V> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Join the pending fetch for `key`, or start one.
    ///
    /// `recheck` runs under the registry lock before anything else. A fetch
    /// that completes writes its result to the cache *before* leaving the
    /// registry, so re-checking here closes the window between a caller's
    /// first cache miss and taking the lock.
    ///
    /// `start` is only called when no fetch is pending. Its future must
    /// publish a successful result to the cache itself.
    pub(crate) fn join_or_start<F, Fut>(
        &self,
        key: &K,
        recheck: impl FnOnce() -> Option<V>,
        start: F,
    ) -> Joined<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let mut in_flight = lock(&self.in_flight);

        if let Some(value) = recheck() {
            return Joined::Ready(value);
        }
        if let Some(pending) = in_flight.get(key) {
            return Joined::Pending(pending.clone());
        }

        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: key.clone(),
        };
        let fetch = start();
        let task = tokio::spawn(async move {
            // Dropped after the fetch has published its result, or on panic.
            let _guard = guard;
            fetch.await.map_err(Arc::new)
        });
        let shared = async move {
            task.await
                .unwrap_or_else(|e| Err(Arc::new(ApiError::TaskAborted(e.to_string()))))
        }
        .boxed()
        .shared();

        in_flight.insert(key.clone(), shared.clone());
        drop(in_flight);
        Joined::Pending(shared)
    }

    /// Number of fetches currently outstanding.
    pub(crate) fn len(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

/// Removes a key from the registry when its fetch task ends.
struct InFlightGuard<K: Eq + Hash, V> {
    in_flight: InFlightMap<K, V>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for InFlightGuard<K, V> {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;

    use super::*;

    async fn resolve(coalescer: &Coalescer<String, u32>, calls: &Arc<AtomicUsize>) -> u32 {
        let calls = Arc::clone(calls);
        match coalescer.join_or_start(&"k".to_string(), || None, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(7)
        }) {
            Joined::Ready(v) => v,
            Joined::Pending(fetch) => fetch.await.unwrap(),
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let coalescer = Coalescer::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..5).map(|_| resolve(&coalescer, &calls))).await;

        assert_eq!(results, vec![7; 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.len(), 0);
    }

    #[tokio::test]
    async fn test_sequential_callers_fetch_again() {
        let coalescer = Coalescer::default();
        let calls = Arc::new(AtomicUsize::new(0));

        resolve(&coalescer, &calls).await;
        resolve(&coalescer, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recheck_short_circuits() {
        let coalescer: Coalescer<String, u32> = Coalescer::default();
        let joined = coalescer.join_or_start(&"k".to_string(), || Some(3), || async {
            Ok(99)
        });
        assert!(matches!(joined, Joined::Ready(3)));
        assert_eq!(coalescer.len(), 0);
    }

    #[tokio::test]
    async fn test_dropped_waiter_does_not_cancel_fetch() {
        let coalescer: Coalescer<String, u32> = Coalescer::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();

        let first = coalescer.join_or_start(&"k".to_string(), || None, move || async move {
            Ok(rx.await.unwrap_or(0))
        });
        drop(first);

        let Joined::Pending(second) =
            coalescer.join_or_start(&"k".to_string(), || None, || async { Ok(0) })
        else {
            panic!("expected the first fetch to still be pending");
        };
        tx.send(42).unwrap();
        assert_eq!(second.await.unwrap(), 42);
    }
}
