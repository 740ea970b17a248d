//! Request generations for stale-response suppression.
//!
//! A screen context (a filter selection, a list being hydrated) advances its
//! counter whenever it is reset. Async work captures the [`Generation`] that
//! was current when it started and discards its result if the counter has
//! moved on by the time it completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token identifying one request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Monotonic generation counter shared by clones.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding generation and return the new one.
    pub fn advance(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    #[must_use]
    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    /// Whether `generation` is still the latest.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_previous() {
        let counter = GenerationCounter::new();
        let first = counter.current();
        assert!(counter.is_current(first));

        let second = counter.advance();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn test_clones_share_state() {
        let counter = GenerationCounter::new();
        let clone = counter.clone();
        let generation = clone.advance();
        assert_eq!(counter.current(), generation);
        assert_eq!(generation.to_string(), "gen-1");
    }
}
