#![forbid(unsafe_code)]

//! Name-keyed disposer scopes.
//!
//! A [`DisposerScope`] holds the disposers of the computations that share one
//! teardown point (deactivation or destruction). Clearing the scope disposes
//! every held subscription.
//!
//! # Invariants
//!
//! 1. A name maps to at most one disposer; it is present iff that
//!    subscription is live.
//! 2. `clear()` disposes in registration order and always leaves the scope
//!    empty. Calling it on an empty scope is a no-op.
//! 3. Dropping the scope disposes whatever it still holds.
//!
//! # Failure Modes
//!
//! - Disposers are assumed not to panic. A panicking disposer leaves the
//!   remaining ones held; they are disposed when the scope drops.

use hostbind_reactive::Disposer;
use indexmap::IndexMap;

pub struct DisposerScope {
    label: &'static str,
    disposers: IndexMap<&'static str, Disposer>,
}

impl DisposerScope {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            disposers: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.disposers.contains_key(name)
    }

    /// Hold `disposer` under `name`. A disposer already held under the same
    /// name is disposed first.
    pub fn hold(&mut self, name: &'static str, disposer: Disposer) {
        if let Some(previous) = self.disposers.insert(name, disposer) {
            tracing::warn!(scope = self.label, name, "replacing a live subscription");
            previous.dispose();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// Held names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.disposers.keys().copied().collect()
    }

    /// Dispose every held subscription.
    pub fn clear(&mut self) {
        while let Some((name, disposer)) = self.disposers.shift_remove_index(0) {
            disposer.dispose();
            tracing::trace!(scope = self.label, name, "subscription disposed");
        }
    }
}

impl Drop for DisposerScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for DisposerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposerScope")
            .field("label", &self.label)
            .field("names", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use hostbind_reactive::{AutorunOptions, Observable, autorun, live_reactions};

    fn watch(source: &Observable<i32>) -> Disposer {
        let source = source.clone();
        autorun(
            move |_| {
                let _ = source.get();
            },
            AutorunOptions::new(),
        )
    }

    #[test]
    fn hold_and_clear() {
        let value = Observable::new(0);
        let mut scope = DisposerScope::new("disable");
        scope.hold("a", watch(&value));
        scope.hold("b", watch(&value));
        assert_eq!(scope.names(), vec!["a", "b"]);
        assert_eq!(value.observer_count(), 2);

        scope.clear();
        assert!(scope.is_empty());
        assert_eq!(value.observer_count(), 0);
        assert_eq!(live_reactions(), 0);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut scope = DisposerScope::new("destroy");
        scope.clear();
        scope.clear();
        assert_eq!(scope.len(), 0);
    }

    #[test]
    fn drop_disposes() {
        let value = Observable::new(0);
        {
            let mut scope = DisposerScope::new("disable");
            scope.hold("a", watch(&value));
            assert_eq!(live_reactions(), 1);
        }
        assert_eq!(live_reactions(), 0);
        assert_eq!(value.observer_count(), 0);
    }

    #[test]
    fn hold_replaces_and_disposes_previous() {
        let value = Observable::new(0);
        let mut scope = DisposerScope::new("disable");
        scope.hold("a", watch(&value));
        scope.hold("a", watch(&value));
        assert_eq!(scope.len(), 1);
        assert_eq!(live_reactions(), 1);
        assert!(scope.contains("a"));
        assert!(!scope.contains("b"));
    }
}
