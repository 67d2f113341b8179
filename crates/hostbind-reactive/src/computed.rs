#![forbid(unsafe_code)]

//! Lazy computed values that track their own dependencies.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. The function runs inside a tracking frame, so
//! whatever observables (or other computed values) it reads become its
//! dependencies. A dependency change marks the value dirty and forwards the
//! invalidation to the computed value's own observers. The next read
//! recomputes.
//!
//! # Invariants
//!
//! 1. `get()` never returns a value computed before the latest change of any
//!    dependency.
//! 2. The compute function runs at most once per invalidation.
//! 3. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the previous cached value is kept and the
//!   value stays dirty, so the next read retries.
//! - **Self-referential compute**: reading a computed value from its own
//!   compute function panics with a cycle message.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::config::config;
use crate::runtime::{self, Atom, Derivation};

struct ComputedInner<T> {
    atom: Rc<Atom>,
    this: Weak<ComputedInner<T>>,
    compute: Box<dyn Fn() -> T>,
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    computing: Cell<bool>,
    version: Cell<u64>,
    deps: RefCell<Vec<Rc<Atom>>>,
}

impl<T: 'static> Derivation for ComputedInner<T> {
    fn on_stale(self: Rc<Self>) {
        if !self.dirty.replace(true) {
            self.atom.report_changed();
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        let id = self.atom.id();
        for atom in self.deps.get_mut().drain(..) {
            atom.remove_observer(id);
        }
    }
}

struct ComputingGuard<'a>(&'a Cell<bool>);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A lazily-evaluated, memoized value derived from other reactive values.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.inner.atom.name())
            .field("cached", &*self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::build(None, Box::new(compute))
    }

    pub fn named(name: impl Into<String>, compute: impl Fn() -> T + 'static) -> Self {
        Self::build(Some(name.into()), Box::new(compute))
    }

    fn build(name: Option<String>, compute: Box<dyn Fn() -> T>) -> Self {
        Self {
            inner: Rc::new_cyclic(|this| ComputedInner {
                atom: Atom::new(name, "Computed"),
                this: this.clone(),
                compute,
                cached: RefCell::new(None),
                dirty: Cell::new(true),
                computing: Cell::new(false),
                version: Cell::new(0),
                deps: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Current value, recomputed first if a dependency changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if config().computed_requires_reaction && !runtime::is_tracking() {
            tracing::warn!(
                computed = self.inner.atom.name(),
                "computed value read outside a reaction"
            );
        }
        self.inner.atom.report_observed();
        self.refresh();
        let cached = self.inner.cached.borrow();
        f(cached
            .as_ref()
            .expect("cached is always Some after refresh"))
    }

    fn refresh(&self) {
        let inner = &self.inner;
        if !inner.dirty.get() && inner.cached.borrow().is_some() {
            return;
        }
        assert!(
            !inner.computing.replace(true),
            "computed `{}` reads itself",
            inner.atom.name()
        );
        let _computing = ComputingGuard(&inner.computing);

        let (value, deps) = runtime::track(|| (inner.compute)());
        let observer: Weak<dyn Derivation> = inner.this.clone();
        let previous = inner.deps.replace(Vec::new());
        runtime::rebind_dependencies(inner.atom.id(), &observer, previous, &deps);
        *inner.deps.borrow_mut() = deps;

        *inner.cached.borrow_mut() = Some(value);
        inner.dirty.set(false);
        inner.version.set(inner.version.get() + 1);
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.atom.name()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AutorunOptions, EngineConfig, Observable, autorun, configure};
    use tracing_test::traced_test;

    #[test]
    fn lazy_evaluation() {
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        let source = Observable::new(21);
        let s = source.clone();
        let doubled = Computed::new(move || {
            c.set(c.get() + 1);
            s.get() * 2
        });

        assert_eq!(count.get(), 0);
        assert_eq!(doubled.get(), 42);
        assert_eq!(doubled.get(), 42);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn recomputes_after_dependency_change() {
        let width = Observable::new(10);
        let height = Observable::new(20);
        let (w, h) = (width.clone(), height.clone());
        let area = Computed::new(move || w.get() * h.get());

        assert_eq!(area.get(), 200);
        assert_eq!(area.version(), 1);

        width.set(5).unwrap();
        assert!(area.is_dirty());
        assert_eq!(area.get(), 100);
        assert_eq!(area.version(), 2);
    }

    #[test]
    fn same_value_write_keeps_cache() {
        let source = Observable::new(42);
        let s = source.clone();
        let computed = Computed::new(move || s.get());
        let _ = computed.get();
        source.set(42).unwrap();
        assert!(!computed.is_dirty());
        assert_eq!(computed.version(), 1);
    }

    #[test]
    fn invalidation_reaches_reactions() {
        let hp = Observable::new(100);
        let h = hp.clone();
        let low = Computed::new(move || h.get() < 30);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (l, s) = (low.clone(), Rc::clone(&seen));
        let disposer = autorun(move |_| s.borrow_mut().push(l.get()), AutorunOptions::new());

        hp.set(20).unwrap();
        assert_eq!(*seen.borrow(), vec![false, true]);
        disposer.dispose();
    }

    #[test]
    fn chained_computed() {
        let base = Observable::new(2);
        let b = base.clone();
        let squared = Computed::new(move || b.get() * b.get());
        let sq = squared.clone();
        let plus_one = Computed::new(move || sq.get() + 1);

        assert_eq!(plus_one.get(), 5);
        base.set(3).unwrap();
        assert_eq!(plus_one.get(), 10);
    }

    #[test]
    fn with_access() {
        let source = Observable::new(vec![1, 2, 3]);
        let s = source.clone();
        let computed = Computed::new(move || s.with(|v| v.iter().sum::<i32>()));
        assert_eq!(computed.with(|sum| *sum), 6);
    }

    #[test]
    fn panic_keeps_value_dirty() {
        let source = Observable::new(1);
        let s = source.clone();
        let computed = Computed::new(move || {
            let v = s.get();
            assert!(v < 5, "too large");
            v
        });
        assert_eq!(computed.get(), 1);

        source.set(9).unwrap();
        let c = computed.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c.get()));
        assert!(result.is_err());
        assert!(computed.is_dirty());

        source.set(2).unwrap();
        assert_eq!(computed.get(), 2);
    }

    #[test]
    fn dropped_computed_unsubscribes() {
        let source = Observable::new(1);
        let s = source.clone();
        let computed = Computed::new(move || s.get());
        let _ = computed.get();
        assert_eq!(source.observer_count(), 1);
        drop(computed);
        assert_eq!(source.observer_count(), 0);
    }

    #[traced_test]
    #[test]
    fn warns_when_read_outside_reaction_if_required() {
        configure(EngineConfig {
            computed_requires_reaction: true,
            ..EngineConfig::default()
        })
        .unwrap();
        let computed = Computed::named("total", || 3);
        assert_eq!(computed.get(), 3);
        assert!(logs_contain("computed value read outside a reaction"));
    }
}
