#![forbid(unsafe_code)]

//! Shared, version-tracked observable values.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per write that changes the value.
//! 2. Writing a value equal to the current one is a no-op: no version bump,
//!    no notifications.
//! 3. Reads inside a reaction or computed value subscribe that derivation;
//!    `get_untracked` never subscribes.
//! 4. Write permission is checked before equality, so a forbidden write is
//!    reported even when it would not change anything.
//!
//! # Failure Modes
//!
//! - Write outside an action while the engine enforces actions:
//!   [`ReactiveError::MutationOutsideAction`], value unchanged.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::check_mutation;
use crate::error::ReactiveError;
use crate::runtime::Atom;

struct ObservableInner<T> {
    atom: Rc<Atom>,
    value: RefCell<T>,
    version: Cell<u64>,
}

/// A shared mutable value whose reads are tracked by reactions.
///
/// Cloning an `Observable` creates a new handle to the **same** value.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.inner.atom.name())
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::build(None, value)
    }

    /// Create an observable with a diagnostic name.
    #[must_use]
    pub fn named(name: impl Into<String>, value: T) -> Self {
        Self::build(Some(name.into()), value)
    }

    fn build(name: Option<String>, value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                atom: Atom::new(name, "Observable"),
                value: RefCell::new(value),
                version: Cell::new(0),
            }),
        }
    }

    /// Current value; subscribes the running derivation.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.atom.report_observed();
        self.inner.value.borrow().clone()
    }

    /// Current value without subscribing anything.
    #[must_use]
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value; subscribes the running derivation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.atom.report_observed();
        f(&self.inner.value.borrow())
    }

    /// Replace the value and notify observers if it changed.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        check_mutation(&self.inner.atom)?;
        if *self.inner.value.borrow() == value {
            return Ok(());
        }
        *self.inner.value.borrow_mut() = value;
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.atom.report_changed();
        Ok(())
    }

    /// Modify a copy of the value in place, then [`set`](Self::set) it.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), ReactiveError> {
        let mut next = self.get_untracked();
        f(&mut next);
        self.set(next)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of live derivations currently subscribed.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.atom.observer_count()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.atom.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AutorunOptions, EngineConfig, autorun, configure, run_in_action};

    #[test]
    fn get_set_and_version() {
        let obs = Observable::new(1);
        assert_eq!(obs.get(), 1);
        assert_eq!(obs.version(), 0);

        obs.set(2).unwrap();
        assert_eq!(obs.get(), 2);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn equal_write_is_noop() {
        let obs = Observable::new(String::from("a"));
        obs.set("a".to_string()).unwrap();
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn update_applies_closure() {
        let obs = Observable::new(vec![1, 2]);
        obs.update(|v| v.push(3)).unwrap();
        assert_eq!(obs.get(), vec![1, 2, 3]);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn clone_shares_state() {
        let a = Observable::new(0);
        let b = a.clone();
        b.set(9).unwrap();
        assert_eq!(a.get(), 9);
    }

    #[test]
    fn with_borrows() {
        let obs = Observable::new(vec![1, 2, 3]);
        assert_eq!(obs.with(|v| v.iter().sum::<i32>()), 6);
    }

    #[test]
    fn observed_write_outside_action_is_rejected() {
        configure(EngineConfig::host_defaults()).unwrap();
        let obs = Observable::named("hp", 10);

        // Unobserved: allowed.
        obs.set(11).unwrap();

        let o = obs.clone();
        let disposer = autorun(
            move |_| {
                let _ = o.get();
            },
            AutorunOptions::new(),
        );
        assert_eq!(
            obs.set(12),
            Err(ReactiveError::MutationOutsideAction {
                name: "hp".to_string()
            })
        );
        assert_eq!(obs.get_untracked(), 11);

        run_in_action(|| obs.set(12)).unwrap();
        assert_eq!(obs.get_untracked(), 12);
        disposer.dispose();

        obs.set(13).unwrap();
    }

    #[test]
    fn always_mode_rejects_every_write() {
        configure(EngineConfig {
            enforce_actions: crate::EnforceActions::Always,
            ..EngineConfig::default()
        })
        .unwrap();
        let obs = Observable::new(0);
        assert!(obs.set(1).is_err());
        run_in_action(|| obs.set(1)).unwrap();
        assert_eq!(obs.get_untracked(), 1);
    }

    proptest::proptest! {
        #[test]
        fn version_counts_effective_writes(
            values in proptest::collection::vec(0i32..4, 0..50)
        ) {
            let obs = Observable::new(0);
            let seen = Rc::new(RefCell::new(Vec::new()));
            let (o, s) = (obs.clone(), Rc::clone(&seen));
            let disposer = autorun(move |_| s.borrow_mut().push(o.get()), AutorunOptions::new());

            let mut expected = vec![0];
            for value in values {
                obs.set(value).unwrap();
                if expected.last() != Some(&value) {
                    expected.push(value);
                }
            }
            proptest::prop_assert_eq!(obs.version(), expected.len() as u64 - 1);
            let runs = seen.borrow().clone();
            proptest::prop_assert_eq!(runs, expected);
            disposer.dispose();
        }
    }

    #[test]
    fn debug_format() {
        let obs = Observable::named("score", 42);
        let dbg = format!("{obs:?}");
        assert!(dbg.contains("score"));
        assert!(dbg.contains("42"));
    }
}
