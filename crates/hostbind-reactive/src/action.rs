#![forbid(unsafe_code)]

//! Actions, batches and untracked reads.
//!
//! An action is a batch that also grants mutation permission. Reactions made
//! stale inside either run once, when the outermost batch closes.

use crate::runtime::{self, ActionGuard, BatchGuard};

/// Run `f` with observable writes permitted and notifications batched.
///
/// Nested actions flush only when the outermost one returns. The action
/// ends (and pending reactions run) even if `f` returns an error value;
/// on panic the pending queue is left for the next flush.
pub fn run_in_action<R>(f: impl FnOnce() -> R) -> R {
    let _action = ActionGuard::enter();
    f()
}

/// Defer reactions until `f` returns, without granting mutation permission.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _batch = BatchGuard::enter();
    f()
}

/// Run `f` without subscribing the current derivation to anything it reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    runtime::untracked(f)
}

/// Whether an action is currently running on this thread.
#[must_use]
pub fn in_action() -> bool {
    runtime::in_action()
}

/// Whether some derivation is recording reads on this thread right now.
#[must_use]
pub fn is_tracking() -> bool {
    runtime::is_tracking()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AutorunOptions, EngineConfig, Observable, autorun, configure};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn action_returns_value_and_scopes_permission() {
        assert!(!in_action());
        let value = run_in_action(|| {
            assert!(in_action());
            run_in_action(in_action)
        });
        assert!(value);
        assert!(!in_action());
    }

    #[test]
    fn nested_actions_flush_once_at_outermost_exit() {
        let count = Observable::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (c, s) = (count.clone(), Rc::clone(&seen));
        let disposer = autorun(move |_| s.borrow_mut().push(c.get()), AutorunOptions::new());

        run_in_action(|| {
            count.set(1).unwrap();
            run_in_action(|| count.set(2).unwrap());
            assert_eq!(*seen.borrow(), vec![0], "still batched");
            count.set(3).unwrap();
        });
        assert_eq!(*seen.borrow(), vec![0, 3]);
        disposer.dispose();
    }

    #[test]
    fn batch_does_not_grant_permission() {
        configure(EngineConfig::host_defaults()).unwrap();
        let count = Observable::new(0);
        let c = count.clone();
        let disposer = autorun(
            move |_| {
                let _ = c.get();
            },
            AutorunOptions::new(),
        );
        let result = batch(|| count.set(1));
        assert!(result.is_err());
        disposer.dispose();
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let tracked = Observable::new(0);
        let ignored = Observable::new(0);
        let runs = Rc::new(Cell::new(0));

        let (t, i, r) = (tracked.clone(), ignored.clone(), Rc::clone(&runs));
        let disposer = autorun(
            move |_| {
                assert!(is_tracking());
                let _ = t.get();
                let _ = untracked(|| {
                    assert!(!is_tracking());
                    i.get()
                });
                r.set(r.get() + 1);
            },
            AutorunOptions::new(),
        );
        assert!(!is_tracking());
        ignored.set(1).unwrap();
        assert_eq!(runs.get(), 1);
        tracked.set(1).unwrap();
        assert_eq!(runs.get(), 2);
        disposer.dispose();
    }
}
