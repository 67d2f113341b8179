#![forbid(unsafe_code)]

//! Autoruns, explicit reactions and their disposers.
//!
//! Both kinds share one core: a body that runs inside a tracking frame and an
//! implicit action, re-scheduled whenever something it read changes. An
//! explicit reaction's body evaluates the expression (tracked) and runs the
//! effect (untracked) only when the expression's value changed.
//!
//! # Invariants
//!
//! 1. A live reaction is listed in the runtime's live table exactly until its
//!    disposer (or handle) disposes it.
//! 2. Disposal is synchronous and idempotent: after `dispose()` returns the
//!    body never runs again.
//! 3. Dependencies are replaced wholesale after every successful run.
//!
//! # Failure Modes
//!
//! - Body panics with error boundaries disabled: the panic propagates to the
//!   code that triggered the run. A reaction that panics on its first run is
//!   disposed before the panic leaves [`autorun`] / [`reaction`]. Reactions
//!   queued behind the panicking one stay scheduled and run on the next
//!   drain.
//! - Body panics with error boundaries enabled: logged, the reaction keeps the
//!   dependencies of its last successful run.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::config::config;
use crate::options::{AutorunOptions, ReactionOptions};
use crate::runtime::{self, ActionGuard, Atom, Derivation, NodeId};

type Body = Box<dyn FnMut(&ReactionHandle)>;

pub(crate) struct ReactionCore {
    id: NodeId,
    name: String,
    this: Weak<ReactionCore>,
    body: RefCell<Option<Body>>,
    deps: RefCell<Vec<Rc<Atom>>>,
    scheduled: Cell<bool>,
    disposed: Cell<bool>,
}

impl ReactionCore {
    fn spawn(name: Option<String>, kind: &str, body: Body) -> Disposer {
        let id = runtime::next_id();
        let name = name.unwrap_or_else(|| format!("{kind}@{id}"));
        let core = Rc::new_cyclic(|this| ReactionCore {
            id,
            name,
            this: this.clone(),
            body: RefCell::new(Some(body)),
            deps: RefCell::new(Vec::new()),
            scheduled: Cell::new(false),
            disposed: Cell::new(false),
        });
        runtime::register_live(Rc::clone(&core));
        tracing::trace!(reaction = %core.name, "reaction created");

        core.schedule();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(runtime::flush)) {
            core.dispose();
            panic::resume_unwind(payload);
        }
        Disposer { core }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self) {
        if self.disposed.get() || self.scheduled.replace(true) {
            return;
        }
        if let Some(this) = self.this.upgrade() {
            runtime::enqueue(this);
        }
    }

    pub(crate) fn unschedule(&self) {
        self.scheduled.set(false);
    }

    pub(crate) fn run(self: &Rc<Self>) {
        self.scheduled.set(false);
        if self.disposed.get() {
            return;
        }
        // Taken out while running; a re-entrant run finds nothing to do.
        let Some(mut body) = self.body.borrow_mut().take() else {
            return;
        };
        let handle = ReactionHandle {
            core: Rc::downgrade(self),
        };

        let outcome = {
            let _action = ActionGuard::enter();
            panic::catch_unwind(AssertUnwindSafe(|| runtime::track(|| body(&handle))))
        };

        if self.disposed.get() {
            drop(body);
        } else {
            *self.body.borrow_mut() = Some(body);
        }

        match outcome {
            Ok(((), deps)) => {
                if !self.disposed.get() {
                    let observer: Weak<dyn Derivation> = self.this.clone();
                    let previous = self.deps.replace(Vec::new());
                    runtime::rebind_dependencies(self.id, &observer, previous, &deps);
                    *self.deps.borrow_mut() = deps;
                }
            }
            Err(payload) => {
                if config().disable_error_boundaries {
                    panic::resume_unwind(payload);
                }
                tracing::error!(
                    reaction = %self.name,
                    panic = panic_message(payload.as_ref()),
                    "reaction panicked; keeping previous dependencies"
                );
            }
        }
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        for atom in self.deps.take() {
            atom.remove_observer(self.id);
        }
        let body = self.body.borrow_mut().take();
        runtime::unregister_live(self.id);
        drop(body);
        tracing::trace!(reaction = %self.name, "reaction disposed");
    }
}

impl Derivation for ReactionCore {
    fn on_stale(self: Rc<Self>) {
        self.schedule();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// Public handles
// ---------------------------------------------------------------------------

/// Ends one subscription when called.
///
/// Dropping a `Disposer` does **not** dispose: the reaction stays subscribed
/// until [`dispose`](Disposer::dispose) runs.
#[must_use = "the reaction stays subscribed until its disposer is called"]
pub struct Disposer {
    core: Rc<ReactionCore>,
}

impl Disposer {
    /// Unsubscribe permanently. Idempotent.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }

    /// Diagnostic name of the reaction.
    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("name", &self.core.name)
            .field("disposed", &self.core.disposed.get())
            .finish()
    }
}

/// Handle passed to a running body.
pub struct ReactionHandle {
    core: Weak<ReactionCore>,
}

impl ReactionHandle {
    #[must_use]
    pub fn name(&self) -> String {
        self.core
            .upgrade()
            .map(|core| core.name.clone())
            .unwrap_or_default()
    }

    /// Dispose the running reaction from inside its own body.
    pub fn dispose(&self) {
        if let Some(core) = self.core.upgrade() {
            core.dispose();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.core
            .upgrade()
            .is_none_or(|core| core.disposed.get())
    }
}

impl std::fmt::Debug for ReactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactionHandle")
            .field("name", &self.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Run `body` now and again whenever anything it read changes.
pub fn autorun(
    mut body: impl FnMut(&ReactionHandle) + 'static,
    options: AutorunOptions,
) -> Disposer {
    ReactionCore::spawn(
        options.name,
        "Autorun",
        Box::new(move |handle: &ReactionHandle| body(handle)),
    )
}

/// Track `expression`; run `effect` when its value changes.
///
/// The effect runs untracked and inside an action. With
/// `fire_immediately` it also runs once with the initial value.
pub fn reaction<T, E, F>(mut expression: E, mut effect: F, options: ReactionOptions) -> Disposer
where
    T: PartialEq + 'static,
    E: FnMut(&ReactionHandle) -> T + 'static,
    F: FnMut(&T, &ReactionHandle) + 'static,
{
    let fire_immediately = options.fires_immediately();
    let mut previous: Option<T> = None;
    ReactionCore::spawn(
        options.name,
        "Reaction",
        Box::new(move |handle: &ReactionHandle| {
            let value = expression(handle);
            let fire = match &previous {
                None => fire_immediately,
                Some(previous) => *previous != value,
            };
            if fire {
                runtime::untracked(|| effect(&value, handle));
            }
            previous = Some(value);
        }),
    )
}

/// Number of reactions currently subscribed on this thread.
#[must_use]
pub fn live_reactions() -> usize {
    runtime::live_count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
