#![forbid(unsafe_code)]

//! Thread-local reactive runtime: dependency tracking, batching and the
//! pending-reaction queue.
//!
//! Every observable value owns an [`Atom`]. Derivations (reactions and
//! computed values) read atoms inside a tracking frame; the frame's contents
//! become the derivation's dependency set once the run completes. Writing an
//! observable reports the change on its atom, which marks every observer
//! stale inside a batch. When the outermost batch closes, the queue drains.
//!
//! # Invariants
//!
//! 1. An atom lists each observer at most once.
//! 2. A reaction sits in the pending queue at most once (`scheduled` flag).
//! 3. The queue only drains at batch depth zero and never re-entrantly.
//! 4. Tracking frames and batch depth are restored on unwind (RAII guards).
//! 5. A panic escaping a drain pass puts the pass's unrun reactions back at
//!    the head of the queue, so each still-scheduled reaction stays queued.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::config::EngineConfig;
use crate::reaction::ReactionCore;

pub(crate) type NodeId = u64;

/// Drain passes allowed before the pending queue is treated as divergent.
const MAX_REACTION_ITERATIONS: usize = 100;

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Something that re-evaluates when one of its dependencies changes.
pub(crate) trait Derivation {
    /// A dependency changed. Called inside a batch.
    fn on_stale(self: Rc<Self>);
}

struct Runtime {
    next_id: Cell<NodeId>,
    config: Cell<Option<EngineConfig>>,
    /// `None` frames come from `untracked` and swallow reads.
    tracking: RefCell<Vec<Option<Vec<Rc<Atom>>>>>,
    action_depth: Cell<u32>,
    batch_depth: Cell<u32>,
    flushing: Cell<bool>,
    pending: RefCell<Vec<Rc<ReactionCore>>>,
    live: RefCell<AHashMap<NodeId, Rc<ReactionCore>>>,
    reactions_created: Cell<bool>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            config: Cell::new(None),
            tracking: RefCell::new(Vec::new()),
            action_depth: Cell::new(0),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            pending: RefCell::new(Vec::new()),
            live: RefCell::new(AHashMap::new()),
            reactions_created: Cell::new(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/// Change-notification node shared by observables and computed values.
pub(crate) struct Atom {
    id: NodeId,
    name: String,
    observers: RefCell<Vec<(NodeId, Weak<dyn Derivation>)>>,
}

impl Atom {
    pub(crate) fn new(name: Option<String>, kind: &str) -> Rc<Self> {
        let id = next_id();
        Rc::new(Self {
            id,
            name: name.unwrap_or_else(|| format!("{kind}@{id}")),
            observers: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter(|(_, observer)| observer.strong_count() > 0)
            .count()
    }

    /// Record a read in the innermost tracking frame, if any.
    pub(crate) fn report_observed(self: &Rc<Self>) {
        RUNTIME.with(|rt| {
            if let Some(Some(frame)) = rt.tracking.borrow_mut().last_mut()
                && !frame.iter().any(|atom| atom.id == self.id)
            {
                frame.push(Rc::clone(self));
            }
        });
    }

    /// Mark every live observer stale. Drains the queue when no batch is open.
    pub(crate) fn report_changed(&self) {
        let observers: Vec<Rc<dyn Derivation>> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|(_, observer)| observer.strong_count() > 0);
            observers
                .iter()
                .filter_map(|(_, observer)| observer.upgrade())
                .collect()
        };
        if observers.is_empty() {
            return;
        }
        let _batch = BatchGuard::enter();
        for observer in observers {
            observer.on_stale();
        }
    }

    fn add_observer(&self, id: NodeId, observer: Weak<dyn Derivation>) {
        let mut observers = self.observers.borrow_mut();
        if !observers.iter().any(|(existing, _)| *existing == id) {
            observers.push((id, observer));
        }
    }

    pub(crate) fn remove_observer(&self, id: NodeId) {
        self.observers
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Swap a derivation's dependency set: unsubscribe from atoms it no longer
/// reads, subscribe to the new ones.
pub(crate) fn rebind_dependencies(
    id: NodeId,
    observer: &Weak<dyn Derivation>,
    previous: Vec<Rc<Atom>>,
    next: &[Rc<Atom>],
) {
    for atom in &previous {
        if !next.iter().any(|candidate| candidate.id == atom.id) {
            atom.remove_observer(id);
        }
    }
    for atom in next {
        atom.add_observer(id, observer.clone());
    }
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

struct FrameGuard {
    popped: bool,
}

impl FrameGuard {
    fn push(frame: Option<Vec<Rc<Atom>>>) -> Self {
        RUNTIME.with(|rt| rt.tracking.borrow_mut().push(frame));
        Self { popped: false }
    }

    fn finish(mut self) -> Vec<Rc<Atom>> {
        self.popped = true;
        RUNTIME
            .with(|rt| rt.tracking.borrow_mut().pop())
            .flatten()
            .unwrap_or_default()
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.popped {
            RUNTIME.with(|rt| rt.tracking.borrow_mut().pop());
        }
    }
}

/// Run `f` in a fresh tracking frame and return what it read.
pub(crate) fn track<R>(f: impl FnOnce() -> R) -> (R, Vec<Rc<Atom>>) {
    let frame = FrameGuard::push(Some(Vec::new()));
    let value = f();
    (value, frame.finish())
}

pub(crate) fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _frame = FrameGuard::push(None);
    f()
}

pub(crate) fn is_tracking() -> bool {
    RUNTIME.with(|rt| matches!(rt.tracking.borrow().last(), Some(Some(_))))
}

// ---------------------------------------------------------------------------
// Batches and actions
// ---------------------------------------------------------------------------

/// Defers queue draining until the outermost guard drops.
pub(crate) struct BatchGuard {
    _private: (),
}

impl BatchGuard {
    pub(crate) fn enter() -> Self {
        RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
        Self { _private: () }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = RUNTIME.with(|rt| {
            let depth = rt.batch_depth.get().saturating_sub(1);
            rt.batch_depth.set(depth);
            depth == 0
        });
        if outermost && !std::thread::panicking() {
            flush();
        }
    }
}

/// Grants mutation permission and opens a batch.
pub(crate) struct ActionGuard {
    _batch: BatchGuard,
}

impl ActionGuard {
    pub(crate) fn enter() -> Self {
        RUNTIME.with(|rt| rt.action_depth.set(rt.action_depth.get() + 1));
        Self {
            _batch: BatchGuard::enter(),
        }
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        // Runs before `_batch` drops, so reactions drained at batch exit do
        // not inherit this action's permission.
        RUNTIME.with(|rt| rt.action_depth.set(rt.action_depth.get().saturating_sub(1)));
    }
}

pub(crate) fn in_action() -> bool {
    RUNTIME.with(|rt| rt.action_depth.get() > 0)
}

// ---------------------------------------------------------------------------
// Reaction queue
// ---------------------------------------------------------------------------

pub(crate) fn enqueue(reaction: Rc<ReactionCore>) {
    RUNTIME.with(|rt| rt.pending.borrow_mut().push(reaction));
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.flushing.set(false));
    }
}

/// The reactions of one drain pass. If a run unwinds, the ones not yet run
/// go back to the head of the queue and keep their `scheduled` flag.
struct PassGuard {
    pass: Vec<Rc<ReactionCore>>,
    next: usize,
}

impl PassGuard {
    fn advance(&mut self) -> Option<Rc<ReactionCore>> {
        let reaction = self.pass.get(self.next).cloned()?;
        self.next += 1;
        Some(reaction)
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        if self.next >= self.pass.len() {
            return;
        }
        let unrun = self.pass.split_off(self.next);
        let _ = RUNTIME.try_with(|rt| {
            rt.pending.borrow_mut().splice(0..0, unrun);
        });
    }
}

/// Run pending reactions until the queue is empty.
pub(crate) fn flush() {
    let idle = RUNTIME.with(|rt| rt.batch_depth.get() == 0 && !rt.flushing.get());
    if !idle {
        return;
    }
    RUNTIME.with(|rt| rt.flushing.set(true));
    let _flushing = FlushGuard;

    let mut iterations = 0;
    loop {
        let pass: Vec<Rc<ReactionCore>> =
            RUNTIME.with(|rt| std::mem::take(&mut *rt.pending.borrow_mut()));
        if pass.is_empty() {
            break;
        }
        iterations += 1;
        if iterations > MAX_REACTION_ITERATIONS {
            let names: Vec<&str> = pass.iter().map(|reaction| reaction.name()).collect();
            tracing::error!(
                iterations = MAX_REACTION_ITERATIONS,
                ?names,
                "reactions did not converge to a stable state; dropping pending runs"
            );
            for reaction in &pass {
                reaction.unschedule();
            }
            break;
        }
        let mut pass = PassGuard { pass, next: 0 };
        while let Some(reaction) = pass.advance() {
            reaction.run();
        }
    }
}

/// Reactions waiting for the next drain.
#[cfg(test)]
pub(crate) fn pending_names() -> Vec<String> {
    RUNTIME.with(|rt| {
        rt.pending
            .borrow()
            .iter()
            .map(|reaction| reaction.name().to_string())
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Bookkeeping
// ---------------------------------------------------------------------------

pub(crate) fn next_id() -> NodeId {
    RUNTIME.with(|rt| {
        let id = rt.next_id.get();
        rt.next_id.set(id + 1);
        id
    })
}

pub(crate) fn register_live(reaction: Rc<ReactionCore>) {
    RUNTIME.with(|rt| {
        rt.reactions_created.set(true);
        rt.live.borrow_mut().insert(reaction.id(), reaction);
    });
}

pub(crate) fn unregister_live(id: NodeId) {
    // The runtime may already be torn down when a disposer runs during
    // thread exit; there is nothing left to unregister from then.
    let removed = RUNTIME.try_with(|rt| rt.live.borrow_mut().remove(&id));
    drop(removed);
}

pub(crate) fn live_count() -> usize {
    RUNTIME.with(|rt| rt.live.borrow().len())
}

pub(crate) fn reactions_created() -> bool {
    RUNTIME.with(|rt| rt.reactions_created.get())
}

pub(crate) fn stored_config() -> Option<EngineConfig> {
    RUNTIME.with(|rt| rt.config.get())
}

pub(crate) fn store_config(config: EngineConfig) {
    RUNTIME.with(|rt| rt.config.set(Some(config)));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
