#![forbid(unsafe_code)]

//! Activation and disposal of a host's collected computations.
//!
//! The [`Binder`] owns the four partitions produced by the chain collector
//! and two lazily created [`DisposerScope`]s: the disable scope for transient
//! computations and the destroy scope for persistent ones.
//!
//! # Invariants
//!
//! 1. A name has at most one live disposer, in the scope chosen by its
//!    `keep` flag. Activating a name that is already live is a no-op.
//! 2. Descriptors only move transient -> persistent, and only on a first
//!    bind forced by a non-default [`Trigger`].
//! 3. `dispose_all` always runs the disable-scope disposal first and clears
//!    the activation marker.
//!
//! # Failure Modes
//!
//! - A computation panicking during activation propagates to the caller of
//!   [`Binder::bind_render`]. Computations activated earlier in the same
//!   pass stay live; the activation marker is not recorded.

use std::rc::Rc;

use hostbind_reactive::{AutorunOptions, ReactionOptions, autorun, untracked};

use crate::collect::{Collected, DescriptorMap};
use crate::declare::HostRef;
use crate::registry::{Computation, Descriptor};
use crate::scope::DisposerScope;

/// What caused a bind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The host's enable transition.
    #[default]
    Enable,
    /// Any other caller; the label is diagnostic only.
    Manual(&'static str),
}

impl Trigger {
    #[must_use]
    pub const fn manual() -> Self {
        Self::Manual("manual")
    }

    #[must_use]
    pub const fn is_enable(self) -> bool {
        matches!(self, Self::Enable)
    }
}

pub struct Binder {
    class: &'static str,
    host: HostRef,
    transient_autoruns: DescriptorMap,
    persistent_autoruns: DescriptorMap,
    transient_reactions: DescriptorMap,
    persistent_reactions: DescriptorMap,
    disable_scope: Option<DisposerScope>,
    destroy_scope: Option<DisposerScope>,
    activation: Option<Trigger>,
}

impl Binder {
    #[must_use]
    pub fn new(class: &'static str, host: HostRef, collected: Collected) -> Self {
        let Collected {
            transient_autoruns,
            persistent_autoruns,
            transient_reactions,
            persistent_reactions,
        } = collected;
        Self {
            class,
            host,
            transient_autoruns,
            persistent_autoruns,
            transient_reactions,
            persistent_reactions,
            disable_scope: None,
            destroy_scope: None,
            activation: None,
        }
    }

    /// Activate whatever is not yet live.
    ///
    /// The first bind activates every partition. Later binds only re-create
    /// the transient computations torn down by the last disable.
    pub fn bind_render(&mut self, trigger: Trigger) {
        let _span = tracing::debug_span!("bind_render", class = self.class, ?trigger).entered();

        if self.activation.is_some() {
            self.activate_all(&self.transient_autoruns.clone());
            self.activate_all(&self.transient_reactions.clone());
            return;
        }

        if !trigger.is_enable() {
            self.promote_transient(trigger);
        }
        self.activate_all(&self.transient_autoruns.clone());
        self.activate_all(&self.persistent_autoruns.clone());
        self.activate_all(&self.transient_reactions.clone());
        self.activate_all(&self.persistent_reactions.clone());
        self.activation = Some(trigger);
    }

    fn promote_transient(&mut self, trigger: Trigger) {
        let promoted = self.transient_autoruns.len() + self.transient_reactions.len();
        for (name, mut descriptor) in self.transient_autoruns.drain(..) {
            descriptor.set_keep(true);
            self.persistent_autoruns.insert(name, descriptor);
        }
        for (name, mut descriptor) in self.transient_reactions.drain(..) {
            descriptor.set_keep(true);
            self.persistent_reactions.insert(name, descriptor);
        }
        if promoted > 0 {
            tracing::debug!(
                class = self.class,
                ?trigger,
                promoted,
                "forced first bind; transient computations promoted to persistent"
            );
        }
    }

    fn activate_all(&mut self, descriptors: &DescriptorMap) {
        for descriptor in descriptors.values() {
            self.activate(descriptor);
        }
    }

    fn scope_for(&mut self, keep: bool) -> &mut DisposerScope {
        if keep {
            self.destroy_scope
                .get_or_insert_with(|| DisposerScope::new("destroy"))
        } else {
            self.disable_scope
                .get_or_insert_with(|| DisposerScope::new("disable"))
        }
    }

    fn activate(&mut self, descriptor: &Descriptor) {
        let name = descriptor.name();
        let keep = descriptor.keep();
        if self.scope_for(keep).contains(name) {
            return;
        }

        let label = format!("{}.{}", self.class, name);
        let disposer = match descriptor.computation() {
            Computation::Autorun { options, run } => {
                let run = Rc::clone(run);
                let host = self.host.clone();
                autorun(
                    move |_| run(&host),
                    AutorunOptions::named(label).merge(options),
                )
            }
            Computation::Reaction { options, produce } => {
                let Some(pending) = untracked(|| produce(&self.host)) else {
                    tracing::warn!(class = self.class, name, "host dropped before activation");
                    return;
                };
                let defaults = ReactionOptions::named(label)
                    .with_fire_immediately(true)
                    .merge(options);
                pending.install(&defaults)
            }
        };
        tracing::trace!(
            class = self.class,
            name,
            keep,
            kind = ?descriptor.kind(),
            "computation activated"
        );
        self.scope_for(keep).hold(name, disposer);
    }

    /// Dispose every transient subscription. No-op when none are live.
    pub fn dispose_disable_scope(&mut self) {
        if let Some(scope) = self.disable_scope.as_mut() {
            scope.clear();
        }
    }

    /// Dispose everything and forget the activation.
    pub fn dispose_all(&mut self) {
        self.dispose_disable_scope();
        if let Some(scope) = self.destroy_scope.as_mut() {
            scope.clear();
        }
        self.activation = None;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn class(&self) -> &'static str {
        self.class
    }

    #[must_use]
    pub fn activation(&self) -> Option<Trigger> {
        self.activation
    }

    /// Live transient subscriptions, in activation order.
    #[must_use]
    pub fn disable_scope_names(&self) -> Vec<&'static str> {
        self.disable_scope
            .as_ref()
            .map(DisposerScope::names)
            .unwrap_or_default()
    }

    /// Live persistent subscriptions, in activation order.
    #[must_use]
    pub fn destroy_scope_names(&self) -> Vec<&'static str> {
        self.destroy_scope
            .as_ref()
            .map(DisposerScope::names)
            .unwrap_or_default()
    }

    /// Transient computation names, autoruns first.
    #[must_use]
    pub fn transient_names(&self) -> Vec<&'static str> {
        self.transient_autoruns
            .keys()
            .chain(self.transient_reactions.keys())
            .copied()
            .collect()
    }

    /// Persistent computation names, autoruns first.
    #[must_use]
    pub fn persistent_names(&self) -> Vec<&'static str> {
        self.persistent_autoruns
            .keys()
            .chain(self.persistent_reactions.keys())
            .copied()
            .collect()
    }

    #[must_use]
    pub fn is_persistent(&self, name: &str) -> bool {
        let descriptor = self
            .persistent_autoruns
            .get(name)
            .or_else(|| self.persistent_reactions.get(name));
        descriptor.is_some_and(Descriptor::keep)
    }

    /// Number of live subscriptions across both scopes.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.disable_scope.as_ref().map_or(0, DisposerScope::len)
            + self.destroy_scope.as_ref().map_or(0, DisposerScope::len)
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder")
            .field("class", &self.class)
            .field("transient", &self.transient_names())
            .field("persistent", &self.persistent_names())
            .field("disable_scope", &self.disable_scope_names())
            .field("destroy_scope", &self.destroy_scope_names())
            .field("activation", &self.activation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::collect;
    use crate::declare::{Class, Declarations, Level, react};
    use hostbind_reactive::{Observable, live_reactions};
    use std::cell::{Cell, RefCell};
    use std::rc::Weak;

    struct Panel {
        count: Observable<i32>,
        renders: Cell<u32>,
        effects: RefCell<Vec<i32>>,
    }

    impl Class for Panel {
        const NAME: &'static str = "Panel";

        fn declare(decl: &mut Declarations<Self>) {
            decl.autorun("render", |panel| {
                let _ = panel.count.get();
                panel.renders.set(panel.renders.get() + 1);
            })
            .autorun_with("audit", AutorunOptions::kept(), |panel| {
                let _ = panel.count.get();
            })
            .reactor("onCount", |panel| {
                let count = panel.count.clone();
                react(move |_| count.get(), |_, _| {})
            })
            .reactor_on(
                "log",
                ReactionOptions::kept(),
                |panel| panel.count.get(),
                |panel, value| panel.effects.borrow_mut().push(*value),
            );
        }
    }

    fn bound() -> (Rc<Panel>, Binder) {
        let panel = Rc::new(Panel {
            count: Observable::new(0),
            renders: Cell::new(0),
            effects: RefCell::new(Vec::new()),
        });
        let weak: Weak<dyn Level> = Rc::<Panel>::downgrade(&panel);
        let binder = Binder::new(Panel::NAME, HostRef::new(weak), collect(&*panel));
        (panel, binder)
    }

    #[test]
    fn first_bind_activates_everything() {
        let (panel, mut binder) = bound();
        binder.bind_render(Trigger::Enable);

        assert_eq!(binder.disable_scope_names(), vec!["render", "onCount"]);
        assert_eq!(binder.destroy_scope_names(), vec!["audit", "log"]);
        assert_eq!(binder.activation(), Some(Trigger::Enable));
        assert_eq!(panel.renders.get(), 1);
        assert_eq!(*panel.effects.borrow(), vec![0], "fires immediately");
        assert_eq!(live_reactions(), 4);
    }

    #[test]
    fn rebind_is_idempotent() {
        let (panel, mut binder) = bound();
        binder.bind_render(Trigger::Enable);
        binder.bind_render(Trigger::Enable);
        binder.bind_render(Trigger::manual());
        assert_eq!(binder.live_count(), 4);
        assert_eq!(panel.renders.get(), 1);
        assert_eq!(binder.activation(), Some(Trigger::Enable));
    }

    #[test]
    fn disable_scope_cycle() {
        let (panel, mut binder) = bound();
        binder.bind_render(Trigger::Enable);
        binder.dispose_disable_scope();
        assert!(binder.disable_scope_names().is_empty());
        assert_eq!(binder.destroy_scope_names(), vec!["audit", "log"]);

        panel.count.set(1).unwrap();
        assert_eq!(panel.renders.get(), 1, "render is disposed");
        assert_eq!(*panel.effects.borrow(), vec![0, 1], "log is kept");

        binder.bind_render(Trigger::Enable);
        assert_eq!(binder.disable_scope_names(), vec!["render", "onCount"]);
        assert_eq!(panel.renders.get(), 2);
        assert_eq!(*panel.effects.borrow(), vec![0, 1], "log not re-subscribed");
    }

    #[test]
    fn forced_first_bind_promotes() {
        let (_panel, mut binder) = bound();
        binder.bind_render(Trigger::manual());

        assert!(binder.transient_names().is_empty());
        assert_eq!(
            binder.persistent_names(),
            vec!["audit", "render", "log", "onCount"]
        );
        assert!(binder.is_persistent("render"));
        assert!(binder.is_persistent("onCount"));
        assert!(binder.disable_scope_names().is_empty());
        assert_eq!(binder.destroy_scope_names().len(), 4);

        binder.dispose_disable_scope();
        assert_eq!(binder.live_count(), 4);
    }

    #[test]
    fn dispose_all_clears_marker_and_is_idempotent() {
        let (panel, mut binder) = bound();
        binder.bind_render(Trigger::Enable);
        binder.dispose_all();
        binder.dispose_all();
        assert_eq!(binder.live_count(), 0);
        assert_eq!(binder.activation(), None);
        assert_eq!(live_reactions(), 0);
        assert_eq!(panel.count.observer_count(), 0);
    }

    #[test]
    fn dispose_before_any_bind_is_noop() {
        let (_panel, mut binder) = bound();
        binder.dispose_disable_scope();
        binder.dispose_all();
        assert!(binder.disable_scope_names().is_empty());
        assert!(binder.destroy_scope_names().is_empty());
    }

    #[test]
    fn reactions_are_named_after_host_class() {
        let (_panel, mut binder) = bound();
        binder.bind_render(Trigger::Enable);
        let dbg = format!("{binder:?}");
        assert!(dbg.contains("Panel"));
        assert!(dbg.contains("onCount"));
    }

    #[test]
    fn dropped_host_skips_reactions() {
        let (panel, mut binder) = bound();
        drop(panel);
        binder.bind_render(Trigger::Enable);
        assert_eq!(binder.disable_scope_names(), vec!["render"]);
        assert_eq!(binder.destroy_scope_names(), vec!["audit"]);
    }
}
