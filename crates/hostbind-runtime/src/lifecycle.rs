#![forbid(unsafe_code)]

//! Driving a host's computations from its lifecycle.
//!
//! [`Bound`] owns a host, its [`Binder`] and an explicit [`Phase`]:
//!
//! ```text
//! Constructed --enable--> Active --disable--> Inactive --enable--> Active
//! Constructed/Active/Inactive --destroy--> Destroying --destruct--> Destroyed
//! ```
//!
//! | Event      | From                              | Effect                                        |
//! |------------|-----------------------------------|-----------------------------------------------|
//! | `enable`   | Constructed, Inactive             | `on_enable`, bind, -> Active                  |
//! | `enable`   | Active                            | no-op                                         |
//! | `disable`  | Active                            | dispose disable scope, -> Inactive, `on_disable` |
//! | `disable`  | Constructed, Inactive, Destroying | dispose disable scope (no-op if empty)        |
//! | `destroy`  | Constructed, Active, Inactive     | -> Destroying, dispose all, `on_destroy`      |
//! | `destroy`  | Destroying, Destroyed             | no-op                                         |
//! | `destruct` | any but Destroyed                 | dispose all, host `destruct` in an action, -> Destroyed |
//! | `destruct` | Destroyed                         | no-op                                         |
//!
//! # Invariants
//!
//! 1. After `destroy` or `destruct` returns, the host has no live
//!    subscriptions.
//! 2. Events that would revive a destroyed host are rejected with
//!    [`LifecycleError::Destroyed`].
//! 3. The host's own teardown always runs inside an action.
//!
//! # Failure Modes
//!
//! - A computation panicking during `enable` propagates; the phase is
//!   already `Active` and the computations activated before it stay live.
//! - A failing host `destruct` is reported after the phase reaches
//!   `Destroyed`; subscriptions are gone either way.

use std::rc::{Rc, Weak};

use hostbind_reactive::{ReactiveError, run_in_action};

use crate::binder::{Binder, Trigger};
use crate::collect::collect;
use crate::declare::{Class, HostRef, Level};
use crate::error::LifecycleError;

/// Host-side lifecycle hooks. Every hook defaults to doing nothing.
pub trait Lifecycle {
    fn on_enable(&self) {}

    fn on_disable(&self) {}

    fn on_destroy(&self) {}

    /// Final teardown of the host's own state. Runs inside an action.
    fn destruct(&self) -> Result<(), ReactiveError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Constructed,
    Active,
    Inactive,
    Destroying,
    Destroyed,
}

impl Phase {
    #[must_use]
    pub const fn is_destroyed(self) -> bool {
        matches!(self, Self::Destroying | Self::Destroyed)
    }
}

/// A host bound to its declared computations.
pub struct Bound<H: Class + Lifecycle> {
    host: Rc<H>,
    binder: Binder,
    phase: Phase,
}

impl<H: Class + Lifecycle> Bound<H> {
    /// Collect the host's computations. Nothing is activated yet.
    pub fn new(host: H) -> Self {
        if let Err(err) = crate::init() {
            tracing::warn!(class = H::NAME, %err, "engine not configured with host defaults");
        }
        let host = Rc::new(host);
        let level: Weak<dyn Level> = Rc::<H>::downgrade(&host);
        let collected = collect(&*host);
        let binder = Binder::new(H::NAME, HostRef::new(level), collected);
        Self {
            host,
            binder,
            phase: Phase::Constructed,
        }
    }

    #[must_use]
    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    fn destroyed(event: &'static str) -> LifecycleError {
        LifecycleError::Destroyed {
            class: H::NAME,
            event,
        }
    }

    pub fn enable(&mut self) -> Result<(), LifecycleError> {
        match self.phase {
            Phase::Active => Ok(()),
            Phase::Destroying | Phase::Destroyed => Err(Self::destroyed("enable")),
            Phase::Constructed | Phase::Inactive => {
                let _span = tracing::debug_span!("enable", class = H::NAME).entered();
                self.host.on_enable();
                self.phase = Phase::Active;
                self.binder.bind_render(Trigger::Enable);
                Ok(())
            }
        }
    }

    pub fn disable(&mut self) -> Result<(), LifecycleError> {
        match self.phase {
            Phase::Destroyed => Err(Self::destroyed("disable")),
            Phase::Active => {
                let _span = tracing::debug_span!("disable", class = H::NAME).entered();
                self.binder.dispose_disable_scope();
                self.phase = Phase::Inactive;
                self.host.on_disable();
                Ok(())
            }
            Phase::Constructed | Phase::Inactive | Phase::Destroying => {
                self.binder.dispose_disable_scope();
                Ok(())
            }
        }
    }

    /// Begin destruction. Idempotent.
    pub fn destroy(&mut self) {
        if self.phase.is_destroyed() {
            return;
        }
        let _span = tracing::debug_span!("destroy", class = H::NAME).entered();
        self.phase = Phase::Destroying;
        self.binder.dispose_all();
        self.host.on_destroy();
    }

    /// Finish destruction: dispose everything, then run the host's
    /// [`Lifecycle::destruct`] inside an action. Idempotent.
    pub fn destruct(&mut self) -> Result<(), LifecycleError> {
        if self.phase == Phase::Destroyed {
            return Ok(());
        }
        let _span = tracing::debug_span!("destruct", class = H::NAME).entered();
        self.binder.dispose_all();
        let host = Rc::clone(&self.host);
        let result = run_in_action(|| host.destruct());
        self.phase = Phase::Destroyed;
        result.map_err(LifecycleError::from)
    }

    /// Bind outside the normal enable path.
    ///
    /// A first bind with a non-default trigger makes every transient
    /// computation persistent.
    pub fn bind_render(&mut self, trigger: Trigger) -> Result<(), LifecycleError> {
        if self.phase.is_destroyed() {
            return Err(Self::destroyed("bind_render"));
        }
        self.binder.bind_render(trigger);
        Ok(())
    }
}

impl<H: Class + Lifecycle + std::fmt::Debug> std::fmt::Debug for Bound<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bound")
            .field("host", &self.host)
            .field("phase", &self.phase)
            .field("binder", &self.binder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::Declarations;
    use hostbind_reactive::{AutorunOptions, Observable, live_reactions};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Lamp {
        lit: Observable<bool>,
        hooks: RefCell<Vec<&'static str>>,
    }

    impl Class for Lamp {
        const NAME: &'static str = "Lamp";

        fn declare(decl: &mut Declarations<Self>) {
            decl.autorun("glow", |lamp| {
                let _ = lamp.lit.get();
            })
            .autorun_with("wiring", AutorunOptions::kept(), |lamp| {
                let _ = lamp.lit.get();
            });
        }
    }

    impl Lifecycle for Lamp {
        fn on_enable(&self) {
            self.hooks.borrow_mut().push("enable");
        }

        fn on_disable(&self) {
            self.hooks.borrow_mut().push("disable");
        }

        fn on_destroy(&self) {
            self.hooks.borrow_mut().push("destroy");
        }

        fn destruct(&self) -> Result<(), ReactiveError> {
            self.hooks.borrow_mut().push("destruct");
            self.lit.set(false)
        }
    }

    #[test]
    fn new_configures_engine_and_binds_nothing() {
        let bound = Bound::new(Lamp::default());
        assert_eq!(
            hostbind_reactive::configured(),
            Some(hostbind_reactive::EngineConfig::host_defaults())
        );
        assert_eq!(bound.phase(), Phase::Constructed);
        assert_eq!(bound.binder().live_count(), 0);
    }

    #[test]
    fn full_cycle_calls_hooks_in_order() {
        let mut bound = Bound::new(Lamp::default());
        bound.enable().unwrap();
        bound.enable().unwrap();
        bound.disable().unwrap();
        bound.enable().unwrap();
        bound.destroy();
        bound.destruct().unwrap();
        assert_eq!(
            *bound.host().hooks.borrow(),
            vec!["enable", "disable", "enable", "destroy", "destruct"]
        );
        assert_eq!(bound.phase(), Phase::Destroyed);
        assert_eq!(live_reactions(), 0);
    }

    #[test]
    fn destroyed_host_rejects_revival() {
        let mut bound = Bound::new(Lamp::default());
        bound.destroy();
        assert_eq!(
            bound.enable(),
            Err(LifecycleError::Destroyed {
                class: "Lamp",
                event: "enable"
            })
        );
        assert!(bound.bind_render(Trigger::manual()).is_err());
        assert_eq!(bound.disable(), Ok(()));

        bound.destruct().unwrap();
        assert!(bound.disable().is_err());
        bound.destroy();
        bound.destruct().unwrap();
        assert_eq!(
            bound.host().hooks.borrow().iter().filter(|h| **h == "destruct").count(),
            1
        );
    }

    #[test]
    fn inactive_to_destroyed_directly() {
        let mut bound = Bound::new(Lamp::default());
        bound.enable().unwrap();
        bound.disable().unwrap();
        bound.destruct().unwrap();
        assert_eq!(bound.phase(), Phase::Destroyed);
        assert_eq!(bound.binder().live_count(), 0);
    }

    #[test]
    fn drop_disposes_subscriptions() {
        {
            let mut bound = Bound::new(Lamp::default());
            bound.enable().unwrap();
            assert_eq!(live_reactions(), 2);
        }
        assert_eq!(live_reactions(), 0);
    }

    #[test]
    fn disable_before_enable_is_noop() {
        let mut bound = Bound::new(Lamp::default());
        bound.disable().unwrap();
        assert_eq!(bound.phase(), Phase::Constructed);
        assert!(bound.host().hooks.borrow().is_empty());
    }
}
