#![forbid(unsafe_code)]

//! Declaring reactive computations on host classes.
//!
//! A host type implements [`Class`] and lists its computations in
//! [`Class::declare`]. Inheritance is explicit: a level that extends another
//! embeds it and returns it from [`Class::parent`].
//!
//! ```ignore
//! struct Base { score: Observable<u32> }
//!
//! impl Class for Base {
//!     const NAME: &'static str = "Base";
//!
//!     fn declare(decl: &mut Declarations<Self>) {
//!         decl.reactor("onScore", |base| {
//!             let score = base.score.clone();
//!             react(move |_| score.get(), |score, _| tracing::info!(score))
//!         });
//!     }
//! }
//!
//! struct Derived { base: Base, health: Observable<u32> }
//!
//! impl Class for Derived {
//!     const NAME: &'static str = "Derived";
//!
//!     fn declare(decl: &mut Declarations<Self>) {
//!         decl.autorun_with("onHealth", AutorunOptions::kept(), |derived| {
//!             let _ = derived.health.get();
//!         });
//!     }
//!
//!     fn parent(&self) -> Option<&dyn Level> {
//!         Some(&self.base)
//!     }
//! }
//! ```
//!
//! Computations are stored type-erased. When one runs it receives a
//! [`HostRef`], which finds the level that declared it by walking the live
//! host's parent links.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use hostbind_reactive::{AutorunOptions, Disposer, ReactionHandle, ReactionOptions, reaction};

use crate::registry::{self, ClassTable, Computation, Descriptor};

// ---------------------------------------------------------------------------
// Class levels
// ---------------------------------------------------------------------------

/// One level of a host's class chain.
pub trait Class: Any + Sized {
    /// Diagnostic name; prefixes every reaction name of the host.
    const NAME: &'static str;

    /// Declare the computations introduced at this level.
    ///
    /// Runs once per thread, the first time the level is used.
    fn declare(decl: &mut Declarations<Self>);

    /// The level this one extends, if any.
    fn parent(&self) -> Option<&dyn Level> {
        None
    }
}

/// Object-safe view of a [`Class`] level.
pub trait Level: Any {
    fn class_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn parent_level(&self) -> Option<&dyn Level>;

    /// Computations declared directly on this level.
    fn declarations(&self) -> Rc<ClassTable>;
}

impl<C: Class> Level for C {
    fn class_name(&self) -> &'static str {
        C::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn parent_level(&self) -> Option<&dyn Level> {
        self.parent()
    }

    fn declarations(&self) -> Rc<ClassTable> {
        registry::registered::<C>()
    }
}

/// Weak handle to a bound host, passed to stored computations.
#[derive(Clone)]
pub struct HostRef {
    host: Weak<dyn Level>,
}

impl HostRef {
    pub(crate) fn new(host: Weak<dyn Level>) -> Self {
        Self { host }
    }

    /// Run `f` against the level of type `C` in the host's chain.
    ///
    /// `None` once the host is gone or if `C` is not in its chain.
    pub fn with<C: Class, R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        let host = self.host.upgrade()?;
        let mut level: &dyn Level = &*host;
        loop {
            if let Some(found) = level.as_any().downcast_ref::<C>() {
                return Some(f(found));
            }
            level = level.parent_level()?;
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.host.strong_count() > 0
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.host.upgrade().map(|host| host.class_name());
        f.debug_struct("HostRef").field("class", &class).finish()
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Collects the computations declared on class level `C`.
pub struct Declarations<C> {
    entries: Vec<Descriptor>,
    _class: PhantomData<fn(&C)>,
}

impl<C: Class> Declarations<C> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            _class: PhantomData,
        }
    }

    pub(crate) fn into_entries(self) -> Vec<Descriptor> {
        self.entries
    }

    /// Declare an autorun with default options.
    pub fn autorun(&mut self, name: &'static str, f: impl Fn(&C) + 'static) -> &mut Self {
        self.autorun_with(name, AutorunOptions::new(), f)
    }

    pub fn autorun_with(
        &mut self,
        name: &'static str,
        options: AutorunOptions,
        f: impl Fn(&C) + 'static,
    ) -> &mut Self {
        let run: Rc<dyn Fn(&HostRef)> = Rc::new(move |host: &HostRef| {
            host.with::<C, _>(&f);
        });
        self.push(name, Computation::Autorun { options, run })
    }

    /// Declare a reaction whose body builds its expression and effect.
    pub fn reactor(
        &mut self,
        name: &'static str,
        f: impl Fn(&C) -> React + 'static,
    ) -> &mut Self {
        self.reactor_with(name, ReactionOptions::new(), f)
    }

    pub fn reactor_with(
        &mut self,
        name: &'static str,
        options: ReactionOptions,
        f: impl Fn(&C) -> React + 'static,
    ) -> &mut Self {
        let produce: Rc<dyn Fn(&HostRef) -> Option<React>> =
            Rc::new(move |host: &HostRef| host.with::<C, _>(&f));
        self.push(name, Computation::Reaction { options, produce })
    }

    /// Declare a reaction from a separate expression and an effect that
    /// receives the host.
    pub fn reactor_on<T: PartialEq + 'static>(
        &mut self,
        name: &'static str,
        options: ReactionOptions,
        expression: impl Fn(&C) -> T + 'static,
        effect: impl Fn(&C, &T) + 'static,
    ) -> &mut Self {
        let expression = Rc::new(expression);
        let effect = Rc::new(effect);
        let produce: Rc<dyn Fn(&HostRef) -> Option<React>> = Rc::new(move |host: &HostRef| {
            let (reader, writer) = (host.clone(), host.clone());
            let expression = Rc::clone(&expression);
            let effect = Rc::clone(&effect);
            Some(react(
                move |_| reader.with::<C, _>(|level| (*expression)(level)),
                move |value: &Option<T>, _| {
                    if let Some(value) = value {
                        writer.with::<C, _>(|level| (*effect)(level, value));
                    }
                },
            ))
        });
        self.push(name, Computation::Reaction { options, produce })
    }

    fn push(&mut self, name: &'static str, computation: Computation) -> &mut Self {
        let descriptor = Descriptor::new(name, C::NAME, computation);
        match self.entries.iter_mut().find(|entry| entry.name() == name) {
            Some(existing) => {
                tracing::trace!(class = C::NAME, name, "computation redeclared");
                *existing = descriptor;
            }
            None => self.entries.push(descriptor),
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Explicit reactions
// ---------------------------------------------------------------------------

/// An expression/effect pair returned by a reactor, ready to subscribe.
#[must_use = "a React does nothing until the binder installs it"]
pub struct React {
    install: Box<dyn FnOnce(ReactionOptions) -> Disposer>,
    options: ReactionOptions,
}

impl React {
    /// Options that override both the binder defaults and the declared ones.
    pub fn with_options(mut self, options: ReactionOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ReactionOptions {
        &self.options
    }

    pub(crate) fn install(self, defaults: &ReactionOptions) -> Disposer {
        (self.install)(defaults.merge(&self.options))
    }
}

impl fmt::Debug for React {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("React")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Bundle a tracked `expression` with the `effect` run when its value changes.
pub fn react<T, E, F>(expression: E, effect: F) -> React
where
    T: PartialEq + 'static,
    E: FnMut(&ReactionHandle) -> T + 'static,
    F: FnMut(&T, &ReactionHandle) + 'static,
{
    React {
        install: Box::new(move |options| reaction(expression, effect, options)),
        options: ReactionOptions::new(),
    }
}
