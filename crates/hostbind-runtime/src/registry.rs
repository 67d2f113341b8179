#![forbid(unsafe_code)]

//! Per-class computation tables.
//!
//! Each class level owns one ordered list of [`Descriptor`]s, built by
//! running [`Class::declare`] the first time the level is looked up. Tables
//! are keyed by the level's `TypeId` and never change or go away afterwards.
//!
//! # Invariants
//!
//! 1. `Class::declare` runs at most once per level per thread.
//! 2. A name appears at most once in a level's table; a later declaration of
//!    the same name replaces the earlier one in its original position.
//! 3. Descriptors handed out are clones; the registry's copy is never
//!    mutated, so promotion on one instance does not leak to another.

use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use hostbind_reactive::{AutorunOptions, ReactionOptions};

use crate::declare::{Class, Declarations, HostRef, React};

thread_local! {
    static REGISTRY: RefCell<AHashMap<TypeId, Rc<ClassTable>>> =
        RefCell::new(AHashMap::new());
}

/// Whether a computation infers its dependencies or declares them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Autorun,
    Reaction,
}

#[derive(Clone)]
pub(crate) enum Computation {
    Autorun {
        options: AutorunOptions,
        run: Rc<dyn Fn(&HostRef)>,
    },
    Reaction {
        options: ReactionOptions,
        produce: Rc<dyn Fn(&HostRef) -> Option<React>>,
    },
}

/// One declared reactive computation.
#[derive(Clone)]
pub struct Descriptor {
    name: &'static str,
    declared_on: &'static str,
    computation: Computation,
}

impl Descriptor {
    pub(crate) fn new(
        name: &'static str,
        declared_on: &'static str,
        computation: Computation,
    ) -> Self {
        Self {
            name,
            declared_on,
            computation,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the class level that declared this computation.
    #[must_use]
    pub fn declared_on(&self) -> &'static str {
        self.declared_on
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match self.computation {
            Computation::Autorun { .. } => Kind::Autorun,
            Computation::Reaction { .. } => Kind::Reaction,
        }
    }

    /// Disposed only on destruction when set; otherwise on every disable.
    #[must_use]
    pub fn keep(&self) -> bool {
        match &self.computation {
            Computation::Autorun { options, .. } => options.keep(),
            Computation::Reaction { options, .. } => options.keep(),
        }
    }

    pub(crate) fn set_keep(&mut self, keep: bool) {
        match &mut self.computation {
            Computation::Autorun { options, .. } => options.keep = Some(keep),
            Computation::Reaction { options, .. } => options.keep = Some(keep),
        }
    }

    pub(crate) fn computation(&self) -> &Computation {
        &self.computation
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("declared_on", &self.declared_on)
            .field("kind", &self.kind())
            .field("keep", &self.keep())
            .finish()
    }
}

/// The computations declared directly on one class level.
#[derive(Debug)]
pub struct ClassTable {
    class: &'static str,
    entries: Vec<Descriptor>,
}

impl ClassTable {
    #[must_use]
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Declarations in order, both kinds interleaved as declared.
    #[must_use]
    pub fn entries(&self) -> &[Descriptor] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.entries.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn autoruns(&self) -> impl Iterator<Item = &Descriptor> {
        self.of_kind(Kind::Autorun)
    }

    pub fn reactions(&self) -> impl Iterator<Item = &Descriptor> {
        self.of_kind(Kind::Reaction)
    }

    fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &Descriptor> {
        self.entries
            .iter()
            .filter(move |descriptor| descriptor.kind() == kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The table of computations declared directly on `C`.
///
/// Builds the table from [`Class::declare`] on first use.
#[must_use]
pub fn registered<C: Class>() -> Rc<ClassTable> {
    let id = TypeId::of::<C>();
    if let Some(table) = REGISTRY.with(|registry| registry.borrow().get(&id).cloned()) {
        return table;
    }

    // Not holding the registry borrow: `declare` is user code.
    let mut declarations = Declarations::<C>::new();
    C::declare(&mut declarations);
    let table = Rc::new(ClassTable {
        class: C::NAME,
        entries: declarations.into_entries(),
    });
    tracing::debug!(
        class = C::NAME,
        computations = table.len(),
        "class computations registered"
    );

    REGISTRY.with(|registry| Rc::clone(registry.borrow_mut().entry(id).or_insert(table)))
}
