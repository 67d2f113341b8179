#![forbid(unsafe_code)]

//! Merging a host's class chain into per-instance computation maps.
//!
//! # Invariants
//!
//! 1. Levels are visited nearest-first, so a level's declaration shadows any
//!    ancestor declaration of the same name.
//! 2. Names share one namespace across kinds: an ancestor's reaction is
//!    shadowed by a nearer autorun of the same name and vice versa.
//! 3. Every collected name lands in exactly one of the four partitions.
//!
//! Autoruns and reactions are not merged into two independent per-kind
//! maps. The chain walk shares one seen-name set across both kinds, so an
//! instance never holds an autorun and a reaction under the same name, and
//! a name owns at most one disposer in one scope.

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::declare::Level;
use crate::registry::{Descriptor, Kind};

/// Name-keyed, insertion-ordered descriptor map.
pub type DescriptorMap = IndexMap<&'static str, Descriptor>;

/// A host's computations split by kind and disposal scope.
#[derive(Debug, Default)]
pub struct Collected {
    pub transient_autoruns: DescriptorMap,
    pub persistent_autoruns: DescriptorMap,
    pub transient_reactions: DescriptorMap,
    pub persistent_reactions: DescriptorMap,
}

impl Collected {
    fn route(&mut self, descriptor: Descriptor) {
        let map = match (descriptor.kind(), descriptor.keep()) {
            (Kind::Autorun, false) => &mut self.transient_autoruns,
            (Kind::Autorun, true) => &mut self.persistent_autoruns,
            (Kind::Reaction, false) => &mut self.transient_reactions,
            (Kind::Reaction, true) => &mut self.persistent_reactions,
        };
        map.insert(descriptor.name(), descriptor);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transient_autoruns.len()
            + self.persistent_autoruns.len()
            + self.transient_reactions.len()
            + self.persistent_reactions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walk `host` and its ancestors and merge their declarations.
#[must_use]
pub fn collect(host: &dyn Level) -> Collected {
    let mut collected = Collected::default();
    let mut seen: AHashSet<&'static str> = AHashSet::new();
    let mut levels = 0usize;

    let mut level = Some(host);
    while let Some(current) = level {
        levels += 1;
        let table = current.declarations();
        for descriptor in table.entries() {
            if seen.insert(descriptor.name()) {
                collected.route(descriptor.clone());
            } else {
                tracing::trace!(
                    class = current.class_name(),
                    name = descriptor.name(),
                    "computation shadowed by a nearer level"
                );
            }
        }
        level = current.parent_level();
    }

    tracing::debug!(
        class = host.class_name(),
        levels,
        transient = collected.transient_autoruns.len() + collected.transient_reactions.len(),
        persistent = collected.persistent_autoruns.len() + collected.persistent_reactions.len(),
        "computations collected"
    );
    collected
}
