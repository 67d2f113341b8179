#![forbid(unsafe_code)]

//! Lifecycle-bound reactive computations.
//!
//! Host types declare autoruns and reactions per class level
//! ([`Class::declare`]). Wrapping a host in [`Bound`] collects the
//! declarations of its whole chain once; the lifecycle events then activate
//! and dispose them:
//!
//! - transient computations live while the host is enabled,
//! - persistent (`keep`) computations live until the host is destroyed.
//!
//! # Architecture
//!
//! - [`registry`]: one lazily built, read-only table per class level.
//! - [`declare`]: the declaration front end and the explicit-reaction
//!   composer [`react`].
//! - [`collect`]: merges a chain into four name-keyed partitions.
//! - [`binder`]: activation and the two disposer scopes.
//! - [`lifecycle`]: the phase machine calling into the binder.
//!
//! Everything is single-threaded; the registry and the engine configuration
//! are per thread.

pub mod binder;
pub mod bootstrap;
pub mod collect;
pub mod declare;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod scope;

pub use binder::{Binder, Trigger};
pub use bootstrap::{init, init_with};
pub use collect::{Collected, collect};
pub use declare::{Class, Declarations, HostRef, Level, React, react};
pub use error::LifecycleError;
pub use lifecycle::{Bound, Lifecycle, Phase};
pub use registry::{ClassTable, Descriptor, Kind, registered};
pub use scope::DisposerScope;
