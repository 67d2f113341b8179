#![forbid(unsafe_code)]

//! Single-threaded reactive engine for hostbind.
//!
//! - [`Observable`]: a shared, version-tracked value whose reads are tracked.
//! - [`Computed`]: a lazily-evaluated, memoized value derived from other
//!   reactive values.
//! - [`autorun`]: re-runs a closure whenever anything it read changes.
//! - [`reaction`]: tracks an expression and runs an effect when its value
//!   changes.
//! - [`run_in_action`] / [`batch`]: group writes so reactions run once.
//!
//! # Architecture
//!
//! All state lives in a thread-local runtime. Reads inside a running
//! derivation are recorded in a tracking frame; after the run the frame
//! becomes the derivation's dependency set. Observers are stored as `Weak`
//! pointers on each observable's atom and pruned lazily.
//!
//! Reactions are synchronous. A write outside any batch runs every stale
//! reaction before `set` returns; inside a batch they run when the outermost
//! batch closes.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per write that changes a value.
//! 2. A reaction runs at most once per flush pass.
//! 3. After `Disposer::dispose` returns, the reaction never runs again and no
//!    observable lists it as an observer.
//! 4. Engine configuration is written at most once per thread, before the
//!    first reaction is created.
//!
//! # Failure Modes
//!
//! - Write to an observed value outside an action under
//!   [`EnforceActions::Observed`]: [`ReactiveError::MutationOutsideAction`].
//! - Reactions that keep invalidating each other: the drain stops after 100
//!   passes and logs an error.

pub mod action;
pub mod computed;
pub mod config;
pub mod error;
pub mod observable;
pub mod options;
pub mod reaction;
mod runtime;

pub use action::{batch, in_action, is_tracking, run_in_action, untracked};
pub use computed::Computed;
pub use config::{EnforceActions, EngineConfig, config, configure, configured};
pub use error::{ReactiveError, Result};
pub use observable::Observable;
pub use options::{AutorunOptions, ReactionOptions};
pub use reaction::{Disposer, ReactionHandle, autorun, live_reactions, reaction};
