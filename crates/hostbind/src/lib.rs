#![forbid(unsafe_code)]

//! hostbind public facade crate.
//!
//! Re-exports the reactive engine and the lifecycle manager. Most hosts only
//! need the prelude:
//!
//! ```ignore
//! use hostbind::prelude::*;
//!
//! struct Player { health: Observable<u32> }
//!
//! impl Class for Player {
//!     const NAME: &'static str = "Player";
//!
//!     fn declare(decl: &mut Declarations<Self>) {
//!         decl.autorun_with("onHealth", AutorunOptions::kept(), |player| {
//!             tracing::info!(health = player.health.get());
//!         });
//!     }
//! }
//!
//! impl Lifecycle for Player {}
//!
//! let mut player = Bound::new(Player { health: Observable::new(100) });
//! player.enable()?;
//! ```

pub use hostbind_reactive as reactive;
pub use hostbind_runtime as runtime;

pub mod prelude {
    pub use hostbind_reactive as reactive;
    pub use hostbind_runtime as runtime;

    pub use hostbind_reactive::{
        AutorunOptions, Computed, Disposer, EngineConfig, Observable, ReactionOptions,
        ReactiveError, autorun, batch, reaction, run_in_action, untracked,
    };
    pub use hostbind_runtime::{
        Bound, Class, Declarations, Level, Lifecycle, LifecycleError, Phase, React, Trigger,
        react,
    };
}
