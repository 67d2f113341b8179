#![forbid(unsafe_code)]

//! One-time engine configuration for lifecycle-bound hosts.

use hostbind_reactive::{EngineConfig, ReactiveError, configure, configured};

/// Configure this thread's engine with [`EngineConfig::host_defaults`].
///
/// Idempotent. Called by [`Bound::new`](crate::Bound::new).
///
/// # Errors
///
/// See [`init_with`].
pub fn init() -> Result<(), ReactiveError> {
    init_with(EngineConfig::host_defaults())
}

/// Configure this thread's engine with `config`.
///
/// Returns `Ok` if the engine already runs with exactly `config`.
///
/// # Errors
///
/// - [`ReactiveError::AlreadyConfigured`] if a different configuration is in
///   place.
/// - [`ReactiveError::ConfigureAfterActivation`] if reactions were created
///   before any configuration.
pub fn init_with(config: EngineConfig) -> Result<(), ReactiveError> {
    match configured() {
        Some(current) if current == config => Ok(()),
        Some(_) => Err(ReactiveError::AlreadyConfigured),
        None => configure(config),
    }
}
