#![forbid(unsafe_code)]

//! Engine-wide configuration.
//!
//! The configuration lives in the thread-local runtime and is written at most
//! once, before the first reaction exists. Reads fall back to
//! [`EngineConfig::default`] until then.

use crate::error::ReactiveError;
use crate::runtime::{self, Atom};

/// When observable writes require an enclosing action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EnforceActions {
    /// Writes are always permitted.
    #[default]
    Never,
    /// Writes to an observable that has observers must happen in an action.
    Observed,
    /// Every write must happen in an action.
    Always,
}

/// Engine switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub enforce_actions: EnforceActions,
    /// Warn when a computed value is read outside any reaction.
    pub computed_requires_reaction: bool,
    /// Let panics inside reactions propagate instead of logging them.
    pub disable_error_boundaries: bool,
}

impl EngineConfig {
    /// Settings expected by lifecycle-bound hosts: observed mutations must be
    /// wrapped in actions, computed values are usable anywhere, and reaction
    /// failures surface to the caller.
    #[must_use]
    pub const fn host_defaults() -> Self {
        Self {
            enforce_actions: EnforceActions::Observed,
            computed_requires_reaction: false,
            disable_error_boundaries: true,
        }
    }
}

/// Install `config` for this thread's runtime.
///
/// # Errors
///
/// - [`ReactiveError::AlreadyConfigured`] when called a second time.
/// - [`ReactiveError::ConfigureAfterActivation`] once any reaction exists.
pub fn configure(config: EngineConfig) -> Result<(), ReactiveError> {
    if runtime::stored_config().is_some() {
        return Err(ReactiveError::AlreadyConfigured);
    }
    if runtime::reactions_created() {
        return Err(ReactiveError::ConfigureAfterActivation);
    }
    runtime::store_config(config);
    tracing::debug!(?config, "reactive engine configured");
    Ok(())
}

/// Active configuration (defaults until [`configure`] runs).
#[must_use]
pub fn config() -> EngineConfig {
    runtime::stored_config().unwrap_or_default()
}

/// The configuration installed by [`configure`], if any.
#[must_use]
pub fn configured() -> Option<EngineConfig> {
    runtime::stored_config()
}

pub(crate) fn check_mutation(atom: &Atom) -> Result<(), ReactiveError> {
    let guarded = match config().enforce_actions {
        EnforceActions::Never => false,
        EnforceActions::Observed => atom.observer_count() > 0,
        EnforceActions::Always => true,
    };
    if guarded && !runtime::in_action() {
        return Err(ReactiveError::MutationOutsideAction {
            name: atom.name().to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AutorunOptions, autorun};

    #[test]
    fn defaults_until_configured() {
        assert_eq!(configured(), None);
        assert_eq!(config(), EngineConfig::default());
        assert_eq!(config().enforce_actions, EnforceActions::Never);
    }

    #[test]
    fn configure_once() {
        configure(EngineConfig::host_defaults()).unwrap();
        assert_eq!(config(), EngineConfig::host_defaults());
        assert_eq!(
            configure(EngineConfig::default()),
            Err(ReactiveError::AlreadyConfigured)
        );
        assert_eq!(config(), EngineConfig::host_defaults());
    }

    #[test]
    fn configure_after_reaction_is_rejected() {
        let disposer = autorun(|_| {}, AutorunOptions::default());
        assert_eq!(
            configure(EngineConfig::host_defaults()),
            Err(ReactiveError::ConfigureAfterActivation)
        );
        disposer.dispose();
    }

    #[test]
    fn host_defaults_match_lifecycle_requirements() {
        let config = EngineConfig::host_defaults();
        assert_eq!(config.enforce_actions, EnforceActions::Observed);
        assert!(!config.computed_requires_reaction);
        assert!(config.disable_error_boundaries);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_deserializes_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"enforce_actions":"observed"}"#).unwrap();
        assert_eq!(config.enforce_actions, EnforceActions::Observed);
        assert!(!config.disable_error_boundaries);
    }
}
