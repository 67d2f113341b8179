#![forbid(unsafe_code)]

//! Per-reaction options.
//!
//! Every field is optional so that option sets can be layered:
//! `defaults.merge(&declared).merge(&per_call)` keeps the right-most value
//! that is set. `keep` is not interpreted by the engine; lifecycle managers
//! use it to pick a disposal scope.

/// Options for [`autorun`](crate::autorun).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutorunOptions {
    /// Diagnostic name.
    pub name: Option<String>,
    /// Survive deactivation; dispose only on destruction.
    pub keep: Option<bool>,
}

impl AutorunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Shorthand for `AutorunOptions::new().with_keep(true)`.
    #[must_use]
    pub fn kept() -> Self {
        Self::new().with_keep(true)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = Some(keep);
        self
    }

    #[must_use]
    pub fn keep(&self) -> bool {
        self.keep.unwrap_or(false)
    }

    /// Overlay `over` on `self`; fields set in `over` win.
    #[must_use]
    pub fn merge(&self, over: &Self) -> Self {
        Self {
            name: over.name.clone().or_else(|| self.name.clone()),
            keep: over.keep.or(self.keep),
        }
    }
}

/// Options for [`reaction`](crate::reaction).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReactionOptions {
    /// Diagnostic name.
    pub name: Option<String>,
    /// Run the effect with the first expression value.
    pub fire_immediately: Option<bool>,
    /// Survive deactivation; dispose only on destruction.
    pub keep: Option<bool>,
}

impl ReactionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Shorthand for `ReactionOptions::new().with_keep(true)`.
    #[must_use]
    pub fn kept() -> Self {
        Self::new().with_keep(true)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_fire_immediately(mut self, fire: bool) -> Self {
        self.fire_immediately = Some(fire);
        self
    }

    #[must_use]
    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = Some(keep);
        self
    }

    #[must_use]
    pub fn keep(&self) -> bool {
        self.keep.unwrap_or(false)
    }

    #[must_use]
    pub fn fires_immediately(&self) -> bool {
        self.fire_immediately.unwrap_or(false)
    }

    /// Overlay `over` on `self`; fields set in `over` win.
    #[must_use]
    pub fn merge(&self, over: &Self) -> Self {
        Self {
            name: over.name.clone().or_else(|| self.name.clone()),
            fire_immediately: over.fire_immediately.or(self.fire_immediately),
            keep: over.keep.or(self.keep),
        }
    }
}
