#![forbid(unsafe_code)]

use hostbind_reactive::ReactiveError;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("`{event}` on `{class}` after it was destroyed")]
    Destroyed {
        class: &'static str,
        event: &'static str,
    },

    #[error(transparent)]
    Engine(#[from] ReactiveError),
}
