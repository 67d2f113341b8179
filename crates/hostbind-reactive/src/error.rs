#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("observable `{name}` changed outside an action while actions are enforced")]
    MutationOutsideAction { name: String },

    #[error("reactive engine is already configured")]
    AlreadyConfigured,

    #[error("reactive engine must be configured before the first reaction is created")]
    ConfigureAfterActivation,
}
