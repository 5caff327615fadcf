use thiserror::Error;

/// Rejections of operator input. None of them reaches the gateway; the flow
/// re-prompts and keeps its step.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("input is empty")]
    EmptyInput,
    #[error("`{input}` is not a valid number")]
    InvalidNumber { input: String },
    #[error("`{input}` does not match any listed option")]
    UnknownLabel { input: String },
    #[error("`{input}` is not a yes/no answer")]
    InvalidAnswer { input: String },
    #[error("trial needs at least {required} measurements, found {found}")]
    InsufficientSamples { found: usize, required: usize },
}
