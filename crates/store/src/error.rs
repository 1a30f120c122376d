use std::fmt::Display;
use thiserror::Error;

/// Errors surfaced by an [`AggregateStore`](crate::AggregateStore).
///
/// A compare-and-store that loses the race is not an error; it is reported as
/// [`CasOutcome::Conflict`](crate::CasOutcome::Conflict).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure, timeout, or backend-internal failure. Transient.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The stored value does not decode as an aggregate.
    #[error("stored aggregate is corrupt: {0}")]
    Corrupt(String),
    /// The backend cannot be built from the supplied configuration.
    #[error("store configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn unavailable<E: Display>(err: E) -> Self {
        StoreError::Unavailable(err.to_string())
    }

    pub fn corrupt<E: Display>(err: E) -> Self {
        StoreError::Corrupt(err.to_string())
    }

    /// Whether retrying the whole request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
