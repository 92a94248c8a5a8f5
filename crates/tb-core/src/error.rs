//! Errors raised by analyses that go through an event store.

use thiserror::Error;

use crate::types::ValidationError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Analysis errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Invalid analysis parameters.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The event store failed.
    #[error("event store error: {0}")]
    Store(#[source] BoxError),
}

impl AnalysisError {
    /// Wraps a store backend error.
    pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(err))
    }
}
