//! Error types raised by the rating aggregator and the ranking engine.
#![forbid(unsafe_code)]

use spotsync_core::StoreError;
use thiserror::Error;

/// Errors raised while aggregating ratings or answering ranked queries.
#[derive(Debug, Error)]
pub enum ScorerError {
    /// A store call failed.
    #[error("store operation {operation} failed")]
    Store {
        /// Description of the failed operation.
        operation: &'static str,
        /// Source error from the store.
        #[source]
        source: StoreError,
    },
    /// A worker reading one side of an antimeridian viewport panicked.
    #[error("viewport worker panicked while reading the {tier} tier")]
    WorkerPanicked {
        /// Tier being read when the worker failed.
        tier: &'static str,
    },
}

impl ScorerError {
    pub(crate) fn store(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { operation, source }
    }
}
