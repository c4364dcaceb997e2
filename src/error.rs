//! Error type for cursor operations.

use thiserror::Error;

/// Errors reported by cursor stepping.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `next`/`prev` was called with nothing left in that direction.
    #[error("no more elements in this direction")]
    NoMoreElements,

    /// The tree changed structurally since the cursor was created.
    #[error("tree was modified concurrently (cursor version {expected}, tree version {actual})")]
    ConcurrentModification {
        /// Version captured when the cursor was created.
        expected: u64,
        /// Version of the tree at the failed call.
        actual: u64,
    },
}

impl Error {
    /// Whether this is [`Error::ConcurrentModification`].
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Error::ConcurrentModification { .. })
    }
}

/// Result alias with [`Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
