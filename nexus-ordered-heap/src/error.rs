//! Error types for heap operations.
//!
//! Every variant is a precondition failure detected before the heap is
//! mutated. A failed call leaves the structure exactly as it was.

use core::convert::Infallible;

use crate::storage::Full;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Failure of a single heap operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Swap requested at position 0. The root has no parent.
    #[error("the root element cannot be swapped with its parent")]
    RootSwap,

    /// Position is not inside the dense array.
    #[error("position {pos} is out of bounds for heap of length {len}")]
    OutOfBounds {
        /// The rejected position.
        pos: usize,
        /// Heap length at the time of the call.
        len: usize,
    },

    /// Removal from an empty heap.
    #[error("heap is empty")]
    Empty,

    /// Handle does not name a live entry of this heap: its entry was removed,
    /// even if a newer entry now occupies the same slot.
    #[error("handle does not refer to a live entry")]
    StaleHandle,

    /// Fixed-capacity storage rejected the new entry.
    #[error("storage is full")]
    Full,

    /// Reported by `check()` when a heap or order-list invariant is broken.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl<T> From<Full<T>> for Error {
    fn from(_: Full<T>) -> Self {
        Error::Full
    }
}
