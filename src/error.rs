//! Error types for [`KvFifo`](crate::KvFifo) operations.
//!
//! Every fallible operation returns [`Result`], and a failed call leaves the
//! container exactly as it was before the call.

use std::collections::TryReserveError;

/// Represents errors that can occur when operating on a [`KvFifo`](crate::KvFifo).
///
/// # Examples
///
/// ```rust
/// use kvfifo::{KvFifo, KvFifoError};
///
/// let mut fifo: KvFifo<i32, &str> = KvFifo::new();
/// assert_eq!(fifo.pop(), Err(KvFifoError::EmptyContainer));
/// assert_eq!(fifo.pop_key(&1), Err(KvFifoError::KeyNotFound));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvFifoError {
    /// The container holds no entries.
    EmptyContainer,
    /// The requested key has no entries in the container.
    KeyNotFound,
    /// Growing the backing storage failed.
    AllocationFailure(TryReserveError),
}

impl std::fmt::Display for KvFifoError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContainer => write!(formatter, "the queue is empty"),
            Self::KeyNotFound => write!(formatter, "no such key in the queue"),
            Self::AllocationFailure(error) => {
                write!(formatter, "failed to grow queue storage: {error}")
            }
        }
    }
}

impl std::error::Error for KvFifoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AllocationFailure(error) => Some(error),
            Self::EmptyContainer | Self::KeyNotFound => None,
        }
    }
}

impl From<TryReserveError> for KvFifoError {
    fn from(error: TryReserveError) -> Self {
        Self::AllocationFailure(error)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KvFifoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::error::Error;

    fn reserve_failure() -> TryReserveError {
        let mut buffer: Vec<u64> = Vec::new();
        match buffer.try_reserve(usize::MAX) {
            Err(error) => error,
            Ok(()) => unreachable!("reserving usize::MAX elements cannot succeed"),
        }
    }

    #[rstest]
    fn test_empty_container_display() {
        assert_eq!(
            format!("{}", KvFifoError::EmptyContainer),
            "the queue is empty"
        );
    }

    #[rstest]
    fn test_key_not_found_display() {
        assert_eq!(
            format!("{}", KvFifoError::KeyNotFound),
            "no such key in the queue"
        );
    }

    #[rstest]
    fn test_allocation_failure_display_has_prefix() {
        let error = KvFifoError::from(reserve_failure());
        assert!(format!("{error}").starts_with("failed to grow queue storage: "));
    }

    #[rstest]
    fn test_source_only_for_allocation_failure() {
        assert!(KvFifoError::EmptyContainer.source().is_none());
        assert!(KvFifoError::KeyNotFound.source().is_none());
        assert!(KvFifoError::from(reserve_failure()).source().is_some());
    }

    #[rstest]
    fn test_error_equality() {
        assert_eq!(KvFifoError::KeyNotFound, KvFifoError::KeyNotFound);
        assert_ne!(KvFifoError::KeyNotFound, KvFifoError::EmptyContainer);
    }
}
