//! # kvfifo
//!
//! A key-indexed FIFO queue with copy-on-write value semantics.
//!
//! ## Overview
//!
//! [`KvFifo`] is an ordered sequence of key/value entries. It behaves as a
//! FIFO queue overall, and additionally supports:
//!
//! - **Per-key access**: the oldest and newest entry of each key, and the
//!   number of entries per key
//! - **Per-key removal**: removing the oldest entry of a key
//! - **Reordering**: moving all entries of a key to the back of the queue
//! - **Cheap copies**: clones share storage until one of them mutates
//! - **Key iteration**: distinct keys in ascending order
//!
//! The building blocks are public as well: [`store::OrderedStore`] is a
//! sequence with stable positions, and [`index::KeyIndex`] maps each key to
//! the positions of its entries.
//!
//! ## Feature Flags
//!
//! - `arc`: Share storage through `Arc` instead of `Rc`, making queues `Send`
//!   and `Sync` when their keys and values are
//! - `serde`: `Serialize`/`Deserialize` for [`KvFifo`]
//! - `full`: Enable all optional features except `arc`
//!
//! ## Example
//!
//! ```rust
//! use kvfifo::KvFifo;
//!
//! let mut requests = KvFifo::new();
//! requests.push("host-a", 1).unwrap();
//! requests.push("host-b", 2).unwrap();
//! requests.push("host-a", 3).unwrap();
//!
//! let snapshot = requests.clone();
//! requests.pop().unwrap();
//!
//! assert_eq!(requests.len(), 2);
//! assert_eq!(snapshot.len(), 3);
//! assert_eq!(requests.keys().collect::<Vec<_>>(), vec![&"host-a", &"host-b"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod error;
mod fifo;
pub mod index;
pub mod store;

pub use error::KvFifoError;
pub use error::Result;
pub use fifo::KvFifo;
pub use fifo::KvFifoIterator;
pub use index::Keys;

/// Prelude module for convenient imports.
///
/// ```rust
/// use kvfifo::prelude::*;
///
/// let queue: KvFifo<u8, u8> = KvFifo::new();
/// assert_eq!(queue.front(), Err(KvFifoError::EmptyContainer));
/// ```
pub mod prelude {
    pub use crate::{KvFifo, KvFifoError};
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod reference_counter_tests {
    use super::ReferenceCounter;
    use rstest::rstest;

    #[rstest]
    fn test_reference_counter_make_mut_copies_only_when_shared() {
        let mut reference_counter: ReferenceCounter<Vec<i32>> = ReferenceCounter::new(vec![1]);
        let before = ReferenceCounter::as_ptr(&reference_counter);
        ReferenceCounter::make_mut(&mut reference_counter).push(2);
        assert_eq!(ReferenceCounter::as_ptr(&reference_counter), before);

        let reference_counter_clone = reference_counter.clone();
        ReferenceCounter::make_mut(&mut reference_counter).push(3);
        assert!(!ReferenceCounter::ptr_eq(&reference_counter, &reference_counter_clone));
        assert_eq!(*reference_counter_clone, vec![1, 2]);
        assert_eq!(*reference_counter, vec![1, 2, 3]);
    }

    #[rstest]
    fn test_reference_counter_strong_count() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 2);
        drop(reference_counter_clone);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
    }
}
