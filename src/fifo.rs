//! Key-indexed FIFO queue with copy-on-write value semantics.
//!
//! This module provides [`KvFifo`], an ordered sequence of key/value entries
//! that behaves as a FIFO queue overall while also supporting lookup, removal,
//! and reordering of entries by key.
//!
//! # Sharing
//!
//! Cloning a `KvFifo` is O(1): the clone shares the backing storage of its
//! source. The first structural mutation or mutable access on either side
//! copies the storage for that side only, so clones never observe each
//! other's changes.
//!
//! ```text
//!   a ──┐                              a ──► [block 0]
//!       ├──► [block 0]    b.push(..)
//!   b ──┘                 ─────────►   b ──► [copy of block 0 + new entry]
//! ```
//!
//! # Mutable Aliases
//!
//! The mutable accessors ([`front_mut`](KvFifo::front_mut),
//! [`back_mut`](KvFifo::back_mut), [`first_mut`](KvFifo::first_mut),
//! [`last_mut`](KvFifo::last_mut)) mark the container as *aliased*. A clone
//! taken from an aliased container receives its own copy of the storage
//! instead of sharing it. The mark is cleared by the next structural mutation
//! (`push`, `pop`, `pop_key`, `move_to_back`, `clear`).
//!
//! # Time Complexity
//!
//! | Operation                 | Complexity                      |
//! |---------------------------|---------------------------------|
//! | `clone`                   | O(1), O(n) when aliased         |
//! | `push`                    | O(log k) + copy if shared       |
//! | `pop` / `pop_key`         | O(log k) + copy if shared       |
//! | `move_to_back`            | O(log k + m) + copy if shared   |
//! | `front` / `back`          | O(1)                            |
//! | `first` / `last`          | O(log k)                        |
//! | `*_mut` accessors         | as above + copy if shared       |
//! | `len` / `is_empty`        | O(1)                            |
//! | `count`                   | O(log k)                        |
//! | `clear`                   | O(1)                            |
//!
//! Here k is the number of distinct keys, m the number of entries of the
//! moved key, and n the total number of entries.
//!
//! # Examples
//!
//! ```rust
//! use kvfifo::KvFifo;
//!
//! let mut queue = KvFifo::new();
//! queue.push(1, "a").unwrap();
//! queue.push(2, "b").unwrap();
//! queue.push(1, "c").unwrap();
//!
//! let snapshot = queue.clone();
//! queue.move_to_back(&1).unwrap();
//!
//! assert_eq!(queue.front().unwrap(), (&2, &"b"));
//! assert_eq!(snapshot.front().unwrap(), (&1, &"a"));
//! assert_eq!(queue.count(&1), 2);
//! ```

use std::borrow::Borrow;
use std::fmt;

use crate::ReferenceCounter;
use crate::error::{KvFifoError, Result};
use crate::index::{KeyIndex, Keys};
use crate::store::{OrderedStore, OrderedStoreIterator, Position};

// =============================================================================
// Shared State
// =============================================================================

/// The storage block shared between clones of one [`KvFifo`].
///
/// The store and the index are kept mutually consistent: every position in
/// the store appears in exactly one index list, under the key of its entry.
#[derive(Debug, Clone)]
struct SharedState<K, V> {
    store: OrderedStore<(K, V)>,
    index: KeyIndex<K>,
}

impl<K, V> SharedState<K, V> {
    const fn new() -> Self {
        Self {
            store: OrderedStore::new(),
            index: KeyIndex::new(),
        }
    }

    fn entry(&self, position: Position) -> Option<(&K, &V)> {
        self.store.get(position).map(|(key, value)| (key, value))
    }
}

impl<K: Clone + Ord, V> SharedState<K, V> {
    /// Appends an entry to both the store and the index, or to neither.
    fn push(&mut self, key: K, value: V) -> Result<()> {
        let position = self.store.try_append((key.clone(), value))?;

        let (list, created) = self.index.find_or_create(key);
        if let Err(error) = list.try_push(position) {
            if created
                && let Some((stored_key, _)) = self.store.get(position)
            {
                self.index.remove_key(stored_key);
            }
            self.store.remove(position);
            return Err(error);
        }
        Ok(())
    }

    fn pop_oldest<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self.index.find(key)?.oldest()?;
        let entry = self.store.remove(position)?;
        self.index.remove_entry(key, position);
        Some(entry)
    }

    fn move_to_back<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if let Some(list) = self.index.find(key) {
            for position in list.iter() {
                self.store.relocate_to_end(position);
            }
        }
    }
}

// =============================================================================
// KvFifo Definition
// =============================================================================

/// A FIFO queue of key/value entries with per-key access and O(1) cloning.
///
/// Entries leave the queue in insertion order, and every key additionally
/// keeps the order of its own entries so that the oldest or newest entry of a
/// key can be read, the oldest entry of a key can be removed, and all entries
/// of a key can be moved to the back of the queue together.
///
/// Cloning shares storage until one side mutates. The mutable accessors mark
/// the queue as aliased, and a clone taken from an aliased queue receives its
/// own copy of the storage. The next structural mutation clears the mark.
///
/// # Type Parameters
///
/// * `K` - The key type. Must implement `Ord`, and `Clone` for mutation.
/// * `V` - The value type. Must implement `Clone` for mutation.
///
/// # Examples
///
/// ```rust
/// use kvfifo::KvFifo;
///
/// let mut queue = KvFifo::new();
/// queue.push("alice", 1).unwrap();
/// queue.push("bob", 2).unwrap();
/// queue.push("alice", 3).unwrap();
///
/// assert_eq!(queue.first(&"alice").unwrap(), (&"alice", &1));
/// assert_eq!(queue.last(&"alice").unwrap(), (&"alice", &3));
///
/// assert_eq!(queue.pop_key(&"alice").unwrap(), ("alice", 1));
/// assert_eq!(queue.front().unwrap(), (&"bob", &2));
/// ```
pub struct KvFifo<K, V> {
    shared: ReferenceCounter<SharedState<K, V>>,
    aliased: bool,
}

impl<K, V> KvFifo<K, V> {
    /// Creates an empty queue with its own storage.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let queue: KvFifo<i32, String> = KvFifo::new();
    /// assert!(queue.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: ReferenceCounter::new(SharedState::new()),
            aliased: false,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.store.len()
    }

    /// Returns `true` if the queue holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    /// Removes every entry.
    ///
    /// The queue switches to fresh, unshared storage; other queues still
    /// sharing the old storage are unaffected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue = KvFifo::new();
    /// queue.push(1, 1).unwrap();
    /// let snapshot = queue.clone();
    ///
    /// queue.clear();
    /// assert!(queue.is_empty());
    /// assert_eq!(snapshot.len(), 1);
    /// ```
    pub fn clear(&mut self) {
        self.shared = ReferenceCounter::new(SharedState::new());
        self.aliased = false;
    }

    /// Returns an iterator over the distinct keys in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let queue: KvFifo<i32, char> = [(3, 'a'), (1, 'b'), (3, 'c')].into_iter().collect();
    /// let keys: Vec<&i32> = queue.keys().collect();
    /// assert_eq!(keys, vec![&1, &3]);
    /// ```
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K> {
        self.shared.index.keys()
    }

    /// Returns an iterator over the entries in queue order.
    #[must_use]
    pub fn iter(&self) -> KvFifoIterator<'_, K, V> {
        KvFifoIterator {
            inner: self.shared.store.iter(),
        }
    }

    /// Returns the first entry of the queue.
    ///
    /// Never copies storage and never marks the queue as aliased.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::EmptyContainer`] if the queue is empty.
    pub fn front(&self) -> Result<(&K, &V)> {
        self.shared
            .store
            .front()
            .map(|(_, (key, value))| (key, value))
            .ok_or(KvFifoError::EmptyContainer)
    }

    /// Returns the last entry of the queue.
    ///
    /// Never copies storage and never marks the queue as aliased.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::EmptyContainer`] if the queue is empty.
    pub fn back(&self) -> Result<(&K, &V)> {
        self.shared
            .store
            .back()
            .map(|(_, (key, value))| (key, value))
            .ok_or(KvFifoError::EmptyContainer)
    }

    /// Returns `true` if this queue currently shares its storage with another queue.
    #[inline]
    #[must_use]
    pub fn is_shared(&self) -> bool {
        ReferenceCounter::strong_count(&self.shared) > 1
    }

    /// Returns `true` if a mutable accessor handed out a reference into the
    /// storage since the last structural mutation.
    #[inline]
    #[must_use]
    pub const fn is_aliased(&self) -> bool {
        self.aliased
    }

    /// Returns `true` if both queues are backed by the same storage.
    #[inline]
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.shared, &other.shared)
    }
}

impl<K: Ord, V> KvFifo<K, V> {
    /// Returns the number of entries stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let queue: KvFifo<&str, i32> = [("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
    /// assert_eq!(queue.count(&"a"), 2);
    /// assert_eq!(queue.count(&"z"), 0);
    /// ```
    #[must_use]
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.shared.index.count(key)
    }

    /// Returns `true` if at least one entry is stored under `key`.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.shared.index.contains_key(key)
    }

    /// Returns the oldest entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::KeyNotFound`] if `key` has no entries.
    pub fn first<Q>(&self, key: &Q) -> Result<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.oldest_position(key)
            .and_then(|position| self.shared.entry(position))
            .ok_or(KvFifoError::KeyNotFound)
    }

    /// Returns the newest entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::KeyNotFound`] if `key` has no entries.
    pub fn last<Q>(&self, key: &Q) -> Result<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.newest_position(key)
            .and_then(|position| self.shared.entry(position))
            .ok_or(KvFifoError::KeyNotFound)
    }

    fn oldest_position<Q>(&self, key: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.shared.index.find(key).and_then(|list| list.oldest())
    }

    fn newest_position<Q>(&self, key: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.shared.index.find(key).and_then(|list| list.newest())
    }
}

impl<K: Clone + Ord, V: Clone> KvFifo<K, V> {
    /// Appends an entry at the back of the queue.
    ///
    /// Copies the storage first if it is shared. Clears the aliased mark.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::AllocationFailure`] if the storage cannot grow.
    /// The queue, and any storage it shared, is left exactly as before.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue = KvFifo::new();
    /// queue.push(1, "a").unwrap();
    /// queue.push(2, "b").unwrap();
    /// assert_eq!(queue.back().unwrap(), (&2, &"b"));
    /// ```
    pub fn push(&mut self, key: K, value: V) -> Result<()> {
        let previous = self.is_shared().then(|| ReferenceCounter::clone(&self.shared));

        match self.state_mut().push(key, value) {
            Ok(()) => {
                self.aliased = false;
                Ok(())
            }
            Err(error) => {
                log::debug!("kvfifo: push rolled back: {error}");
                if let Some(previous) = previous {
                    self.shared = previous;
                }
                Err(error)
            }
        }
    }

    /// Removes and returns the first entry of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::EmptyContainer`] if the queue is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::{KvFifo, KvFifoError};
    ///
    /// let mut queue = KvFifo::new();
    /// queue.push(1, "a").unwrap();
    /// assert_eq!(queue.pop(), Ok((1, "a")));
    /// assert_eq!(queue.pop(), Err(KvFifoError::EmptyContainer));
    /// ```
    pub fn pop(&mut self) -> Result<(K, V)> {
        let key = self.front()?.0.clone();
        self.pop_key(&key)
    }

    /// Removes and returns the oldest entry stored under `key`.
    ///
    /// Copies the storage first if it is shared. Clears the aliased mark.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::KeyNotFound`] if `key` has no entries; the
    /// queue is left untouched.
    pub fn pop_key<Q>(&mut self, key: &Q) -> Result<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if !self.contains_key(key) {
            return Err(KvFifoError::KeyNotFound);
        }
        let entry = self
            .state_mut()
            .pop_oldest(key)
            .ok_or(KvFifoError::KeyNotFound)?;
        self.aliased = false;
        Ok(entry)
    }

    /// Moves every entry stored under `key` to the back of the queue.
    ///
    /// The entries of `key` keep their relative order, and so do the entries
    /// of every other key. Copies the storage first if it is shared. Clears
    /// the aliased mark.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::KeyNotFound`] if `key` has no entries; the
    /// queue is left untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue: KvFifo<i32, char> =
    ///     [(1, 'a'), (2, 'b'), (1, 'c'), (3, 'd')].into_iter().collect();
    /// queue.move_to_back(&1).unwrap();
    ///
    /// let order: Vec<char> = queue.iter().map(|(_, value)| *value).collect();
    /// assert_eq!(order, vec!['b', 'd', 'a', 'c']);
    /// ```
    pub fn move_to_back<Q>(&mut self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if !self.contains_key(key) {
            return Err(KvFifoError::KeyNotFound);
        }
        self.state_mut().move_to_back(key);
        self.aliased = false;
        Ok(())
    }

    /// Returns the first entry with a mutable reference to its value.
    ///
    /// Copies the storage first if it is shared and marks the queue as
    /// aliased.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::EmptyContainer`] if the queue is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue = KvFifo::new();
    /// queue.push("job", 1).unwrap();
    /// let snapshot = queue.clone();
    ///
    /// *queue.front_mut().unwrap().1 += 10;
    /// assert_eq!(queue.front().unwrap(), (&"job", &11));
    /// assert_eq!(snapshot.front().unwrap(), (&"job", &1));
    /// ```
    pub fn front_mut(&mut self) -> Result<(&K, &mut V)> {
        let position = self
            .shared
            .store
            .front()
            .map(|(position, _)| position)
            .ok_or(KvFifoError::EmptyContainer)?;
        self.alias_entry(position).ok_or(KvFifoError::EmptyContainer)
    }

    /// Returns the last entry with a mutable reference to its value.
    ///
    /// Copies the storage first if it is shared and marks the queue as
    /// aliased.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::EmptyContainer`] if the queue is empty.
    pub fn back_mut(&mut self) -> Result<(&K, &mut V)> {
        let position = self
            .shared
            .store
            .back()
            .map(|(position, _)| position)
            .ok_or(KvFifoError::EmptyContainer)?;
        self.alias_entry(position).ok_or(KvFifoError::EmptyContainer)
    }

    /// Returns the oldest entry stored under `key` with a mutable reference
    /// to its value.
    ///
    /// Copies the storage first if it is shared and marks the queue as
    /// aliased.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::KeyNotFound`] if `key` has no entries.
    pub fn first_mut<Q>(&mut self, key: &Q) -> Result<(&K, &mut V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self
            .oldest_position(key)
            .ok_or(KvFifoError::KeyNotFound)?;
        self.alias_entry(position).ok_or(KvFifoError::KeyNotFound)
    }

    /// Returns the newest entry stored under `key` with a mutable reference
    /// to its value.
    ///
    /// Copies the storage first if it is shared and marks the queue as
    /// aliased.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::KeyNotFound`] if `key` has no entries.
    pub fn last_mut<Q>(&mut self, key: &Q) -> Result<(&K, &mut V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self
            .newest_position(key)
            .ok_or(KvFifoError::KeyNotFound)?;
        self.alias_entry(position).ok_or(KvFifoError::KeyNotFound)
    }

    /// Appends every entry of `entries`, stopping at the first failure.
    ///
    /// Entries appended before the failure stay in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::AllocationFailure`] if the storage cannot grow.
    pub fn try_extend<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .try_for_each(|(key, value)| self.push(key, value))
    }

    /// Returns exclusive access to the storage, copying it first if shared.
    fn state_mut(&mut self) -> &mut SharedState<K, V> {
        if self.is_shared() {
            log::trace!(
                "kvfifo: copying shared storage of {} entries before mutation",
                self.len()
            );
        }
        ReferenceCounter::make_mut(&mut self.shared)
    }

    /// Hands out the entry at `position` for mutation and marks the queue as aliased.
    ///
    /// `position` may come from the storage before it is copied: a copy keeps
    /// every position of its source.
    fn alias_entry(&mut self, position: Position) -> Option<(&K, &mut V)> {
        if !self.shared.store.contains(position) {
            return None;
        }
        self.aliased = true;
        let (key, value) = self.state_mut().store.get_mut(position)?;
        Some((&*key, value))
    }

    /// Asserts that the store and the index describe the same entries.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let state = &*self.shared;
        state.store.debug_validate_invariants();
        assert_eq!(state.store.len(), state.index.position_count());
        for key in state.index.keys() {
            let list = state.index.find(key).expect("listed key must resolve");
            assert!(!list.is_empty());
            for position in list.iter() {
                let (stored_key, _) = state.store.get(position).expect("indexed position must be live");
                assert!(stored_key == key);
            }
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the entries of a [`KvFifo`] in queue order.
pub struct KvFifoIterator<'a, K, V> {
    inner: OrderedStoreIterator<'a, (K, V)>,
}

impl<'a, K, V> Iterator for KvFifoIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.inner.next()?;
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for KvFifoIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Clone for KvFifo<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Returns a queue with the same entries.
    ///
    /// The clone shares storage with `self`, unless `self` is aliased, in
    /// which case the clone receives its own copy of the storage.
    fn clone(&self) -> Self {
        if self.aliased {
            log::trace!(
                "kvfifo: source is aliased, copying {} entries eagerly",
                self.len()
            );
            return Self {
                shared: ReferenceCounter::new((*self.shared).clone()),
                aliased: false,
            };
        }
        Self {
            shared: ReferenceCounter::clone(&self.shared),
            aliased: false,
        }
    }
}

impl<K, V> Default for KvFifo<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Appends every entry in iteration order.
///
/// # Panics
///
/// Panics if the storage cannot grow, as the standard collections do.
impl<K: Clone + Ord, V: Clone> Extend<(K, V)> for KvFifo<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        if let Err(error) = self.try_extend(iter) {
            panic!("kvfifo: extend failed: {error}");
        }
    }
}

impl<K: Clone + Ord, V: Clone> FromIterator<(K, V)> for KvFifo<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<'a, K, V> IntoIterator for &'a KvFifo<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = KvFifoIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for KvFifo<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.shares_storage_with(other) {
            return true;
        }
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for KvFifo<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for KvFifo<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for KvFifo<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "]")
    }
}

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(KvFifo<i32, i32>: Send, Sync);

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(KvFifo<i32, String>: Send, Sync);

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for KvFifo<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for entry in self {
            sequence.serialize_element(&entry)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct KvFifoVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<K, V> KvFifoVisitor<K, V> {
    const fn new() -> Self {
        Self {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for KvFifoVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = KvFifo<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a sequence of key/value pairs")
    }

    fn visit_seq<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut queue = KvFifo::new();
        while let Some((key, value)) = access.next_element::<(K, V)>()? {
            queue.push(key, value).map_err(serde::de::Error::custom)?;
        }
        Ok(queue)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for KvFifo<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(KvFifoVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests (arc feature only)
// =============================================================================

#[cfg(all(test, feature = "arc"))]
mod send_sync_tests {
    use super::*;
    use rstest::rstest;
    use std::thread;

    #[rstest]
    fn test_snapshot_moves_to_another_thread() {
        let mut queue = KvFifo::new();
        queue.push(1, "a".to_string()).unwrap();
        let snapshot = queue.clone();

        let handle = thread::spawn(move || snapshot.front().map(|(_, value)| value.clone()));
        queue.push(2, "b".to_string()).unwrap();

        assert_eq!(handle.join().unwrap(), Ok("a".to_string()));
        assert_eq!(queue.len(), 2);
    }
}

// =============================================================================
// Serde Tests (serde feature only)
// =============================================================================
