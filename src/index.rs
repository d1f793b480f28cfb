//! Ordered mapping from each key to the positions of its entries.
//!
//! [`KeyIndex`] maps every distinct key to the [`Position`]s of that key's
//! entries, oldest first. A key is present exactly while it has at least one
//! position; draining a key's list removes the key.

use std::borrow::Borrow;
use std::collections::{BTreeMap, VecDeque, btree_map};

use crate::error::Result;
use crate::store::Position;

#[cfg(test)]
thread_local! {
    /// When set, the next [`PositionList::try_push`] on this thread fails.
    static FAIL_NEXT_PUSH: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Makes the next [`PositionList::try_push`] on this thread fail with an
/// allocation error.
#[cfg(test)]
pub(crate) fn fail_next_push() {
    FAIL_NEXT_PUSH.with(|flag| flag.set(true));
}

/// The positions of one key's entries, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionList {
    positions: VecDeque<Position>,
}

impl PositionList {
    /// Creates an empty list.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            positions: VecDeque::new(),
        }
    }

    /// Returns the number of positions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the list holds no positions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns the position of the oldest entry.
    #[inline]
    #[must_use]
    pub fn oldest(&self) -> Option<Position> {
        self.positions.front().copied()
    }

    /// Returns the position of the newest entry.
    #[inline]
    #[must_use]
    pub fn newest(&self) -> Option<Position> {
        self.positions.back().copied()
    }

    /// Returns an iterator over the positions, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Position> + ExactSizeIterator + '_ {
        self.positions.iter().copied()
    }

    /// Appends `position` as the newest entry.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::AllocationFailure`](crate::KvFifoError::AllocationFailure)
    /// when the list cannot grow. The list is unchanged in that case.
    pub fn try_push(&mut self, position: Position) -> Result<()> {
        #[cfg(test)]
        if FAIL_NEXT_PUSH.with(|flag| flag.replace(false)) {
            self.positions.try_reserve(usize::MAX)?;
        }
        self.positions.try_reserve(1)?;
        self.positions.push_back(position);
        Ok(())
    }

    /// Removes `position` from the list.
    ///
    /// Returns `false` if the list does not hold `position`. Removing the
    /// oldest position is O(1).
    pub fn remove(&mut self, position: Position) -> bool {
        let Some(offset) = self.positions.iter().position(|candidate| *candidate == position) else {
            return false;
        };
        self.positions.remove(offset).is_some()
    }
}

/// Ordered mapping from key to that key's positions, oldest first.
#[derive(Debug, Clone)]
pub struct KeyIndex<K> {
    positions: BTreeMap<K, PositionList>,
}

impl<K> KeyIndex<K> {
    /// Creates an empty index.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
        }
    }

    /// Returns the number of distinct keys.
    #[inline]
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns an iterator over the distinct keys in ascending order.
    ///
    /// The iterator is `Clone`, so a consumer can restart from a saved copy.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K> {
        Keys {
            inner: self.positions.keys(),
        }
    }

    /// Returns the total number of positions across all keys.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.positions.values().map(PositionList::len).sum()
    }
}

impl<K: Ord> KeyIndex<K> {
    /// Returns the positions recorded for `key`, oldest first.
    ///
    /// # Complexity
    ///
    /// O(log k) where k is the number of distinct keys.
    #[must_use]
    pub fn find<Q>(&self, key: &Q) -> Option<&PositionList>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.positions.get(key)
    }

    /// Returns the number of positions recorded for `key`.
    #[must_use]
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).map_or(0, PositionList::len)
    }

    /// Returns `true` if `key` has at least one position.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.positions.contains_key(key)
    }

    /// Returns the list of `key`, creating an empty one if needed.
    ///
    /// The flag reports whether the list was created by this call. A created
    /// list must either receive a position or be dropped again with
    /// [`remove_key`](Self::remove_key) before the owning container returns.
    ///
    /// # Complexity
    ///
    /// O(log k) where k is the number of distinct keys.
    pub fn find_or_create(&mut self, key: K) -> (&mut PositionList, bool) {
        match self.positions.entry(key) {
            btree_map::Entry::Occupied(entry) => (entry.into_mut(), false),
            btree_map::Entry::Vacant(entry) => (entry.insert(PositionList::new()), true),
        }
    }

    /// Removes `key` and its whole list.
    pub fn remove_key<Q>(&mut self, key: &Q) -> Option<PositionList>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.positions.remove(key)
    }

    /// Removes `position` from the list of `key`.
    ///
    /// The key itself is removed once its list drains. Returns `false` if
    /// `key` has no such position.
    pub fn remove_entry<Q>(&mut self, key: &Q, position: Position) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(list) = self.positions.get_mut(key) else {
            return false;
        };
        let removed = list.remove(position);
        if list.is_empty() {
            self.positions.remove(key);
        }
        removed
    }
}

impl<K> Default for KeyIndex<K> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the distinct keys of a [`KeyIndex`] in ascending order.
///
/// Created by [`KeyIndex::keys`] and [`KvFifo::keys`](crate::KvFifo::keys).
#[derive(Debug)]
pub struct Keys<'a, K> {
    inner: btree_map::Keys<'a, K, PositionList>,
}

impl<K> Clone for Keys<'_, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K> Iterator for Keys<'a, K> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> DoubleEndedIterator for Keys<'_, K> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K> ExactSizeIterator for Keys<'_, K> {
    #[inline]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K> std::iter::FusedIterator for Keys<'_, K> {}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KvFifoError;
    use crate::store::OrderedStore;
    use rstest::rstest;

    fn positions(count: usize) -> Vec<Position> {
        let mut store = OrderedStore::new();
        (0..count).map(|value| store.try_append(value).unwrap()).collect()
    }

    fn index_of(entries: &[(i32, Position)]) -> KeyIndex<i32> {
        let mut index = KeyIndex::new();
        for (key, position) in entries {
            let (list, _) = index.find_or_create(*key);
            list.try_push(*position).unwrap();
        }
        index
    }

    #[rstest]
    fn test_new_index_is_empty() {
        let index: KeyIndex<i32> = KeyIndex::new();
        assert_eq!(index.key_count(), 0);
        assert_eq!(index.keys().count(), 0);
        assert_eq!(index.count(&1), 0);
        assert!(index.find(&1).is_none());
    }

    #[rstest]
    fn test_find_or_create_reports_creation() {
        let mut index = KeyIndex::new();
        let (_, created) = index.find_or_create("a");
        assert!(created);
        let (_, created) = index.find_or_create("a");
        assert!(!created);
        assert_eq!(index.key_count(), 1);
    }

    #[rstest]
    fn test_positions_are_kept_oldest_first() {
        let slots = positions(3);
        let index = index_of(&[(1, slots[0]), (1, slots[1]), (1, slots[2])]);

        let list = index.find(&1).unwrap();
        assert_eq!(list.iter().collect::<Vec<_>>(), slots);
        assert_eq!(list.oldest(), Some(slots[0]));
        assert_eq!(list.newest(), Some(slots[2]));
        assert_eq!(index.count(&1), 3);
        assert_eq!(index.position_count(), 3);
    }

    #[rstest]
    fn test_remove_entry_removes_drained_key() {
        let slots = positions(2);
        let mut index = index_of(&[(7, slots[0]), (7, slots[1])]);

        assert!(index.remove_entry(&7, slots[0]));
        assert!(index.contains_key(&7));
        assert_eq!(index.find(&7).unwrap().oldest(), Some(slots[1]));
        assert!(index.remove_entry(&7, slots[1]));
        assert!(!index.contains_key(&7));
        assert!(!index.remove_entry(&7, slots[1]));
    }

    #[rstest]
    fn test_remove_entry_keeps_order_of_the_rest() {
        let slots = positions(3);
        let mut index = index_of(&[(1, slots[0]), (1, slots[1]), (1, slots[2])]);

        assert!(index.remove_entry(&1, slots[1]));
        assert_eq!(
            index.find(&1).unwrap().iter().collect::<Vec<_>>(),
            vec![slots[0], slots[2]]
        );
    }

    #[rstest]
    fn test_remove_entry_ignores_foreign_position() {
        let slots = positions(2);
        let mut index = index_of(&[(1, slots[0]), (2, slots[1])]);

        assert!(!index.remove_entry(&1, slots[1]));
        assert_eq!(index.count(&1), 1);
        assert_eq!(index.count(&2), 1);
    }

    #[rstest]
    fn test_try_push_failure_leaves_list_unchanged() {
        let slots = positions(2);
        let mut list = PositionList::new();
        list.try_push(slots[0]).unwrap();

        fail_next_push();
        assert!(matches!(
            list.try_push(slots[1]),
            Err(KvFifoError::AllocationFailure(_))
        ));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![slots[0]]);

        list.try_push(slots[1]).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[rstest]
    fn test_remove_key_drops_created_list() {
        let mut index: KeyIndex<i32> = KeyIndex::new();
        let (list, created) = index.find_or_create(4);
        assert!(created);
        assert!(list.is_empty());

        assert_eq!(index.remove_key(&4), Some(PositionList::new()));
        assert_eq!(index.key_count(), 0);
    }

    #[rstest]
    fn test_keys_ascend_without_duplicates() {
        let slots = positions(5);
        let index = index_of(&[
            (3, slots[0]),
            (1, slots[1]),
            (3, slots[2]),
            (2, slots[3]),
            (1, slots[4]),
        ]);

        let keys: Vec<i32> = index.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(index.keys().len(), 3);
        assert_eq!(index.keys().next_back(), Some(&3));
    }

    #[rstest]
    fn test_keys_iterator_restarts_from_clone() {
        let slots = positions(2);
        let index = index_of(&[(1, slots[0]), (2, slots[1])]);

        let mut keys = index.keys();
        let saved = keys.clone();
        keys.next();
        assert_eq!(keys.copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(saved.copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[rstest]
    fn test_borrowed_key_lookup() {
        let slots = positions(1);
        let mut index = KeyIndex::new();
        let (list, _) = index.find_or_create("key".to_string());
        list.try_push(slots[0]).unwrap();

        assert_eq!(index.count("key"), 1);
        assert_eq!(index.remove_key("key").map(|list| list.len()), Some(1));
        assert!(!index.contains_key("key"));
    }
}
