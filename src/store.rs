//! Ordered sequence with stable positions.
//!
//! [`OrderedStore`] keeps its entries in a slot arena and threads them into a
//! doubly linked list by slot index. A [`Position`] names one slot together
//! with the generation the slot had when the entry was stored, so it keeps
//! addressing the same entry while other entries are appended, removed, or
//! relocated, and stops resolving once its own entry is removed.
//!
//! ```text
//!   slots (Vec<Slot<T>>)
//!   ┌───────┬─────────────────────────────────────────────────┐
//!   │ index │ Slot { generation, node }                       │
//!   ├───────┼─────────────────────────────────────────────────┤
//!   │ 0     │ { 0, Node { A, prev: None,    next: Some(2) } } │
//!   │ 1     │ { 1, None }  (free)                             │
//!   │ 2     │ { 0, Node { C, prev: Some(0), next: None    } } │
//!   └───────┴─────────────────────────────────────────────────┘
//!
//!   head ─► [0] ◄──► [2] ◄── tail        free_list: [1]
//! ```
//!
//! Cloning a store copies it slot for slot, so every [`Position`] taken from
//! the source resolves to the corresponding entry of the clone.
//!
//! # Time Complexity
//!
//! | Operation         | Complexity       |
//! |-------------------|------------------|
//! | `try_append`      | O(1) amortized   |
//! | `remove`          | O(1)             |
//! | `relocate_to_end` | O(1)             |
//! | `front` / `back`  | O(1)             |
//! | `get` / `get_mut` | O(1)             |
//! | `clone`           | O(n)             |

use crate::error::Result;

/// A stable reference to one entry of an [`OrderedStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    index: usize,
    generation: u64,
}

impl Position {
    /// Returns the slot index this position refers to.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u64,
    node: Option<Node<T>>,
}

/// An append-friendly sequence whose entries keep stable [`Position`]s.
///
/// # Examples
///
/// ```rust
/// use kvfifo::store::OrderedStore;
///
/// let mut store = OrderedStore::new();
/// let first = store.try_append("a").unwrap();
/// let second = store.try_append("b").unwrap();
/// store.try_append("c").unwrap();
///
/// store.relocate_to_end(first);
/// assert_eq!(store.iter().copied().collect::<Vec<_>>(), vec!["b", "c", "a"]);
///
/// assert_eq!(store.remove(second), Some("b"));
/// assert_eq!(store.get(second), None);
/// assert_eq!(store.get(first), Some(&"a"));
/// ```
#[derive(Debug, Clone)]
pub struct OrderedStore<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    length: usize,
}

impl<T> OrderedStore<T> {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
            length: 0,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the store holds no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Appends `value` at the logical end and returns its position.
    ///
    /// Existing positions stay valid. A freed slot is reused when one is
    /// available; otherwise the slot vector grows through a fallible
    /// reservation.
    ///
    /// # Errors
    ///
    /// Returns [`KvFifoError::AllocationFailure`](crate::KvFifoError::AllocationFailure)
    /// when the slot vector cannot grow. The store is unchanged in that case.
    pub fn try_append(&mut self, value: T) -> Result<Position> {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };

        let index = if let Some(index) = self.free_list.pop() {
            self.slots[index].node = Some(node);
            index
        } else {
            self.slots.try_reserve(1)?;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            self.slots.len() - 1
        };

        if let Some(tail) = self.tail {
            if let Some(tail_node) = self.node_mut(tail) {
                tail_node.next = Some(index);
            }
        } else {
            self.head = Some(index);
        }
        self.tail = Some(index);
        self.length += 1;

        Ok(Position {
            index,
            generation: self.slots[index].generation,
        })
    }

    /// Removes the entry at `position` and returns its value.
    ///
    /// Returns `None` if `position` no longer refers to a live entry.
    pub fn remove(&mut self, position: Position) -> Option<T> {
        if !self.contains(position) {
            return None;
        }
        self.detach(position.index);

        let slot = &mut self.slots[position.index];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(position.index);
        self.length -= 1;
        Some(node.value)
    }

    /// Moves the entry at `position` to the logical end.
    ///
    /// The relative order of every other entry is preserved. Returns `false`
    /// if `position` no longer refers to a live entry.
    pub fn relocate_to_end(&mut self, position: Position) -> bool {
        if !self.contains(position) {
            return false;
        }
        if self.tail == Some(position.index) {
            return true;
        }
        self.detach(position.index);
        self.attach_back(position.index);
        true
    }

    /// Returns `true` if `position` refers to a live entry.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        self.slots
            .get(position.index)
            .is_some_and(|slot| slot.generation == position.generation && slot.node.is_some())
    }

    /// Returns the value at `position`, if it is still live.
    #[must_use]
    pub fn get(&self, position: Position) -> Option<&T> {
        self.slots
            .get(position.index)
            .filter(|slot| slot.generation == position.generation)
            .and_then(|slot| slot.node.as_ref())
            .map(|node| &node.value)
    }

    /// Returns a mutable reference to the value at `position`, if it is still live.
    pub fn get_mut(&mut self, position: Position) -> Option<&mut T> {
        self.slots
            .get_mut(position.index)
            .filter(|slot| slot.generation == position.generation)
            .and_then(|slot| slot.node.as_mut())
            .map(|node| &mut node.value)
    }

    /// Returns the first entry and its position.
    #[must_use]
    pub fn front(&self) -> Option<(Position, &T)> {
        self.head.and_then(|index| self.entry_at(index))
    }

    /// Returns the last entry and its position.
    #[must_use]
    pub fn back(&self) -> Option<(Position, &T)> {
        self.tail.and_then(|index| self.entry_at(index))
    }

    /// Returns an iterator over the values from front to back.
    #[must_use]
    pub fn iter(&self) -> OrderedStoreIterator<'_, T> {
        OrderedStoreIterator {
            store: self,
            current: self.head,
            remaining: self.length,
        }
    }

    fn entry_at(&self, index: usize) -> Option<(Position, &T)> {
        let slot = self.slots.get(index)?;
        let node = slot.node.as_ref()?;
        Some((
            Position {
                index,
                generation: slot.generation,
            },
            &node.value,
        ))
    }

    fn node(&self, index: usize) -> Option<&Node<T>> {
        self.slots.get(index).and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(index).and_then(|slot| slot.node.as_mut())
    }

    fn detach(&mut self, index: usize) {
        let Some((prev, next)) = self.node(index).map(|node| (node.prev, node.next)) else {
            return;
        };

        if let Some(prev_index) = prev {
            if let Some(prev_node) = self.node_mut(prev_index) {
                prev_node.next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_index) = next {
            if let Some(next_node) = self.node_mut(next_index) {
                next_node.prev = prev;
            }
        } else {
            self.tail = prev;
        }

        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_back(&mut self, index: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(index) {
            node.prev = old_tail;
            node.next = None;
        } else {
            return;
        }

        if let Some(old_tail) = old_tail {
            if let Some(tail_node) = self.node_mut(old_tail) {
                tail_node.next = Some(index);
            }
        } else {
            self.head = Some(index);
        }
        self.tail = Some(index);
    }

    /// Walks the links and asserts that they agree with the recorded length.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if self.head.is_none() || self.tail.is_none() {
            assert!(self.head.is_none());
            assert!(self.tail.is_none());
            assert_eq!(self.length, 0);
            return;
        }

        let mut count = 0usize;
        let mut current = self.head;
        let mut prev = None;
        while let Some(index) = current {
            let node = self.node(index).expect("linked slot must be occupied");
            assert_eq!(node.prev, prev);
            if node.next.is_none() {
                assert_eq!(self.tail, Some(index));
            }
            prev = Some(index);
            current = node.next;
            count += 1;
            assert!(count <= self.length);
        }

        assert_eq!(count, self.length);
        assert_eq!(self.slots.len() - self.free_list.len(), self.length);
    }
}

impl<T> Default for OrderedStore<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the values of an [`OrderedStore`] from front to back.
#[derive(Clone)]
pub struct OrderedStoreIterator<'a, T> {
    store: &'a OrderedStore<T>,
    current: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for OrderedStoreIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        let node = self.store.node(index)?;
        self.current = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for OrderedStoreIterator<'_, T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn collect<T: Clone>(store: &OrderedStore<T>) -> Vec<T> {
        store.iter().cloned().collect()
    }

    #[rstest]
    fn test_new_store_is_empty() {
        let store: OrderedStore<i32> = OrderedStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.front().is_none());
        assert!(store.back().is_none());
        store.debug_validate_invariants();
    }

    #[rstest]
    fn test_append_keeps_insertion_order() {
        let mut store = OrderedStore::new();
        for value in 1..=4 {
            store.try_append(value).unwrap();
        }
        assert_eq!(collect(&store), vec![1, 2, 3, 4]);
        assert_eq!(store.front().map(|(_, value)| *value), Some(1));
        assert_eq!(store.back().map(|(_, value)| *value), Some(4));
        store.debug_validate_invariants();
    }

    #[rstest]
    #[case::head(0, vec![2, 3])]
    #[case::middle(1, vec![1, 3])]
    #[case::tail(2, vec![1, 2])]
    fn test_remove_unlinks_entry(#[case] victim: usize, #[case] expected: Vec<i32>) {
        let mut store = OrderedStore::new();
        let positions: Vec<_> = (1..=3).map(|value| store.try_append(value).unwrap()).collect();

        let removed = store.remove(positions[victim]);

        assert_eq!(removed, Some(i32::try_from(victim).unwrap() + 1));
        assert_eq!(collect(&store), expected);
        store.debug_validate_invariants();
    }

    #[rstest]
    fn test_other_positions_survive_removal() {
        let mut store = OrderedStore::new();
        let first = store.try_append("a").unwrap();
        let second = store.try_append("b").unwrap();
        let third = store.try_append("c").unwrap();

        store.remove(second);

        assert_eq!(store.get(first), Some(&"a"));
        assert_eq!(store.get(third), Some(&"c"));
    }

    #[rstest]
    fn test_stale_position_does_not_resolve_after_slot_reuse() {
        let mut store = OrderedStore::new();
        let stale = store.try_append("old").unwrap();
        store.remove(stale);
        let fresh = store.try_append("new").unwrap();

        assert_eq!(stale.index(), fresh.index());
        assert_eq!(store.get(stale), None);
        assert_eq!(store.get(fresh), Some(&"new"));
        assert_eq!(store.remove(stale), None);
        assert!(!store.relocate_to_end(stale));
        assert_eq!(store.len(), 1);
    }

    #[rstest]
    fn test_relocate_to_end_preserves_order_of_others() {
        let mut store = OrderedStore::new();
        let positions: Vec<_> = (1..=5).map(|value| store.try_append(value).unwrap()).collect();

        assert!(store.relocate_to_end(positions[1]));
        assert!(store.relocate_to_end(positions[3]));

        assert_eq!(collect(&store), vec![1, 3, 5, 2, 4]);
        assert_eq!(store.get(positions[1]), Some(&2));
        store.debug_validate_invariants();
    }

    #[rstest]
    fn test_relocate_tail_is_noop() {
        let mut store = OrderedStore::new();
        store.try_append(1).unwrap();
        let tail = store.try_append(2).unwrap();

        assert!(store.relocate_to_end(tail));
        assert_eq!(collect(&store), vec![1, 2]);
    }

    #[rstest]
    fn test_relocate_single_entry() {
        let mut store = OrderedStore::new();
        let only = store.try_append(7).unwrap();
        assert!(store.relocate_to_end(only));
        assert_eq!(collect(&store), vec![7]);
        store.debug_validate_invariants();
    }

    #[rstest]
    fn test_get_mut_updates_value() {
        let mut store = OrderedStore::new();
        let position = store.try_append(10).unwrap();
        *store.get_mut(position).unwrap() += 5;
        assert_eq!(store.get(position), Some(&15));
    }

    #[rstest]
    fn test_clone_keeps_positions_valid() {
        let mut store = OrderedStore::new();
        let first = store.try_append("a".to_string()).unwrap();
        let second = store.try_append("b".to_string()).unwrap();
        store.relocate_to_end(first);

        let mut copy = store.clone();
        copy.get_mut(first).unwrap().push('!');

        assert_eq!(copy.get(first), Some(&"a!".to_string()));
        assert_eq!(copy.get(second), Some(&"b".to_string()));
        assert_eq!(store.get(first), Some(&"a".to_string()));
        assert_eq!(collect(&copy), vec!["b".to_string(), "a!".to_string()]);
        copy.debug_validate_invariants();
    }

    #[rstest]
    fn test_iterator_is_exact_size() {
        let mut store = OrderedStore::new();
        for value in 0..3 {
            store.try_append(value).unwrap();
        }
        let mut iterator = store.iter();
        assert_eq!(iterator.len(), 3);
        iterator.next();
        assert_eq!(iterator.len(), 2);
    }
}
