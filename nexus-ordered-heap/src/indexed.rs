//! Max-heap with an insertion-order list threaded through array positions.
//!
//! Elements live directly in the heap array. Their `prev`/`next` links are
//! array positions, so any move inside the array must rewrite every link that
//! names one of the moved slots:
//!
//! ```text
//!        order list:   p ──▶ A ──▶ n        B
//!        heap array:   [.., A@a, .., B@b, ..]
//!
//! exchange(a, b):
//!   p.next = b, n.prev = b        outside neighbors follow A to b
//!   A.x == b  =>  A.x = a         a link to the partner follows it to a
//!   swap cells, remap first/last
//! ```
//!
//! A link between the two exchanged elements is rewritten only on the element
//! that owns it. Writing it through the partner as a neighbor update would
//! make the element point at its own new slot.
//!
//! Prefer [`OrderedHeap`](crate::OrderedHeap) unless the arena indirection is
//! unwanted; positions returned here go stale after the next mutation.

use core::mem;

use crate::{Error, Result, Slot, tree};

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Order-preserving max-heap whose list links are array positions.
///
/// # Example
///
/// ```
/// use nexus_ordered_heap::IndexedOrderedHeap;
///
/// let mut heap: IndexedOrderedHeap<i64, ()> = IndexedOrderedHeap::new();
///
/// // Each insert names its order-list predecessor by current position.
/// let mut pos = None;
/// for key in [5, 20, 3, 9, 2, 10] {
///     pos = Some(heap.insert(pos, key, ()).unwrap());
/// }
///
/// let order: Vec<_> = heap.iter().map(|(k, _)| *k).collect();
/// assert_eq!(order, [5, 20, 3, 9, 2, 10]);
/// assert_eq!(heap.delete_max().unwrap().0, 20);
/// ```
#[derive(Debug, Clone)]
pub struct IndexedOrderedHeap<K, V> {
    array: Vec<Node<K, V>>,
    /// Position of the oldest live element.
    first: usize,
    /// Position of the newest live element.
    last: usize,
}

impl<K: Ord, V> Default for IndexedOrderedHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> IndexedOrderedHeap<K, V> {
    /// Creates an empty heap.
    #[inline]
    pub const fn new() -> Self {
        Self {
            array: Vec::new(),
            first: usize::NONE,
            last: usize::NONE,
        }
    }

    /// Creates an empty heap with pre-allocated capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            array: Vec::with_capacity(capacity),
            first: usize::NONE,
            last: usize::NONE,
        }
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns `true` if the heap is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    // ========================================================================
    // Insert operations
    // ========================================================================

    /// Inserts an element after the element at `predecessor` in the order
    /// list and bubbles it up.
    ///
    /// `None` inserts at the head of the order list. Returns the element's
    /// final position.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if `predecessor` is not a valid position.
    pub fn insert(&mut self, predecessor: Option<usize>, key: K, value: V) -> Result<usize> {
        let pos = self.append(predecessor, key, value)?;
        Ok(self.sift_up(pos))
    }

    /// Inserts after the newest live element.
    #[inline]
    pub fn push(&mut self, key: K, value: V) -> usize {
        let pos = self.append_tail(key, value);
        self.sift_up(pos)
    }

    /// Appends at the array end and the order-list tail without bubbling.
    ///
    /// The heap property is suspended until [`build_heap`](Self::build_heap).
    #[inline]
    pub fn push_unordered(&mut self, key: K, value: V) -> usize {
        self.append_tail(key, value)
    }

    /// Restores the heap property over the whole array in O(n).
    pub fn build_heap(&mut self) {
        let len = self.array.len();
        log::debug!("build_heap: {len} elements");

        if let Some(last) = tree::last_internal(len) {
            for p in (0..=last).rev() {
                self.sift_down(p);
            }
        }
    }

    // ========================================================================
    // Remove operations
    // ========================================================================

    /// Removes the element at `pos`, compacting the array with the last
    /// element and re-heapifying at `pos`.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if the heap is empty
    /// - [`Error::OutOfBounds`] if `pos >= len`
    pub fn delete(&mut self, pos: usize) -> Result<(K, V)> {
        if self.array.is_empty() {
            log::trace!("delete on empty heap");
            return Err(Error::Empty);
        }
        self.check_bounds(pos)?;

        self.unlink(pos);

        let last_pos = self.array.len() - 1;
        if pos != last_pos {
            // The last element moves into `pos`; its neighbors follow it.
            let (prev, next) = (self.array[last_pos].prev, self.array[last_pos].next);
            if prev.is_some() {
                self.array[prev].next = pos;
            }
            if next.is_some() {
                self.array[next].prev = pos;
            }
            if self.first == last_pos {
                self.first = pos;
            }
            if self.last == last_pos {
                self.last = pos;
            }
        }

        let node = self.array.swap_remove(pos);
        if pos < self.array.len() {
            self.heapify_from(pos);
        }
        Ok((node.key, node.value))
    }

    /// Removes the maximum element.
    ///
    /// # Errors
    ///
    /// [`Error::Empty`] if the heap is empty.
    #[inline]
    pub fn delete_max(&mut self) -> Result<(K, V)> {
        self.delete(0)
    }

    /// Removes the maximum element, or returns `None` if empty.
    #[inline]
    pub fn pop(&mut self) -> Option<(K, V)> {
        self.delete_max().ok()
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        log::debug!("clear: dropping {} elements", self.array.len());
        self.array.clear();
        self.first = usize::NONE;
        self.last = usize::NONE;
    }

    // ========================================================================
    // Priority updates
    // ========================================================================

    /// Replaces the key at `pos` and restores the heap property.
    ///
    /// Returns the previous key.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if `pos >= len`.
    pub fn update(&mut self, pos: usize, key: K) -> Result<K> {
        self.check_bounds(pos)?;
        let old = mem::replace(&mut self.array[pos].key, key);
        self.heapify_from(pos);
        Ok(old)
    }

    /// Bubbles up, then down, from `pos`. Returns the element's final
    /// position.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if `pos >= len`.
    pub fn heapify(&mut self, pos: usize) -> Result<usize> {
        self.check_bounds(pos)?;
        Ok(self.heapify_from(pos))
    }

    /// Exchanges the element at `child_pos` with its parent, repairing all
    /// order-list links that name either slot.
    ///
    /// Returns the parent position, which now holds the former child.
    ///
    /// # Errors
    ///
    /// - [`Error::RootSwap`] if `child_pos == 0`
    /// - [`Error::OutOfBounds`] if `child_pos >= len`
    pub fn swap(&mut self, child_pos: usize) -> Result<usize> {
        let Some(parent) = tree::parent(child_pos) else {
            log::trace!("swap rejected at root");
            return Err(Error::RootSwap);
        };
        self.check_bounds(child_pos)?;
        self.exchange(child_pos, parent);
        Ok(parent)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns the maximum key and its payload.
    #[inline]
    pub fn peek(&self) -> Option<(&K, &V)> {
        self.array.first().map(|n| (&n.key, &n.value))
    }

    /// Returns the key at `pos`.
    #[inline]
    pub fn key(&self, pos: usize) -> Option<&K> {
        self.array.get(pos).map(|n| &n.key)
    }

    /// Returns the payload at `pos`.
    #[inline]
    pub fn get(&self, pos: usize) -> Option<&V> {
        self.array.get(pos).map(|n| &n.value)
    }

    /// Returns the payload at `pos` mutably.
    #[inline]
    pub fn get_mut(&mut self, pos: usize) -> Option<&mut V> {
        self.array.get_mut(pos).map(|n| &mut n.value)
    }

    /// Returns the position of the oldest live element.
    #[inline]
    pub fn first_inserted(&self) -> Option<usize> {
        self.first.to_option()
    }

    /// Returns the position of the newest live element.
    #[inline]
    pub fn last_inserted(&self) -> Option<usize> {
        self.last.to_option()
    }

    /// Returns the position of the element inserted right after the one at
    /// `pos`.
    #[inline]
    pub fn next_of(&self, pos: usize) -> Option<usize> {
        self.array.get(pos)?.next.to_option()
    }

    /// Returns the position of the element inserted right before the one at
    /// `pos`.
    #[inline]
    pub fn prev_of(&self, pos: usize) -> Option<usize> {
        self.array.get(pos)?.prev.to_option()
    }

    /// Iterates `(key, payload)` in insertion order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            array: &self.array,
            front: self.first,
            back: self.last,
            remaining: self.array.len(),
        }
    }

    /// Iterates current positions in insertion order.
    #[inline]
    pub fn positions(&self) -> Positions<'_, K, V> {
        Positions {
            array: &self.array,
            front: self.first,
            back: self.last,
            remaining: self.array.len(),
        }
    }

    /// Verifies the heap property, link consistency and both directions of
    /// the order list.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] describing the first broken invariant.
    pub fn check(&self) -> Result<()> {
        let len = self.array.len();

        for (p, node) in self.array.iter().enumerate() {
            if let Some(parent) = tree::parent(p) {
                if self.array[parent].key < node.key {
                    return Err(violation(format!(
                        "position {p} is greater than its parent {parent}"
                    )));
                }
            }
            for (name, link) in [("prev", node.prev), ("next", node.next)] {
                if link.is_some() && link >= len {
                    return Err(violation(format!(
                        "position {p} has {name} link {link} past length {len}"
                    )));
                }
            }
            if node.prev.is_some() && self.array[node.prev].next != p {
                return Err(violation(format!(
                    "prev of {p} is {}, whose next is not {p}",
                    node.prev
                )));
            }
            if node.next.is_some() && self.array[node.next].prev != p {
                return Err(violation(format!(
                    "next of {p} is {}, whose prev is not {p}",
                    node.next
                )));
            }
        }

        let walk = |start: usize, step: fn(&Node<K, V>) -> usize| -> Result<(usize, usize)> {
            let mut count = 0;
            let mut end = usize::NONE;
            let mut cur = start;
            while cur.is_some() {
                count += 1;
                if count > len {
                    return Err(violation("order list does not terminate".into()));
                }
                end = cur;
                cur = step(&self.array[cur]);
            }
            Ok((count, end))
        };

        let (forward, tail) = walk(self.first, |n| n.next)?;
        if forward != len || tail != self.last {
            return Err(violation(format!(
                "forward walk visits {forward} of {len}, ends at {tail} (last_inserted {})",
                self.last
            )));
        }
        let (backward, head) = walk(self.last, |n| n.prev)?;
        if backward != len || head != self.first {
            return Err(violation(format!(
                "reverse walk visits {backward} of {len}, ends at {head} (first_inserted {})",
                self.first
            )));
        }

        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    #[inline]
    fn check_bounds(&self, pos: usize) -> Result<()> {
        let len = self.array.len();
        if pos >= len {
            log::trace!("position {pos} rejected, len {len}");
            return Err(Error::OutOfBounds { pos, len });
        }
        Ok(())
    }

    fn append(&mut self, predecessor: Option<usize>, key: K, value: V) -> Result<usize> {
        if let Some(p) = predecessor {
            self.check_bounds(p)?;
        }

        let pos = self.array.len();
        self.array.push(Node {
            key,
            value,
            prev: usize::NONE,
            next: usize::NONE,
        });

        let next = match predecessor {
            Some(p) => mem::replace(&mut self.array[p].next, pos),
            None => mem::replace(&mut self.first, pos),
        };
        self.array[pos].prev = usize::from_option(predecessor);
        self.array[pos].next = next;
        if next.is_some() {
            self.array[next].prev = pos;
        } else {
            self.last = pos;
        }

        Ok(pos)
    }

    #[inline]
    fn append_tail(&mut self, key: K, value: V) -> usize {
        let pos = self.array.len();
        self.array.push(Node {
            key,
            value,
            prev: self.last,
            next: usize::NONE,
        });

        if self.last.is_some() {
            self.array[self.last].next = pos;
        } else {
            self.first = pos;
        }
        self.last = pos;
        pos
    }

    fn unlink(&mut self, pos: usize) {
        let (prev, next) = (self.array[pos].prev, self.array[pos].next);

        if prev.is_some() {
            self.array[prev].next = next;
        } else {
            self.first = next;
        }

        if next.is_some() {
            self.array[next].prev = prev;
        } else {
            self.last = prev;
        }
    }

    /// Swaps the elements at `a` and `b` and rewrites every link naming
    /// either slot. Uses pre-swap link values throughout.
    fn exchange(&mut self, a: usize, b: usize) {
        let (a_prev, a_next) = (self.array[a].prev, self.array[a].next);
        let (b_prev, b_next) = (self.array[b].prev, self.array[b].next);

        // Outside neighbors follow the moved element.
        if a_prev.is_some() && a_prev != b {
            self.array[a_prev].next = b;
        }
        if a_next.is_some() && a_next != b {
            self.array[a_next].prev = b;
        }
        if b_prev.is_some() && b_prev != a {
            self.array[b_prev].next = a;
        }
        if b_next.is_some() && b_next != a {
            self.array[b_next].prev = a;
        }

        let relocate = |link: usize| {
            if link == a {
                b
            } else if link == b {
                a
            } else {
                link
            }
        };

        // Links between the pair follow the partner.
        self.array[a].prev = relocate(a_prev);
        self.array[a].next = relocate(a_next);
        self.array[b].prev = relocate(b_prev);
        self.array[b].next = relocate(b_next);

        self.array.swap(a, b);
        self.first = relocate(self.first);
        self.last = relocate(self.last);
    }

    #[inline]
    fn heapify_from(&mut self, pos: usize) -> usize {
        let pos = self.sift_up(pos);
        self.sift_down(pos)
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while let Some(parent) = tree::parent(pos) {
            if self.array[parent].key >= self.array[pos].key {
                break;
            }
            self.exchange(pos, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) -> usize {
        let len = self.array.len();
        while !tree::is_leaf(pos, len) {
            let left = tree::left_child(pos);
            let right = tree::right_child(pos);

            let larger = if right < len && self.array[left].key < self.array[right].key {
                right
            } else {
                left
            };

            if self.array[larger].key <= self.array[pos].key {
                break;
            }
            self.exchange(larger, pos);
            pos = larger;
        }
        pos
    }
}

#[inline]
fn violation(msg: String) -> Error {
    Error::InvariantViolation(msg)
}

impl<K: Ord, V> Extend<(K, V)> for IndexedOrderedHeap<K, V> {
    /// Appends every item in order, then rebuilds the heap once.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.append_tail(key, value);
        }
        self.build_heap();
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for IndexedOrderedHeap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut heap = Self::new();
        heap.extend(iter);
        heap
    }
}

/// Insertion-order iterator over `(key, payload)`.
pub struct Iter<'a, K, V> {
    array: &'a [Node<K, V>],
    front: usize,
    back: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.array[self.front];
        self.front = node.next;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.array[self.back];
        self.back = node.prev;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Insertion-order iterator over current positions.
pub struct Positions<'a, K, V> {
    array: &'a [Node<K, V>],
    front: usize,
    back: usize,
    remaining: usize,
}

impl<K, V> Iterator for Positions<'_, K, V> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.front;
        self.front = self.array[pos].next;
        self.remaining -= 1;
        Some(pos)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Positions<'_, K, V> {
    fn next_back(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.back;
        self.back = self.array[pos].prev;
        self.remaining -= 1;
        Some(pos)
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a IndexedOrderedHeap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
