//! Max-heap over arena storage that remembers insertion order.
//!
//! Entries live in a [`Storage`] arena and are addressed by slot. The heap
//! array holds slots, and every entry embeds:
//!
//! - its current heap position (back-reference, refreshed on every move)
//! - `prev`/`next` slots threading the insertion-order list
//! - the generation it was inserted under
//!
//! Because links are slots rather than positions, moving an entry inside
//! the heap array never touches the order list. A swap exchanges two array
//! cells and refreshes two back-references.
//!
//! Callers hold a [`Handle`]: slot plus generation. Arenas reuse freed slots,
//! so every lookup compares generations and a handle to a removed entry
//! reports [`Error::StaleHandle`] instead of reaching its slot's new tenant.

use core::marker::PhantomData;
use core::mem;

use crate::{Error, Result, Slot, Storage, tree};

/// Generation-checked reference to an entry of an [`OrderedHeap`].
///
/// Returned by every insert. Stays valid until the entry is removed, however
/// often the entry moves inside the heap. Once removed, the handle never
/// resolves again, even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle<H = usize> {
    slot: H,
    generation: u64,
}

impl<H: Slot> Handle<H> {
    /// Returns the arena slot. Reused by later inserts once the entry is
    /// removed.
    #[inline]
    pub fn slot(&self) -> H {
        self.slot
    }

    /// Returns the generation the entry was inserted under.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// An element of an [`OrderedHeap`], as stored in the arena.
///
/// Only reachable through the heap's storage; the fields are maintained by
/// the heap.
#[derive(Debug, Clone)]
pub struct Entry<K, V, H = usize> {
    key: K,
    value: V,
    pos: usize,
    generation: u64,
    prev: H,
    next: H,
}

impl<K, V, H: Slot> Entry<K, V, H> {
    /// Returns the sort key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the payload.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the entry's current heap position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the generation the entry was inserted under.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A max-heap that also keeps its live entries in insertion order.
///
/// Insert returns a [`Handle`]. Handles stay valid until their entry is
/// removed, independent of how often the entry moves inside the heap, so
/// they can drive [`update`](Self::update) and [`delete`](Self::delete)
/// directly.
///
/// # Example
///
/// ```
/// use nexus_ordered_heap::{Error, OrderedHeap};
///
/// let mut heap: OrderedHeap<u32, &str> = OrderedHeap::new();
///
/// let a = heap.push(5, "a").unwrap();
/// let b = heap.push(20, "b").unwrap();
/// heap.push(3, "c").unwrap();
///
/// // Max first.
/// assert_eq!(heap.peek(), Some((&20, &"b")));
///
/// // Insertion order, independent of heap layout.
/// let order: Vec<_> = heap.iter().map(|(_, v)| *v).collect();
/// assert_eq!(order, ["a", "b", "c"]);
///
/// // Raise a's key above everything else.
/// heap.update(a, 100).unwrap();
/// assert_eq!(heap.delete_max().unwrap(), (100, "a"));
///
/// heap.delete(b).unwrap();
/// assert_eq!(heap.len(), 1);
///
/// // Removed entries stay removed, even once their slot is reused.
/// heap.push(7, "d").unwrap();
/// assert_eq!(heap.delete(a), Err(Error::StaleHandle));
/// ```
///
/// # Storage
///
/// The default arena is a growable `slab::Slab` with `usize` slots. Use
/// [`with_storage`](Self::with_storage) with a [`BoundedSlab`](crate::BoundedSlab)
/// for a fixed-capacity heap that never reallocates its arena, optionally
/// with narrower slots:
///
/// ```
/// use nexus_ordered_heap::{BoundedSlab, Entry, OrderedHeap};
///
/// type Arena = BoundedSlab<Entry<u64, (), u32>, u32>;
///
/// let mut heap: OrderedHeap<u64, (), Arena, u32> =
///     OrderedHeap::with_storage(BoundedSlab::with_capacity(1024));
/// let h = heap.push(9, ()).unwrap();
/// assert_eq!(h.slot(), 0u32);
/// ```
#[derive(Debug, Clone)]
pub struct OrderedHeap<K, V, S = slab::Slab<Entry<K, V>>, H: Slot = usize> {
    storage: S,
    /// Heap-ordered slots.
    heap: Vec<H>,
    /// Head of the order list.
    first: H,
    /// Tail of the order list.
    last: H,
    /// Stamped on the next inserted entry. Never reset.
    generation: u64,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: Ord, V> Default for OrderedHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> OrderedHeap<K, V> {
    /// Creates an empty heap backed by a growable slab.
    #[inline]
    pub fn new() -> Self {
        Self::with_storage(slab::Slab::new())
    }

    /// Creates an empty heap with room for `capacity` entries before
    /// reallocating.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut heap = Self::with_storage(slab::Slab::with_capacity(capacity));
        heap.heap.reserve(capacity);
        heap
    }
}

impl<K, V, S, H> OrderedHeap<K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
    /// Creates an empty heap over the given storage.
    ///
    /// # Panics
    ///
    /// Panics if `storage` is not empty. The heap assumes it owns every
    /// entry in its arena.
    pub fn with_storage(storage: S) -> Self {
        assert!(storage.is_empty(), "storage must be empty");

        Self {
            storage,
            heap: Vec::new(),
            first: H::NONE,
            last: H::NONE,
            generation: 0,
            _marker: PhantomData,
        }
    }

    /// Returns the number of entries in the heap.
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if the heap is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the backing storage.
    #[inline]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ========================================================================
    // Insert operations
    // ========================================================================

    /// Inserts an entry right after `predecessor` in the order list and
    /// restores the heap property.
    ///
    /// With `predecessor = None` the entry becomes the head of the order
    /// list. It becomes the tail when `predecessor` is the current tail (or
    /// the heap was empty).
    ///
    /// Returns the entry's handle.
    ///
    /// # Errors
    ///
    /// - [`Error::StaleHandle`] if `predecessor` is not live
    /// - [`Error::Full`] if bounded storage is full
    pub fn insert(
        &mut self,
        predecessor: Option<Handle<H>>,
        key: K,
        value: V,
    ) -> Result<Handle<H>> {
        let after = match predecessor {
            Some(p) => self.live_slot(p)?,
            None => H::NONE,
        };
        let handle = self.append(after, key, value)?;
        self.sift_up(self.heap.len() - 1);
        Ok(handle)
    }

    /// Inserts an entry after the most recently inserted live entry.
    #[inline]
    pub fn push(&mut self, key: K, value: V) -> Result<Handle<H>> {
        let handle = self.append(self.last, key, value)?;
        self.sift_up(self.heap.len() - 1);
        Ok(handle)
    }

    /// Appends an entry at the array end and the order-list tail without
    /// restoring the heap property.
    ///
    /// Call [`build_heap`](Self::build_heap) once all entries are appended.
    /// Until then max-queries and removals see an unordered array.
    #[inline]
    pub fn push_unordered(&mut self, key: K, value: V) -> Result<Handle<H>> {
        self.append(self.last, key, value)
    }

    /// Restores the heap property over the whole array in O(n).
    ///
    /// Bubbles down every internal position, from the last one to the root.
    pub fn build_heap(&mut self) {
        let len = self.heap.len();
        log::debug!("build_heap: {len} entries");

        if let Some(last) = tree::last_internal(len) {
            for p in (0..=last).rev() {
                self.sift_down(p);
            }
        }
    }

    /// Appends every item in order, then rebuilds the heap once.
    ///
    /// # Errors
    ///
    /// [`Error::Full`] if bounded storage fills up. Items appended before the
    /// rejected one stay, and the heap property holds on return either way.
    pub fn try_extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) -> Result<()> {
        let appended = iter
            .into_iter()
            .try_for_each(|(key, value)| self.push_unordered(key, value).map(drop));
        self.build_heap();
        appended
    }

    // ========================================================================
    // Remove operations
    // ========================================================================

    /// Removes the maximum entry and returns its key and payload.
    ///
    /// # Errors
    ///
    /// [`Error::Empty`] if the heap is empty.
    pub fn delete_max(&mut self) -> Result<(K, V)> {
        if self.heap.is_empty() {
            log::trace!("delete_max on empty heap");
            return Err(Error::Empty);
        }
        Ok(self.remove_at(0))
    }

    /// Removes the maximum entry, or returns `None` if empty.
    #[inline]
    pub fn pop(&mut self) -> Option<(K, V)> {
        self.delete_max().ok()
    }

    /// Removes the entry named by `handle`.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if the heap is empty
    /// - [`Error::StaleHandle`] if `handle` is not live
    pub fn delete(&mut self, handle: Handle<H>) -> Result<(K, V)> {
        if self.heap.is_empty() {
            return Err(Error::Empty);
        }
        let pos = self.resolve(handle).ok_or(Error::StaleHandle)?.pos;
        Ok(self.remove_at(pos))
    }

    /// Removes the entry at heap position `pos`.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if the heap is empty
    /// - [`Error::OutOfBounds`] if `pos >= len`
    pub fn delete_at(&mut self, pos: usize) -> Result<(K, V)> {
        if self.heap.is_empty() {
            return Err(Error::Empty);
        }
        self.check_bounds(pos)?;
        Ok(self.remove_at(pos))
    }

    /// Removes every entry. Outstanding handles become stale.
    pub fn clear(&mut self) {
        log::debug!("clear: dropping {} entries", self.heap.len());
        self.storage.clear();
        self.heap.clear();
        self.first = H::NONE;
        self.last = H::NONE;
    }

    // ========================================================================
    // Priority updates
    // ========================================================================

    /// Replaces an entry's key and restores the heap property.
    ///
    /// Returns the previous key. The order list is unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::StaleHandle`] if `handle` is not live.
    pub fn update(&mut self, handle: Handle<H>, key: K) -> Result<K> {
        let slot = self.live_slot(handle)?;
        Ok(self.replace_key(slot, key))
    }

    /// Replaces the key of the entry at heap position `pos`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if `pos >= len`.
    pub fn update_at(&mut self, pos: usize, key: K) -> Result<K> {
        self.check_bounds(pos)?;
        Ok(self.replace_key(self.heap[pos], key))
    }

    /// Restores the heap property around position `pos` after its key
    /// changed in either direction.
    ///
    /// Returns the entry's final position.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] if `pos >= len`.
    pub fn heapify(&mut self, pos: usize) -> Result<usize> {
        self.check_bounds(pos)?;
        Ok(self.heapify_from(pos))
    }

    /// Exchanges the entry at `child_pos` with its parent.
    ///
    /// Returns the parent position, which now holds the entry that was at
    /// `child_pos`. The order list is unaffected.
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
        self.swap_cells(child_pos, parent);
        Ok(parent)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Returns the key and payload of the maximum entry.
    pub fn peek(&self) -> Option<(&K, &V)> {
        let &slot = self.heap.first()?;
        let entry = self.entry(slot);
        Some((&entry.key, &entry.value))
    }

    /// Returns the handle of the maximum entry.
    #[inline]
    pub fn peek_handle(&self) -> Option<Handle<H>> {
        self.heap.first().map(|&slot| self.handle_of(slot))
    }

    /// Returns `true` if `handle` names a live entry.
    #[inline]
    pub fn contains(&self, handle: Handle<H>) -> bool {
        self.resolve(handle).is_some()
    }

    /// Returns the payload of an entry.
    #[inline]
    pub fn get(&self, handle: Handle<H>) -> Option<&V> {
        self.resolve(handle).map(|e| &e.value)
    }

    /// Returns the payload of an entry mutably. The key is not reachable
    /// here; change it through [`update`](Self::update).
    #[inline]
    pub fn get_mut(&mut self, handle: Handle<H>) -> Option<&mut V> {
        self.resolve_mut(handle).map(|e| &mut e.value)
    }

    /// Returns the key of an entry.
    #[inline]
    pub fn key(&self, handle: Handle<H>) -> Option<&K> {
        self.resolve(handle).map(|e| &e.key)
    }

    /// Returns the current heap position of an entry.
    #[inline]
    pub fn position(&self, handle: Handle<H>) -> Option<usize> {
        self.resolve(handle).map(|e| e.pos)
    }

    /// Returns the handle of the entry at heap position `pos`.
    #[inline]
    pub fn handle_at(&self, pos: usize) -> Option<Handle<H>> {
        self.heap.get(pos).map(|&slot| self.handle_of(slot))
    }

    /// Returns the oldest live entry.
    #[inline]
    pub fn first_inserted(&self) -> Option<Handle<H>> {
        self.link(self.first)
    }

    /// Returns the newest live entry.
    #[inline]
    pub fn last_inserted(&self) -> Option<Handle<H>> {
        self.link(self.last)
    }

    /// Returns the entry inserted right after `handle`.
    #[inline]
    pub fn next_of(&self, handle: Handle<H>) -> Option<Handle<H>> {
        self.link(self.resolve(handle)?.next)
    }

    /// Returns the entry inserted right before `handle`.
    #[inline]
    pub fn prev_of(&self, handle: Handle<H>) -> Option<Handle<H>> {
        self.link(self.resolve(handle)?.prev)
    }

    /// Iterates `(key, payload)` in insertion order.
    ///
    /// Reversible: `iter().rev()` walks from the newest entry.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V, S, H> {
        Iter {
            heap: self,
            front: self.first,
            back: self.last,
            remaining: self.heap.len(),
        }
    }

    /// Iterates handles in insertion order.
    #[inline]
    pub fn handles(&self) -> Handles<'_, K, V, S, H> {
        Handles {
            heap: self,
            front: self.first,
            back: self.last,
            remaining: self.heap.len(),
        }
    }

    /// Verifies the heap property, back-references, generations, density and
    /// both directions of the order list.
    ///
    /// # Errors
    ///
    /// [`Error::InvariantViolation`] describing the first broken invariant.
    pub fn check(&self) -> Result<()> {
        let len = self.heap.len();
        if self.storage.len() != len {
            return Err(violation(format!(
                "storage holds {} entries, heap array {len}",
                self.storage.len()
            )));
        }

        for (p, &slot) in self.heap.iter().enumerate() {
            let Some(entry) = self.storage.get(slot) else {
                return Err(violation(format!("position {p} holds a vacant slot")));
            };
            if entry.pos != p {
                return Err(violation(format!(
                    "entry at position {p} records position {}",
                    entry.pos
                )));
            }
            if entry.generation >= self.generation {
                return Err(violation(format!(
                    "entry at position {p} has generation {} from the future",
                    entry.generation
                )));
            }
            if let Some(parent) = tree::parent(p) {
                if self.key_at(parent) < &entry.key {
                    return Err(violation(format!(
                        "position {p} is greater than its parent {parent}"
                    )));
                }
            }
        }

        let mut count = 0;
        let mut prev = H::NONE;
        let mut cur = self.first;
        while cur.is_some() {
            let Some(entry) = self.storage.get(cur) else {
                return Err(violation("order list reaches a vacant slot".into()));
            };
            if entry.prev != prev {
                return Err(violation(format!(
                    "slot {cur:?} links back to {:?}, expected {prev:?}",
                    entry.prev
                )));
            }
            count += 1;
            if count > len {
                return Err(violation("order list is longer than the heap".into()));
            }
            prev = cur;
            cur = entry.next;
        }
        if prev != self.last {
            return Err(violation(format!(
                "forward walk ends at {prev:?}, last_inserted is {:?}",
                self.last
            )));
        }
        if count != len {
            return Err(violation(format!(
                "forward walk visits {count} of {len} entries"
            )));
        }

        let mut back = 0;
        let mut cur = self.last;
        while let Some(entry) = self.storage.get(cur) {
            back += 1;
            if back > len {
                return Err(violation("reverse walk does not terminate".into()));
            }
            cur = entry.prev;
        }
        if back != len {
            return Err(violation(format!(
                "reverse walk visits {back} of {len} entries"
            )));
        }

        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    #[inline]
    fn check_bounds(&self, pos: usize) -> Result<()> {
        let len = self.heap.len();
        if pos >= len {
            log::trace!("position {pos} rejected, len {len}");
            return Err(Error::OutOfBounds { pos, len });
        }
        Ok(())
    }

    /// Looks up a handle, rejecting vacant slots and reused ones.
    #[inline]
    fn resolve(&self, handle: Handle<H>) -> Option<&Entry<K, V, H>> {
        self.storage
            .get(handle.slot)
            .filter(|e| e.generation == handle.generation)
    }

    #[inline]
    fn resolve_mut(&mut self, handle: Handle<H>) -> Option<&mut Entry<K, V, H>> {
        self.storage
            .get_mut(handle.slot)
            .filter(|e| e.generation == handle.generation)
    }

    fn live_slot(&self, handle: Handle<H>) -> Result<H> {
        if self.resolve(handle).is_none() {
            log::trace!("stale handle {handle:?}");
            return Err(Error::StaleHandle);
        }
        Ok(handle.slot)
    }

    #[inline]
    fn handle_of(&self, slot: H) -> Handle<H> {
        Handle {
            slot,
            generation: self.entry(slot).generation,
        }
    }

    #[inline]
    fn link(&self, slot: H) -> Option<Handle<H>> {
        slot.to_option().map(|s| self.handle_of(s))
    }

    #[inline]
    fn entry(&self, slot: H) -> &Entry<K, V, H> {
        self.storage
            .get(slot)
            .expect("heap array and order list only hold live slots")
    }

    #[inline]
    fn entry_mut(&mut self, slot: H) -> &mut Entry<K, V, H> {
        self.storage
            .get_mut(slot)
            .expect("heap array and order list only hold live slots")
    }

    #[inline]
    fn key_at(&self, pos: usize) -> &K {
        &self.entry(self.heap[pos]).key
    }

    /// Stores the entry and links it after `after` (`NONE` for the head),
    /// leaving the heap property to the caller.
    fn append(&mut self, after: H, key: K, value: V) -> Result<Handle<H>> {
        let generation = self.generation;
        let slot = self.storage.try_insert(Entry {
            key,
            value,
            pos: self.heap.len(),
            generation,
            prev: H::NONE,
            next: H::NONE,
        })?;
        self.generation += 1;
        self.heap.push(slot);
        self.link_after(slot, after);
        Ok(Handle { slot, generation })
    }

    fn link_after(&mut self, slot: H, after: H) {
        let next = if after.is_some() {
            mem::replace(&mut self.entry_mut(after).next, slot)
        } else {
            mem::replace(&mut self.first, slot)
        };

        let entry = self.entry_mut(slot);
        entry.prev = after;
        entry.next = next;

        if next.is_some() {
            self.entry_mut(next).prev = slot;
        } else {
            self.last = slot;
        }
    }

    fn unlink(&mut self, slot: H) {
        let entry = self.entry(slot);
        let (prev, next) = (entry.prev, entry.next);

        if prev.is_some() {
            self.entry_mut(prev).next = next;
        } else {
            self.first = next;
        }

        if next.is_some() {
            self.entry_mut(next).prev = prev;
        } else {
            self.last = prev;
        }
    }

    /// Unlinks, compacts and re-heapifies. `pos` must be in bounds.
    fn remove_at(&mut self, pos: usize) -> (K, V) {
        let slot = self.heap[pos];
        self.unlink(slot);

        // Last slot fills the hole.
        self.heap.swap_remove(pos);
        if pos < self.heap.len() {
            let moved = self.heap[pos];
            self.entry_mut(moved).pos = pos;
            self.heapify_from(pos);
        }

        let entry = self.storage.remove(slot).expect("removed slot was live");
        (entry.key, entry.value)
    }

    fn replace_key(&mut self, slot: H, key: K) -> K {
        let entry = self.entry_mut(slot);
        let old = mem::replace(&mut entry.key, key);
        let pos = entry.pos;
        self.heapify_from(pos);
        old
    }

    #[inline]
    fn swap_cells(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        let (sa, sb) = (self.heap[a], self.heap[b]);
        self.entry_mut(sa).pos = a;
        self.entry_mut(sb).pos = b;
    }

    #[inline]
    fn heapify_from(&mut self, pos: usize) -> usize {
        let pos = self.sift_up(pos);
        self.sift_down(pos)
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while let Some(parent) = tree::parent(pos) {
            if self.key_at(parent) >= self.key_at(pos) {
                break;
            }
            self.swap_cells(pos, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) -> usize {
        let len = self.heap.len();
        while !tree::is_leaf(pos, len) {
            let left = tree::left_child(pos);
            let right = tree::right_child(pos);

            let larger = if right < len && self.key_at(left) < self.key_at(right) {
                right
            } else {
                left
            };

            if self.key_at(larger) <= self.key_at(pos) {
                break;
            }
            self.swap_cells(larger, pos);
            pos = larger;
        }
        pos
    }
}

#[inline]
fn violation(msg: String) -> Error {
    Error::InvariantViolation(msg)
}

impl<K, V, S, H> Extend<(K, V)> for OrderedHeap<K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
    /// Appends every item in order, then rebuilds the heap once.
    ///
    /// # Panics
    ///
    /// Panics if bounded storage fills up. Use
    /// [`try_extend`](OrderedHeap::try_extend) to handle that case.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        if let Err(err) = self.try_extend(iter) {
            panic!("extend: {err}");
        }
    }
}

impl<K, V, S, H> FromIterator<(K, V)> for OrderedHeap<K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H> + Default,
    Error: From<S::Error>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut heap = Self::with_storage(S::default());
        heap.extend(iter);
        heap
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Insertion-order iterator over `(key, payload)`.
pub struct Iter<'a, K, V, S, H: Slot> {
    heap: &'a OrderedHeap<K, V, S, H>,
    front: H,
    back: H,
    remaining: usize,
}

impl<'a, K, V, S, H> Iterator for Iter<'a, K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.heap.entry(self.front);
        self.front = entry.next;
        self.remaining -= 1;
        Some((&entry.key, &entry.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, S, H> DoubleEndedIterator for Iter<'_, K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.heap.entry(self.back);
        self.back = entry.prev;
        self.remaining -= 1;
        Some((&entry.key, &entry.value))
    }
}

impl<K, V, S, H> ExactSizeIterator for Iter<'_, K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
}

/// Insertion-order iterator over handles.
pub struct Handles<'a, K, V, S, H: Slot> {
    heap: &'a OrderedHeap<K, V, S, H>,
    front: H,
    back: H,
    remaining: usize,
}

impl<K, V, S, H> Iterator for Handles<'_, K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
    type Item = Handle<H>;

    fn next(&mut self) -> Option<Handle<H>> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.front;
        let entry = self.heap.entry(slot);
        self.front = entry.next;
        self.remaining -= 1;
        Some(Handle {
            slot,
            generation: entry.generation,
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, S, H> DoubleEndedIterator for Handles<'_, K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
    fn next_back(&mut self) -> Option<Handle<H>> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.back;
        let entry = self.heap.entry(slot);
        self.back = entry.prev;
        self.remaining -= 1;
        Some(Handle {
            slot,
            generation: entry.generation,
        })
    }
}

impl<'a, K, V, S, H> IntoIterator for &'a OrderedHeap<K, V, S, H>
where
    K: Ord,
    H: Slot,
    S: Storage<Entry<K, V, H>, Slot = H>,
    Error: From<S::Error>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundedSlab;

    fn keys_in_order<S>(heap: &OrderedHeap<i64, (), S>) -> Vec<i64>
    where
        S: Storage<Entry<i64, ()>, Slot = usize>,
        Error: From<S::Error>,
    {
        heap.iter().map(|(k, _)| *k).collect()
    }

    fn chained(keys: &[i64]) -> OrderedHeap<i64, ()> {
        let mut heap = OrderedHeap::new();
        for &k in keys {
            heap.push(k, ()).unwrap();
            heap.check().unwrap();
        }
        heap
    }

    #[test]
    fn new_is_empty() {
        let heap: OrderedHeap<u32, ()> = OrderedHeap::new();
        assert!(heap.is_empty());
        assert_eq!(heap.len(), 0);
        assert!(heap.peek().is_none());
        assert!(heap.first_inserted().is_none());
        assert!(heap.last_inserted().is_none());
        heap.check().unwrap();
    }

    #[test]
    fn push_keeps_insertion_order() {
        let heap = chained(&[5, 20, 3, 9, 2, 10]);

        assert_eq!(keys_in_order(&heap), [5, 20, 3, 9, 2, 10]);
        assert_eq!(heap.peek().map(|(k, _)| *k), Some(20));

        let rev: Vec<_> = heap.iter().rev().map(|(k, _)| *k).collect();
        assert_eq!(rev, [10, 2, 9, 3, 20, 5]);
    }

    #[test]
    fn insert_after_middle_and_at_head() {
        let mut heap: OrderedHeap<i64, &str> = OrderedHeap::new();
        let a = heap.push(1, "a").unwrap();
        heap.push(2, "c").unwrap();

        heap.insert(Some(a), 3, "b").unwrap();
        heap.insert(None, 0, "head").unwrap();
        heap.check().unwrap();

        let order: Vec<_> = heap.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, ["head", "a", "b", "c"]);
        assert_eq!(heap.get(heap.last_inserted().unwrap()), Some(&"c"));
    }

    #[test]
    fn insert_after_stale_handle_fails_cleanly() {
        let mut heap = chained(&[1, 2]);
        let h = heap.first_inserted().unwrap();
        heap.delete(h).unwrap();

        assert_eq!(heap.insert(Some(h), 9, ()), Err(Error::StaleHandle));
        assert_eq!(heap.len(), 1);
        heap.check().unwrap();
    }

    #[test]
    fn delete_max_in_order() {
        let mut heap = chained(&[5, 20, 3, 9, 2, 10]);
        let mut out = Vec::new();
        while let Ok((k, ())) = heap.delete_max() {
            heap.check().unwrap();
            out.push(k);
        }
        assert_eq!(out, [20, 10, 9, 5, 3, 2]);
        assert_eq!(heap.delete_max(), Err(Error::Empty));
    }

    #[test]
    fn delete_max_moves_head_and_tail() {
        // Max inserted first, then last.
        let mut heap = chained(&[50, 1, 2, 40]);
        heap.delete_max().unwrap();
        assert_eq!(heap.key(heap.first_inserted().unwrap()), Some(&1));
        heap.delete_max().unwrap();
        assert_eq!(heap.key(heap.last_inserted().unwrap()), Some(&2));
        assert_eq!(keys_in_order(&heap), [1, 2]);
    }

    #[test]
    fn delete_by_handle() {
        let mut heap: OrderedHeap<i64, u32> = OrderedHeap::new();
        let handles: Vec<_> = [7, 3, 9, 1, 8]
            .iter()
            .enumerate()
            .map(|(i, &k)| heap.push(k, i as u32).unwrap())
            .collect();

        assert_eq!(heap.delete(handles[2]), Ok((9, 2)));
        heap.check().unwrap();
        assert!(!heap.contains(handles[2]));
        assert_eq!(heap.delete(handles[2]), Err(Error::StaleHandle));

        let order: Vec<_> = heap.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, [0, 1, 3, 4]);
    }

    #[test]
    fn delete_last_position() {
        let mut heap = chained(&[10, 5]);
        let (k, ()) = heap.delete_at(1).unwrap();
        assert_eq!(k, 5);
        heap.check().unwrap();
        assert_eq!(heap.delete_at(1), Err(Error::OutOfBounds { pos: 1, len: 1 }));
    }

    #[test]
    fn delete_on_empty() {
        let mut heap: OrderedHeap<i64, ()> = OrderedHeap::new();
        let h = heap.push(1, ()).unwrap();
        heap.pop().unwrap();

        assert_eq!(heap.delete_at(0), Err(Error::Empty));
        assert_eq!(heap.delete(h), Err(Error::Empty));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn update_moves_both_directions() {
        let mut heap: OrderedHeap<i64, ()> = OrderedHeap::new();
        let a = heap.push(1, ()).unwrap();
        let b = heap.push(5, ()).unwrap();
        heap.push(10, ()).unwrap();

        assert_eq!(heap.update(a, 100), Ok(1));
        assert_eq!(heap.peek_handle(), Some(a));
        assert_eq!(heap.position(a), Some(0));
        heap.check().unwrap();

        heap.update(a, 0).unwrap();
        assert_ne!(heap.peek_handle(), Some(a));
        heap.check().unwrap();

        heap.update(b, 11).unwrap();
        assert_eq!(heap.peek_handle(), Some(b));
        assert_eq!(keys_in_order(&heap), [0, 11, 10]);
    }

    #[test]
    fn update_at_out_of_bounds() {
        let mut heap = chained(&[1]);
        assert_eq!(heap.update_at(3, 9), Err(Error::OutOfBounds { pos: 3, len: 1 }));
        assert_eq!(heap.update_at(0, 9), Ok(1));
    }

    #[test]
    fn swap_preconditions() {
        let mut heap = chained(&[3, 2, 1]);
        assert_eq!(heap.swap(0), Err(Error::RootSwap));
        assert_eq!(heap.swap(3), Err(Error::OutOfBounds { pos: 3, len: 3 }));
    }

    #[test]
    fn swap_twice_restores() {
        let mut heap = chained(&[5, 20, 3, 9, 2, 10]);
        let before: Vec<_> = (0..heap.len()).map(|p| heap.handle_at(p)).collect();
        let order_before: Vec<_> = heap.handles().collect();

        assert_eq!(heap.swap(4), Ok(1));
        assert_eq!(heap.swap(4), Ok(1));

        let after: Vec<_> = (0..heap.len()).map(|p| heap.handle_at(p)).collect();
        assert_eq!(before, after);
        assert_eq!(order_before, heap.handles().collect::<Vec<_>>());
        heap.check().unwrap();
    }

    #[test]
    fn swap_keeps_back_references() {
        let mut heap = chained(&[9, 5]);
        let child = heap.handle_at(1).unwrap();
        heap.swap(1).unwrap();
        assert_eq!(heap.position(child), Some(0));
        // Order list untouched, heap property now broken.
        assert_eq!(keys_in_order(&heap), [9, 5]);
        assert!(matches!(heap.check(), Err(Error::InvariantViolation(_))));
        assert_eq!(heap.heapify(0), Ok(1));
        heap.check().unwrap();
    }

    #[test]
    fn build_heap_from_unordered() {
        let mut heap: OrderedHeap<i64, ()> = OrderedHeap::new();
        for k in [25, 50, 75, 0, 25] {
            heap.push_unordered(k, ()).unwrap();
        }
        heap.build_heap();
        heap.check().unwrap();

        let layout: Vec<_> = (0..heap.len())
            .map(|p| *heap.key(heap.handle_at(p).unwrap()).unwrap())
            .collect();
        assert_eq!(layout, [75, 50, 25, 0, 25]);
        assert_eq!(keys_in_order(&heap), [25, 50, 75, 0, 25]);
    }

    #[test]
    fn build_heap_trivial_sizes() {
        let mut heap: OrderedHeap<i64, ()> = OrderedHeap::new();
        heap.build_heap();
        heap.push_unordered(1, ()).unwrap();
        heap.build_heap();
        heap.check().unwrap();
    }

    #[test]
    fn from_iter_builds_heap() {
        let heap: OrderedHeap<i64, char> = [(3, 'a'), (8, 'b'), (1, 'c'), (8, 'd')]
            .into_iter()
            .collect();
        heap.check().unwrap();
        assert_eq!(heap.peek().map(|(k, _)| *k), Some(8));
        let order: String = heap.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, "abcd");
    }

    #[test]
    fn vector_keys() {
        let mut heap: OrderedHeap<Vec<i64>, ()> = OrderedHeap::new();
        heap.push(vec![1, 9], ()).unwrap();
        heap.push(vec![2, 0], ()).unwrap();
        heap.push(vec![2, 0, 1], ()).unwrap();
        heap.push(vec![1, 10], ()).unwrap();

        let out: Vec<_> = core::iter::from_fn(|| heap.pop().map(|(k, _)| k)).collect();
        assert_eq!(out, [vec![2, 0, 1], vec![2, 0], vec![1, 10], vec![1, 9]]);
    }

    #[test]
    fn get_mut_changes_payload_only() {
        let mut heap: OrderedHeap<i64, String> = OrderedHeap::new();
        let h = heap.push(4, "x".to_string()).unwrap();
        heap.get_mut(h).unwrap().push('y');
        assert_eq!(heap.get(h).map(String::as_str), Some("xy"));
        assert_eq!(heap.key(h), Some(&4));
    }

    #[test]
    fn clear_resets() {
        let mut heap = chained(&[1, 2, 3]);
        heap.clear();
        assert!(heap.is_empty());
        assert!(heap.first_inserted().is_none());
        heap.check().unwrap();
        heap.push(7, ()).unwrap();
        assert_eq!(keys_in_order(&heap), [7]);
    }

    #[test]
    fn entry_accessors() {
        let mut heap: OrderedHeap<i64, ()> = OrderedHeap::new();
        let a = heap.push(1, ()).unwrap();
        let b = heap.push(2, ()).unwrap();

        let entry = heap.storage().get(b.slot()).unwrap();
        assert_eq!(entry.key(), &2);
        assert_eq!(entry.position(), 0);
        assert_eq!(entry.generation(), b.generation());
        assert_eq!(heap.next_of(a), Some(b));
        assert_eq!(heap.prev_of(b), Some(a));
        assert_eq!(heap.prev_of(a), None);
        assert_eq!(heap.next_of(b), None);
    }

    #[test]
    fn bounded_storage_full() {
        let storage: BoundedSlab<Entry<i64, ()>> = BoundedSlab::with_capacity(2);
        let mut heap: OrderedHeap<i64, (), BoundedSlab<Entry<i64, ()>>> =
            OrderedHeap::with_storage(storage);

        heap.push(1, ()).unwrap();
        heap.push(2, ()).unwrap();
        assert_eq!(heap.push(3, ()), Err(Error::Full));
        heap.check().unwrap();
        assert_eq!(keys_in_order(&heap), [1, 2]);

        heap.delete_max().unwrap();
        heap.push(3, ()).unwrap();
        assert_eq!(keys_in_order(&heap), [1, 3]);
    }

    #[test]
    fn reused_slot_rejects_old_handle() {
        let mut heap: OrderedHeap<i64, &str> = OrderedHeap::new();
        let a = heap.push(1, "a").unwrap();
        heap.push(2, "b").unwrap();
        heap.delete(a).unwrap();

        // Slab hands a's slot to the next insert.
        let c = heap.push(3, "c").unwrap();
        assert_eq!(c.slot(), a.slot());
        assert_ne!(c.generation(), a.generation());

        assert!(!heap.contains(a));
        assert_eq!(heap.get(a), None);
        assert_eq!(heap.key(a), None);
        assert_eq!(heap.position(a), None);
        assert_eq!(heap.next_of(a), None);
        assert_eq!(heap.delete(a), Err(Error::StaleHandle));
        assert_eq!(heap.update(a, 99), Err(Error::StaleHandle));
        assert_eq!(heap.insert(Some(a), 4, "d"), Err(Error::StaleHandle));

        assert_eq!(heap.len(), 2);
        assert_eq!(heap.get(c), Some(&"c"));
        assert_eq!(heap.key(c), Some(&3));
        heap.check().unwrap();

        let order: Vec<_> = heap.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, ["b", "c"]);
    }

    #[test]
    fn clear_makes_handles_stale() {
        let mut heap = chained(&[4, 8]);
        let old = heap.first_inserted().unwrap();
        heap.clear();

        let fresh = heap.push(4, ()).unwrap();
        assert_eq!(fresh.slot(), old.slot());
        assert_eq!(heap.delete(old), Err(Error::StaleHandle));
        assert!(heap.contains(fresh));
    }

    #[test]
    fn handles_iterate_both_ways() {
        let mut heap: OrderedHeap<i64, ()> = OrderedHeap::new();
        let hs: Vec<_> = [3, 9, 1].iter().map(|&k| heap.push(k, ()).unwrap()).collect();

        assert_eq!(heap.handles().collect::<Vec<_>>(), hs);
        let mut rev: Vec<_> = heap.handles().rev().collect();
        rev.reverse();
        assert_eq!(rev, hs);
        assert_eq!(heap.peek_handle(), Some(hs[1]));
        assert_eq!(heap.handle_at(0), Some(hs[1]));
    }

    #[test]
    fn narrow_slot_heap() {
        type Arena = BoundedSlab<Entry<i64, u32, u32>, u32>;
        let mut heap: OrderedHeap<i64, u32, Arena, u32> =
            OrderedHeap::with_storage(BoundedSlab::with_capacity(8));

        let hs: Vec<Handle<u32>> = (0..8u32)
            .map(|i| heap.push(i64::from(i % 3), i).unwrap())
            .collect();
        assert_eq!(heap.push(0, 99), Err(Error::Full));
        heap.check().unwrap();

        assert_eq!(heap.delete(hs[4]), Ok((1, 4)));
        let reused = heap.insert(Some(hs[0]), 10, 8).unwrap();
        assert_eq!(reused.slot(), hs[4].slot());
        assert_eq!(heap.update(hs[4], 0), Err(Error::StaleHandle));
        heap.check().unwrap();

        assert_eq!(heap.peek(), Some((&10, &8)));
        let order: Vec<_> = heap.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, [0, 8, 1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn try_extend_stops_at_capacity() {
        let storage: BoundedSlab<Entry<i64, ()>> = BoundedSlab::with_capacity(3);
        let mut heap: OrderedHeap<i64, (), BoundedSlab<Entry<i64, ()>>> =
            OrderedHeap::with_storage(storage);

        let items = [(1, ()), (7, ()), (4, ()), (9, ()), (2, ())];
        assert_eq!(heap.try_extend(items), Err(Error::Full));

        assert_eq!(heap.len(), 3);
        heap.check().unwrap();
        assert_eq!(keys_in_order(&heap), [1, 7, 4]);
        assert_eq!(heap.peek().map(|(k, _)| *k), Some(7));
    }

    #[test]
    fn try_extend_within_capacity() {
        let mut heap = chained(&[5]);
        heap.try_extend([(2, ()), (8, ())]).unwrap();
        heap.check().unwrap();
        assert_eq!(keys_in_order(&heap), [5, 2, 8]);
        assert_eq!(heap.pop().map(|(k, _)| k), Some(8));
    }

    #[test]
    #[should_panic(expected = "extend")]
    fn extend_panics_when_bounded_storage_fills() {
        let storage: BoundedSlab<Entry<i64, ()>> = BoundedSlab::with_capacity(1);
        let mut heap: OrderedHeap<i64, (), BoundedSlab<Entry<i64, ()>>> =
            OrderedHeap::with_storage(storage);
        heap.extend([(1, ()), (2, ())]);
    }

    #[test]
    #[should_panic(expected = "storage must be empty")]
    fn with_storage_rejects_populated_arena() {
        let mut storage = slab::Slab::new();
        storage.insert(Entry {
            key: 1i64,
            value: (),
            pos: 0,
            generation: 0,
            prev: usize::NONE,
            next: usize::NONE,
        });
        let _heap: OrderedHeap<i64, ()> = OrderedHeap::with_storage(storage);
    }

    #[test]
    fn stress_mixed_ops() {
        let mut heap: OrderedHeap<u32, u32> = OrderedHeap::with_capacity(512);
        let mut live = Vec::new();

        for i in 0..500u32 {
            let key = (i * 7 + 13) % 101;
            live.push(heap.push(key, i).unwrap());

            if i % 5 == 4 {
                let victim = live.remove((i as usize * 3) % live.len());
                heap.delete(victim).unwrap();
            }
            if i % 7 == 6 {
                let target = live[(i as usize) % live.len()];
                heap.update(target, (i * 11) % 97).unwrap();
            }
        }
        heap.check().unwrap();

        // Live payloads ascend in insertion order.
        let payloads: Vec<_> = heap.iter().map(|(_, v)| *v).collect();
        assert!(payloads.windows(2).all(|w| w[0] < w[1]));

        let mut last = u32::MAX;
        while let Some((k, _)) = heap.pop() {
            assert!(k <= last, "heap order violated");
            last = k;
        }
    }
}
