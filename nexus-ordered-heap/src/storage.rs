//! Arena storage with stable slots.
//!
//! Storage provides insert/remove/get where a slot stays valid until its
//! value is removed. [`OrderedHeap`](crate::OrderedHeap) keeps its entries in
//! storage and threads both the heap array and the order list through
//! slots, so array moves never invalidate a link.

use core::marker::PhantomData;

use crate::Slot;

/// Arena an [`OrderedHeap`](crate::OrderedHeap) keeps its entries in.
///
/// A slot returned by [`try_insert`](Self::try_insert) must resolve to the
/// same value until that value is removed. Insert, remove and lookup are
/// expected to be O(1); freed slots may be handed out again.
///
/// Provided: `slab::Slab<T>` (growable, the default) and [`BoundedSlab<T>`]
/// (fixed capacity, never reallocates).
pub trait Storage<T> {
    /// Slot index type for this storage.
    type Slot: Slot;

    /// Rejection from [`try_insert`](Self::try_insert): [`Full<T>`] when
    /// bounded, `Infallible` when the arena grows.
    type Error;

    /// Inserts a value, returning its stable slot.
    fn try_insert(&mut self, value: T) -> Result<Self::Slot, Self::Error>;

    /// Removes and returns the value at `slot`, if present.
    fn remove(&mut self, slot: Self::Slot) -> Option<T>;

    /// Returns a reference to the value at `slot`, if present.
    fn get(&self, slot: Self::Slot) -> Option<&T>;

    /// Returns a mutable reference to the value at `slot`, if present.
    fn get_mut(&mut self, slot: Self::Slot) -> Option<&mut T>;

    /// Returns the number of occupied slots.
    fn len(&self) -> usize;

    /// Returns `true` if no slot is occupied.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if another insert would be rejected.
    #[inline]
    fn is_full(&self) -> bool {
        false
    }

    /// Removes every value.
    fn clear(&mut self);
}

/// Rejected insert into a [`BoundedSlab`]; carries the value back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Hands the rejected value back to the caller.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> core::fmt::Display for Full<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("bounded slab at capacity")
    }
}

impl<T: core::fmt::Debug> std::error::Error for Full<T> {}

// =============================================================================
// slab::Slab - growable
// =============================================================================

impl<T> Storage<T> for slab::Slab<T> {
    type Slot = usize;
    type Error = core::convert::Infallible;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<usize, Self::Error> {
        Ok(self.insert(value))
    }

    #[inline]
    fn remove(&mut self, slot: usize) -> Option<T> {
        self.try_remove(slot)
    }

    #[inline]
    fn get(&self, slot: usize) -> Option<&T> {
        slab::Slab::get(self, slot)
    }

    #[inline]
    fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        slab::Slab::get_mut(self, slot)
    }

    #[inline]
    fn len(&self) -> usize {
        slab::Slab::len(self)
    }

    #[inline]
    fn clear(&mut self) {
        slab::Slab::clear(self);
    }
}

// =============================================================================
// BoundedSlab - fixed capacity, single up-front allocation
// =============================================================================

/// Fixed-capacity storage over a pre-allocated `slab::Slab`.
///
/// All memory is reserved at construction. Inserting past capacity returns
/// [`Full`] with the rejected value instead of growing.
///
/// Slots are `H`, so a heap over `BoundedSlab<_, u32>` stores 4-byte links.
/// The capacity must leave `H::NONE` unused.
///
/// # Example
///
/// ```
/// use nexus_ordered_heap::{BoundedSlab, Storage};
///
/// let mut storage: BoundedSlab<u64, u16> = BoundedSlab::with_capacity(2);
/// let a = storage.try_insert(1).unwrap();
/// storage.try_insert(2).unwrap();
///
/// assert_eq!(storage.try_insert(3).unwrap_err().into_inner(), 3);
///
/// storage.remove(a);
/// assert!(storage.try_insert(3).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct BoundedSlab<T, H: Slot = usize> {
    slab: slab::Slab<T>,
    capacity: usize,
    _slot: PhantomData<H>,
}

impl<T, H: Slot> BoundedSlab<T, H> {
    /// Creates storage holding at most `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0, or if slot `capacity - 1` would reach
    /// `H::NONE` (reserved as the "no link" sentinel).
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        assert!(
            capacity <= H::NONE.as_usize(),
            "capacity exceeds slot type maximum"
        );

        Self {
            slab: slab::Slab::with_capacity(capacity),
            capacity,
            _slot: PhantomData,
        }
    }

    /// Returns the fixed capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T, H: Slot> Storage<T> for BoundedSlab<T, H> {
    type Slot = H;
    type Error = Full<T>;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<H, Self::Error> {
        if self.slab.len() >= self.capacity {
            return Err(Full(value));
        }
        // Occupied slots never exceed `capacity - 1`, so `H` can hold them.
        Ok(H::from_usize(self.slab.insert(value)))
    }

    #[inline]
    fn remove(&mut self, slot: H) -> Option<T> {
        self.slab.try_remove(slot.as_usize())
    }

    #[inline]
    fn get(&self, slot: H) -> Option<&T> {
        self.slab.get(slot.as_usize())
    }

    #[inline]
    fn get_mut(&mut self, slot: H) -> Option<&mut T> {
        self.slab.get_mut(slot.as_usize())
    }

    #[inline]
    fn len(&self) -> usize {
        self.slab.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.slab.len() >= self.capacity
    }

    #[inline]
    fn clear(&mut self) {
        self.slab.clear();
    }
}
