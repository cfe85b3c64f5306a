//! Sentinel-based slot index for arena entries and array positions.
//!
//! Order-list links are stored inline in every entry. A reserved sentinel
//! (`MAX` for integers) marks "no neighbor" instead of `Option<H>`, keeping
//! each link the size of the underlying integer. Narrow slot types shrink
//! every entry of an [`OrderedHeap`](crate::OrderedHeap) over a
//! [`BoundedSlab`](crate::BoundedSlab).

/// Copyable slot index with a sentinel "none" value.
///
/// Used for arena slots in [`OrderedHeap`](crate::OrderedHeap) and for
/// array positions in [`IndexedOrderedHeap`](crate::IndexedOrderedHeap).
///
/// # Example
///
/// ```
/// use nexus_ordered_heap::Slot;
///
/// let s: usize = 42;
/// assert!(s.is_some());
/// assert!(usize::NONE.is_none());
/// assert_eq!(usize::NONE.to_option(), None);
/// ```
///
/// # Custom Slot Types
///
/// ```
/// use nexus_ordered_heap::Slot;
///
/// #[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// struct JobId(u32);
///
/// impl Slot for JobId {
///     const NONE: Self = JobId(u32::MAX);
///
///     fn from_usize(val: usize) -> Self {
///         JobId(val as u32)
///     }
///
///     fn as_usize(&self) -> usize {
///         self.0 as usize
///     }
/// }
///
/// assert!(JobId::NONE.is_none());
/// ```
pub trait Slot: Copy + Eq + core::fmt::Debug {
    /// Sentinel value representing "no link".
    const NONE: Self;

    /// Creates a slot from a `usize` index.
    fn from_usize(val: usize) -> Self;

    /// Returns the slot as a `usize` index.
    fn as_usize(&self) -> usize;

    /// Returns `true` if this is the sentinel value.
    #[inline]
    fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Returns `true` if this is NOT the sentinel value.
    #[inline]
    fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Maps the sentinel to `None`.
    #[inline]
    fn to_option(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }

    /// Maps `None` to the sentinel.
    #[inline]
    fn from_option(opt: Option<Self>) -> Self {
        opt.unwrap_or(Self::NONE)
    }
}

macro_rules! impl_slot_for_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Slot for $ty {
                const NONE: Self = <$ty>::MAX;

                #[inline]
                fn from_usize(val: usize) -> Self {
                    val as Self
                }

                #[inline]
                fn as_usize(&self) -> usize {
                    *self as usize
                }
            }
        )*
    };
}

impl_slot_for_unsigned!(u16, u32, u64, usize);
