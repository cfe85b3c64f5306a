//! Sort keys.
//!
//! Heap keys only need [`Ord`]. Integers, `Vec<_>`, arrays and tuples work
//! as-is; the collection types compare lexicographically, so a `Vec<i64>`
//! key is a multi-component key where the first differing component decides.
//!
//! Floating point values are not `Ord`. [`F64Key`] wraps an `f64` and orders
//! it with [`f64::total_cmp`].

use core::cmp::Ordering;

/// `f64` sort key with a total order.
///
/// Ordering follows IEEE 754 `totalOrder`: `-0.0 < +0.0` and NaNs sort
/// above every finite value and infinity.
///
/// ```
/// use nexus_ordered_heap::F64Key;
///
/// assert!(F64Key(0.5) < F64Key(1.5));
/// assert!(vec![F64Key(1.0), F64Key(2.0)] < vec![F64Key(1.0), F64Key(3.0)]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct F64Key(pub f64);

impl F64Key {
    /// Returns the wrapped value.
    #[inline]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl From<f64> for F64Key {
    #[inline]
    fn from(value: f64) -> Self {
        F64Key(value)
    }
}

impl Ord for F64Key {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for F64Key {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for F64Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for F64Key {}
