//! Positional arithmetic for an implicit binary tree stored in an array.
//!
//! Position 0 is the root. The children of `p` sit at `2p + 1` and `2p + 2`.

/// Returns the parent of `pos`, or `None` for the root.
#[inline]
pub const fn parent(pos: usize) -> Option<usize> {
    if pos == 0 { None } else { Some((pos - 1) / 2) }
}

/// Returns the left child of `pos`. May be out of range.
#[inline]
pub const fn left_child(pos: usize) -> usize {
    2 * pos + 1
}

/// Returns the right child of `pos`. May be out of range.
#[inline]
pub const fn right_child(pos: usize) -> usize {
    2 * pos + 2
}

/// Returns `true` if `pos` has no children in a tree of `len` elements.
///
/// Positions past the end count as leaves.
#[inline]
pub const fn is_leaf(pos: usize, len: usize) -> bool {
    left_child(pos) >= len
}

/// Returns the last position that has at least one child.
#[inline]
pub const fn last_internal(len: usize) -> Option<usize> {
    if len < 2 { None } else { Some(len / 2 - 1) }
}
