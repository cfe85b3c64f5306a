//! Max-heap that remembers insertion order.
//!
//! A binary max-heap answers "what is the largest?" in O(1) and reorders its
//! array on every insert and removal. Many consumers also need "what was
//! inserted, in which order?" (replaying open orders, search frontiers that
//! break ties by age, audit trails). This crate keeps both views over one set
//! of elements:
//!
//! ```text
//! heap array (max first):   [ 20 | 9 | 10 | 5 | 2 | 3 ]
//! order list (oldest first):  5 ─ 20 ─ 3 ─ 9 ─ 2 ─ 10
//! ```
//!
//! Every structural heap operation (swap, compaction on delete, re-heapify)
//! keeps the doubly linked order list intact.
//!
//! # Quick Start
//!
//! ```
//! use nexus_ordered_heap::OrderedHeap;
//!
//! let mut heap: OrderedHeap<u64, &str> = OrderedHeap::new();
//!
//! let buy = heap.push(100, "buy").unwrap();
//! heap.push(250, "sell").unwrap();
//! heap.push(175, "cancel").unwrap();
//!
//! // Largest key first
//! assert_eq!(heap.peek(), Some((&250, &"sell")));
//!
//! // Oldest first, regardless of heap layout
//! let replay: Vec<_> = heap.iter().map(|(_, v)| *v).collect();
//! assert_eq!(replay, ["buy", "sell", "cancel"]);
//!
//! // Handles survive heap moves
//! heap.update(buy, 500).unwrap();
//! assert_eq!(heap.delete_max().unwrap(), (500, "buy"));
//! ```
//!
//! # Two Layouts
//!
//! | Type | Links | Swap cost | Identity |
//! |------|-------|-----------|----------|
//! | [`OrderedHeap`] | arena handles | 2 back-reference writes | stable handle |
//! | [`IndexedOrderedHeap`] | array positions | up to 4 neighbor rewrites | none, positions move |
//!
//! [`OrderedHeap`] keeps entries in a slab and the heap array holds slots,
//! so the order list never changes when the heap reorders. Prefer it.
//! Its [`Handle`]s carry a generation: once an entry is removed its handle
//! reports [`Error::StaleHandle`], even after the slab reuses the slot.
//!
//! [`IndexedOrderedHeap`] stores elements inline in the array. Links are
//! positions and are repaired on every move. Positions it returns are only
//! valid until the next mutating call.
//!
//! # Storage
//!
//! ```text
//! Storage<T>          - trait: try_insert, remove, get, get_mut
//!     ├── slab::Slab<T>      - growable, usize slots (default)
//!     └── BoundedSlab<T, H>  - fixed capacity, H slots, rejects with Full
//! ```
//!
//! Slots are any [`Slot`] type (u16, u32, u64, usize). Narrow slots shrink
//! every entry's order links.
//!
//! # Keys
//!
//! Keys are any [`Ord`] type. `Vec<_>`, arrays and tuples give
//! lexicographic multi-component keys. [`F64Key`] orders `f64` totally.
//!
//! # Errors
//!
//! Every fallible operation checks its preconditions before touching the
//! structure and returns [`Error`]. A failed call never leaves a partial
//! mutation behind, except `try_extend`, which keeps the items appended
//! before storage filled up.

#![warn(missing_docs)]

pub mod error;
pub mod heap;
pub mod indexed;
pub mod key;
pub mod slot;
pub mod storage;
pub mod tree;

pub use error::{Error, Result};
pub use heap::{Entry, Handle, OrderedHeap};
pub use indexed::IndexedOrderedHeap;
pub use key::F64Key;
pub use slot::Slot;
pub use storage::{BoundedSlab, Full, Storage};
