//! Rank-ordered sequences with wait-free snapshots.
//!
//! # Purpose
//!
//! [`RankedSequence`] keeps `(item, rank)` pairs in descending rank order and is shared by
//! every ranked structure in the locator: the global publisher list, the per-type pending
//! publisher queues, and the per-type resolved bindings.
//!
//! # Mental Model
//!
//! 1. **Publication:** Contents live in an immutable `Arc<Vec<_>>` published through
//!    [`arc_swap::ArcSwap`]. Every mutation builds the next vector and installs it with a
//!    compare-and-swap retry loop.
//! 2. **Snapshots:** [`RankedSequence::snapshot`] pins the current vector. Concurrent writers
//!    never touch a pinned vector, so iterating a [`RankedSnapshot`] is always safe.
//! 3. **Cursors:** [`RankedCursor`] walks the *live* sequence. It remembers the position of the
//!    last element it yielded and re-synchronises whenever a newer vector is published, so
//!    elements inserted behind it are still seen.
//!
//! # Ordering
//!
//! - Higher rank first.
//! - Equal ranks keep insertion order (each insert draws a monotonically increasing id).
//!
//! # Concurrency
//!
//! - **Reads:** Wait-free (atomic load of the current vector).
//! - **Writes:** Lock-free, linearizable (CAS retry loop). `poll` removes the head in the same
//!   CAS, so concurrent pollers never observe the same element.

mod cursor;
mod sequence;
mod snapshot;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use cursor::RankedCursor;
pub use sequence::{RankedSequence, SequenceIter};
pub use snapshot::{RankedSnapshot, SnapshotIter};

/// Integer priority; higher ranks are yielded first.
pub type Rank = i32;

/// Identity comparison used for by-identity removal and membership checks.
///
/// Ranked items are handles (usually `Arc`s) to shared objects; two handles are the same item
/// only when they point at the same allocation, never because their contents compare equal.
pub trait Identity {
	/// Returns true when both handles refer to the same object.
	fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for Arc<T> {
	#[inline]
	fn same(&self, other: &Self) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(self), Arc::as_ptr(other))
	}
}
