//! Copy-on-write ranked sequence.
//!
//! # Invariants
//!
//! - Slots are sorted by rank (descending), then insertion id (ascending).
//! - A published vector is never mutated; writers replace it wholesale.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::cursor::RankedCursor;
use crate::snapshot::RankedSnapshot;
use crate::{Identity, Rank};

/// One ranked element together with its tie-breaking insertion id.
#[derive(Clone)]
pub(crate) struct Slot<T> {
	pub(crate) item: T,
	pub(crate) rank: Rank,
	pub(crate) uid: u64,
}

impl<T> Slot<T> {
	/// Returns true when this slot sorts at or before the `(rank, uid)` position.
	#[inline]
	pub(crate) fn at_or_before(&self, rank: Rank, uid: u64) -> bool {
		self.rank > rank || (self.rank == rank && self.uid <= uid)
	}
}

/// Thread-safe ordered collection of `(item, rank)` pairs.
pub struct RankedSequence<T> {
	pub(crate) slots: ArcSwap<Vec<Slot<T>>>,
	next_uid: AtomicU64,
}

impl<T> Default for RankedSequence<T> {
	fn default() -> Self {
		Self {
			slots: ArcSwap::from_pointee(Vec::new()),
			next_uid: AtomicU64::new(0),
		}
	}
}

impl<T> fmt::Debug for RankedSequence<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RankedSequence")
			.field("len", &self.len())
			.field("top_rank", &self.top_rank())
			.finish()
	}
}

impl<T: Clone> RankedSequence<T> {
	/// Creates an empty sequence.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a sequence seeded with the contents of a snapshot.
	///
	/// Ranks and relative order are preserved; insertion ids continue after the seed.
	pub fn from_snapshot(snapshot: &RankedSnapshot<T>) -> Self {
		let slots: Vec<Slot<T>> = snapshot.slots.to_vec();
		let next_uid = slots.iter().map(|s| s.uid).max().map_or(0, |uid| uid + 1);
		Self {
			slots: ArcSwap::from_pointee(slots),
			next_uid: AtomicU64::new(next_uid),
		}
	}

	/// Inserts an item; duplicates are legal and kept as distinct entries.
	pub fn insert(&self, item: T, rank: Rank) {
		let uid = self.next_uid.fetch_add(1, Ordering::Relaxed);
		self.update(|slots| {
			let at = slots.partition_point(|s| s.at_or_before(rank, uid));
			let mut next = Vec::with_capacity(slots.len() + 1);
			next.extend_from_slice(&slots[..at]);
			next.push(Slot {
				item: item.clone(),
				rank,
				uid,
			});
			next.extend_from_slice(&slots[at..]);
			Some((next, ()))
		});
	}

	/// Atomically removes and returns the highest-ranked element.
	pub fn poll(&self) -> Option<T> {
		self.update(|slots| {
			let (head, rest) = slots.split_first()?;
			Some((rest.to_vec(), head.item.clone()))
		})
	}

	/// Removes every element.
	pub fn clear(&self) {
		self.slots.store(Arc::new(Vec::new()));
	}

	/// Pins the current contents.
	pub fn snapshot(&self) -> RankedSnapshot<T> {
		RankedSnapshot {
			slots: self.slots.load_full(),
		}
	}

	/// Returns a live cursor positioned before the first element.
	pub fn cursor(&self) -> RankedCursor<T> {
		RankedCursor::new(self.slots.load_full())
	}

	/// Returns an iterator over the live sequence.
	pub fn iter(&self) -> SequenceIter<'_, T> {
		SequenceIter {
			seq: self,
			cursor: self.cursor(),
		}
	}

	/// Installs `f(current)` with a CAS retry loop.
	///
	/// `f` may run several times under contention; returning `None` aborts without writing.
	fn update<R>(&self, mut f: impl FnMut(&[Slot<T>]) -> Option<(Vec<Slot<T>>, R)>) -> Option<R> {
		loop {
			let current = self.slots.load_full();
			let (next, out) = f(&current)?;
			let prev = self.slots.compare_and_swap(&current, Arc::new(next));
			if Arc::ptr_eq(&prev, &current) {
				return Some(out);
			}
		}
	}
}

impl<T: Clone + Identity> RankedSequence<T> {
	/// Removes the first element that is `item` by identity.
	///
	/// Returns false (and changes nothing) when the item is absent.
	pub fn remove(&self, item: &T) -> bool {
		self.update(|slots| {
			let at = slots.iter().position(|s| s.item.same(item))?;
			let mut next = slots.to_vec();
			next.remove(at);
			Some((next, ()))
		})
		.is_some()
	}

	/// Returns true when `item` is present by identity.
	pub fn contains(&self, item: &T) -> bool {
		self.slots.load().iter().any(|s| s.item.same(item))
	}
}

impl<T> RankedSequence<T> {
	/// Returns the rank of the highest-ranked element, or `None` when empty.
	#[inline]
	pub fn top_rank(&self) -> Option<Rank> {
		self.slots.load().first().map(|s| s.rank)
	}

	/// Returns the number of elements.
	pub fn len(&self) -> usize {
		self.slots.load().len()
	}

	/// Returns true if the sequence holds no elements.
	pub fn is_empty(&self) -> bool {
		self.slots.load().is_empty()
	}
}

/// Iterator over a live [`RankedSequence`].
pub struct SequenceIter<'a, T> {
	seq: &'a RankedSequence<T>,
	cursor: RankedCursor<T>,
}

impl<T: Clone> SequenceIter<'_, T> {
	/// Rank of the last yielded element.
	pub fn rank(&self) -> Option<Rank> {
		self.cursor.rank()
	}

	/// Rank of the next element, if any.
	pub fn peek_rank(&mut self) -> Option<Rank> {
		self.cursor.peek_rank(self.seq)
	}
}

impl<T: Clone> Iterator for SequenceIter<'_, T> {
	type Item = T;

	fn next(&mut self) -> Option<T> {
		self.cursor.advance(self.seq).map(|(item, _)| item)
	}
}
