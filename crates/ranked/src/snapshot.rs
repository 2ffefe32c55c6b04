use std::sync::Arc;

use crate::Rank;
use crate::sequence::Slot;

/// Immutable, rank-descending view of a [`crate::RankedSequence`].
pub struct RankedSnapshot<T> {
	pub(crate) slots: Arc<Vec<Slot<T>>>,
}

impl<T> Clone for RankedSnapshot<T> {
	fn clone(&self) -> Self {
		Self {
			slots: Arc::clone(&self.slots),
		}
	}
}

impl<T> RankedSnapshot<T> {
	/// Returns an iterator over the pinned contents.
	pub fn iter(&self) -> SnapshotIter<'_, T> {
		SnapshotIter {
			slots: &self.slots,
			index: 0,
		}
	}

	/// Returns `(item, rank)` pairs in order.
	pub fn ranked(&self) -> impl Iterator<Item = (&T, Rank)> + '_ {
		self.slots.iter().map(|s| (&s.item, s.rank))
	}

	/// Returns the highest-ranked element.
	pub fn first(&self) -> Option<&T> {
		self.slots.first().map(|s| &s.item)
	}

	/// Returns the rank of the highest-ranked element.
	pub fn top_rank(&self) -> Option<Rank> {
		self.slots.first().map(|s| s.rank)
	}

	/// Returns the number of elements.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Returns true if empty.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}
}

impl<'a, T> IntoIterator for &'a RankedSnapshot<T> {
	type Item = &'a T;
	type IntoIter = SnapshotIter<'a, T>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

/// Iterator over a [`RankedSnapshot`].
pub struct SnapshotIter<'a, T> {
	slots: &'a [Slot<T>],
	index: usize,
}

impl<T> SnapshotIter<'_, T> {
	/// Rank of the last yielded element.
	pub fn rank(&self) -> Option<Rank> {
		self.index.checked_sub(1).map(|i| self.slots[i].rank)
	}

	/// Rank of the next element, if any.
	pub fn peek_rank(&self) -> Option<Rank> {
		self.slots.get(self.index).map(|s| s.rank)
	}
}

impl<'a, T> Iterator for SnapshotIter<'a, T> {
	type Item = &'a T;

	fn next(&mut self) -> Option<&'a T> {
		let slot = self.slots.get(self.index)?;
		self.index += 1;
		Some(&slot.item)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let rest = self.slots.len() - self.index;
		(rest, Some(rest))
	}
}

impl<T> ExactSizeIterator for SnapshotIter<'_, T> {}
