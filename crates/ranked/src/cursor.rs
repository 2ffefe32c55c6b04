use std::sync::Arc;

use crate::Rank;
use crate::sequence::{RankedSequence, Slot};

/// Position in a live [`RankedSequence`].
///
/// The cursor owns the vector it last synchronised with and the `(rank, uid)` of the last
/// element it yielded. When the sequence publishes a newer vector the cursor re-locates
/// itself just after that position: later-ranked insertions are picked up, earlier-ranked
/// ones are not yielded retroactively.
pub struct RankedCursor<T> {
	slots: Arc<Vec<Slot<T>>>,
	index: usize,
	last: Option<(Rank, u64)>,
}

impl<T> RankedCursor<T> {
	pub(crate) fn new(slots: Arc<Vec<Slot<T>>>) -> Self {
		Self {
			slots,
			index: 0,
			last: None,
		}
	}

	/// Rank of the last yielded element.
	pub fn rank(&self) -> Option<Rank> {
		self.last.map(|(rank, _)| rank)
	}

	fn sync(&mut self, seq: &RankedSequence<T>) {
		if Arc::ptr_eq(&seq.slots.load(), &self.slots) {
			return;
		}
		self.slots = seq.slots.load_full();
		self.index = match self.last {
			None => 0,
			Some((rank, uid)) => self.slots.partition_point(|s| s.at_or_before(rank, uid)),
		};
	}

	/// Rank of the next element in `seq`, if any.
	pub fn peek_rank(&mut self, seq: &RankedSequence<T>) -> Option<Rank> {
		self.sync(seq);
		self.slots.get(self.index).map(|s| s.rank)
	}
}

impl<T: Clone> RankedCursor<T> {
	/// Yields the next element of `seq` with its rank.
	pub fn advance(&mut self, seq: &RankedSequence<T>) -> Option<(T, Rank)> {
		self.sync(seq);
		let slot = self.slots.get(self.index)?;
		self.index += 1;
		self.last = Some((slot.rank, slot.uid));
		Some((slot.item.clone(), slot.rank))
	}
}
