use std::collections::HashSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::{Identity, RankedSequence, SequenceIter};

fn contents(seq: &RankedSequence<&'static str>) -> Vec<(&'static str, i32)> {
	seq.snapshot().ranked().map(|(item, rank)| (*item, rank)).collect()
}

/// Verifies that snapshots list elements by descending rank regardless of insertion order.
#[test]
fn test_snapshot_is_rank_descending() {
	let seq = RankedSequence::new();
	seq.insert("low", -5);
	seq.insert("high", 100);
	seq.insert("mid", 7);

	assert_eq!(contents(&seq), vec![("high", 100), ("mid", 7), ("low", -5)]);
}

/// Verifies that equal ranks keep their insertion order.
#[test]
fn test_ties_keep_insertion_order() {
	let seq = RankedSequence::new();
	seq.insert("a", 1);
	seq.insert("b", 1);
	seq.insert("top", 2);
	seq.insert("c", 1);

	assert_eq!(contents(&seq), vec![("top", 2), ("a", 1), ("b", 1), ("c", 1)]);
}

/// Verifies that `i32::MIN` and `i32::MAX` are usable ranks and that
/// an empty sequence reports no top rank.
#[test]
fn test_extreme_ranks_are_ordinary_elements() {
	let seq = RankedSequence::new();
	seq.insert("min", i32::MIN);
	seq.insert("max", i32::MAX);

	assert_eq!(seq.top_rank(), Some(i32::MAX));
	assert_eq!(seq.poll(), Some("max"));
	assert_eq!(seq.top_rank(), Some(i32::MIN));
	assert_eq!(seq.poll(), Some("min"));
	assert_eq!(seq.top_rank(), None);
	assert_eq!(seq.poll(), None);
}

/// Verifies that removal and membership compare by identity, not by value.
#[test]
fn test_remove_by_identity() {
	let first = Arc::new(5u32);
	let twin = Arc::new(5u32);
	let seq = RankedSequence::new();
	seq.insert(Arc::clone(&first), 3);
	seq.insert(Arc::clone(&twin), 3);

	assert!(seq.contains(&twin));
	assert!(seq.remove(&twin), "twin is present");
	assert!(!seq.contains(&twin));
	assert!(seq.contains(&first), "equal-valued item must survive");
	assert!(!seq.remove(&twin), "second remove is a no-op");
	assert_eq!(seq.len(), 1);
}

/// Verifies that inserting the same handle twice yields two entries and
/// that removal drops only one of them.
#[test]
fn test_duplicates_are_distinct_entries() {
	let item = Arc::new(());
	let seq = RankedSequence::new();
	seq.insert(Arc::clone(&item), 1);
	seq.insert(Arc::clone(&item), 1);
	assert_eq!(seq.len(), 2);

	assert!(seq.remove(&item));
	assert_eq!(seq.len(), 1, "remove only drops the first match");
}

/// Verifies that a snapshot iterator keeps its contents while the
/// sequence is cleared and refilled.
#[test]
fn test_snapshot_survives_mutation() {
	let seq = RankedSequence::new();
	seq.insert("a", 2);
	seq.insert("b", 1);

	let snap = seq.snapshot();
	let mut iter = snap.iter();
	assert_eq!(iter.next(), Some(&"a"));
	assert_eq!(iter.rank(), Some(2));

	seq.clear();
	seq.insert("z", 10);

	assert_eq!(iter.peek_rank(), Some(1));
	assert_eq!(iter.next(), Some(&"b"));
	assert_eq!(iter.next(), None);
	assert_eq!(snap.len(), 2);
}

/// Verifies that a live cursor picks up elements inserted behind its
/// position but never ones inserted ahead of it.
#[test]
fn test_cursor_sees_insertions_behind_it() {
	let seq = RankedSequence::new();
	seq.insert("a", 10);
	seq.insert("c", 1);

	let mut cursor = seq.cursor();
	assert_eq!(cursor.advance(&seq), Some(("a", 10)));

	seq.insert("b", 5);
	seq.insert("ahead", 20);
	seq.insert("tie", 10);

	assert_eq!(cursor.peek_rank(&seq), Some(10));
	assert_eq!(cursor.advance(&seq), Some(("tie", 10)));
	assert_eq!(cursor.advance(&seq), Some(("b", 5)));
	assert_eq!(cursor.advance(&seq), Some(("c", 1)));
	assert_eq!(cursor.advance(&seq), None);
	assert_eq!(cursor.rank(), Some(1));
}

/// Verifies that a live iterator skips elements removed after it started.
#[test]
fn test_cursor_skips_removed_elements() {
	let seq = RankedSequence::new();
	let a = Arc::new("a");
	let b = Arc::new("b");
	let c = Arc::new("c");
	seq.insert(Arc::clone(&a), 3);
	seq.insert(Arc::clone(&b), 2);
	seq.insert(Arc::clone(&c), 1);

	let mut iter = seq.iter();
	assert!(iter.next().is_some_and(|x| x.same(&a)));
	seq.remove(&b);
	assert!(iter.next().is_some_and(|x| x.same(&c)));
	assert_eq!(iter.rank(), Some(1));
	assert!(iter.next().is_none());
}

/// Verifies that the live iterator is nameable from the crate root and
/// reports the rank of upcoming elements, including late insertions.
#[test]
fn test_sequence_iter_peeks_live_ranks() {
	let seq = RankedSequence::new();
	seq.insert("a", 2);
	let mut iter: SequenceIter<'_, &str> = seq.iter();
	assert_eq!(iter.peek_rank(), Some(2));

	seq.insert("b", 1);
	assert_eq!(iter.next(), Some("a"));
	assert_eq!(iter.peek_rank(), Some(1));
	assert_eq!(iter.next(), Some("b"));
	assert_eq!(iter.peek_rank(), None);
	assert_eq!(iter.rank(), Some(1));
}

/// Verifies that a sequence seeded from a snapshot keeps order and tie
/// ordering, and evolves independently of its source.
#[test]
fn test_from_snapshot_preserves_order_and_ties() {
	let seq = RankedSequence::new();
	seq.insert("a", 1);
	seq.insert("b", 1);
	let copy = RankedSequence::from_snapshot(&seq.snapshot());
	copy.insert("c", 1);
	seq.insert("d", 9);

	assert_eq!(contents(&copy), vec![("a", 1), ("b", 1), ("c", 1)]);
	assert_eq!(contents(&seq), vec![("d", 9), ("a", 1), ("b", 1)]);
}

/// Verifies that concurrent pollers drain every element exactly once.
#[test]
fn test_concurrent_poll_never_double_processes() {
	let seq = RankedSequence::new();
	for i in 0..1000u32 {
		seq.insert(i, (i % 17) as i32);
	}

	let polled: Vec<Vec<u32>> = std::thread::scope(|s| {
		let handles: Vec<_> = (0..8)
			.map(|_| {
				s.spawn(|| {
					let mut got = Vec::new();
					while let Some(item) = seq.poll() {
						got.push(item);
					}
					got
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	let all: Vec<u32> = polled.into_iter().flatten().collect();
	let unique: HashSet<u32> = all.iter().copied().collect();
	assert_eq!(all.len(), 1000);
	assert_eq!(unique.len(), 1000);
	assert!(seq.is_empty());
}

/// Verifies that concurrent inserts are linearizable: none are lost and
/// the result stays rank-ordered.
#[test]
fn test_concurrent_inserts_are_not_lost() {
	let seq = RankedSequence::new();
	std::thread::scope(|s| {
		for t in 0..4i32 {
			let seq = &seq;
			s.spawn(move || {
				for i in 0..250i32 {
					seq.insert(t * 1000 + i, i % 5);
				}
			});
		}
	});

	let snap = seq.snapshot();
	assert_eq!(snap.len(), 1000);
	let ranks: Vec<i32> = snap.ranked().map(|(_, rank)| rank).collect();
	assert!(ranks.windows(2).all(|w| w[0] >= w[1]));
}

#[derive(Debug, Clone)]
enum Op {
	Insert(i32),
	RemoveNth(usize),
	Poll,
}

fn op_strategy() -> impl Strategy<Value = Op> {
	prop_oneof![
		3 => (-50i32..50).prop_map(Op::Insert),
		1 => (0usize..64).prop_map(Op::RemoveNth),
		1 => Just(Op::Poll),
	]
}

proptest! {
	/// Verifies that any sequence of inserts, removals and polls matches a
	/// stable descending sort of the surviving elements.
	#[test]
	fn test_snapshot_order_matches_stable_sort(ops in prop::collection::vec(op_strategy(), 0..64)) {
		let seq = RankedSequence::new();
		// (id, rank) in insertion order; the model is a stable sort by descending rank
		let mut model: Vec<(Arc<usize>, i32)> = Vec::new();
		let mut next_id = 0usize;

		for op in ops {
			match op {
				Op::Insert(rank) => {
					let item = Arc::new(next_id);
					next_id += 1;
					seq.insert(Arc::clone(&item), rank);
					model.push((item, rank));
				}
				Op::RemoveNth(n) => {
					if model.is_empty() {
						continue;
					}
					let (item, _) = model.remove(n % model.len());
					prop_assert!(seq.remove(&item));
				}
				Op::Poll => {
					let mut sorted = model.clone();
					sorted.sort_by(|a, b| b.1.cmp(&a.1));
					let expected = sorted.first().map(|(item, _)| Arc::clone(item));
					let polled = seq.poll();
					prop_assert_eq!(polled.as_deref(), expected.as_deref());
					if let Some(item) = expected {
						model.retain(|(x, _)| !x.same(&item));
					}
				}
			}
		}

		let mut sorted = model.clone();
		sorted.sort_by(|a, b| b.1.cmp(&a.1));
		let expected: Vec<(usize, i32)> = sorted.iter().map(|(item, rank)| (**item, *rank)).collect();
		let actual: Vec<(usize, i32)> = seq.snapshot().ranked().map(|(item, rank)| (**item, rank)).collect();
		prop_assert_eq!(actual, expected);
	}
}
