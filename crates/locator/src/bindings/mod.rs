//! Per-type binding views with lazy, rank-driven publisher draining.
//!
//! # Role
//!
//! A [`RankedBindings`] view holds the bindings already resolved for one type plus a ranked
//! queue of publishers that have not been asked about that type yet. Publishers are only
//! consulted when an iteration needs to know whether something better than the next resolved
//! binding could still exist.
//!
//! # Invariants
//!
//! - Before an iterator yields a binding of rank `r`, no pending publisher ranks above `r`.
//!   - Enforced in: [`RankedBindings::drain`].
//!   - Tested by: `bindings::tests::test_drains_only_what_ordering_requires`.
//! - Each publisher is subscribed at most once per view.
//!   - Enforced in: [`RankedBindings::drain`] (poll under the drain lock).
//!   - Tested by: `bindings::tests::test_concurrent_iteration_subscribes_once`.
//! - Removing a publisher unsubscribes it only when it was actually consulted.
//!   - Enforced in: [`RankedBindings::remove_publisher`].
//!   - Tested by: `bindings::tests::test_remove_pending_publisher_never_unsubscribes`.
//!
//! # Concurrency
//!
//! `top_rank` is an upper bound on the best pending rank, read without locking. Adding,
//! removing and draining publishers share one mutex so a publisher can never be subscribed
//! and removed at the same time, and so a drain cannot lower `top_rank` below a publisher
//! that was enqueued concurrently.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use plexus_ranked::{Identity, Rank, RankedCursor, RankedSequence, RankedSnapshot};

use crate::binding::{Binding, TypeKey};
use crate::cache::{BeanCache, BeanEviction};
use crate::error::LocateError;
use crate::publisher::{BindingSubscriber, PublisherRef};


/// Encoded "no pending publisher" value for `top_rank`.
const NO_RANK: i64 = i64::MIN;

#[inline]
fn encode(rank: Option<Rank>) -> i64 {
	rank.map_or(NO_RANK, i64::from)
}

/// Returns true when a pending rank must be drained before yielding `next`.
#[inline]
fn outranks(pending: i64, next: Option<Rank>) -> bool {
	pending != NO_RANK && next.is_none_or(|next| pending > i64::from(next))
}

#[derive(Default)]
struct DrainState {
	/// Publishers already asked to contribute to this view.
	subscribed: Vec<PublisherRef>,
}

/// Resolved bindings and pending publishers for one type.
pub struct RankedBindings {
	type_key: TypeKey,
	me: Weak<RankedBindings>,
	bindings: RankedSequence<Arc<Binding>>,
	pending: RankedSequence<PublisherRef>,
	top_rank: AtomicI64,
	drain: Mutex<DrainState>,
	caches: Mutex<Vec<Weak<dyn BeanEviction>>>,
}

impl RankedBindings {
	/// Creates a view whose pending queue is seeded with `publishers`.
	pub(crate) fn new(type_key: TypeKey, publishers: &RankedSnapshot<PublisherRef>) -> Arc<Self> {
		let pending = RankedSequence::from_snapshot(publishers);
		let top_rank = AtomicI64::new(encode(pending.top_rank()));
		Arc::new_cyclic(|me| Self {
			type_key,
			me: me.clone(),
			bindings: RankedSequence::new(),
			pending,
			top_rank,
			drain: Mutex::new(DrainState::default()),
			caches: Mutex::new(Vec::new()),
		})
	}

	pub fn type_key(&self) -> TypeKey {
		self.type_key
	}

	/// Inserts a resolved binding; called by publishers.
	pub fn add_binding(&self, binding: Arc<Binding>, rank: Rank) {
		self.bindings.insert(binding, rank);
	}

	/// Removes a resolved binding and evicts everything derived from it.
	pub fn remove_binding(&self, binding: &Arc<Binding>) -> bool {
		if !self.bindings.remove(binding) {
			return false;
		}
		for cache in self.live_caches() {
			cache.evict(binding);
		}
		true
	}

	/// Enqueues a newly installed publisher.
	///
	/// No-op when the publisher is already pending or subscribed.
	pub fn add_publisher(&self, publisher: PublisherRef, rank: Rank) {
		let state = self.drain.lock();
		if self.pending.contains(&publisher) || state.subscribed.iter().any(|p| p.same(&publisher)) {
			return;
		}
		self.pending.insert(publisher, rank);
		self.top_rank.fetch_max(i64::from(rank), Ordering::AcqRel);
	}

	/// Forgets a removed publisher.
	///
	/// A still-pending publisher is simply dequeued; a consulted one is unsubscribed.
	pub fn remove_publisher(&self, publisher: &PublisherRef) {
		let mut state = self.drain.lock();
		if self.pending.remove(publisher) {
			self.top_rank.store(encode(self.pending.top_rank()), Ordering::Release);
			return;
		}
		if let Some(at) = state.subscribed.iter().position(|p| p.same(publisher)) {
			let publisher = state.subscribed.swap_remove(at);
			tracing::trace!(type_name = self.type_key.name(), "unsubscribing view");
			publisher.unsubscribe(self);
		}
	}

	/// Iterates bindings in rank order, draining publishers on demand.
	pub fn iter(self: &Arc<Self>) -> RankedBindingsIter {
		RankedBindingsIter {
			view: Arc::clone(self),
			cursor: self.bindings.cursor(),
		}
	}

	/// Allocates a derived cache that is invalidated whenever a binding leaves this view.
	///
	/// The view keeps only a weak reference; dropping the returned cache unregisters it.
	pub fn new_bean_cache<T: Any + Send + Sync>(&self) -> Arc<BeanCache<T>> {
		let cache = Arc::new(BeanCache::new());
		let weak: Weak<dyn BeanEviction> = Arc::downgrade(&cache) as Weak<dyn BeanEviction>;
		let mut caches = self.caches.lock();
		caches.retain(|c| c.strong_count() > 0);
		caches.push(weak);
		cache
	}

	/// True when no binding has been resolved yet; pending publishers do not count.
	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}

	/// Number of publishers not yet consulted.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	#[cfg(test)]
	pub(crate) fn live_cache_count(&self) -> usize {
		self.caches.lock().iter().filter(|c| c.strong_count() > 0).count()
	}

	fn live_caches(&self) -> Vec<Arc<dyn BeanEviction>> {
		let mut caches = self.caches.lock();
		caches.retain(|c| c.strong_count() > 0);
		caches.iter().filter_map(Weak::upgrade).collect()
	}

	/// Subscribes pending publishers while the best of them outranks `next_rank()`.
	///
	/// `next_rank` is re-read after every subscription since publishers may contribute
	/// synchronously. A failing publisher stays consulted and the error is returned.
	fn drain(&self, mut next_rank: impl FnMut() -> Option<Rank>) -> Result<(), LocateError> {
		if !outranks(self.top_rank.load(Ordering::Acquire), next_rank()) {
			return Ok(());
		}
		let Some(me) = self.me.upgrade() else {
			return Ok(());
		};
		let subscriber: Arc<dyn BindingSubscriber> = me;

		let mut state = self.drain.lock();
		let result = loop {
			if !outranks(encode(self.pending.top_rank()), next_rank()) {
				break Ok(());
			}
			let Some(publisher) = self.pending.poll() else {
				break Ok(());
			};
			state.subscribed.push(Arc::clone(&publisher));
			tracing::trace!(type_name = self.type_key.name(), "subscribing pending publisher");
			if let Err(err) = publisher.subscribe(Arc::clone(&subscriber)) {
				tracing::warn!(type_name = self.type_key.name(), error = %err, "publisher failed to contribute");
				break Err(LocateError::publisher(self.type_key.name(), err));
			}
		};
		self.top_rank.store(encode(self.pending.top_rank()), Ordering::Release);
		result
	}
}

impl BindingSubscriber for RankedBindings {
	fn type_key(&self) -> TypeKey {
		self.type_key
	}

	fn add(&self, binding: Arc<Binding>, rank: Rank) {
		self.add_binding(binding, rank);
	}

	fn remove(&self, binding: &Arc<Binding>) {
		self.remove_binding(binding);
	}

	fn bindings(&self) -> Vec<Arc<Binding>> {
		self.bindings.snapshot().iter().cloned().collect()
	}
}

impl Drop for RankedBindings {
	fn drop(&mut self) {
		let subscribed = std::mem::take(&mut self.drain.get_mut().subscribed);
		for publisher in subscribed {
			publisher.unsubscribe(&*self);
		}
	}
}

impl fmt::Debug for RankedBindings {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RankedBindings")
			.field("type", &self.type_key)
			.field("bindings", &self.bindings.len())
			.field("pending", &self.pending.len())
			.finish()
	}
}

/// Rank-ordered iterator over a [`RankedBindings`] view.
///
/// Yields `Err` once for each publisher that fails while being drained; iteration may
/// continue afterwards.
pub struct RankedBindingsIter {
	view: Arc<RankedBindings>,
	cursor: RankedCursor<Arc<Binding>>,
}

impl RankedBindingsIter {
	/// Rank of the last yielded binding.
	pub fn rank(&self) -> Option<Rank> {
		self.cursor.rank()
	}
}

impl Iterator for RankedBindingsIter {
	type Item = Result<(Arc<Binding>, Rank), LocateError>;

	fn next(&mut self) -> Option<Self::Item> {
		let Self { view, cursor } = self;
		if let Err(err) = view.drain(|| cursor.peek_rank(&view.bindings)) {
			return Some(Err(err));
		}
		cursor.advance(&view.bindings).map(Ok)
	}
}
