//! In-memory publisher over a mutable binding set.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use plexus_ranked::{Identity, Rank};

use crate::binding::{Binding, DefaultRanking, RankingFunction};
use crate::publisher::{BindingPublisher, BindingSubscriber, same_subscriber};

#[derive(Default)]
struct PublisherState {
	bindings: Vec<Arc<Binding>>,
	subscribers: Vec<Weak<dyn BindingSubscriber>>,
}

/// Publisher backed by a list of bindings ranked by a [`RankingFunction`].
///
/// Bindings may be added and removed while subscribed; live subscribers of the matching type
/// are notified outside the state lock.
///
/// # Concurrency
///
/// `bind`, `unbind`, `subscribe` and `unsubscribe` hold `notify` for their whole fan-out, so a
/// subscriber observes one publisher's changes in the order they were made. `notify` is
/// re-entrant so that subscriber callbacks may call back into the same publisher. Lock order
/// is `notify`, then `state`. Upgraded subscriber handles are released only after `notify`.
pub struct MemoryPublisher {
	ranking: Box<dyn RankingFunction>,
	notify: ReentrantMutex<()>,
	state: Mutex<PublisherState>,
}

impl MemoryPublisher {
	/// Creates a publisher using [`DefaultRanking`] at `rank`.
	pub fn new(rank: Rank) -> Self {
		Self::with_ranking(DefaultRanking::new(rank))
	}

	pub fn with_ranking(ranking: impl RankingFunction + 'static) -> Self {
		Self {
			ranking: Box::new(ranking),
			notify: ReentrantMutex::new(()),
			state: Mutex::new(PublisherState::default()),
		}
	}

	/// Publishes a binding and returns its shared handle.
	pub fn bind(&self, binding: Binding) -> Arc<Binding> {
		let notify = self.notify.lock();
		let binding = Arc::new(binding);
		let subscribers = {
			let mut state = self.state.lock();
			state.bindings.push(Arc::clone(&binding));
			live_subscribers(&mut state)
		};
		let rank = self.ranking.rank(&binding);
		for subscriber in &subscribers {
			if subscriber.type_key() == binding.type_key() {
				subscriber.add(Arc::clone(&binding), rank);
			}
		}
		drop(notify);
		binding
	}

	/// Withdraws a binding from this publisher and from every subscriber.
	pub fn unbind(&self, binding: &Arc<Binding>) -> bool {
		let notify = self.notify.lock();
		let subscribers = {
			let mut state = self.state.lock();
			let Some(at) = state.bindings.iter().position(|b| b.same(binding)) else {
				return false;
			};
			state.bindings.remove(at);
			live_subscribers(&mut state)
		};
		for subscriber in &subscribers {
			if subscriber.type_key() == binding.type_key() {
				subscriber.remove(binding);
			}
		}
		drop(notify);
		true
	}

	pub fn bindings(&self) -> Vec<Arc<Binding>> {
		self.state.lock().bindings.clone()
	}

	/// Number of subscribers still alive.
	///
	/// Never upgrades: the last handle released under the state lock would re-enter
	/// `unsubscribe` from the subscriber's `Drop`.
	pub fn subscriber_count(&self) -> usize {
		let mut state = self.state.lock();
		state.subscribers.retain(|s| s.strong_count() > 0);
		state.subscribers.len()
	}
}

fn live_subscribers(state: &mut PublisherState) -> Vec<Arc<dyn BindingSubscriber>> {
	state.subscribers.retain(|s| s.strong_count() > 0);
	state.subscribers.iter().filter_map(Weak::upgrade).collect()
}

impl BindingPublisher for MemoryPublisher {
	fn subscribe(&self, subscriber: Arc<dyn BindingSubscriber>) -> anyhow::Result<()> {
		let _notify = self.notify.lock();
		let type_key = subscriber.type_key();
		let matching: Vec<Arc<Binding>> = {
			let mut state = self.state.lock();
			state.subscribers.push(Arc::downgrade(&subscriber));
			state
				.bindings
				.iter()
				.filter(|b| b.type_key() == type_key)
				.cloned()
				.collect()
		};
		for binding in matching {
			let rank = self.ranking.rank(&binding);
			subscriber.add(binding, rank);
		}
		Ok(())
	}

	fn unsubscribe(&self, subscriber: &dyn BindingSubscriber) {
		let _notify = self.notify.lock();
		let ours = {
			let mut state = self.state.lock();
			state
				.subscribers
				.retain(|s| s.strong_count() > 0 && !same_subscriber(s.as_ptr(), subscriber));
			state.bindings.clone()
		};
		for binding in subscriber.bindings() {
			if ours.iter().any(|b| b.same(&binding)) {
				subscriber.remove(&binding);
			}
		}
	}

	fn max_binding_rank(&self) -> Rank {
		self.ranking.max_rank()
	}
}

impl fmt::Debug for MemoryPublisher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("MemoryPublisher")
			.field("max_rank", &self.ranking.max_rank())
			.field("bindings", &state.bindings.len())
			.field("subscribers", &state.subscribers.len())
			.finish()
	}
}
