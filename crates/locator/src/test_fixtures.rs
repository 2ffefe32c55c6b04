use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use plexus_ranked::{Identity, Rank};

use crate::binding::{Binding, Qualifier, TypeKey};
use crate::cache::BeanEntry;
use crate::memory::MemoryPublisher;
use crate::publisher::{BindingPublisher, BindingSubscriber, PublisherRef};
use crate::watch::Mediator;

/// Subscriber that records what it was given.
pub(crate) struct RecordingSubscriber {
	type_key: TypeKey,
	held: Mutex<Vec<(Arc<Binding>, Rank)>>,
}

impl RecordingSubscriber {
	pub(crate) fn of<T: 'static>() -> Self {
		Self {
			type_key: TypeKey::of::<T>(),
			held: Mutex::new(Vec::new()),
		}
	}

	pub(crate) fn ranks(&self) -> Vec<Rank> {
		self.held.lock().iter().map(|(_, rank)| *rank).collect()
	}
}

impl BindingSubscriber for RecordingSubscriber {
	fn type_key(&self) -> TypeKey {
		self.type_key
	}

	fn add(&self, binding: Arc<Binding>, rank: Rank) {
		self.held.lock().push((binding, rank));
	}

	fn remove(&self, binding: &Arc<Binding>) {
		self.held.lock().retain(|(b, _)| !b.same(binding));
	}

	fn bindings(&self) -> Vec<Arc<Binding>> {
		self.held.lock().iter().map(|(b, _)| Arc::clone(b)).collect()
	}
}

/// [`MemoryPublisher`] wrapper that counts subscriptions and can fail or stall on demand.
pub(crate) struct CountingPublisher {
	pub(crate) inner: MemoryPublisher,
	subscribes: AtomicUsize,
	unsubscribes: AtomicUsize,
	fail: AtomicBool,
	delay: Option<Duration>,
}

impl CountingPublisher {
	pub(crate) fn new(rank: Rank) -> Arc<Self> {
		Arc::new(Self::build(rank, None))
	}

	pub(crate) fn slow(rank: Rank, delay: Duration) -> Arc<Self> {
		Arc::new(Self::build(rank, Some(delay)))
	}

	pub(crate) fn failing(rank: Rank) -> Arc<Self> {
		let publisher = Self::build(rank, None);
		publisher.fail.store(true, Ordering::SeqCst);
		Arc::new(publisher)
	}

	fn build(rank: Rank, delay: Option<Duration>) -> Self {
		Self {
			inner: MemoryPublisher::new(rank),
			subscribes: AtomicUsize::new(0),
			unsubscribes: AtomicUsize::new(0),
			fail: AtomicBool::new(false),
			delay,
		}
	}

	pub(crate) fn bind<T: Any + Send + Sync>(&self, qualifier: Qualifier, value: T) -> Arc<Binding> {
		self.inner.bind(Binding::to_instance(qualifier, value))
	}

	pub(crate) fn subscribes(&self) -> usize {
		self.subscribes.load(Ordering::SeqCst)
	}

	pub(crate) fn unsubscribes(&self) -> usize {
		self.unsubscribes.load(Ordering::SeqCst)
	}
}

impl BindingPublisher for CountingPublisher {
	fn subscribe(&self, subscriber: Arc<dyn BindingSubscriber>) -> anyhow::Result<()> {
		self.subscribes.fetch_add(1, Ordering::SeqCst);
		if let Some(delay) = self.delay {
			std::thread::sleep(delay);
		}
		if self.fail.load(Ordering::SeqCst) {
			anyhow::bail!("binding source unavailable");
		}
		self.inner.subscribe(subscriber)
	}

	fn unsubscribe(&self, subscriber: &dyn BindingSubscriber) {
		self.unsubscribes.fetch_add(1, Ordering::SeqCst);
		self.inner.unsubscribe(subscriber);
	}

	fn max_binding_rank(&self) -> Rank {
		self.inner.max_binding_rank()
	}
}

pub(crate) fn publisher_ref(publisher: &Arc<CountingPublisher>) -> PublisherRef {
	Arc::clone(publisher) as PublisherRef
}

/// Instance provided by `binding`, downcast to `T`.
pub(crate) fn instance_of<T: Any + Send + Sync + Clone>(binding: &Binding) -> T {
	binding
		.provide()
		.downcast::<T>()
		.map(|value| (*value).clone())
		.expect("binding provides the requested type")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum WatchEvent<T> {
	Added(T),
	Removed(T),
}

/// Mediator that logs every callback it receives.
pub(crate) struct RecordingMediator<T> {
	pub(crate) events: Arc<Mutex<Vec<WatchEvent<T>>>>,
}

impl<T> RecordingMediator<T> {
	pub(crate) fn new() -> (Self, Arc<Mutex<Vec<WatchEvent<T>>>>) {
		let events = Arc::new(Mutex::new(Vec::new()));
		(
			Self {
				events: Arc::clone(&events),
			},
			events,
		)
	}
}

impl<T, W> Mediator<T, W> for RecordingMediator<T>
where
	T: Any + Send + Sync + Clone,
{
	fn add(&self, entry: &BeanEntry<T>, _watcher: &W) -> anyhow::Result<()> {
		let value = entry.value()?;
		self.events.lock().push(WatchEvent::Added((*value).clone()));
		Ok(())
	}

	fn remove(&self, entry: &BeanEntry<T>, _watcher: &W) -> anyhow::Result<()> {
		let value = entry.value()?;
		self.events.lock().push(WatchEvent::Removed((*value).clone()));
		Ok(())
	}
}
