//! Standing watch subscriptions.
//!
//! A watch subscribes directly to every publisher (not to a view) and forwards matching
//! bindings to a [`Mediator`] as they appear and disappear. The watcher object is held
//! weakly: once its owner drops it the subscription goes quiet and the registry prunes it
//! on its next mutation. [`crate::BindingRegistry::unwatch`] removes it explicitly.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use plexus_ranked::Rank;

use crate::binding::{Binding, Key, TypeKey};
use crate::cache::{BeanCache, BeanEntry};
use crate::publisher::BindingSubscriber;

/// Receives add/remove callbacks for beans matching a watched key.
pub trait Mediator<T, W>: Send + Sync {
	fn add(&self, entry: &BeanEntry<T>, watcher: &W) -> anyhow::Result<()>;

	fn remove(&self, entry: &BeanEntry<T>, watcher: &W) -> anyhow::Result<()>;
}

/// Handle for explicit removal of a watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub(crate) u64);

/// Type-erased watch as stored by the registry.
pub(crate) trait WatchSubscription: BindingSubscriber {
	/// False once the watcher has been dropped or the watch was closed.
	fn is_live(&self) -> bool;

	/// Stops reporting new beans; removals of already reported beans still reach the mediator.
	fn close(&self);
}

pub(crate) struct WatchedBeans<T, W> {
	key: Key,
	mediator: Box<dyn Mediator<T, W>>,
	watcher: Weak<W>,
	closed: AtomicBool,
	beans: BeanCache<T>,
}

impl<T, W> WatchedBeans<T, W>
where
	T: Any + Send + Sync,
	W: Send + Sync + 'static,
{
	pub(crate) fn new(key: Key, mediator: impl Mediator<T, W> + 'static, watcher: Weak<W>) -> Self {
		Self {
			key,
			mediator: Box::new(mediator),
			watcher,
			closed: AtomicBool::new(false),
			beans: BeanCache::new(),
		}
	}
}

impl<T, W> BindingSubscriber for WatchedBeans<T, W>
where
	T: Any + Send + Sync,
	W: Send + Sync + 'static,
{
	fn type_key(&self) -> TypeKey {
		self.key.type_key()
	}

	fn add(&self, binding: Arc<Binding>, rank: Rank) {
		if !self.key.matches(&binding) || self.closed.load(Ordering::Acquire) {
			return;
		}
		let Some(watcher) = self.watcher.upgrade() else {
			return;
		};
		let Some(entry) = self.beans.insert_new(&binding, rank) else {
			return;
		};
		if let Err(err) = self.mediator.add(&entry, &watcher) {
			tracing::warn!(key = ?self.key, error = %err, "watch mediator failed to add bean");
		}
	}

	fn remove(&self, binding: &Arc<Binding>) {
		let Some(entry) = self.beans.take(binding) else {
			return;
		};
		let Some(watcher) = self.watcher.upgrade() else {
			return;
		};
		if let Err(err) = self.mediator.remove(&entry, &watcher) {
			tracing::warn!(key = ?self.key, error = %err, "watch mediator failed to remove bean");
		}
	}

	fn bindings(&self) -> Vec<Arc<Binding>> {
		self.beans.bindings()
	}
}

impl<T, W> WatchSubscription for WatchedBeans<T, W>
where
	T: Any + Send + Sync,
	W: Send + Sync + 'static,
{
	fn is_live(&self) -> bool {
		!self.closed.load(Ordering::Acquire) && self.watcher.strong_count() > 0
	}

	fn close(&self) {
		self.closed.store(true, Ordering::Release);
	}
}
