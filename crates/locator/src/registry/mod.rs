//! Top-level binding registry.
//!
//! # Role
//!
//! [`BindingRegistry`] owns the global publisher sequence, the per-type view cache and the
//! active watch subscriptions, and fans publisher changes out to all of them.
//!
//! # Invariants
//!
//! - A publisher is globally visible before any view or watch hears about it, and view
//!   creation snapshots the publisher sequence under the view-map write lock, so a concurrent
//!   `locate` can neither miss nor double-count a publisher being added.
//!   - Enforced in: [`BindingRegistry::add`], [`BindingRegistry::view`].
//!   - Tested by: `registry::tests::test_concurrent_add_and_locate_never_lose_publishers`.
//! - Concurrent first lookups of one type converge on a single view.
//!   - Enforced in: [`BindingRegistry::view`] (check, create and insert under the write lock).
//!   - Tested by: `registry::tests::test_concurrent_first_lookup_converges`.
//! - Dropping a view from the cache never changes results; it only costs recomputation.
//!   - Enforced in: weak view map plus optional LRU retention.
//!   - Tested by: `registry::tests::test_unretained_views_are_recomputed`.
//! - A mediator may call back into the registry from its callbacks; a closed watch reports
//!   no further additions.
//!   - Enforced in: re-entrant admin mutex, [`BindingRegistry::unwatch`].
//!   - Tested by: `registry::tests::test_mediator_can_unwatch_from_callback`.
//!
//! # Concurrency
//!
//! `add`, `remove`, `watch`, `unwatch` and `clear` serialise on one re-entrant administrative
//! mutex, so a [`Mediator`] may call back into the registry from its callbacks. The admin
//! state itself is only borrowed between callbacks, never across one. `locate` and iteration
//! never take the admin mutex.
//!
//! Views that may be the last strong reference are released only after the view map and LRU
//! locks are dropped, since a view's `Drop` unsubscribes it from publishers.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

use lru::LruCache;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use plexus_ranked::{Rank, RankedSequence};
use rustc_hash::FxHashMap;

use crate::binding::{Key, Qualifier, TypeKey};
use crate::bindings::RankedBindings;
use crate::located::LocatedBeans;
use crate::options::RegistryOptions;
use crate::publisher::{BindingSubscriber, PublisherRef};
use crate::watch::{Mediator, WatchHandle, WatchSubscription, WatchedBeans};


type Watch = (WatchHandle, Arc<dyn WatchSubscription>);

#[derive(Default)]
struct AdminState {
	watches: Vec<Watch>,
	next_watch: u64,
}

/// Dynamic, rank-ordered registry of bindings contributed by pluggable publishers.
pub struct BindingRegistry {
	publishers: RankedSequence<PublisherRef>,
	views: RwLock<FxHashMap<TypeKey, Weak<RankedBindings>>>,
	retained: Option<Mutex<LruCache<TypeKey, Arc<RankedBindings>>>>,
	admin: ReentrantMutex<RefCell<AdminState>>,
}

impl Default for BindingRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl BindingRegistry {
	pub fn new() -> Self {
		Self::with_options(RegistryOptions::default())
	}

	pub fn with_options(options: RegistryOptions) -> Self {
		Self {
			publishers: RankedSequence::new(),
			views: RwLock::new(FxHashMap::default()),
			retained: NonZeroUsize::new(options.retained_views).map(|cap| Mutex::new(LruCache::new(cap))),
			admin: ReentrantMutex::new(RefCell::new(AdminState::default())),
		}
	}

	/// Locates beans of type `T`, optionally restricted to one qualifier.
	pub fn locate<T: Any + Send + Sync>(&self, qualifier: Option<Qualifier>) -> LocatedBeans<T> {
		let key = Key::new(TypeKey::of::<T>(), qualifier);
		LocatedBeans::new(key, self.view(TypeKey::of::<T>()))
	}

	/// Returns the shared view for `type_key`, creating it on first use.
	pub fn view(&self, type_key: TypeKey) -> Arc<RankedBindings> {
		let existing = self.views.read().get(&type_key).and_then(Weak::upgrade);
		if let Some(view) = existing {
			self.retain(&view);
			return view;
		}

		let view = {
			let mut views = self.views.write();
			match views.get(&type_key).and_then(Weak::upgrade) {
				Some(view) => view,
				None => {
					views.retain(|_, v| v.strong_count() > 0);
					let view = RankedBindings::new(type_key, &self.publishers.snapshot());
					views.insert(type_key, Arc::downgrade(&view));
					tracing::debug!(type_name = type_key.name(), pending = view.pending_len(), "created binding view");
					view
				}
			}
		};
		self.retain(&view);
		view
	}

	/// Installs a publisher at `rank`; no-op if it is already installed.
	pub fn add(&self, publisher: PublisherRef, rank: Rank) -> bool {
		let admin = self.admin.lock();
		if self.publishers.contains(&publisher) {
			return false;
		}
		self.publishers.insert(Arc::clone(&publisher), rank);
		tracing::debug!(rank, publishers = self.publishers.len(), "added publisher");

		for view in self.live_views() {
			view.add_publisher(Arc::clone(&publisher), rank);
		}

		self.prune_watches(&admin);
		let watches = admin.borrow().watches.clone();
		for (handle, watch) in &watches {
			// A mediator may have removed the publisher or closed this watch meanwhile.
			if !self.publishers.contains(&publisher) {
				break;
			}
			if watch.is_live() {
				self.feed_watch(&publisher, *handle, watch);
			}
		}
		true
	}

	/// Installs a publisher at its own [`crate::BindingPublisher::max_binding_rank`].
	pub fn publish(&self, publisher: PublisherRef) -> bool {
		let rank = publisher.max_binding_rank();
		self.add(publisher, rank)
	}

	/// Removes a publisher; no-op if it is not installed.
	pub fn remove(&self, publisher: &PublisherRef) -> bool {
		let admin = self.admin.lock();
		if !self.publishers.remove(publisher) {
			return false;
		}
		tracing::debug!(publishers = self.publishers.len(), "removed publisher");

		for view in self.live_views() {
			view.remove_publisher(publisher);
		}
		let watches = admin.borrow().watches.clone();
		for (_, watch) in &watches {
			publisher.unsubscribe(watch.as_ref());
		}
		self.prune_watches(&admin);
		self.drop_empty_views();
		true
	}

	/// Removes every installed publisher.
	pub fn clear(&self) {
		for publisher in &self.publishers.snapshot() {
			self.remove(publisher);
		}
	}

	/// Installed publishers with their ranks, best first.
	pub fn publishers(&self) -> Vec<(PublisherRef, Rank)> {
		self.publishers
			.snapshot()
			.ranked()
			.map(|(publisher, rank)| (Arc::clone(publisher), rank))
			.collect()
	}

	/// Watches beans of `T` matching `qualifier`, reporting changes to `mediator`.
	///
	/// The subscription stays active until [`Self::unwatch`] or until `watcher` is dropped;
	/// the registry holds `watcher` only weakly.
	pub fn watch<T, W, M>(&self, qualifier: Option<Qualifier>, mediator: M, watcher: &Arc<W>) -> WatchHandle
	where
		T: Any + Send + Sync,
		W: Send + Sync + 'static,
		M: Mediator<T, W> + 'static,
	{
		let key = Key::new(TypeKey::of::<T>(), qualifier);
		tracing::debug!(?key, "registering watch");
		let watch: Arc<dyn WatchSubscription> = Arc::new(WatchedBeans::new(key, mediator, Arc::downgrade(watcher)));

		let admin = self.admin.lock();
		let publishers = self.publishers.snapshot();
		let handle = {
			let mut state = admin.borrow_mut();
			let handle = WatchHandle(state.next_watch);
			state.next_watch += 1;
			state.watches.push((handle, Arc::clone(&watch)));
			handle
		};
		for publisher in &publishers {
			if !watch.is_live() {
				break;
			}
			if self.publishers.contains(publisher) {
				self.feed_watch(publisher, handle, &watch);
			}
		}
		handle
	}

	/// Cancels a watch; returns false for unknown or already pruned handles.
	pub fn unwatch(&self, handle: WatchHandle) -> bool {
		let admin = self.admin.lock();
		let removed = {
			let mut state = admin.borrow_mut();
			let at = state.watches.iter().position(|(h, _)| *h == handle);
			at.map(|at| state.watches.swap_remove(at))
		};
		let Some((_, watch)) = removed else {
			return false;
		};
		watch.close();
		for publisher in &self.publishers.snapshot() {
			publisher.unsubscribe(watch.as_ref());
		}
		tracing::debug!(?handle, "removed watch");
		true
	}

	/// Number of active watch subscriptions.
	pub fn watch_count(&self) -> usize {
		self.admin.lock().borrow().watches.len()
	}

	fn feed_watch(&self, publisher: &PublisherRef, handle: WatchHandle, watch: &Arc<dyn WatchSubscription>) {
		let subscriber: Arc<dyn BindingSubscriber> = Arc::clone(watch) as Arc<dyn BindingSubscriber>;
		if let Err(err) = publisher.subscribe(subscriber) {
			tracing::warn!(?handle, error = %err, "publisher failed to feed watch");
		}
	}

	/// Drops watches that were closed or whose watcher is gone, unsubscribing them everywhere.
	fn prune_watches(&self, admin: &RefCell<AdminState>) {
		let dead: Vec<Watch> = {
			let mut state = admin.borrow_mut();
			let (live, dead) = std::mem::take(&mut state.watches)
				.into_iter()
				.partition(|(_, watch)| watch.is_live());
			state.watches = live;
			dead
		};
		if dead.is_empty() {
			return;
		}
		let publishers = self.publishers.snapshot();
		for (handle, watch) in dead {
			for publisher in &publishers {
				publisher.unsubscribe(watch.as_ref());
			}
			tracing::debug!(?handle, "pruned watch of dropped watcher");
		}
	}

	fn retain(&self, view: &Arc<RankedBindings>) {
		if let Some(retained) = &self.retained {
			let evicted = retained.lock().push(view.type_key(), Arc::clone(view));
			drop(evicted);
		}
	}

	fn live_views(&self) -> Vec<Arc<RankedBindings>> {
		self.views.read().values().filter_map(Weak::upgrade).collect()
	}

	/// Forgets views that hold no bindings and that nobody outside the registry uses.
	fn drop_empty_views(&self) {
		let mut released = Vec::new();
		if let Some(retained) = &self.retained {
			let mut lru = retained.lock();
			let empty: Vec<TypeKey> = lru
				.iter()
				.filter(|(_, view)| view.is_empty() && Arc::strong_count(view) == 1)
				.map(|(type_key, _)| *type_key)
				.collect();
			released.extend(empty.iter().filter_map(|type_key| lru.pop(type_key)));
		}
		drop(released);

		let mut upgraded = Vec::new();
		self.views.write().retain(|type_key, weak| {
			let Some(view) = weak.upgrade() else {
				return false;
			};
			let keep = !view.is_empty() || Arc::strong_count(&view) > 1;
			if !keep {
				tracing::trace!(type_name = type_key.name(), "dropped empty binding view");
			}
			upgraded.push(view);
			keep
		});
		drop(upgraded);
	}
}

impl fmt::Debug for BindingRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BindingRegistry")
			.field("publishers", &self.publishers.len())
			.field("views", &self.views.read().len())
			.finish_non_exhaustive()
	}
}
