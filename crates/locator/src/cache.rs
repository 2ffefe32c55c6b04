//! Derived per-binding bean caches.
//!
//! # Role
//!
//! A [`BeanCache`] memoises one [`BeanEntry`] per binding so repeated iteration hands out the
//! same lazily-provisioned instance. Views only hold caches weakly: the cache lives exactly as
//! long as its owner (a [`crate::LocatedBeans`] or a watch subscription) keeps it.
//!
//! # Invariants
//!
//! - When a binding leaves a view, every live cache registered with that view drops the entry
//!   derived from it before the removal returns.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use plexus_ranked::Rank;
use rustc_hash::FxHashMap;

use crate::binding::{Binding, Qualifier};
use crate::error::LocateError;

/// Invalidation channel from a view to its derived caches.
pub(crate) trait BeanEviction: Send + Sync {
	fn evict(&self, binding: &Arc<Binding>);
}

/// A located binding together with its rank and memoised instance.
pub struct BeanEntry<T> {
	binding: Arc<Binding>,
	rank: Rank,
	instance: OnceLock<Arc<T>>,
}

impl<T: Any + Send + Sync> BeanEntry<T> {
	fn new(binding: Arc<Binding>, rank: Rank) -> Self {
		Self {
			binding,
			rank,
			instance: OnceLock::new(),
		}
	}

	pub fn qualifier(&self) -> &Qualifier {
		self.binding.qualifier()
	}

	pub fn rank(&self) -> Rank {
		self.rank
	}

	pub fn binding(&self) -> &Arc<Binding> {
		&self.binding
	}

	pub fn description(&self) -> Option<&str> {
		self.binding.description()
	}

	/// Returns the instance, provisioning it on first use.
	///
	/// Concurrent first calls may each ask the provider; exactly one result is kept.
	pub fn value(&self) -> Result<Arc<T>, LocateError> {
		if let Some(value) = self.instance.get() {
			return Ok(Arc::clone(value));
		}
		let value = self
			.binding
			.provide()
			.downcast::<T>()
			.map_err(|_| LocateError::TypeMismatch {
				expected: type_name::<T>(),
			})?;
		Ok(Arc::clone(self.instance.get_or_init(|| value)))
	}
}

impl<T> fmt::Debug for BeanEntry<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BeanEntry")
			.field("binding", &self.binding)
			.field("rank", &self.rank)
			.field("provisioned", &self.instance.get().is_some())
			.finish()
	}
}

/// Binding-identity keyed cache of [`BeanEntry`] values.
pub struct BeanCache<T> {
	entries: Mutex<FxHashMap<usize, Arc<BeanEntry<T>>>>,
}

#[inline]
fn slot(binding: &Arc<Binding>) -> usize {
	Arc::as_ptr(binding).addr()
}

impl<T: Any + Send + Sync> BeanCache<T> {
	pub(crate) fn new() -> Self {
		Self {
			entries: Mutex::new(FxHashMap::default()),
		}
	}

	/// Returns the entry for `binding`, creating it at `rank` if absent.
	pub fn get_or_create(&self, binding: &Arc<Binding>, rank: Rank) -> Arc<BeanEntry<T>> {
		let mut entries = self.entries.lock();
		Arc::clone(
			entries
				.entry(slot(binding))
				.or_insert_with(|| Arc::new(BeanEntry::new(Arc::clone(binding), rank))),
		)
	}

	/// Creates an entry for `binding` unless one already exists.
	pub(crate) fn insert_new(&self, binding: &Arc<Binding>, rank: Rank) -> Option<Arc<BeanEntry<T>>> {
		let mut entries = self.entries.lock();
		let key = slot(binding);
		if entries.contains_key(&key) {
			return None;
		}
		let entry = Arc::new(BeanEntry::new(Arc::clone(binding), rank));
		entries.insert(key, Arc::clone(&entry));
		Some(entry)
	}

	/// Removes and returns the entry derived from `binding`.
	pub fn take(&self, binding: &Arc<Binding>) -> Option<Arc<BeanEntry<T>>> {
		self.entries.lock().remove(&slot(binding))
	}

	pub fn contains(&self, binding: &Arc<Binding>) -> bool {
		self.entries.lock().contains_key(&slot(binding))
	}

	/// Bindings with a cached entry, in no particular order.
	pub fn bindings(&self) -> Vec<Arc<Binding>> {
		self.entries
			.lock()
			.values()
			.map(|entry| Arc::clone(&entry.binding))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

impl<T: Any + Send + Sync> BeanEviction for BeanCache<T> {
	fn evict(&self, binding: &Arc<Binding>) {
		if self.take(binding).is_some() {
			tracing::trace!(?binding, "evicted bean entry");
		}
	}
}
