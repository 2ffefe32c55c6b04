use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::binding::Key;
use crate::bindings::{RankedBindings, RankedBindingsIter};
use crate::cache::{BeanCache, BeanEntry};
use crate::error::LocateError;

/// Qualifier-filtered, typed sequence of beans returned by [`crate::BindingRegistry::locate`].
///
/// Owns its [`BeanCache`], so entries (and their provisioned instances) are shared across
/// iterations until the binding behind them is removed.
pub struct LocatedBeans<T> {
	key: Key,
	view: Arc<RankedBindings>,
	cache: Arc<BeanCache<T>>,
}

impl<T: Any + Send + Sync> LocatedBeans<T> {
	pub(crate) fn new(key: Key, view: Arc<RankedBindings>) -> Self {
		let cache = view.new_bean_cache();
		Self { key, view, cache }
	}

	pub fn key(&self) -> &Key {
		&self.key
	}

	/// The per-type view backing this sequence.
	pub fn view(&self) -> &Arc<RankedBindings> {
		&self.view
	}

	pub fn iter(&self) -> LocatedIter<'_, T> {
		LocatedIter {
			beans: self,
			inner: self.view.iter(),
		}
	}

	/// Best-ranked matching bean.
	pub fn first(&self) -> Option<Result<Arc<BeanEntry<T>>, LocateError>> {
		self.iter().next()
	}

	/// True when iteration yields nothing; this may drain publishers.
	pub fn is_empty(&self) -> bool {
		self.first().is_none()
	}

	/// Collects every matching bean, stopping at the first publisher failure.
	pub fn try_collect(&self) -> Result<Vec<Arc<BeanEntry<T>>>, LocateError> {
		self.iter().collect()
	}
}

impl<T> fmt::Debug for LocatedBeans<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LocatedBeans")
			.field("key", &self.key)
			.field("view", &self.view)
			.finish_non_exhaustive()
	}
}

impl<'a, T: Any + Send + Sync> IntoIterator for &'a LocatedBeans<T> {
	type Item = Result<Arc<BeanEntry<T>>, LocateError>;
	type IntoIter = LocatedIter<'a, T>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

/// Iterator over [`LocatedBeans`].
pub struct LocatedIter<'a, T> {
	beans: &'a LocatedBeans<T>,
	inner: RankedBindingsIter,
}

impl<T: Any + Send + Sync> Iterator for LocatedIter<'_, T> {
	type Item = Result<Arc<BeanEntry<T>>, LocateError>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			match self.inner.next()? {
				Err(err) => return Some(Err(err)),
				Ok((binding, rank)) if self.beans.key.matches(&binding) => {
					return Some(Ok(self.beans.cache.get_or_create(&binding, rank)));
				}
				Ok(_) => {}
			}
		}
	}
}
