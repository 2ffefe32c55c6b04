//! Publisher and subscriber contracts.
//!
//! A publisher is any runtime-installable source of bindings (an injector, a plugin, a
//! test fixture). Subscribers are the per-type views and watch subscriptions that want the
//! publisher's bindings for one type.

use std::sync::Arc;

use plexus_ranked::Rank;

use crate::binding::{Binding, TypeKey};

/// Receiver of bindings for a single type.
pub trait BindingSubscriber: Send + Sync {
	/// The type whose bindings this subscriber wants.
	fn type_key(&self) -> TypeKey;

	fn add(&self, binding: Arc<Binding>, rank: Rank);

	fn remove(&self, binding: &Arc<Binding>);

	/// Bindings currently held by this subscriber.
	fn bindings(&self) -> Vec<Arc<Binding>>;
}

/// Rank-bearing source of bindings.
///
/// # Contract
///
/// - `subscribe` calls [`BindingSubscriber::add`] zero or more times for the subscriber's
///   type, synchronously or later from another thread. It must tolerate several distinct
///   subscribers being subscribed concurrently.
/// - Publishers hold subscribers weakly (`Arc::downgrade`); a subscriber's identity is its
///   address (see [`same_subscriber`]).
/// - `unsubscribe` removes every binding this publisher contributed to the subscriber and
///   forgets it. Unsubscribing an unknown subscriber is a no-op.
pub trait BindingPublisher: Send + Sync {
	fn subscribe(&self, subscriber: Arc<dyn BindingSubscriber>) -> anyhow::Result<()>;

	fn unsubscribe(&self, subscriber: &dyn BindingSubscriber);

	/// Upper bound of the ranks this publisher assigns.
	fn max_binding_rank(&self) -> Rank;
}

/// Shared publisher handle; compared by identity.
pub type PublisherRef = Arc<dyn BindingPublisher>;

/// Returns true when both references denote the same subscriber object.
#[inline]
pub fn same_subscriber(a: *const (dyn BindingSubscriber + '_), b: *const (dyn BindingSubscriber + '_)) -> bool {
	std::ptr::addr_eq(a, b)
}
