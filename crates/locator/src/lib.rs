//! Rank-ordered binding locator over a dynamic set of publishers.
//!
//! # Purpose
//!
//! Publishers (injectors, plugins, any runtime-installable binding source) are installed into
//! a [`BindingRegistry`] with a rank. Consumers ask for every binding of a type and observe them
//! best rank first, or register watches that hear about matching bindings as they come and go.
//!
//! # Mental Model
//!
//! 1. **Install:** [`BindingRegistry::add`] inserts the publisher into the global
//!    [`plexus_ranked::RankedSequence`], then enqueues it on every live per-type view and
//!    subscribes every live watch to it.
//! 2. **Locate:** [`BindingRegistry::locate`] returns [`LocatedBeans`] over the shared
//!    [`RankedBindings`] view for the type. A new view starts with every installed publisher
//!    pending; nothing is asked yet.
//! 3. **Drain:** Iteration subscribes pending publishers only while the best of them could
//!    still outrank the next resolved binding, so expensive publishers are consulted late or
//!    never.
//! 4. **Withdraw:** [`BindingRegistry::remove`] dequeues the publisher where it was still
//!    pending and unsubscribes it where it was consulted. Publishers withdraw their bindings on
//!    unsubscribe, which evicts derived [`BeanEntry`] caches.
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`BindingRegistry`] | Owns publishers, per-type views and watches. |
//! | [`RankedBindings`] | Per-type resolved bindings plus pending publishers. |
//! | [`LocatedBeans`] | Qualifier-filtered, typed view with its own [`BeanCache`]. |
//! | [`BindingPublisher`] | Contract implemented by binding sources. |
//! | [`MemoryPublisher`] | In-memory publisher ranked by a [`RankingFunction`]. |
//! | [`Mediator`] | Callback target for watches. |
//!
//! # Lifetimes
//!
//! Nothing in the registry keeps consumer state alive: views are cached weakly (plus a small
//! LRU, see [`RegistryOptions`]), derived caches are registered weakly with their view, and
//! watchers are held weakly by their watch subscription.

mod binding;
mod bindings;
mod cache;
mod error;
mod located;
mod memory;
mod options;
mod publisher;
mod registry;
mod watch;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use binding::{Binding, DefaultRanking, Instance, Key, Provider, Qualifier, RankingFunction, TypeKey};
pub use bindings::{RankedBindings, RankedBindingsIter};
pub use cache::{BeanCache, BeanEntry};
pub use error::{LocateError, OptionsError};
pub use located::{LocatedBeans, LocatedIter};
pub use memory::MemoryPublisher;
pub use options::RegistryOptions;
pub use plexus_ranked::Rank;
pub use publisher::{BindingPublisher, BindingSubscriber, PublisherRef, same_subscriber};
pub use registry::BindingRegistry;
pub use watch::{Mediator, WatchHandle};
