//! Binding vocabulary: type keys, qualifiers, providers, and ranking functions.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use plexus_ranked::Rank;

/// Type-erased instance produced by a [`Provider`].
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Identity of a requested type.
#[derive(Clone, Copy)]
pub struct TypeKey {
	id: TypeId,
	name: &'static str,
}

impl TypeKey {
	/// Returns the key for `T`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	/// Returns the type name, for diagnostics only.
	pub const fn name(&self) -> &'static str {
		self.name
	}
}

impl PartialEq for TypeKey {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

/// Discriminator between several bindings of the same type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Qualifier {
	/// The unqualified binding.
	#[default]
	Default,
	/// A binding qualified by name.
	Named(Arc<str>),
}

impl Qualifier {
	pub fn named(name: impl Into<Arc<str>>) -> Self {
		Self::Named(name.into())
	}

	pub fn is_default(&self) -> bool {
		matches!(self, Self::Default)
	}
}

impl fmt::Display for Qualifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Default => f.write_str("default"),
			Self::Named(name) => write!(f, "@{name}"),
		}
	}
}

/// Lookup key: a type plus an optional qualifier (`None` matches every qualifier).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key {
	type_key: TypeKey,
	qualifier: Option<Qualifier>,
}

impl Key {
	pub fn new(type_key: TypeKey, qualifier: Option<Qualifier>) -> Self {
		Self { type_key, qualifier }
	}

	/// Matches every binding of `T`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self::new(TypeKey::of::<T>(), None)
	}

	/// Matches bindings of `T` carrying exactly `qualifier`.
	pub fn qualified<T: ?Sized + 'static>(qualifier: Qualifier) -> Self {
		Self::new(TypeKey::of::<T>(), Some(qualifier))
	}

	pub fn type_key(&self) -> TypeKey {
		self.type_key
	}

	pub fn qualifier(&self) -> Option<&Qualifier> {
		self.qualifier.as_ref()
	}

	/// Returns true when `binding` satisfies this key.
	pub fn matches(&self, binding: &Binding) -> bool {
		binding.type_key == self.type_key
			&& self
				.qualifier
				.as_ref()
				.is_none_or(|q| *q == binding.qualifier)
	}
}

/// Produces instances for a binding.
pub trait Provider: Send + Sync {
	fn provide(&self) -> Instance;
}

impl<F> Provider for F
where
	F: Fn() -> Instance + Send + Sync,
{
	fn provide(&self) -> Instance {
		self()
	}
}

/// Association between a qualifier and a provider for one type.
///
/// Bindings are shared as `Arc<Binding>` and compared by identity; two bindings with the same
/// qualifier and type are still distinct.
pub struct Binding {
	type_key: TypeKey,
	qualifier: Qualifier,
	provider: Arc<dyn Provider>,
	description: Option<Arc<str>>,
}

impl Binding {
	pub fn new(type_key: TypeKey, qualifier: Qualifier, provider: impl Provider + 'static) -> Self {
		Self {
			type_key,
			qualifier,
			provider: Arc::new(provider),
			description: None,
		}
	}

	/// Binds `T` to a single shared instance.
	pub fn to_instance<T: Any + Send + Sync>(qualifier: Qualifier, instance: T) -> Self {
		let instance: Instance = Arc::new(instance);
		Self::new(TypeKey::of::<T>(), qualifier, move || Arc::clone(&instance))
	}

	/// Binds `T` to a factory invoked once per provision.
	pub fn to_factory<T, F>(qualifier: Qualifier, factory: F) -> Self
	where
		T: Any + Send + Sync,
		F: Fn() -> T + Send + Sync + 'static,
	{
		Self::new(TypeKey::of::<T>(), qualifier, move || -> Instance { Arc::new(factory()) })
	}

	pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn type_key(&self) -> TypeKey {
		self.type_key
	}

	pub fn qualifier(&self) -> &Qualifier {
		&self.qualifier
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	/// Asks the provider for an instance.
	pub fn provide(&self) -> Instance {
		self.provider.provide()
	}
}

impl fmt::Debug for Binding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Binding")
			.field("type", &self.type_key)
			.field("qualifier", &self.qualifier)
			.field("description", &self.description)
			.finish_non_exhaustive()
	}
}

/// Assigns ranks to the bindings of one publisher.
pub trait RankingFunction: Send + Sync {
	/// Upper bound of every rank this function returns.
	fn max_rank(&self) -> Rank;

	fn rank(&self, binding: &Binding) -> Rank;
}

/// Ranks default bindings at the primary rank and qualified bindings far below it.
///
/// Qualified bindings get `primary + i32::MIN`, so every named binding sorts after every
/// default binding of every publisher while named bindings keep their publishers' order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultRanking {
	primary: Rank,
}

impl DefaultRanking {
	/// # Panics
	///
	/// Panics if `primary` is negative.
	pub const fn new(primary: Rank) -> Self {
		assert!(primary >= 0, "primary rank must be non-negative");
		Self { primary }
	}
}

impl RankingFunction for DefaultRanking {
	fn max_rank(&self) -> Rank {
		self.primary
	}

	fn rank(&self, binding: &Binding) -> Rank {
		if binding.qualifier.is_default() {
			self.primary
		} else {
			self.primary.wrapping_add(i32::MIN)
		}
	}
}
