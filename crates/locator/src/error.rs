/// Errors surfaced while iterating located bindings.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
	/// A publisher failed while contributing bindings during a drain.
	///
	/// The publisher counts as consulted and is not asked again for this type.
	#[error("publisher failed to contribute bindings for `{type_name}`: {source}")]
	Publisher {
		type_name: &'static str,
		source: Box<dyn std::error::Error + Send + Sync + 'static>,
	},

	/// A provider produced an instance of a different type than its binding declares.
	#[error("binding provided an instance that is not a `{expected}`")]
	TypeMismatch { expected: &'static str },
}

impl LocateError {
	pub(crate) fn publisher(type_name: &'static str, err: anyhow::Error) -> Self {
		Self::Publisher {
			type_name,
			source: err.into(),
		}
	}
}

/// Errors raised while loading [`crate::RegistryOptions`].
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
	#[error("invalid registry options: {0}")]
	Parse(#[from] toml::de::Error),
}
