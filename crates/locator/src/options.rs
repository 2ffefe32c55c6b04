use serde::Deserialize;

use crate::error::OptionsError;

/// Tuning knobs for [`crate::BindingRegistry`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryOptions {
	/// Number of recently located per-type views kept alive by the registry itself.
	///
	/// Views still held by consumers stay live regardless; `0` disables retention.
	pub retained_views: usize,
}

impl Default for RegistryOptions {
	fn default() -> Self {
		Self { retained_views: 64 }
	}
}

impl RegistryOptions {
	/// Parses options from a TOML document; missing fields take their defaults.
	pub fn from_toml_str(src: &str) -> Result<Self, OptionsError> {
		Ok(toml::from_str(src)?)
	}
}
