use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Engine configuration.
///
/// ```toml
/// event_buffer = 128
/// coalesce_fetches = true
/// fetch_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
	/// Capacity of every event broadcast buffer.
	pub event_buffer: usize,
	/// Share one in-flight tree request between concurrent fetches of the same path.
	pub coalesce_fetches: bool,
	/// Per-request timeout for tree fetches and lookups, in milliseconds.
	pub fetch_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			event_buffer: 128,
			coalesce_fetches: true,
			fetch_timeout_ms: None,
		}
	}
}

impl EngineConfig {
	/// Parse a configuration from TOML text.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
		config.validate()
	}

	/// Read and parse a TOML configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
		Self::from_toml_str(&text)
	}

	/// Set the event broadcast buffer capacity.
	///
	/// # Panics
	///
	/// Panics if `size` is zero.
	#[must_use]
	pub fn event_buffer(mut self, size: usize) -> Self {
		assert!(size > 0, "event buffer size must be > 0");
		self.event_buffer = size;
		self
	}

	/// Enable or disable fetch coalescing.
	#[must_use]
	pub fn coalesce_fetches(mut self, coalesce: bool) -> Self {
		self.coalesce_fetches = coalesce;
		self
	}

	/// Set the per-request timeout.
	#[must_use]
	pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
		self.fetch_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
		self
	}

	/// Get the per-request timeout.
	pub fn timeout(&self) -> Option<Duration> {
		self.fetch_timeout_ms.map(Duration::from_millis)
	}

	fn validate(self) -> Result<Self> {
		if self.event_buffer == 0 {
			return Err(Error::Config("event_buffer must be > 0".into()));
		}
		Ok(self)
	}
}
