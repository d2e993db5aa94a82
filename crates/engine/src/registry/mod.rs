//! Tier model registry.
//!
//! Hands out exactly one [`TierModel`] per tier name. Misses and forced refreshes resolve the
//! name through the tree service; concurrent requests for one name share a single lookup.

use std::collections::HashMap;
use std::sync::Arc;

use cassini_documents::DocumentBackend;
use cassini_remote::TreeService;
use cassini_types::TierInfo;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::model::{TierModel, TierRefresh};
use crate::notify::Notifier;
use crate::singleflight::Singleflight;
use crate::tree::with_timeout;
use crate::{Error, Result};

/// Registry of live tier models, keyed by tier name.
///
/// # Concurrency
///
/// - `models`: `RwLock` held only for map access, never across a lookup
/// - `flights`: one in-flight resolution per name; waiters receive the leader's result
pub struct ModelRegistry {
	service: Arc<dyn TreeService>,
	backend: Arc<dyn DocumentBackend>,
	notifier: Arc<dyn Notifier>,
	config: EngineConfig,
	models: RwLock<HashMap<String, TierModel>>,
	flights: Singleflight<String, Result<TierModel>>,
}

impl ModelRegistry {
	/// Create an empty registry.
	pub fn new(
		service: Arc<dyn TreeService>,
		backend: Arc<dyn DocumentBackend>,
		notifier: Arc<dyn Notifier>,
		config: EngineConfig,
	) -> Self {
		Self {
			service,
			backend,
			notifier,
			config,
			models: RwLock::new(HashMap::new()),
			flights: Singleflight::default(),
		}
	}

	/// Get the model for `name`.
	///
	/// A cached model is returned as is unless `force_refresh` is set. Otherwise the name is
	/// looked up: a cached model of the same kind is refreshed in place, a cached model of the
	/// other kind is disposed and replaced, and a missing model is created.
	///
	/// # Errors
	///
	/// Returns the lookup error if the service cannot resolve the name, or the construction
	/// error if the tier info cannot be turned into a model.
	pub async fn get(&self, name: &str, force_refresh: bool) -> Result<TierModel> {
		if !force_refresh && let Some(model) = self.cached(name) {
			return Ok(model);
		}

		self.flights
			.run(name.to_string(), self.resolve(name))
			.await
			.unwrap_or_else(|| Err(Error::Protocol(format!("lookup of {name:?} abandoned"))))
	}

	/// Get the cached model for `name` without a lookup.
	pub fn cached(&self, name: &str) -> Option<TierModel> {
		self.models
			.read()
			.get(name)
			.filter(|model| !model.is_disposed())
			.cloned()
	}

	/// Create a model from already known tier info, replacing any cached one.
	pub fn insert(&self, info: TierInfo) -> Result<TierModel> {
		let model = self.open(info)?;
		if let Some(previous) = self.models.write().insert(model.name().to_string(), model.clone()) {
			previous.dispose();
		}
		Ok(model)
	}

	/// Drop and dispose the model for `name`.
	pub fn remove(&self, name: &str) -> Option<TierModel> {
		let model = self.models.write().remove(name)?;
		model.dispose();
		Some(model)
	}

	/// Dispose every model.
	pub fn dispose_all(&self) {
		let models: Vec<TierModel> = self.models.write().drain().map(|(_, model)| model).collect();
		for model in &models {
			model.dispose();
		}
		debug!(count = models.len(), "disposed all tier models");
	}

	/// Number of cached models.
	pub fn len(&self) -> usize {
		self.models.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.models.read().is_empty()
	}

	async fn resolve(&self, name: &str) -> Result<TierModel> {
		let info = with_timeout(self.config.timeout(), name, self.service.lookup(name)).await?;

		match (self.cached(name), info) {
			(Some(TierModel::Notebook(model)), TierInfo::Notebook(info)) => {
				debug!(name, "refreshing notebook model");
				model.refresh(TierRefresh::from(&info)).await?;
				Ok(TierModel::Notebook(model))
			}
			(Some(TierModel::Folder(model)), TierInfo::Folder(info)) => {
				debug!(name, "refreshing folder model");
				model.refresh_children(info.children);
				Ok(TierModel::Folder(model))
			}
			(Some(previous), info) => {
				info!(name, from = ?previous.kind(), to = ?info.kind(), "tier kind changed, replacing model");
				let model = self.open(info)?;
				self.models.write().insert(name.to_string(), model.clone());
				previous.dispose();
				Ok(model)
			}
			(None, info) => {
				debug!(name, kind = ?info.kind(), "creating tier model");
				let model = self.open(info)?;
				self.models.write().insert(name.to_string(), model.clone());
				Ok(model)
			}
		}
	}

	fn open(&self, info: TierInfo) -> Result<TierModel> {
		TierModel::open(info, self.backend.clone(), self.notifier.clone(), &self.config)
	}
}
