//! Tier tree cache and tier model synchronization.
//!
//! [`Cassini`] ties the pieces together over one remote [`TreeService`] and one
//! [`DocumentBackend`]:
//!
//! - [`tree::TreeCache`]: lazily expanded tree of [`cassini_types::TreeNode`]s, one request per
//!   path in flight
//! - [`registry::ModelRegistry`]: one [`model::TierModel`] per tier name
//! - [`browser::BrowserModel`]: the path a view shows, resolved through the cache

pub mod browser;
pub mod config;
mod error;
pub mod event;
pub mod fixture;
pub mod model;
pub mod notify;
pub mod registry;
mod singleflight;
pub mod tree;

use std::sync::Arc;

use cassini_documents::{DocumentBackend, MemoryBackend};
use cassini_remote::TreeService;
use cassini_types::{NewChildInfo, TierPath};
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub use crate::browser::{BrowserEvent, BrowserModel, ColumnSet};
pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::model::{FolderTierModel, ModelChange, NotebookTierModel, TierModel, TierRefresh};
pub use crate::notify::{LogNotifier, Notifier};
pub use crate::registry::ModelRegistry;
pub use crate::tree::{NodeRef, TreeCache, TreeChanged};

/// What launching a tier does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
	/// Open this notebook document in the editor.
	Notebook(String),
	/// The server was asked to open the tier's folder.
	Folder {
		/// Whether the server reported success.
		opened: bool,
	},
}

/// Engine context: one tree cache and one model registry over a service and a backend.
pub struct Cassini {
	service: Arc<dyn TreeService>,
	backend: Arc<dyn DocumentBackend>,
	config: EngineConfig,
	cache: Arc<TreeCache>,
	registry: ModelRegistry,
	root: OnceCell<NodeRef>,
}

impl Cassini {
	/// Create a context with an empty in-memory backend, log notices and default configuration.
	pub fn new(service: Arc<dyn TreeService>) -> Self {
		Self::builder(service).build()
	}

	/// Start configuring a context.
	pub fn builder(service: Arc<dyn TreeService>) -> CassiniBuilder {
		CassiniBuilder {
			service,
			backend: None,
			notifier: None,
			config: EngineConfig::default(),
		}
	}

	/// Fetch the root of the tree.
	///
	/// Once a fetch succeeds, later calls return its node without a request. A failed fetch leaves
	/// the context uninitialized, so the next call tries again.
	pub async fn initialize(&self) -> Option<NodeRef> {
		let root = self
			.root
			.get_or_try_init(|| async {
				match self.cache.initialize().await {
					Some(node) => {
						info!(name = %node.name(), "tier tree initialized");
						Ok(node)
					}
					None => {
						debug!("tier tree root unavailable");
						Err(())
					}
				}
			})
			.await;
		root.ok().cloned()
	}

	/// Wait until the root has been fetched, fetching it if nobody has.
	pub async fn ready(&self) -> Option<NodeRef> {
		self.initialize().await
	}

	pub fn cache(&self) -> &Arc<TreeCache> {
		&self.cache
	}

	pub fn registry(&self) -> &ModelRegistry {
		&self.registry
	}

	pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
		&self.backend
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Create a browser showing `path`.
	pub fn browser(&self, path: TierPath) -> BrowserModel {
		BrowserModel::new(Arc::clone(&self.cache), path, &self.config)
	}

	/// Get the model for tier `name`; see [`ModelRegistry::get`].
	pub async fn model(&self, name: &str, force_refresh: bool) -> Result<TierModel> {
		self.registry.get(name, force_refresh).await
	}

	/// Create a child tier.
	///
	/// A cached model of the parent is refreshed so its child names include the new tier.
	pub async fn new_child(&self, info: NewChildInfo) -> Result<NodeRef> {
		let parent = info.parent.clone();
		let child = self.cache.new_child(info).await?;
		if self.registry.cached(&parent).is_some() {
			self.registry.get(&parent, true).await?;
		}
		Ok(child)
	}

	/// Ask the server to open the folder of tier `name`.
	pub async fn open_tier(&self, name: &str) -> Result<bool> {
		Ok(self.service.open(name).await?)
	}

	/// Decide how to launch `model`: notebooks open their document, folders are opened by the
	/// server.
	pub async fn launch_target(&self, model: &TierModel) -> Result<LaunchTarget> {
		match model {
			TierModel::Notebook(notebook) => Ok(LaunchTarget::Notebook(notebook.notebook_path().to_string())),
			TierModel::Folder(folder) => Ok(LaunchTarget::Folder {
				opened: self.open_tier(folder.name()).await?,
			}),
		}
	}

	/// Dispose every model.
	pub fn shutdown(&self) {
		self.registry.dispose_all();
	}
}

/// Builder for [`Cassini`].
pub struct CassiniBuilder {
	service: Arc<dyn TreeService>,
	backend: Option<Arc<dyn DocumentBackend>>,
	notifier: Option<Arc<dyn Notifier>>,
	config: EngineConfig,
}

impl CassiniBuilder {
	/// Set the document backend.
	#[must_use]
	pub fn backend(mut self, backend: Arc<dyn DocumentBackend>) -> Self {
		self.backend = Some(backend);
		self
	}

	/// Set where user-visible errors go.
	#[must_use]
	pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	/// Set the configuration.
	#[must_use]
	pub fn config(mut self, config: EngineConfig) -> Self {
		self.config = config;
		self
	}

	pub fn build(self) -> Cassini {
		let backend = self
			.backend
			.unwrap_or_else(|| Arc::new(MemoryBackend::new()));
		let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
		let cache = Arc::new(TreeCache::new(Arc::clone(&self.service), self.config.clone()));
		let registry = ModelRegistry::new(
			Arc::clone(&self.service),
			Arc::clone(&backend),
			notifier,
			self.config.clone(),
		);

		Cassini {
			service: self.service,
			backend,
			config: self.config,
			cache,
			registry,
			root: OnceCell::new(),
		}
	}
}
