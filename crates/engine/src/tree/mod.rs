//! Lazily expanded cache of the remote tier tree.
//!
//! The cache maps identifier paths to [`NodeRef`]s. A fetched node always carries the complete
//! list of its immediate children as shallow summaries; a child is promoted to a node of its own
//! only when its path is fetched. Re-fetching a path overwrites the cached node in place, so every
//! holder of the [`NodeRef`] observes the update.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cassini_remote::TreeService;
use cassini_types::{NewChildInfo, TierPath, TreeNode};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::event::EventStream;
use crate::singleflight::Singleflight;
use crate::{Error, Result};

/// Shared handle to a cached tree node.
///
/// Clones point at the same node; a later fetch of the same path updates it for all of them.
#[derive(Clone)]
pub struct NodeRef(Arc<RwLock<TreeNode>>);

impl NodeRef {
	fn new(node: TreeNode) -> Self {
		Self(Arc::new(RwLock::new(node)))
	}

	/// Lock the node for reading.
	pub fn read(&self) -> RwLockReadGuard<'_, TreeNode> {
		self.0.read()
	}

	/// Get a copy of the node as it is now.
	pub fn snapshot(&self) -> TreeNode {
		self.0.read().clone()
	}

	/// Whether both handles point at the same cached node.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	/// Get the tier name.
	pub fn name(&self) -> String {
		self.0.read().name.clone()
	}

	/// Get the path the node is cached at.
	pub fn path(&self) -> TierPath {
		self.0.read().path.clone()
	}

	/// Mutate the cached node in place.
	///
	/// Edits are local; the next fetch of the path overwrites them.
	pub fn update(&self, f: impl FnOnce(&mut TreeNode)) {
		f(&mut self.0.write());
	}

	fn replace(&self, node: TreeNode) -> TreeNode {
		std::mem::replace(&mut *self.0.write(), node)
	}
}

impl fmt::Debug for NodeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let node = self.0.read();
		f.debug_struct("NodeRef")
			.field("name", &node.name)
			.field("path", &node.path)
			.finish()
	}
}

/// Broadcast after every successful merge into the cache.
#[derive(Debug, Clone)]
pub struct TreeChanged {
	/// Path the node was fetched at.
	pub path: TierPath,
	/// The merged node.
	pub node: NodeRef,
	/// Position of this merge in the cache's merge sequence, starting at 1.
	pub seq: u64,
}

#[derive(Default)]
struct Branch {
	node: Option<NodeRef>,
	children: HashMap<String, Branch>,
}

#[derive(Default)]
struct CacheState {
	root: Branch,
	names: HashMap<String, NodeRef>,
}

impl CacheState {
	fn branch(&self, path: &TierPath) -> Option<&Branch> {
		path.iter().try_fold(&self.root, |branch, id| branch.children.get(id))
	}
}

/// Tier tree cache.
pub struct TreeCache {
	service: Arc<dyn TreeService>,
	config: EngineConfig,
	state: RwLock<CacheState>,
	events: EventStream<TreeChanged>,
	flights: Singleflight<TierPath, Option<NodeRef>>,
	merges: AtomicU64,
}

impl TreeCache {
	/// Create an empty cache over `service`.
	pub fn new(service: Arc<dyn TreeService>, config: EngineConfig) -> Self {
		Self {
			events: EventStream::new(config.event_buffer),
			service,
			config,
			state: RwLock::new(CacheState::default()),
			flights: Singleflight::default(),
			merges: AtomicU64::new(0),
		}
	}

	/// Get the remote service the cache fetches from.
	pub fn service(&self) -> &Arc<dyn TreeService> {
		&self.service
	}

	/// Fetch the root and install it.
	pub async fn initialize(&self) -> Option<NodeRef> {
		self.fetch_tier_data(&TierPath::root()).await
	}

	/// Get the node at `path`, fetching it on a miss or when `force_refresh` is set.
	///
	/// Returns `None` if the fetch fails.
	pub async fn get(&self, path: &TierPath, force_refresh: bool) -> Option<NodeRef> {
		if !force_refresh && let Some(node) = self.node(path) {
			return Some(node);
		}
		self.fetch_tier_data(path).await
	}

	/// Fetch `path` from the service and merge the result, ignoring anything cached.
	///
	/// Concurrent calls for one path share a single request unless coalescing is disabled.
	pub async fn fetch_tier_data(&self, path: &TierPath) -> Option<NodeRef> {
		if self.config.coalesce_fetches {
			self.flights
				.run(path.clone(), self.fetch_and_merge(path))
				.await
				.flatten()
		} else {
			self.fetch_and_merge(path).await
		}
	}

	/// Find a node by tier name.
	///
	/// Names seen in earlier fetches resolve without a request; other names are looked up on
	/// the service and their path fetched.
	pub async fn lookup(&self, name: &str) -> Option<NodeRef> {
		if let Some(node) = self.state.read().names.get(name) {
			return Some(node.clone());
		}

		let info = match with_timeout(self.config.timeout(), name, self.service.lookup(name)).await {
			Ok(info) => info,
			Err(e) => {
				debug!(name, error = %e, "tier lookup failed");
				return None;
			}
		};
		self.get(info.path(), false).await
	}

	/// Peek at the cached node at `path` without fetching.
	pub fn node(&self, path: &TierPath) -> Option<NodeRef> {
		self.state.read().branch(path)?.node.clone()
	}

	/// Create a child tier and merge it.
	///
	/// The parent is re-fetched afterwards so its child summaries include the new entry.
	pub async fn new_child(&self, info: NewChildInfo) -> Result<NodeRef> {
		let parent = self
			.lookup(&info.parent)
			.await
			.ok_or_else(|| cassini_remote::Error::NotFound(format!("parent tier {:?}", info.parent)))?;
		let parent_path = {
			let parent = parent.read();
			parent.validate_child_id(&info.id)?;
			parent.path.clone()
		};

		let response = self.service.new_child(&info).await?;
		let path = parent_path.child(info.id.clone());
		let node = TreeNode::from_response(response, path.clone())?;
		let child = self.merge(&path, node);
		debug!(path = %path, name = %child.name(), "created child tier");

		if self.fetch_tier_data(&parent_path).await.is_none() {
			warn!(path = %parent_path, "failed to refresh parent after creating child");
		}
		Ok(child)
	}

	/// Subscribe to merges.
	pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TreeChanged> {
		self.events.subscribe()
	}

	/// Number of merges so far; the `seq` of the latest [`TreeChanged`].
	pub fn merge_count(&self) -> u64 {
		self.merges.load(Ordering::Acquire)
	}

	async fn fetch_and_merge(&self, path: &TierPath) -> Option<NodeRef> {
		debug!(path = %path, "fetching tier data");
		let response = match with_timeout(self.config.timeout(), path, self.service.tree(path)).await {
			Ok(response) => response,
			Err(e) => {
				debug!(path = %path, error = %e, "tier data fetch failed");
				return None;
			}
		};
		match TreeNode::from_response(response, path.clone()) {
			Ok(node) => Some(self.merge(path, node)),
			Err(e) => {
				warn!(path = %path, error = %e, "discarding malformed tier data");
				None
			}
		}
	}

	fn merge(&self, path: &TierPath, node: TreeNode) -> NodeRef {
		let name = node.name.clone();
		let (merged, seq) = {
			let mut guard = self.state.write();
			let state = &mut *guard;

			let mut branch = &mut state.root;
			for id in path {
				branch = branch.children.entry(id.clone()).or_default();
			}

			let merged = match &branch.node {
				Some(existing) => {
					let previous = existing.replace(node);
					if previous.name != name
						&& state
							.names
							.get(&previous.name)
							.is_some_and(|indexed| indexed.ptr_eq(existing))
					{
						state.names.remove(&previous.name);
					}
					existing.clone()
				}
				None => {
					let created = NodeRef::new(node);
					branch.node = Some(created.clone());
					created
				}
			};
			state.names.insert(name, merged.clone());
			(merged, self.merges.fetch_add(1, Ordering::AcqRel) + 1)
		};

		self.events.emit(TreeChanged {
			path: path.clone(),
			node: merged.clone(),
			seq,
		});
		merged
	}
}

/// Await a service call, bounded by `limit` when set.
pub(crate) async fn with_timeout<T>(
	limit: Option<Duration>,
	target: impl fmt::Display,
	request: impl Future<Output = cassini_remote::Result<T>>,
) -> Result<T> {
	match limit {
		Some(limit) => tokio::time::timeout(limit, request)
			.await
			.map_err(|_| Error::Timeout(target.to_string()))?
			.map_err(Error::from),
		None => request.await.map_err(Error::from),
	}
}

#[cfg(test)]
mod tests;
