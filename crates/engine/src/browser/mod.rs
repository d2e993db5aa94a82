//! View model of the tier browser.
//!
//! Tracks the path the user is looking at and resolves it through the [`TreeCache`]. Path edits
//! notify synchronously; the resolved node follows asynchronously.

mod columns;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use cassini_types::{ChildSummary, TierPath};
pub use columns::{ColumnSet, ColumnStore};
use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::event::EventStream;
use crate::tree::{NodeRef, TreeCache, TreeChanged};

/// Notification of a [`BrowserModel`].
#[derive(Debug, Clone)]
pub enum BrowserEvent {
	/// The path changed.
	Path(TierPath),
	/// A navigation finished; `node` is `None` if the path could not be fetched.
	Current {
		/// Path the navigation was started for.
		path: TierPath,
		node: Option<NodeRef>,
	},
	/// The resolved node has children to list.
	Children(NodeRef),
	/// The current node was re-fetched.
	Refresh(NodeRef),
}

struct BrowserState {
	current_path: RwLock<TierPath>,
	current: RwLock<Option<NodeRef>>,
	/// Merge count of the cache when `current` was last resolved.
	resolved_at: AtomicU64,
	columns: ColumnStore,
	events: EventStream<BrowserEvent>,
}

/// Browser view model.
///
/// Dropping the model stops its cache listener.
pub struct BrowserModel {
	cache: Arc<TreeCache>,
	state: Arc<BrowserState>,
	listener: JoinHandle<()>,
}

impl BrowserModel {
	/// Create a browser showing `path` and start resolving it.
	pub fn new(cache: Arc<TreeCache>, path: TierPath, config: &EngineConfig) -> Self {
		let state = Arc::new(BrowserState {
			current_path: RwLock::new(TierPath::root()),
			current: RwLock::new(None),
			resolved_at: AtomicU64::new(0),
			columns: ColumnStore::default(),
			events: EventStream::new(config.event_buffer),
		});
		let listener = tokio::spawn(listen(Arc::downgrade(&state), cache.subscribe()));

		let browser = Self {
			cache,
			state,
			listener,
		};
		browser.set_path(path);
		browser
	}

	/// Get the current path.
	pub fn path(&self) -> TierPath {
		self.state.current_path.read().clone()
	}

	/// Get the node of the last finished navigation.
	pub fn current(&self) -> Option<NodeRef> {
		self.state.current.read().clone()
	}

	/// Get the children of the current node, in server order.
	pub fn children(&self) -> Vec<(String, ChildSummary)> {
		self.current()
			.map(|node| {
				node.read()
					.children
					.iter()
					.map(|(id, child)| (id.clone(), child.clone()))
					.collect()
			})
			.unwrap_or_default()
	}

	/// Get the additional columns shown for the current path.
	pub fn additional_columns(&self) -> ColumnSet {
		self.state.columns.columns(&self.path())
	}

	/// Get the cache the browser resolves paths through.
	pub fn cache(&self) -> &Arc<TreeCache> {
		&self.cache
	}

	pub fn subscribe(&self) -> broadcast::Receiver<BrowserEvent> {
		self.state.events.subscribe()
	}

	/// Descend into child `id`.
	pub fn push(&self, id: impl Into<String>) {
		let id = id.into();
		self.update_path(|path| path.push(id));
	}

	/// Descend through several identifiers at once.
	pub fn push_all(&self, ids: impl IntoIterator<Item = impl Into<String>>) {
		let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
		self.update_path(|path| path.extend(ids));
	}

	/// Go up one level, returning the identifier left.
	pub fn pop(&self) -> Option<String> {
		self.update_path(TierPath::pop)
	}

	/// Keep the first `len` identifiers.
	pub fn truncate(&self, len: usize) {
		self.update_path(|path| path.truncate(len));
	}

	/// Go to the root.
	pub fn clear(&self) {
		self.update_path(TierPath::clear);
	}

	/// Replace the whole path.
	pub fn set_path(&self, path: TierPath) {
		self.update_path(|current| *current = path);
	}

	/// Re-fetch the current path.
	///
	/// Subscribers receive [`BrowserEvent::Refresh`] once the merged node arrives.
	pub async fn refresh(&self) -> Option<NodeRef> {
		let path = self.path();
		self.cache.fetch_tier_data(&path).await
	}

	fn update_path<R>(&self, f: impl FnOnce(&mut TierPath) -> R) -> R {
		let (result, path) = {
			let mut current = self.state.current_path.write();
			let result = f(&mut current);
			(result, current.clone())
		};
		self.state.events.emit(BrowserEvent::Path(path.clone()));
		self.resolve(path);
		result
	}

	fn resolve(&self, path: TierPath) {
		let cache = Arc::clone(&self.cache);
		let state = Arc::downgrade(&self.state);
		tokio::spawn(async move {
			let node = cache.get(&path, false).await;
			let Some(state) = state.upgrade() else {
				return;
			};
			trace!(path = %path, found = node.is_some(), "navigation resolved");

			state.resolved_at.store(cache.merge_count(), Ordering::Release);
			*state.current.write() = node.clone();
			state.events.emit(BrowserEvent::Current {
				path,
				node: node.clone(),
			});
			if let Some(node) = node.filter(|node| node.read().has_children()) {
				state.events.emit(BrowserEvent::Children(node));
			}
		});
	}
}

impl Drop for BrowserModel {
	fn drop(&mut self) {
		self.listener.abort();
	}
}

/// Forward cache merges of the displayed path as [`BrowserEvent::Refresh`].
async fn listen(state: Weak<BrowserState>, mut rx: broadcast::Receiver<TreeChanged>) {
	loop {
		let changed = match rx.recv().await {
			Ok(changed) => changed,
			Err(RecvError::Lagged(skipped)) => {
				debug!(skipped, "browser listener lagged behind tree changes");
				continue;
			}
			Err(RecvError::Closed) => break,
		};
		let Some(state) = state.upgrade() else {
			break;
		};

		let displayed = *state.current_path.read() == changed.path
			&& state
				.current
				.read()
				.as_ref()
				.is_some_and(|node| node.ptr_eq(&changed.node))
			&& changed.seq > state.resolved_at.load(Ordering::Acquire);
		if displayed {
			state.events.emit(BrowserEvent::Refresh(changed.node));
		}
	}
}
