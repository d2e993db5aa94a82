//! In-memory tree service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cassini_types::time::format_started;
use cassini_types::{
	ChildClsInfo, FolderTierInfo, NewChildInfo, NotebookTierInfo, TierInfo, TierPath,
	TreeChildResponse, TreeNode, TreeResponse,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::{Error, Result, TreeService};

/// One tree response of a [`ProjectFixture`], keyed by the path it is served at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeFixture {
	pub ids: TierPath,
	pub tree: TreeResponse,
}

/// Serialized content of a [`MemoryTreeService`].
///
/// ```json
/// {
///   "trees": [{ "ids": [], "tree": { "name": "Home", "folder": "WorkPackages", "children": {} } }],
///   "tiers": [{ "tierType": "folder", "name": "Home", "ids": [] }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFixture {
	#[serde(default)]
	pub trees: Vec<TreeFixture>,
	#[serde(default)]
	pub tiers: Vec<TierInfo>,
}

impl ProjectFixture {
	/// Parse a fixture from JSON text.
	pub fn from_json_str(text: &str) -> Result<Self> {
		Ok(serde_json::from_str(text)?)
	}
}

#[derive(Default)]
struct ServiceState {
	trees: HashMap<TierPath, TreeResponse>,
	tiers: HashMap<String, TierInfo>,
	tree_calls: HashMap<TierPath, usize>,
	lookup_calls: HashMap<String, usize>,
	opened: Vec<String>,
}

impl ServiceState {
	fn path_of(&self, name: &str) -> Option<TierPath> {
		if let Some(info) = self.tiers.get(name) {
			return Some(info.path().clone());
		}
		self.trees
			.iter()
			.find(|(_, tree)| tree.name == name)
			.map(|(path, _)| path.clone())
	}
}

/// Tree service answering from an in-memory project.
///
/// Counts requests per path and per name, and can hold every response behind a gate so tests can
/// line up concurrent callers before the "server" answers.
#[derive(Default)]
pub struct MemoryTreeService {
	state: RwLock<ServiceState>,
	gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MemoryTreeService {
	/// Create an empty service.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a service serving `fixture`.
	pub fn from_fixture(fixture: ProjectFixture) -> Self {
		let service = Self::new();
		for TreeFixture { ids, tree } in fixture.trees {
			service.insert_tree(ids, tree);
		}
		for tier in fixture.tiers {
			service.insert_tier(tier);
		}
		service
	}

	/// Serve `tree` at `ids`, replacing any previous response.
	pub fn insert_tree(&self, ids: impl Into<TierPath>, tree: TreeResponse) {
		self.state.write().trees.insert(ids.into(), tree);
	}

	/// Stop serving the tree at `ids`.
	pub fn remove_tree(&self, ids: &TierPath) -> Option<TreeResponse> {
		self.state.write().trees.remove(ids)
	}

	/// Answer lookups of `info.name()` with `info`.
	pub fn insert_tier(&self, info: TierInfo) {
		self.state.write().tiers.insert(info.name().to_string(), info);
	}

	/// Number of `tree` requests received for `ids`.
	pub fn tree_calls(&self, ids: &TierPath) -> usize {
		self.state.read().tree_calls.get(ids).copied().unwrap_or(0)
	}

	/// Number of `tree` requests received in total.
	pub fn total_tree_calls(&self) -> usize {
		self.state.read().tree_calls.values().sum()
	}

	/// Number of `lookup` requests received for `name`.
	pub fn lookup_calls(&self, name: &str) -> usize {
		self.state.read().lookup_calls.get(name).copied().unwrap_or(0)
	}

	/// Names passed to `open`, in call order.
	pub fn opened(&self) -> Vec<String> {
		self.state.read().opened.clone()
	}

	/// Hold `tree` and `lookup` responses until [`Self::release`].
	///
	/// Requests are still counted on arrival.
	pub fn hold(&self) {
		let mut gate = self.gate.lock();
		if gate.is_none() {
			*gate = Some(Arc::new(Semaphore::new(0)));
		}
	}

	/// Let every held and future response through.
	pub fn release(&self) {
		if let Some(gate) = self.gate.lock().take() {
			gate.close();
		}
	}

	async fn pass_gate(&self) {
		let gate = self.gate.lock().clone();
		if let Some(gate) = gate {
			// Closed on release; the error is the wake-up.
			let _ = gate.acquire().await;
		}
	}
}

#[async_trait]
impl TreeService for MemoryTreeService {
	async fn lookup(&self, name: &str) -> Result<TierInfo> {
		*self.state.write().lookup_calls.entry(name.to_string()).or_default() += 1;
		self.pass_gate().await;

		let state = self.state.read();
		state
			.tiers
			.get(name)
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("tier {name:?}")))
	}

	async fn tree(&self, ids: &TierPath) -> Result<TreeResponse> {
		*self.state.write().tree_calls.entry(ids.clone()).or_default() += 1;
		debug!(path = %ids, "memory service tree request");
		self.pass_gate().await;

		let state = self.state.read();
		state
			.trees
			.get(ids)
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("tree at {ids}")))
	}

	async fn new_child(&self, info: &NewChildInfo) -> Result<TreeResponse> {
		let mut state = self.state.write();

		let parent_path = state
			.path_of(&info.parent)
			.ok_or_else(|| Error::NotFound(format!("parent tier {:?}", info.parent)))?;
		let parent = state
			.trees
			.get(&parent_path)
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("tree at {parent_path}")))?;
		let parent_node = TreeNode::from_response(parent.clone(), parent_path.clone())
			.map_err(|e| Error::Decode(e.to_string()))?;
		parent_node
			.validate_child_id(&info.id)
			.map_err(|e| Error::Rejected(e.to_string()))?;

		let child_path = parent_path.child(info.id.clone());
		let name = parent_node
			.child_name(&info.id)
			.unwrap_or_else(|| info.id.clone());
		let folder = format!("{}/{name}", parent.folder);
		let started = format_started(&chrono::Utc::now());

		let additional_meta = info.extra.clone();

		let (child, tier) = match &parent.child_cls_info {
			Some(ChildClsInfo::Notebook(cls)) => {
				let meta_path = format!("{}/.meta/{name}.json", parent.folder);
				let notebook_path = format!("{}/{name}.ipynb", parent.folder);
				let child = TreeResponse {
					name: name.clone(),
					folder,
					started: Some(started.clone()),
					meta_path: Some(meta_path.clone()),
					notebook_path: Some(notebook_path.clone()),
					additional_meta,
					..TreeResponse::default()
				};
				let tier = TierInfo::Notebook(NotebookTierInfo {
					name: name.clone(),
					path: child_path.clone(),
					children: Vec::new(),
					started,
					notebook_path,
					meta_path,
					hlts_path: None,
					meta_schema: cls.meta_schema.clone(),
				});
				(child, tier)
			}
			_ => {
				let child = TreeResponse {
					name: name.clone(),
					folder,
					started: Some(started),
					additional_meta,
					..TreeResponse::default()
				};
				let tier = TierInfo::Folder(FolderTierInfo {
					name: name.clone(),
					path: child_path.clone(),
					children: Vec::new(),
				});
				(child, tier)
			}
		};

		let summary = TreeChildResponse {
			name: child.name.clone(),
			info: child.info.clone(),
			outcome: child.outcome.clone(),
			started: child.started.clone(),
			hlts_path: child.hlts_path.clone(),
			meta_path: child.meta_path.clone(),
			notebook_path: child.notebook_path.clone(),
			additional_meta: child.additional_meta.clone(),
		};
		if let Some(parent) = state.trees.get_mut(&parent_path) {
			parent.children.insert(info.id.clone(), summary);
		}
		match state.tiers.get_mut(&info.parent) {
			Some(TierInfo::Folder(parent)) => parent.children.push(name.clone()),
			Some(TierInfo::Notebook(parent)) => parent.children.push(name.clone()),
			None => {}
		}
		state.trees.insert(child_path.clone(), child.clone());
		state.tiers.insert(name, tier);

		debug!(path = %child_path, "memory service created child");
		Ok(child)
	}

	async fn open(&self, name: &str) -> Result<bool> {
		let mut state = self.state.write();
		if state.path_of(name).is_none() {
			return Err(Error::NotFound(format!("tier {name:?}")));
		}
		state.opened.push(name.to_string());
		Ok(true)
	}
}
