use std::collections::HashMap;
use std::sync::Arc;

use cassini_types::TierPath;
use indexmap::IndexSet;
use parking_lot::RwLock;

/// Insertion-ordered set of column names, shared by every holder.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet(Arc<RwLock<IndexSet<String>>>);

impl ColumnSet {
	/// Add a column; returns `false` if it was already shown.
	pub fn insert(&self, column: impl Into<String>) -> bool {
		self.0.write().insert(column.into())
	}

	/// Remove a column, keeping the order of the rest.
	pub fn remove(&self, column: &str) -> bool {
		self.0.write().shift_remove(column)
	}

	pub fn contains(&self, column: &str) -> bool {
		self.0.read().contains(column)
	}

	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	pub fn clear(&self) {
		self.0.write().clear();
	}

	/// Get the columns in display order.
	pub fn to_vec(&self) -> Vec<String> {
		self.0.read().iter().cloned().collect()
	}

	/// Whether both handles share one set.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

#[derive(Default)]
struct ColumnNode {
	columns: ColumnSet,
	children: HashMap<String, ColumnNode>,
}

/// Additional column preferences per tier path.
#[derive(Default)]
pub struct ColumnStore {
	root: RwLock<ColumnNode>,
}

impl ColumnStore {
	/// Get the column set for `path`, creating an empty one on first use.
	pub fn columns(&self, path: &TierPath) -> ColumnSet {
		let mut root = self.root.write();
		let mut node = &mut *root;
		for id in path {
			node = node.children.entry(id.clone()).or_default();
		}
		node.columns.clone()
	}
}
