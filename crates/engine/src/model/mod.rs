//! Live models of individual tiers.
//!
//! Folder tiers only track their children. Notebook tiers own a meta document buffer and an
//! optional highlights buffer, validate meta edits against the tier's schema, and report every
//! change on a [`ModelChange`] stream.

mod folder;
mod notebook;

use std::fmt;
use std::sync::Arc;

use cassini_documents::DocumentBackend;
use cassini_types::{NotebookTierInfo, TierInfo, TierKind, TierPath};
pub use folder::FolderTierModel;
pub use notebook::NotebookTierModel;
use tokio::sync::broadcast;

use crate::Result;
use crate::config::EngineConfig;
use crate::notify::Notifier;

/// Change notification of a tier model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChange {
	/// The meta document changed, or an edit was attempted.
	Meta,
	/// The highlights document changed.
	Highlights,
	/// The dirty flag was updated; carries the new value.
	Dirty(bool),
	/// Initial loading finished.
	Ready,
	/// The child names changed.
	Children,
}

/// New server-side state applied to an existing notebook model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierRefresh {
	/// Replacement child names.
	pub children: Option<Vec<String>>,
	/// Highlights document path, if the tier has one.
	pub hlts_path: Option<String>,
}

impl From<&NotebookTierInfo> for TierRefresh {
	fn from(info: &NotebookTierInfo) -> Self {
		Self {
			children: Some(info.children.clone()),
			hlts_path: info.hlts_path.clone(),
		}
	}
}

/// A tier model of either kind.
#[derive(Clone)]
pub enum TierModel {
	Folder(Arc<FolderTierModel>),
	Notebook(Arc<NotebookTierModel>),
}

impl TierModel {
	/// Create a model from lookup info.
	///
	/// Notebook models start loading their documents in the background.
	pub fn open(
		info: TierInfo,
		backend: Arc<dyn DocumentBackend>,
		notifier: Arc<dyn Notifier>,
		config: &EngineConfig,
	) -> Result<Self> {
		Ok(match info {
			TierInfo::Folder(info) => Self::Folder(Arc::new(FolderTierModel::new(info, config))),
			TierInfo::Notebook(info) => {
				Self::Notebook(NotebookTierModel::open(info, backend, notifier, config)?)
			}
		})
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Folder(model) => model.name(),
			Self::Notebook(model) => model.name(),
		}
	}

	pub fn path(&self) -> &TierPath {
		match self {
			Self::Folder(model) => model.path(),
			Self::Notebook(model) => model.path(),
		}
	}

	pub fn kind(&self) -> TierKind {
		match self {
			Self::Folder(_) => TierKind::Folder,
			Self::Notebook(_) => TierKind::Notebook,
		}
	}

	/// Get the child names.
	pub fn children(&self) -> Vec<String> {
		match self {
			Self::Folder(model) => model.children(),
			Self::Notebook(model) => model.children(),
		}
	}

	/// Subscribe to change notifications.
	pub fn subscribe(&self) -> broadcast::Receiver<ModelChange> {
		match self {
			Self::Folder(model) => model.subscribe(),
			Self::Notebook(model) => model.subscribe(),
		}
	}

	/// Release the model. Idempotent.
	pub fn dispose(&self) {
		match self {
			Self::Folder(model) => model.dispose(),
			Self::Notebook(model) => model.dispose(),
		}
	}

	pub fn is_disposed(&self) -> bool {
		match self {
			Self::Folder(model) => model.is_disposed(),
			Self::Notebook(model) => model.is_disposed(),
		}
	}

	/// Whether both handles refer to the same instance.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Folder(a), Self::Folder(b)) => Arc::ptr_eq(a, b),
			(Self::Notebook(a), Self::Notebook(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}

	pub fn as_notebook(&self) -> Option<&Arc<NotebookTierModel>> {
		match self {
			Self::Notebook(model) => Some(model),
			Self::Folder(_) => None,
		}
	}

	pub fn as_folder(&self) -> Option<&Arc<FolderTierModel>> {
		match self {
			Self::Folder(model) => Some(model),
			Self::Notebook(_) => None,
		}
	}
}

impl fmt::Debug for TierModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Folder(model) => f.debug_tuple("Folder").field(model).finish(),
			Self::Notebook(model) => f.debug_tuple("Notebook").field(model).finish(),
		}
	}
}

#[cfg(test)]
mod tests;
