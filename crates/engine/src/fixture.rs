//! Offline projects: tree service fixture plus document contents in one JSON file.
//!
//! ```json
//! {
//!   "trees": [...],
//!   "tiers": [...],
//!   "documents": { "WorkPackages/.wps/WP1.json": { "description": "..." } }
//! }
//! ```

use std::path::Path;

use cassini_documents::MemoryBackend;
use cassini_remote::{MemoryTreeService, ProjectFixture};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// A project served from memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectBundle {
	/// Trees and tier infos answered by the service.
	#[serde(flatten)]
	pub project: ProjectFixture,
	/// JSON documents by path.
	#[serde(default)]
	pub documents: IndexMap<String, Value>,
}

impl ProjectBundle {
	/// Parse a bundle from JSON text.
	pub fn from_json_str(text: &str) -> Result<Self> {
		serde_json::from_str(text).map_err(|e| Error::Config(format!("invalid project bundle: {e}")))
	}

	/// Read and parse a bundle file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
		Self::from_json_str(&text)
	}

	/// Build a tree service answering from the bundle.
	pub fn service(&self) -> MemoryTreeService {
		MemoryTreeService::from_fixture(self.project.clone())
	}

	/// Build a document backend holding the bundle's documents.
	pub fn backend(&self) -> MemoryBackend {
		let backend = MemoryBackend::new();
		for (path, document) in &self.documents {
			backend.insert_json(path.clone(), document);
		}
		backend
	}
}
