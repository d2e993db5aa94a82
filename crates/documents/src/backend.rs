use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use crate::{Error, Result};

/// Storage of text documents addressed by `/`-separated relative paths.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
	/// Read the whole document.
	async fn read(&self, path: &str) -> Result<String>;

	/// Replace the document, creating it if needed.
	async fn write(&self, path: &str, content: &str) -> Result<()>;

	/// Check whether a document exists.
	async fn exists(&self, path: &str) -> Result<bool>;
}

/// Documents kept in a map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
	documents: RwLock<HashMap<String, String>>,
	writes: RwLock<HashMap<String, usize>>,
}

impl MemoryBackend {
	/// Create an empty backend.
	pub fn new() -> Self {
		Self::default()
	}

	/// Store `content` at `path` without counting it as a write.
	pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
		self.documents.write().insert(path.into(), content.into());
	}

	/// Store `value` as pretty JSON at `path`.
	pub fn insert_json(&self, path: impl Into<String>, value: &serde_json::Value) {
		let content = serde_json::to_string_pretty(value).unwrap_or_default();
		self.insert(path, content);
	}

	/// Delete the document at `path`.
	pub fn remove(&self, path: &str) -> Option<String> {
		self.documents.write().remove(path)
	}

	/// Current content at `path`.
	pub fn get(&self, path: &str) -> Option<String> {
		self.documents.read().get(path).cloned()
	}

	/// Current content at `path`, parsed as JSON.
	pub fn get_json(&self, path: &str) -> Option<serde_json::Value> {
		self.get(path).and_then(|text| serde_json::from_str(&text).ok())
	}

	/// Number of writes through [`DocumentBackend::write`] to `path`.
	pub fn write_count(&self, path: &str) -> usize {
		self.writes.read().get(path).copied().unwrap_or(0)
	}
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
	async fn read(&self, path: &str) -> Result<String> {
		self.get(path).ok_or_else(|| Error::NotFound(path.to_string()))
	}

	async fn write(&self, path: &str, content: &str) -> Result<()> {
		self.documents.write().insert(path.to_string(), content.to_string());
		*self.writes.write().entry(path.to_string()).or_default() += 1;
		Ok(())
	}

	async fn exists(&self, path: &str) -> Result<bool> {
		Ok(self.documents.read().contains_key(path))
	}
}

/// Documents stored below a root directory.
#[derive(Debug, Clone)]
pub struct FsBackend {
	root: PathBuf,
}

impl FsBackend {
	/// Create a backend rooted at `root`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Get the root directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Resolve a document path below the root.
	///
	/// Absolute paths and `..` components are rejected.
	pub fn resolve(&self, path: &str) -> Result<PathBuf> {
		let relative = Path::new(path);
		let mut resolved = self.root.clone();
		for component in relative.components() {
			match component {
				Component::Normal(part) => resolved.push(part),
				Component::CurDir => {}
				_ => return Err(Error::InvalidPath(path.to_string())),
			}
		}
		if resolved == self.root {
			return Err(Error::InvalidPath(path.to_string()));
		}
		Ok(resolved)
	}
}

fn io_error(path: &str, e: io::Error) -> Error {
	if e.kind() == io::ErrorKind::NotFound {
		Error::NotFound(path.to_string())
	} else {
		Error::Io {
			path: path.to_string(),
			message: e.to_string(),
		}
	}
}

#[async_trait]
impl DocumentBackend for FsBackend {
	async fn read(&self, path: &str) -> Result<String> {
		let file = self.resolve(path)?;
		trace!(path = %file.display(), "reading document");
		tokio::fs::read_to_string(&file)
			.await
			.map_err(|e| io_error(path, e))
	}

	async fn write(&self, path: &str, content: &str) -> Result<()> {
		let file = self.resolve(path)?;
		if let Some(parent) = file.parent() {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|e| io_error(path, e))?;
		}
		trace!(path = %file.display(), bytes = content.len(), "writing document");
		tokio::fs::write(&file, content)
			.await
			.map_err(|e| io_error(path, e))
	}

	async fn exists(&self, path: &str) -> Result<bool> {
		let file = self.resolve(path)?;
		tokio::fs::try_exists(&file)
			.await
			.map_err(|e| io_error(path, e))
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[tokio::test]
	async fn test_memory_backend_counts_writes() {
		let backend = MemoryBackend::new();
		backend.insert("a.json", "{}");

		assert_eq!(backend.read("a.json").await.unwrap(), "{}");
		assert_eq!(backend.write_count("a.json"), 0);

		backend.write("a.json", "[]").await.unwrap();
		assert_eq!(backend.get("a.json").as_deref(), Some("[]"));
		assert_eq!(backend.write_count("a.json"), 1);

		assert!(matches!(backend.read("b.json").await, Err(Error::NotFound(_))));
		assert!(!backend.exists("b.json").await.unwrap());
	}

	#[tokio::test]
	async fn test_fs_backend_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FsBackend::new(dir.path());

		assert!(!backend.exists("WorkPackages/.wps/WP1.json").await.unwrap());
		backend
			.write("WorkPackages/.wps/WP1.json", "{\"a\": 1}")
			.await
			.unwrap();
		assert!(backend.exists("WorkPackages/.wps/WP1.json").await.unwrap());
		assert_eq!(
			backend.read("WorkPackages/.wps/WP1.json").await.unwrap(),
			"{\"a\": 1}"
		);
		assert!(dir.path().join("WorkPackages/.wps/WP1.json").is_file());
	}

	#[tokio::test]
	async fn test_fs_backend_missing_document() {
		let dir = tempfile::tempdir().unwrap();
		let backend = FsBackend::new(dir.path());
		assert!(matches!(backend.read("nope.json").await, Err(Error::NotFound(_))));
	}

	#[test]
	fn test_fs_backend_rejects_escaping_paths() {
		let backend = FsBackend::new("/srv/project");
		assert_eq!(
			backend.resolve("./a/b.json").unwrap(),
			PathBuf::from("/srv/project/a/b.json")
		);
		assert!(matches!(backend.resolve("../etc/passwd"), Err(Error::InvalidPath(_))));
		assert!(matches!(backend.resolve("/etc/passwd"), Err(Error::InvalidPath(_))));
		assert!(matches!(backend.resolve(""), Err(Error::InvalidPath(_))));
	}
}
