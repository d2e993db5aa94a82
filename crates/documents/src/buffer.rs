use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::{DocumentBackend, Error, Result};

bitflags! {
	/// What a buffer operation changed.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct BufferChange: u8 {
		/// The in-memory content was replaced.
		const CONTENT = 1 << 0;
		/// The dirty flag flipped.
		const DIRTY = 1 << 1;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
	Loading,
	Ready,
	Disposed,
}

#[derive(Debug, Default)]
struct BufferState {
	content: Option<Value>,
	dirty: bool,
}

/// In-memory copy of one JSON document.
///
/// Content is `None` until [`Self::initialize`] loads it. Edits replace the whole value through
/// [`Self::from_json`] and mark the buffer dirty; [`Self::save`] and [`Self::revert`] are the only
/// operations touching the backend afterwards.
pub struct DocumentBuffer {
	path: String,
	backend: Arc<dyn DocumentBackend>,
	state: RwLock<BufferState>,
	status: watch::Sender<Status>,
}

impl std::fmt::Debug for DocumentBuffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DocumentBuffer")
			.field("path", &self.path)
			.field("status", &*self.status.borrow())
			.field("dirty", &self.state.read().dirty)
			.finish()
	}
}

impl DocumentBuffer {
	/// Create an unloaded buffer for the document at `path`.
	pub fn new(path: impl Into<String>, backend: Arc<dyn DocumentBackend>) -> Self {
		let (status, _) = watch::channel(Status::Loading);
		Self {
			path: path.into(),
			backend,
			state: RwLock::new(BufferState::default()),
			status,
		}
	}

	/// Get the document path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Load the document and mark the buffer ready.
	pub async fn initialize(&self) -> Result<BufferChange> {
		self.ensure_live()?;
		let value = self.load().await?;
		self.ensure_live()?;

		self.state.write().content = Some(value);
		self.status.send_replace(Status::Ready);
		debug!(path = %self.path, "document buffer ready");
		Ok(BufferChange::CONTENT)
	}

	/// Whether the content has been loaded.
	pub fn is_ready(&self) -> bool {
		*self.status.borrow() == Status::Ready
	}

	/// Whether [`Self::dispose`] was called.
	pub fn is_disposed(&self) -> bool {
		*self.status.borrow() == Status::Disposed
	}

	/// Wait until the content has been loaded.
	///
	/// Fails if the buffer is disposed first.
	pub async fn ready(&self) -> Result<()> {
		let mut rx = self.status.subscribe();
		let status = rx
			.wait_for(|status| *status != Status::Loading)
			.await
			.map(|status| *status)
			.unwrap_or(Status::Disposed);
		match status {
			Status::Ready => Ok(()),
			_ => Err(Error::Disposed(self.path.clone())),
		}
	}

	/// Whether the content differs from the last load or save.
	pub fn is_dirty(&self) -> bool {
		self.state.read().dirty
	}

	/// Get a copy of the content, `None` before loading.
	pub fn to_json(&self) -> Option<Value> {
		self.state.read().content.clone()
	}

	/// Replace the content and mark the buffer dirty.
	pub fn from_json(&self, value: Value) -> Result<BufferChange> {
		self.ensure_live()?;
		let mut state = self.state.write();
		state.content = Some(value);

		let mut change = BufferChange::CONTENT;
		if !state.dirty {
			state.dirty = true;
			change |= BufferChange::DIRTY;
		}
		Ok(change)
	}

	/// Write the content to the backend and clear the dirty flag.
	///
	/// An unloaded buffer has nothing to write and reports no change.
	pub async fn save(&self) -> Result<BufferChange> {
		self.ensure_live()?;
		let Some(content) = self.to_json() else {
			return Ok(BufferChange::empty());
		};
		let text = serde_json::to_string_pretty(&content).map_err(|e| Error::Parse {
			path: self.path.clone(),
			message: e.to_string(),
		})?;
		self.backend.write(&self.path, &text).await?;

		let mut state = self.state.write();
		if std::mem::take(&mut state.dirty) {
			Ok(BufferChange::DIRTY)
		} else {
			Ok(BufferChange::empty())
		}
	}

	/// Discard edits by reloading the document.
	pub async fn revert(&self) -> Result<BufferChange> {
		self.ensure_live()?;
		let value = self.load().await?;
		self.ensure_live()?;

		let mut change = BufferChange::CONTENT;
		{
			let mut state = self.state.write();
			state.content = Some(value);
			if std::mem::take(&mut state.dirty) {
				change |= BufferChange::DIRTY;
			}
		}
		self.status.send_if_modified(|status| {
			let loading = *status == Status::Loading;
			if loading {
				*status = Status::Ready;
			}
			loading
		});
		Ok(change)
	}

	/// Release the content. Idempotent.
	pub fn dispose(&self) {
		if self.status.send_replace(Status::Disposed) == Status::Disposed {
			return;
		}
		*self.state.write() = BufferState::default();
		debug!(path = %self.path, "document buffer disposed");
	}

	fn ensure_live(&self) -> Result<()> {
		if self.is_disposed() {
			return Err(Error::Disposed(self.path.clone()));
		}
		Ok(())
	}

	async fn load(&self) -> Result<Value> {
		let text = self.backend.read(&self.path).await?;
		serde_json::from_str(&text).map_err(|e| Error::Parse {
			path: self.path.clone(),
			message: e.to_string(),
		})
	}
}
