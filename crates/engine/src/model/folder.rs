use std::sync::atomic::{AtomicBool, Ordering};

use cassini_types::{FolderTierInfo, TierPath};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use super::ModelChange;
use crate::config::EngineConfig;
use crate::event::EventStream;

/// Model of a folder tier.
#[derive(Debug)]
pub struct FolderTierModel {
	name: String,
	path: TierPath,
	children: RwLock<Vec<String>>,
	events: EventStream<ModelChange>,
	disposed: AtomicBool,
}

impl FolderTierModel {
	/// Create a folder model from lookup info.
	pub fn new(info: FolderTierInfo, config: &EngineConfig) -> Self {
		Self {
			name: info.name,
			path: info.path,
			children: RwLock::new(info.children),
			events: EventStream::new(config.event_buffer),
			disposed: AtomicBool::new(false),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn path(&self) -> &TierPath {
		&self.path
	}

	pub fn children(&self) -> Vec<String> {
		self.children.read().clone()
	}

	/// Replace the child names, notifying if they changed.
	pub fn refresh_children(&self, children: Vec<String>) {
		let changed = {
			let mut current = self.children.write();
			let changed = *current != children;
			*current = children;
			changed
		};
		if changed {
			self.events.emit(ModelChange::Children);
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ModelChange> {
		self.events.subscribe()
	}

	/// Release the model. Idempotent.
	pub fn dispose(&self) {
		if self.disposed.swap(true, Ordering::AcqRel) {
			return;
		}
		self.events.close();
		debug!(name = %self.name, "folder model disposed");
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}
}
