use std::fmt;
use std::sync::Arc;

use cassini_documents::{BufferChange, DocumentBackend, DocumentBuffer};
use cassini_types::time::parse_started;
use cassini_types::{MetaMap, MetaSchema, NotebookTierInfo, TierPath};
use chrono::{DateTime, Utc};
use jsonschema::Validator;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::{ModelChange, TierRefresh};
use crate::config::EngineConfig;
use crate::event::EventStream;
use crate::notify::Notifier;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
	Loading,
	Ready,
	Disposed,
}

/// Model of a notebook tier.
///
/// Loading of the meta buffer (and the highlights buffer, when the tier has a highlights document)
/// starts on construction; [`Self::ready`] resolves once it is done. Meta edits are validated
/// against the tier's schema before they reach the buffer.
pub struct NotebookTierModel {
	name: String,
	path: TierPath,
	started: DateTime<Utc>,
	notebook_path: String,
	meta_path: String,
	hlts_path: RwLock<Option<String>>,
	children: RwLock<Vec<String>>,
	schema: MetaSchema,
	public_schema: MetaSchema,
	validator: Validator,
	meta: DocumentBuffer,
	hlts: RwLock<Option<Arc<DocumentBuffer>>>,
	backend: Arc<dyn DocumentBackend>,
	notifier: Arc<dyn Notifier>,
	events: EventStream<ModelChange>,
	lifecycle: watch::Sender<Lifecycle>,
}

impl fmt::Debug for NotebookTierModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NotebookTierModel")
			.field("name", &self.name)
			.field("path", &self.path)
			.field("lifecycle", &*self.lifecycle.borrow())
			.finish_non_exhaustive()
	}
}

impl NotebookTierModel {
	/// Create a notebook model and start loading its documents.
	///
	/// Fails if `started` is malformed or the meta schema does not compile.
	pub fn open(
		info: NotebookTierInfo,
		backend: Arc<dyn DocumentBackend>,
		notifier: Arc<dyn Notifier>,
		config: &EngineConfig,
	) -> Result<Arc<Self>> {
		let started = parse_started(&info.started)?;
		let validator = jsonschema::validator_for(info.meta_schema.as_value()).map_err(|e| Error::Schema {
			name: info.name.clone(),
			message: e.to_string(),
		})?;
		let (lifecycle, _) = watch::channel(Lifecycle::Loading);

		let model = Arc::new(Self {
			meta: DocumentBuffer::new(info.meta_path.clone(), backend.clone()),
			public_schema: info.meta_schema.public(),
			schema: info.meta_schema,
			name: info.name,
			path: info.path,
			started,
			notebook_path: info.notebook_path,
			meta_path: info.meta_path,
			hlts_path: RwLock::new(info.hlts_path),
			children: RwLock::new(info.children),
			validator,
			hlts: RwLock::new(None),
			backend,
			notifier,
			events: EventStream::new(config.event_buffer),
			lifecycle,
		});

		tokio::spawn(Arc::clone(&model).load());
		Ok(model)
	}

	async fn load(self: Arc<Self>) {
		match self.meta.initialize().await {
			Ok(change) => self.emit_buffer_change(change, ModelChange::Meta),
			Err(cassini_documents::Error::Disposed(_)) => return,
			Err(e) => warn!(name = %self.name, error = %e, "failed to load tier metadata"),
		}

		if let Some(buffer) = self.open_highlights().await {
			match buffer.initialize().await {
				Ok(change) => self.emit_buffer_change(change, ModelChange::Highlights),
				Err(e) => warn!(name = %self.name, error = %e, "failed to load tier highlights"),
			}
		}

		let became_ready = self.lifecycle.send_if_modified(|lifecycle| {
			let loading = *lifecycle == Lifecycle::Loading;
			if loading {
				*lifecycle = Lifecycle::Ready;
			}
			loading
		});
		if became_ready {
			debug!(name = %self.name, "notebook model ready");
			self.events.emit(ModelChange::Ready);
		}
	}

	/// Open a buffer for the highlights document if the tier has one on disk and none is open.
	///
	/// Nothing is installed if the highlights path changed while the document was being checked.
	async fn open_highlights(&self) -> Option<Arc<DocumentBuffer>> {
		if self.hlts.read().is_some() {
			return None;
		}
		let path = self.hlts_path.read().clone()?;
		match self.backend.exists(&path).await {
			Ok(true) => {}
			Ok(false) => return None,
			Err(e) => {
				debug!(name = %self.name, error = %e, "cannot check highlights document");
				return None;
			}
		}
		if self.is_disposed() {
			return None;
		}

		let mut slot = self.hlts.write();
		if slot.is_some() {
			return None;
		}
		if self.hlts_path.read().as_deref() != Some(path.as_str()) {
			debug!(name = %self.name, path, "highlights path changed while opening, skipping");
			return None;
		}
		let buffer = Arc::new(DocumentBuffer::new(path, self.backend.clone()));
		*slot = Some(Arc::clone(&buffer));
		Some(buffer)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn path(&self) -> &TierPath {
		&self.path
	}

	pub fn started(&self) -> DateTime<Utc> {
		self.started
	}

	pub fn notebook_path(&self) -> &str {
		&self.notebook_path
	}

	pub fn meta_path(&self) -> &str {
		&self.meta_path
	}

	pub fn hlts_path(&self) -> Option<String> {
		self.hlts_path.read().clone()
	}

	pub fn children(&self) -> Vec<String> {
		self.children.read().clone()
	}

	/// Get the full meta schema.
	pub fn schema(&self) -> &MetaSchema {
		&self.schema
	}

	/// Get the schema without core and private properties.
	pub fn public_schema(&self) -> &MetaSchema {
		&self.public_schema
	}

	/// Whether a highlights buffer is open.
	pub fn has_highlights(&self) -> bool {
		self.hlts.read().is_some()
	}

	/// Whether initial loading finished.
	pub fn is_ready(&self) -> bool {
		*self.lifecycle.borrow() == Lifecycle::Ready
	}

	pub fn is_disposed(&self) -> bool {
		*self.lifecycle.borrow() == Lifecycle::Disposed
	}

	/// Wait for initial loading to finish.
	///
	/// Fails if the model is disposed first.
	pub async fn ready(&self) -> Result<()> {
		let mut rx = self.lifecycle.subscribe();
		let lifecycle = rx
			.wait_for(|lifecycle| *lifecycle != Lifecycle::Loading)
			.await
			.map(|lifecycle| *lifecycle)
			.unwrap_or(Lifecycle::Disposed);
		match lifecycle {
			Lifecycle::Ready => Ok(()),
			_ => Err(Error::Disposed(self.name.clone())),
		}
	}

	/// Whether the meta document has unsaved edits.
	pub fn is_dirty(&self) -> bool {
		self.meta.is_dirty()
	}

	/// Get the meta document; empty until loaded.
	pub fn meta(&self) -> MetaMap {
		match self.meta.to_json() {
			Some(Value::Object(meta)) => meta,
			_ => Map::new(),
		}
	}

	/// Get the meta entries users curate themselves, without core and private fields.
	pub fn additional_meta(&self) -> MetaMap {
		self.meta()
			.into_iter()
			.filter(|(key, _)| !self.schema.is_hidden(key))
			.collect()
	}

	/// Set one meta entry after validating the resulting document.
	///
	/// Invalid values are reported through the notifier and leave the document unchanged. A
	/// [`ModelChange::Meta`] notification follows either way so views can reset their editors.
	pub fn set_meta_value(&self, key: &str, value: Value) -> bool {
		if !self.meta.is_ready() {
			self.notifier
				.error(&format!("Metadata of {} is not loaded yet; {key} was not changed", self.name));
			return false;
		}

		let mut candidate = self.meta();
		candidate.insert(key.to_string(), value.clone());
		let candidate = Value::Object(candidate);

		let rejection = self.validator.iter_errors(&candidate).next().map(|e| {
			let field = e.instance_path.to_string();
			let field = field.trim_start_matches('/');
			let field = if field.is_empty() { key.to_string() } else { field.to_string() };
			(field, e.to_string())
		});

		let accepted = match rejection {
			None => self.commit_meta(candidate),
			Some((field, message)) => {
				debug!(name = %self.name, key, field, error = %message, "rejected meta value");
				self.notifier
					.error(&format!("Invalid value for {field}: {value}. {message}"));
				false
			}
		};

		self.events.emit(ModelChange::Meta);
		accepted
	}

	/// Remove one meta entry without validation.
	pub fn remove_meta_value(&self, key: &str) {
		if self.meta.is_ready() {
			let mut meta = self.meta();
			if meta.remove(key).is_some() {
				self.commit_meta(Value::Object(meta));
			}
		}
		self.events.emit(ModelChange::Meta);
	}

	pub fn description(&self) -> Option<String> {
		self.meta_str("description")
	}

	pub fn set_description(&self, description: &str) -> bool {
		self.set_meta_value("description", Value::from(description))
	}

	pub fn conclusion(&self) -> Option<String> {
		self.meta_str("conclusion")
	}

	pub fn set_conclusion(&self, conclusion: &str) -> bool {
		self.set_meta_value("conclusion", Value::from(conclusion))
	}

	/// Get the raw highlights document.
	pub fn highlights(&self) -> Option<Value> {
		self.highlights_buffer()?.to_json()
	}

	/// Get the highlighted outputs as notebook `display_data` outputs, in document order.
	///
	/// The highlights document maps titles to lists of outputs.
	pub fn highlight_outputs(&self) -> Vec<Value> {
		let Some(Value::Object(highlights)) = self.highlights() else {
			return Vec::new();
		};
		highlights
			.into_iter()
			.filter_map(|(_, outputs)| match outputs {
				Value::Array(outputs) => Some(outputs),
				_ => None,
			})
			.flatten()
			.filter_map(|output| match output {
				Value::Object(fields) => {
					let mut flattened = Map::new();
					flattened.insert("output_type".into(), "display_data".into());
					flattened.extend(fields);
					Some(Value::Object(flattened))
				}
				_ => None,
			})
			.collect()
	}

	/// Write both documents.
	pub async fn save(&self) -> Result<()> {
		self.ensure_live()?;
		let hlts = self.highlights_buffer();
		let (meta, hlts) = tokio::join!(self.meta.save(), async {
			match &hlts {
				Some(buffer) => buffer.save().await,
				None => Ok(BufferChange::empty()),
			}
		});
		let change = meta? | hlts?;
		if change.contains(BufferChange::DIRTY) {
			self.events.emit(ModelChange::Dirty(self.is_dirty()));
		}
		Ok(())
	}

	/// Discard edits by reloading both documents.
	///
	/// A highlights document created since the model was opened is picked up here.
	pub async fn revert(&self) -> Result<()> {
		self.ensure_live()?;
		self.open_highlights().await;
		let hlts = self.highlights_buffer();

		let (meta, hlts) = tokio::join!(self.meta.revert(), async {
			match &hlts {
				Some(buffer) => buffer.revert().await,
				None => Ok(BufferChange::empty()),
			}
		});
		let (meta, hlts) = (meta?, hlts?);

		if hlts.contains(BufferChange::CONTENT) {
			self.events.emit(ModelChange::Highlights);
		}
		if meta.contains(BufferChange::CONTENT) {
			self.events.emit(ModelChange::Meta);
		}
		if (meta | hlts).contains(BufferChange::DIRTY) {
			self.events.emit(ModelChange::Dirty(self.is_dirty()));
		}
		Ok(())
	}

	/// Apply new server-side state, then reload once ready.
	pub async fn refresh(&self, refresh: TierRefresh) -> Result<()> {
		self.ensure_live()?;

		let hlts_changed = {
			let mut current = self.hlts_path.write();
			let changed = *current != refresh.hlts_path;
			if changed {
				*current = refresh.hlts_path;
			}
			changed
		};
		if hlts_changed {
			let old = self.hlts.write().take();
			if let Some(old) = old {
				old.dispose();
				self.events.emit(ModelChange::Highlights);
			}
		}

		if let Some(children) = refresh.children {
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

		self.ready().await?;
		self.revert().await
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ModelChange> {
		self.events.subscribe()
	}

	/// Release both buffers and close the notification stream. Idempotent.
	pub fn dispose(&self) {
		if self.lifecycle.send_replace(Lifecycle::Disposed) == Lifecycle::Disposed {
			return;
		}
		self.meta.dispose();
		if let Some(hlts) = self.hlts.write().take() {
			hlts.dispose();
		}
		self.events.close();
		debug!(name = %self.name, "notebook model disposed");
	}

	fn highlights_buffer(&self) -> Option<Arc<DocumentBuffer>> {
		self.hlts.read().clone()
	}

	fn meta_str(&self, key: &str) -> Option<String> {
		self.meta().get(key)?.as_str().map(str::to_owned)
	}

	fn commit_meta(&self, meta: Value) -> bool {
		match self.meta.from_json(meta) {
			Ok(change) => {
				self.emit_buffer_change(change, ModelChange::Meta);
				true
			}
			Err(e) => {
				warn!(name = %self.name, error = %e, "failed to update metadata");
				false
			}
		}
	}

	fn emit_buffer_change(&self, change: BufferChange, content: ModelChange) {
		if change.contains(BufferChange::CONTENT) {
			self.events.emit(content);
		}
		if change.contains(BufferChange::DIRTY) {
			self.events.emit(ModelChange::Dirty(self.is_dirty()));
		}
	}

	fn ensure_live(&self) -> Result<()> {
		if self.is_disposed() {
			return Err(Error::Disposed(self.name.clone()));
		}
		Ok(())
	}
}
