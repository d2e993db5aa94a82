use std::time::Duration;

use async_trait::async_trait;
use cassini_documents::MemoryBackend;
use cassini_types::FolderTierInfo;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::*;

const META: &str = "WorkPackages/.wps/WP1.json";
const HLTS: &str = "WorkPackages/.wps/WP1.hlts";
const NEW_HLTS: &str = "WorkPackages/.wps/WP1.new.hlts";

/// Backend whose `exists` checks wait until [`Self::release`].
struct GatedBackend {
	inner: Arc<MemoryBackend>,
	gate: tokio::sync::Semaphore,
}

impl GatedBackend {
	fn new(inner: Arc<MemoryBackend>) -> Self {
		Self {
			inner,
			gate: tokio::sync::Semaphore::new(0),
		}
	}

	fn release(&self) {
		self.gate.close();
	}
}

#[async_trait]
impl DocumentBackend for GatedBackend {
	async fn read(&self, path: &str) -> cassini_documents::Result<String> {
		self.inner.read(path).await
	}

	async fn write(&self, path: &str, content: &str) -> cassini_documents::Result<()> {
		self.inner.write(path, content).await
	}

	async fn exists(&self, path: &str) -> cassini_documents::Result<bool> {
		let _ = self.gate.acquire().await;
		self.inner.exists(path).await
	}
}

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<String>>);

impl Notifier for RecordingNotifier {
	fn error(&self, message: &str) {
		self.0.lock().push(message.to_string());
	}
}

fn info() -> NotebookTierInfo {
	serde_json::from_value(json!({
		"name": "WP1",
		"ids": ["1"],
		"children": ["WP1.1"],
		"started": "2023-07-29T00:00:00Z",
		"notebookPath": "WorkPackages/WP1.ipynb",
		"metaPath": META,
		"hltsPath": HLTS,
		"metaSchema": {
			"properties": {
				"description": { "type": "string", "x-cas-field": "core" },
				"cas_lib_version": { "type": "string", "x-cas-field": "private" },
				"crabs": { "type": "integer", "multipleOf": 5 }
			}
		}
	}))
	.unwrap()
}

fn backend() -> Arc<MemoryBackend> {
	let backend = Arc::new(MemoryBackend::new());
	backend.insert_json(
		META,
		&json!({ "description": "Count the crabs", "cas_lib_version": "0.1.0", "temperature": 273 }),
	);
	backend
}

async fn open(backend: Arc<MemoryBackend>) -> (Arc<NotebookTierModel>, Arc<RecordingNotifier>) {
	let notifier = Arc::new(RecordingNotifier::default());
	let model = NotebookTierModel::open(info(), backend, notifier.clone(), &EngineConfig::default()).unwrap();
	model.ready().await.unwrap();
	(model, notifier)
}

fn drain(rx: &mut broadcast::Receiver<ModelChange>) -> Vec<ModelChange> {
	let mut events = Vec::new();
	while let Ok(event) = rx.try_recv() {
		events.push(event);
	}
	events
}

#[tokio::test]
async fn test_folder_refresh_children() {
	let folder = FolderTierModel::new(
		FolderTierInfo {
			name: "Home".into(),
			path: TierPath::root(),
			children: vec!["WP1".into()],
		},
		&EngineConfig::default(),
	);
	let mut rx = folder.subscribe();

	folder.refresh_children(vec!["WP1".into()]);
	assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

	folder.refresh_children(vec!["WP1".into(), "WP2".into()]);
	assert_eq!(rx.try_recv(), Ok(ModelChange::Children));
	assert_eq!(folder.children(), vec!["WP1".to_string(), "WP2".to_string()]);

	folder.dispose();
	folder.dispose();
	assert_eq!(rx.recv().await, Err(RecvError::Closed));
}

#[tokio::test]
async fn test_notebook_loads_meta() {
	let (model, _) = open(backend()).await;

	assert!(model.is_ready());
	assert_eq!(model.description().as_deref(), Some("Count the crabs"));
	assert_eq!(model.conclusion(), None);
	assert_eq!(model.additional_meta(), json!({ "temperature": 273 }).as_object().cloned().unwrap());
	assert!(!model.has_highlights());
	assert_eq!(model.highlight_outputs(), Vec::<Value>::new());
	assert!(model.public_schema().field_tag("crabs").is_none());
	assert!(model.public_schema().properties().all(|(name, _)| name == "crabs"));
}

#[tokio::test]
async fn test_invalid_schema_fails_open() {
	let mut info = info();
	info.meta_schema = cassini_types::MetaSchema::new(json!({ "type": 12 }));
	let result = NotebookTierModel::open(
		info,
		backend(),
		Arc::new(RecordingNotifier::default()),
		&EngineConfig::default(),
	);
	assert!(matches!(result, Err(crate::Error::Schema { .. })));
}

#[tokio::test]
async fn test_set_meta_value_event_sequence() {
	let (model, notifier) = open(backend()).await;
	let mut rx = model.subscribe();

	assert!(model.set_meta_value("crabs", json!(20)));
	assert_eq!(
		drain(&mut rx),
		vec![ModelChange::Meta, ModelChange::Dirty(true), ModelChange::Meta]
	);

	assert!(!model.set_meta_value("crabs", json!(13)));
	assert_eq!(drain(&mut rx), vec![ModelChange::Meta]);
	assert_eq!(model.meta()["crabs"], json!(20));

	let notices = notifier.0.lock().clone();
	assert_eq!(notices.len(), 1);
	assert!(notices[0].contains("crabs"));
	assert!(notices[0].contains("13"));
}

#[tokio::test]
async fn test_remove_meta_value() {
	let (model, _) = open(backend()).await;
	let mut rx = model.subscribe();

	model.remove_meta_value("temperature");
	assert!(!model.meta().contains_key("temperature"));
	assert!(model.is_dirty());
	assert_eq!(
		drain(&mut rx),
		vec![ModelChange::Meta, ModelChange::Dirty(true), ModelChange::Meta]
	);
}

#[tokio::test]
async fn test_missing_meta_document_still_ready() {
	let (model, notifier) = open(Arc::new(MemoryBackend::new())).await;

	assert!(model.is_ready());
	assert!(model.meta().is_empty());
	assert!(!model.set_description("too early"));
	assert_eq!(notifier.0.lock().len(), 1);
}

#[tokio::test]
async fn test_highlight_outputs_flatten() {
	let backend = backend();
	backend.insert_json(
		HLTS,
		&json!({
			"First": [{ "data": { "text/plain": "1" }, "metadata": {} }],
			"Second": [
				{ "data": { "text/plain": "2" }, "metadata": {} },
				{ "data": { "text/plain": "3" }, "metadata": {} }
			]
		}),
	);
	let (model, _) = open(backend).await;

	assert!(model.has_highlights());
	assert_eq!(
		model.highlight_outputs(),
		vec![
			json!({ "output_type": "display_data", "data": { "text/plain": "1" }, "metadata": {} }),
			json!({ "output_type": "display_data", "data": { "text/plain": "2" }, "metadata": {} }),
			json!({ "output_type": "display_data", "data": { "text/plain": "3" }, "metadata": {} }),
		]
	);
}

#[tokio::test]
async fn test_dispose_closes_stream() {
	let (model, _) = open(backend()).await;
	let mut rx = model.subscribe();

	model.dispose();
	model.dispose();
	assert!(model.is_disposed());
	assert_eq!(rx.recv().await, Err(RecvError::Closed));
	assert!(matches!(model.save().await, Err(crate::Error::Disposed(_))));
	assert!(matches!(model.ready().await, Err(crate::Error::Disposed(_))));
}

#[tokio::test]
async fn test_dispose_before_load() {
	let model = NotebookTierModel::open(
		info(),
		backend(),
		Arc::new(RecordingNotifier::default()),
		&EngineConfig::default(),
	)
	.unwrap();
	model.dispose();
	assert!(matches!(model.ready().await, Err(crate::Error::Disposed(_))));
	assert!(model.meta().is_empty());
}

#[tokio::test]
async fn test_refresh_during_load_serves_new_highlights() {
	let inner = backend();
	inner.insert_json(HLTS, &json!({ "Old": [] }));
	inner.insert_json(NEW_HLTS, &json!({ "New": [] }));
	let backend = Arc::new(GatedBackend::new(inner));
	let model = NotebookTierModel::open(
		info(),
		backend.clone(),
		Arc::new(RecordingNotifier::default()),
		&EngineConfig::default(),
	)
	.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert!(!model.is_ready());

	let refresh = TierRefresh {
		children: None,
		hlts_path: Some(NEW_HLTS.into()),
	};
	let (result, ()) = tokio::join!(model.refresh(refresh), async {
		tokio::time::sleep(Duration::from_millis(20)).await;
		backend.release();
	});
	result.unwrap();

	assert_eq!(model.hlts_path().as_deref(), Some(NEW_HLTS));
	assert_eq!(model.highlights(), Some(json!({ "New": [] })));
}

#[tokio::test]
async fn test_rejection_names_first_failing_field() {
	let backend = backend();
	backend.insert_json(META, &json!({ "description": "Count the crabs", "crabs": 7 }));
	let (model, notifier) = open(backend).await;

	assert!(!model.set_meta_value("fishes", json!(3)));
	assert!(model.meta().get("fishes").is_none());

	let notices = notifier.0.lock().clone();
	assert_eq!(notices.len(), 1);
	assert!(notices[0].starts_with("Invalid value for crabs: 3. "), "{}", notices[0]);
	assert!(!notices[0].contains("; "));
}
