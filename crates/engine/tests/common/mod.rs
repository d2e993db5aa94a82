#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cassini_documents::MemoryBackend;
use cassini_engine::fixture::ProjectBundle;
use cassini_engine::{Cassini, EngineConfig, Notifier};
use cassini_remote::MemoryTreeService;
use parking_lot::Mutex;

pub const PROJECT: &str = include_str!("../fixtures/project.json");
pub const WP1_META: &str = "WorkPackages/.wps/WP1.json";
pub const WP2_HLTS: &str = "WorkPackages/.wps/WP2.hlts";

/// Notifier keeping every message for assertions.
#[derive(Default)]
pub struct RecordingNotifier(Mutex<Vec<String>>);

impl RecordingNotifier {
	pub fn messages(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}

impl Notifier for RecordingNotifier {
	fn error(&self, message: &str) {
		self.0.lock().push(message.to_string());
	}
}

pub struct Harness {
	pub service: Arc<MemoryTreeService>,
	pub backend: Arc<MemoryBackend>,
	pub notifier: Arc<RecordingNotifier>,
	pub cassini: Cassini,
}

pub fn harness() -> Harness {
	harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let bundle = ProjectBundle::from_json_str(PROJECT).unwrap();
	let service = Arc::new(bundle.service());
	let backend = Arc::new(bundle.backend());
	let notifier = Arc::new(RecordingNotifier::default());
	let cassini = Cassini::builder(service.clone())
		.backend(backend.clone())
		.notifier(notifier.clone())
		.config(config)
		.build();
	Harness {
		service,
		backend,
		notifier,
		cassini,
	}
}

/// Give spawned tasks time to run.
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(20)).await;
}
