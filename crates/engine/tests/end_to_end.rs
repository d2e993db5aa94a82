mod common;

use std::sync::Arc;
use std::time::Duration;

use cassini_documents::FsBackend;
use cassini_engine::fixture::ProjectBundle;
use cassini_engine::{BrowserEvent, Cassini, EngineConfig, ModelChange};
use cassini_types::{NewChildInfo, TierPath};
use common::{PROJECT, WP1_META, harness, settle};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn next(rx: &mut tokio::sync::broadcast::Receiver<BrowserEvent>) -> BrowserEvent {
	tokio::time::timeout(Duration::from_secs(1), rx.recv())
		.await
		.expect("timed out waiting for browser event")
		.unwrap()
}

#[tokio::test]
async fn test_browse_into_work_package() {
	let h = harness();
	let browser = h.cassini.browser(TierPath::root());
	settle().await;
	assert_eq!(browser.current().unwrap().name(), "Home");

	let names: Vec<String> = browser.children().into_iter().map(|(_, child)| child.name).collect();
	assert_eq!(names, vec!["WP1".to_string(), "WP2".to_string()]);

	browser.push("1");
	settle().await;
	let current = browser.current().unwrap();
	assert_eq!(current.name(), "WP1");
	assert!(h.cassini.cache().node(&TierPath::from(["1"])).unwrap().ptr_eq(&current));

	let wp11 = &browser.children()[0].1;
	assert_eq!(wp11.name, "WP1.1");
	assert_eq!(wp11.outcome.as_deref(), Some("Crabs outnumber fishes"));
}

#[tokio::test]
async fn test_new_child_refreshes_parent() {
	let h = harness();
	let browser = h.cassini.browser(TierPath::from(["1"]));
	settle().await;
	let parent = browser.current().unwrap();

	let model = h.cassini.model("WP1", false).await.unwrap();
	let notebook = model.as_notebook().unwrap().clone();
	notebook.ready().await.unwrap();
	let mut model_rx = notebook.subscribe();
	let mut browser_rx = browser.subscribe();

	let child = h
		.cassini
		.new_child(NewChildInfo::new("WP1", "2").description("Count the crabs again"))
		.await
		.unwrap();

	assert_eq!(child.name(), "WP1.2");
	assert_eq!(child.path(), TierPath::from(["1", "2"]));
	assert!(parent.read().children.contains_key("2"));
	match next(&mut browser_rx).await {
		BrowserEvent::Refresh(node) => assert!(node.ptr_eq(&parent)),
		other => panic!("expected Refresh, got {other:?}"),
	}

	assert_eq!(notebook.children(), vec!["WP1.1".to_string(), "WP1.2".to_string()]);
	assert_eq!(model_rx.recv().await.unwrap(), ModelChange::Children);
	assert_eq!(h.service.lookup_calls("WP1"), 2);
}

#[tokio::test]
async fn test_duplicate_child_is_rejected() {
	let h = harness();

	let err = h.cassini.new_child(NewChildInfo::new("WP1", "1")).await.unwrap_err();
	assert!(matches!(err, cassini_engine::Error::Types(_)), "{err:?}");
	assert!(h.cassini.cache().node(&TierPath::from(["1", "1"])).is_none());
}

#[tokio::test]
async fn test_documents_on_disk() {
	let dir = tempfile::tempdir().unwrap();
	let meta = dir.path().join(WP1_META);
	std::fs::create_dir_all(meta.parent().unwrap()).unwrap();
	std::fs::write(
		&meta,
		serde_json::to_string_pretty(&json!({
			"description": "Count the crabs",
			"conclusion": "",
			"started": "01/22/2023"
		}))
		.unwrap(),
	)
	.unwrap();

	let bundle = ProjectBundle::from_json_str(PROJECT).unwrap();
	let cassini = Cassini::builder(Arc::new(bundle.service()))
		.backend(Arc::new(FsBackend::new(dir.path())))
		.build();

	let model = cassini.model("WP1", false).await.unwrap();
	let notebook = model.as_notebook().unwrap();
	notebook.ready().await.unwrap();
	assert!(!notebook.has_highlights());

	assert!(notebook.set_meta_value("crabs", json!(25)));
	notebook.save().await.unwrap();

	let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&meta).unwrap()).unwrap();
	assert_eq!(saved["crabs"], json!(25));
	assert_eq!(saved["description"], json!("Count the crabs"));
}

#[tokio::test]
async fn test_config_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("cassini.toml");
	std::fs::write(&path, "event_buffer = 16\ncoalesce_fetches = false\n").unwrap();

	let config = EngineConfig::load(&path).unwrap();
	assert_eq!(config.event_buffer, 16);
	assert!(!config.coalesce_fetches);
	assert_eq!(config.timeout(), None);

	std::fs::write(&path, "event_buffer = 0\n").unwrap();
	assert!(matches!(EngineConfig::load(&path), Err(cassini_engine::Error::Config(_))));
}
