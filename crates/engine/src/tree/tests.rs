use cassini_remote::MemoryTreeService;
use cassini_types::TreeResponse;
use pretty_assertions::assert_eq;

use super::*;
use crate::fixture::ProjectBundle;

const PROJECT: &str = include_str!("../../tests/fixtures/project.json");

fn setup(config: EngineConfig) -> (Arc<MemoryTreeService>, TreeCache) {
	let bundle = ProjectBundle::from_json_str(PROJECT).unwrap();
	let service = Arc::new(bundle.service());
	let cache = TreeCache::new(service.clone(), config);
	(service, cache)
}

fn wp1() -> TierPath {
	TierPath::from(["1"])
}

#[tokio::test]
async fn test_initialize_installs_root_only() {
	let (service, cache) = setup(EngineConfig::default());

	let root = cache.initialize().await.unwrap();
	assert_eq!(root.name(), "Home");
	assert!(root.path().is_root());
	assert_eq!(root.read().children.len(), 2);
	assert!(cache.node(&wp1()).is_none());
	assert_eq!(service.total_tree_calls(), 1);
}

#[tokio::test]
async fn test_get_caches_nodes() {
	let (service, cache) = setup(EngineConfig::default());

	let first = cache.get(&wp1(), false).await.unwrap();
	let second = cache.get(&wp1(), false).await.unwrap();
	assert!(first.ptr_eq(&second));
	assert_eq!(service.tree_calls(&wp1()), 1);

	let forced = cache.get(&wp1(), true).await.unwrap();
	assert!(forced.ptr_eq(&first));
	assert_eq!(service.tree_calls(&wp1()), 2);
}

#[tokio::test]
async fn test_refetch_overwrites_in_place() {
	let (service, cache) = setup(EngineConfig::default());
	let node = cache.get(&wp1(), false).await.unwrap();

	let mut changed: TreeResponse = service.tree(&wp1()).await.unwrap();
	changed.info = Some("rewritten".into());
	service.insert_tree(wp1(), changed);

	cache.fetch_tier_data(&wp1()).await.unwrap();
	assert_eq!(node.read().info.as_deref(), Some("rewritten"));
	assert_eq!(node.path(), wp1());
}

#[tokio::test]
async fn test_fetch_failure_resolves_to_none() {
	let (_, cache) = setup(EngineConfig::default());
	assert!(cache.get(&TierPath::from(["9"]), false).await.is_none());
	assert!(cache.node(&TierPath::from(["9"])).is_none());
}

#[tokio::test]
async fn test_malformed_timestamp_resolves_to_none() {
	let (service, cache) = setup(EngineConfig::default());
	let mut broken = service.tree(&wp1()).await.unwrap();
	broken.started = Some("not a date".into());
	service.insert_tree(wp1(), broken);

	assert!(cache.get(&wp1(), false).await.is_none());
}

#[tokio::test]
async fn test_merge_broadcasts() {
	let (_, cache) = setup(EngineConfig::default());
	let mut rx = cache.subscribe();

	let node = cache.get(&wp1(), false).await.unwrap();
	let event = rx.recv().await.unwrap();
	assert_eq!(event.path, wp1());
	assert!(event.node.ptr_eq(&node));

	cache.get(&wp1(), false).await.unwrap();
	assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_lookup_uses_name_index() {
	let (service, cache) = setup(EngineConfig::default());

	let node = cache.lookup("WP1.1").await.unwrap();
	assert_eq!(node.path(), TierPath::from(["1", "1"]));
	assert_eq!(service.lookup_calls("WP1.1"), 1);

	let again = cache.lookup("WP1.1").await.unwrap();
	assert!(again.ptr_eq(&node));
	assert_eq!(service.lookup_calls("WP1.1"), 1);

	assert!(cache.lookup("nope").await.is_none());
}

#[tokio::test]
async fn test_new_child_merges_and_refreshes_parent() {
	let (service, cache) = setup(EngineConfig::default());
	let parent = cache.get(&wp1(), false).await.unwrap();

	let child = cache
		.new_child(NewChildInfo::new("WP1", "2").description("testing"))
		.await
		.unwrap();
	assert_eq!(child.name(), "WP1.2");
	assert_eq!(child.path(), TierPath::from(["1", "2"]));
	assert!(cache.node(&TierPath::from(["1", "2"])).unwrap().ptr_eq(&child));
	assert_eq!(service.tree_calls(&wp1()), 2);
	assert!(parent.read().children.contains_key("2"));
}

#[tokio::test]
async fn test_new_child_rejects_bad_ids_locally() {
	let (service, cache) = setup(EngineConfig::default());
	cache.get(&wp1(), false).await.unwrap();

	let duplicate = cache.new_child(NewChildInfo::new("WP1", "1")).await;
	assert!(matches!(duplicate, Err(Error::Types(_))));
	assert!(service.tree(&TierPath::from(["1", "1"])).await.is_ok());

	let orphan = cache.new_child(NewChildInfo::new("Nowhere", "1")).await;
	assert!(matches!(orphan, Err(Error::Remote(cassini_remote::Error::NotFound(_)))));
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
	let (service, cache) = setup(EngineConfig::default().fetch_timeout(Duration::from_millis(20)));
	service.hold();
	assert!(cache.get(&wp1(), false).await.is_none());
	service.release();
	assert!(cache.get(&wp1(), false).await.is_some());
}
