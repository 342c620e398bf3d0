use msh_storage::{
    InMemoryMappingStore, JsonFileMappingStore, MappingPersistence, NodeIdentityRegistry,
    StorageError,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[test]
fn same_key_returns_same_node_id() {
    let registry = NodeIdentityRegistry::open(InMemoryMappingStore::new());
    let first = registry.get_or_create("plug-kitchen").expect("node id");
    let second = registry.get_or_create("plug-kitchen").expect("node id");
    assert_eq!(first, second);
    assert!(first.is_operational());
    assert_eq!(registry.len(), 1);
}

#[test]
fn distinct_keys_get_distinct_node_ids() {
    let registry = NodeIdentityRegistry::open(InMemoryMappingStore::new());
    let mut seen = HashSet::new();
    for index in 0..200 {
        let node_id = registry
            .get_or_create(&format!("device-{index}"))
            .expect("node id");
        assert!(seen.insert(node_id), "duplicate node id {node_id}");
    }
}

#[test]
fn mapping_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("device_node_mappings.json");

    let issued = {
        let registry = NodeIdentityRegistry::open(JsonFileMappingStore::new(&path));
        registry.get_or_create("plug-1").expect("node id")
    };

    let raw = std::fs::read_to_string(&path).expect("mapping file");
    let persisted: BTreeMap<String, String> = serde_json::from_str(&raw).expect("json");
    assert_eq!(persisted.get("plug-1"), Some(&issued.to_hex()));

    let reopened = NodeIdentityRegistry::open(JsonFileMappingStore::new(&path));
    assert_eq!(reopened.find("plug-1").expect("find"), Some(issued));
    assert_eq!(reopened.get_or_create("plug-1").expect("node id"), issued);
}

#[test]
fn loaded_ids_are_not_reissued() {
    let mut existing = BTreeMap::new();
    existing.insert("old-device".to_string(), "00000000DEADBEEF".to_string());
    existing.insert("broken".to_string(), "not-hex".to_string());
    let registry = NodeIdentityRegistry::open(InMemoryMappingStore::with_mappings(existing));

    assert_eq!(registry.len(), 1);
    let fresh = registry.get_or_create("new-device").expect("node id");
    assert_ne!(fresh.to_hex(), "00000000DEADBEEF");
}

#[test]
fn missing_or_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = JsonFileMappingStore::new(dir.path().join("absent.json"));
    assert!(missing.load().expect("missing file loads").is_empty());

    let corrupt_path = dir.path().join("corrupt.json");
    std::fs::write(&corrupt_path, b"{not json").expect("write");
    let corrupt = JsonFileMappingStore::new(&corrupt_path);
    assert!(matches!(corrupt.load(), Err(StorageError::Persistence(_))));
    let registry = NodeIdentityRegistry::open(JsonFileMappingStore::new(&corrupt_path));
    assert!(registry.is_empty());
}

#[test]
fn failed_persist_rolls_back() {
    let store = Arc::new(InMemoryMappingStore::new());
    store.set_fail_saves(true);
    let registry = NodeIdentityRegistry::open(SharedStore(store.clone()));

    let err = registry.get_or_create("plug-1").unwrap_err();
    assert!(matches!(err, StorageError::Persistence(_)));
    assert_eq!(registry.find("plug-1").expect("find"), None);
    assert!(registry.is_empty());

    store.set_fail_saves(false);
    let node_id = registry.get_or_create("plug-1").expect("node id");
    assert_eq!(store.snapshot().get("plug-1"), Some(&node_id.to_hex()));
}

#[test]
fn concurrent_callers_agree() {
    let registry = Arc::new(NodeIdentityRegistry::open(InMemoryMappingStore::new()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || registry.get_or_create("shared-key").expect("node id"))
        })
        .collect();
    let ids: HashSet<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn reload_and_reset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mappings.json");
    let registry = NodeIdentityRegistry::open(JsonFileMappingStore::new(&path));
    registry.get_or_create("a").expect("node id");
    registry.get_or_create("b").expect("node id");

    let listed: Vec<String> = registry
        .list()
        .expect("list")
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(listed, vec!["a".to_string(), "b".to_string()]);

    assert_eq!(registry.reload().expect("reload"), 2);

    registry.reset().expect("reset");
    assert!(registry.is_empty());
    assert_eq!(registry.reload().expect("reload"), 0);
}

#[test]
fn failed_reload_keeps_current_mappings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mappings.json");
    let registry = NodeIdentityRegistry::open(JsonFileMappingStore::new(&path));
    let issued = registry.get_or_create("plug-1").expect("node id");

    std::fs::write(&path, b"{\"plug-1\": ").expect("truncate");
    assert!(matches!(registry.reload(), Err(StorageError::Persistence(_))));
    assert_eq!(registry.find("plug-1").expect("find"), Some(issued));

    // 下一次落盘写回完整的表，原映射不会丢失。
    registry.get_or_create("plug-2").expect("node id");
    let raw = std::fs::read_to_string(&path).expect("mapping file");
    let persisted: BTreeMap<String, String> = serde_json::from_str(&raw).expect("json");
    assert_eq!(persisted.get("plug-1"), Some(&issued.to_hex()));
    assert_eq!(persisted.len(), 2);
}

#[test]
fn unreadable_store_on_reload_is_reported() {
    let store = Arc::new(InMemoryMappingStore::new());
    let registry = NodeIdentityRegistry::open(SharedStore(store.clone()));
    registry.get_or_create("plug-1").expect("node id");

    store.set_fail_loads(true);
    assert!(registry.reload().is_err());
    assert_eq!(registry.len(), 1);

    store.set_fail_loads(false);
    assert_eq!(registry.reload().expect("reload"), 1);
}

struct SharedStore(Arc<InMemoryMappingStore>);

impl MappingPersistence for SharedStore {
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        self.0.load()
    }

    fn save(&self, mappings: &BTreeMap<String, String>) -> Result<(), StorageError> {
        self.0.save(mappings)
    }
}
