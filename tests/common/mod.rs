//! Shared fixtures: a small blog schema over the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use steward_sdk::{
    resolve, AdminOptions, AdminState, LocalFileStorage, MemoryStore, Registry, RouterOptions,
    SchemaDescriptor,
};

pub fn registry() -> Arc<Registry> {
    let schema: SchemaDescriptor = serde_json::from_value(serde_json::json!({
        "models": [
            {
                "name": "User",
                "fields": [
                    {"name": "id", "kind": "scalar", "type": "int"},
                    {"name": "email", "kind": "scalar", "type": "text", "required": true, "unique": true},
                    {"name": "posts", "kind": "relation", "resource": "Post", "fk_column": "author_id", "multiplicity": "to_many"}
                ]
            },
            {
                "name": "Post",
                "fields": [
                    {"name": "id", "kind": "scalar", "type": "int"},
                    {"name": "title", "kind": "scalar", "type": "text", "required": true},
                    {"name": "views", "kind": "scalar", "type": "int"},
                    {"name": "published", "kind": "scalar", "type": "boolean"},
                    {"name": "author", "kind": "relation", "resource": "User", "fk_column": "author_id"},
                    {"name": "cover", "kind": "file"}
                ]
            }
        ]
    }))
    .unwrap();
    Arc::new(resolve(&schema, &AdminOptions::default()).unwrap())
}

pub fn seeded_store(registry: &Arc<Registry>) -> Arc<MemoryStore> {
    let store = MemoryStore::new(registry.clone());
    store.seed(
        "User",
        vec![
            serde_json::json!({"id": 1, "email": "alice@example.com"}),
            serde_json::json!({"id": 2, "email": "bob@example.com"}),
        ],
    );
    store.seed(
        "Post",
        vec![
            serde_json::json!({"id": 1, "title": "First", "views": 10, "published": true, "author_id": 1, "cover": null}),
            serde_json::json!({"id": 2, "title": "Second", "views": 3, "published": false, "author_id": 2, "cover": null}),
        ],
    );
    Arc::new(store)
}

pub struct Fixture {
    pub state: AdminState,
    pub store: Arc<MemoryStore>,
    // Held so the upload directory outlives the test.
    _upload_dir: tempfile::TempDir,
}

pub fn fixture() -> Fixture {
    fixture_with(RouterOptions::default())
}

pub fn fixture_with(options: RouterOptions) -> Fixture {
    let registry = registry();
    let store = seeded_store(&registry);
    let upload_dir = tempfile::tempdir().unwrap();
    let state = AdminState::new(
        registry,
        store.clone(),
        Arc::new(LocalFileStorage::new(upload_dir.path())),
        options,
    );
    Fixture {
        state,
        store,
        _upload_dir: upload_dir,
    }
}

pub fn no_params() -> HashMap<String, String> {
    HashMap::new()
}
