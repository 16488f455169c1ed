//! Engine behavior over real backends: uniqueness, idempotency, visibility,
//! race convergence and subtree deletion.

use std::collections::HashSet;
use std::sync::Arc;

use graphfs::engine::GraphEngine;
use graphfs::events::EventDispatcher;
use graphfs::graph::{family, Edge, Vertex};
use graphfs::storage::{MemoryStorage, SharedStorage, SledStorage};

fn engine_over(storage: SharedStorage) -> Arc<GraphEngine> {
    Arc::new(GraphEngine::new(storage, Arc::new(EventDispatcher::new())))
}

fn memory_engine() -> Arc<GraphEngine> {
    engine_over(Arc::new(MemoryStorage::new()))
}

fn draft(name: &str) -> Vertex {
    Vertex {
        name: name.into(),
        kind: "test".into(),
        public: "p".into(),
        private: "s".into(),
        private_key: "k".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn generated_ids_are_pairwise_distinct() {
    let engine = memory_engine();

    let mut seen = HashSet::new();
    for _ in 0..10_500 {
        let vertex = engine.create_vertex(draft("v")).await.unwrap();
        assert!(seen.insert(vertex.id.clone()), "duplicate id {}", vertex.id);
    }
}

#[tokio::test]
async fn edge_creation_is_idempotent_and_keeps_first_data() {
    let engine = memory_engine();
    let a = engine.create_vertex(draft("a")).await.unwrap();
    let b = engine.create_vertex(draft("b")).await.unwrap();
    let c = engine.create_vertex(draft("c")).await.unwrap();

    let first = engine
        .create_edge(
            &a.id,
            "",
            &b.id,
            Edge {
                family: family::PUBLIC.into(),
                kind: "link".into(),
                name: "slot".into(),
                data: "first data".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first.to, b.id);

    // Same tuple, different target and payload.
    let second = engine
        .create_edge(
            &a.id,
            "",
            &c.id,
            Edge {
                family: family::PUBLIC.into(),
                kind: "link".into(),
                name: "slot".into(),
                data: "second data".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(second.to, b.id);
    assert_eq!(second.data, "first data");

    let edges = engine
        .get_edges(&a.id, "", family::PUBLIC, "", "")
        .await
        .unwrap();
    assert_eq!(edges.len(), 1);
}

#[tokio::test]
async fn concurrent_child_creation_converges_on_one_vertex() {
    let engine = memory_engine();
    let parent = engine.create_vertex(draft("parent")).await.unwrap();

    const RACERS: usize = 16;
    let mut handles = Vec::new();
    for i in 0..RACERS {
        let engine = engine.clone();
        let parent_id = parent.id.clone();
        handles.push(tokio::spawn(async move {
            let mut child = draft(&format!("child {}", i));
            child.id = format!("candidate-{}", i);
            let edge = Edge {
                kind: "child".into(),
                name: "shared-slot".into(),
                ..Default::default()
            };
            let (stored, _) = engine
                .create_child_vertex(&parent_id, "k", child, edge)
                .await
                .unwrap();
            (format!("candidate-{}", i), stored.id)
        }));
    }

    let mut winner_ids = HashSet::new();
    let mut fresh_creations = 0;
    for handle in handles {
        let (candidate, stored_id) = handle.await.unwrap();
        if candidate == stored_id {
            fresh_creations += 1;
        }
        winner_ids.insert(stored_id);
    }

    // Exactly one persisted child id; everyone else adopted it as an update.
    assert_eq!(winner_ids.len(), 1);
    assert_eq!(fresh_creations, 1);

    let winner = winner_ids.into_iter().next().unwrap();
    assert!(engine.confirm_vertex(&winner).await);

    let edges = engine
        .get_edges(&parent.id, "k", family::OWNERSHIP, "", "")
        .await
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, winner);

    // The losers' candidate vertices were never written.
    for i in 0..RACERS {
        let candidate = format!("candidate-{}", i);
        if candidate != winner {
            assert!(!engine.confirm_vertex(&candidate).await);
        }
    }
}

#[tokio::test]
async fn visibility_redaction_scenario() {
    let engine = memory_engine();

    let root = engine
        .create_vertex(Vertex {
            name: "root".into(),
            kind: "test".into(),
            public: "p".into(),
            private: "s".into(),
            private_key: "k".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let public = engine.get_vertex(&root.id, "").await.unwrap();
    assert_eq!(public.name, "root");
    assert_eq!(public.kind, "test");
    assert_eq!(public.public, "p");
    assert_eq!(public.private, "");
    assert_eq!(public.private_key, "");

    let full = engine.get_vertex(&root.id, "k").await.unwrap();
    assert_eq!(full.private, "s");
    assert_eq!(full.private_key, "k");

    assert!(engine.get_vertex(&root.id, "wrong").await.is_err());
}

#[tokio::test]
async fn edge_data_is_masked_without_the_key() {
    let engine = memory_engine();
    let a = engine.create_vertex(draft("a")).await.unwrap();
    let b = engine.create_vertex(draft("b")).await.unwrap();

    engine
        .create_edge(
            &a.id,
            "k",
            &b.id,
            Edge {
                family: family::PRIVATE.into(),
                kind: "secret".into(),
                name: "slot".into(),
                data: "hidden payload".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Precisely addressed, no key: all fields intact except the payload.
    let masked = engine
        .get_edges(&a.id, "", family::PRIVATE, "secret", "slot")
        .await
        .unwrap();
    assert_eq!(masked.len(), 1);
    assert_eq!(masked[0].to, b.id);
    assert_eq!(masked[0].kind, "secret");
    assert_eq!(masked[0].data, "");

    let unmasked = engine
        .get_edges(&a.id, "k", family::PRIVATE, "", "")
        .await
        .unwrap();
    assert_eq!(unmasked.len(), 1);
    assert_eq!(unmasked[0].data, "hidden payload");

    // Ambiguous non-public listing without a key is rejected outright.
    assert!(engine
        .get_edges(&a.id, "", family::PRIVATE, "", "")
        .await
        .is_err());
}

async fn run_subtree_deletion(engine: Arc<GraphEngine>) {
    let root = engine.create_vertex(draft("root")).await.unwrap();

    let (child_a, _) = engine
        .create_child_vertex(
            &root.id,
            "k",
            draft("child a"),
            Edge {
                kind: "child".into(),
                name: "a".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (_child_b, _) = engine
        .create_child_vertex(
            &root.id,
            "k",
            draft("child b"),
            Edge {
                kind: "child".into(),
                name: "b".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (grandchild, _) = engine
        .create_child_vertex(
            &child_a.id,
            "k",
            draft("grandchild"),
            Edge {
                kind: "child".into(),
                name: "a1".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    engine.delete_vertex(&root.id).await.unwrap();

    assert!(!engine.confirm_vertex(&root.id).await);
    assert!(!engine.confirm_vertex(&child_a.id).await);
    assert!(!engine.confirm_vertex(&_child_b.id).await);
    assert!(!engine.confirm_vertex(&grandchild.id).await);
}

#[tokio::test]
async fn subtree_deletion_on_memory_backend() {
    run_subtree_deletion(memory_engine()).await;
}

#[tokio::test]
async fn subtree_deletion_on_sled_backend() {
    let dir = tempfile::TempDir::new().unwrap();
    let storage = SledStorage::open(dir.path().join("graph.db")).unwrap();
    run_subtree_deletion(engine_over(Arc::new(storage))).await;
}

#[tokio::test]
async fn create_then_get_round_trips_every_field() {
    let engine = memory_engine();
    let draft = Vertex {
        name: "round trip".into(),
        kind: "test".into(),
        public: "public payload".into(),
        private: "private payload".into(),
        private_key: "round-trip-key".into(),
        ..Default::default()
    };

    let created = engine.create_vertex(draft.clone()).await.unwrap();
    let fetched = engine
        .get_vertex(&created.id, &draft.private_key)
        .await
        .unwrap();

    // Equal in every field except the engine-assigned id and timestamp.
    assert_eq!(fetched.name, draft.name);
    assert_eq!(fetched.kind, draft.kind);
    assert_eq!(fetched.public, draft.public);
    assert_eq!(fetched.private, draft.private);
    assert_eq!(fetched.private_key, draft.private_key);
    assert_eq!(fetched.id, created.id);
    assert!(fetched.last_changed > draft.last_changed);
}

#[tokio::test]
async fn update_preserves_key_and_id() {
    let engine = memory_engine();
    let created = engine.create_vertex(draft("original")).await.unwrap();

    let mut changed = created.clone();
    changed.name = "renamed".into();
    changed.private_key = "forged".into();

    let stored = engine.update_vertex(changed).await.unwrap();
    assert_eq!(stored.id, created.id);
    assert_eq!(stored.name, "renamed");
    assert_eq!(stored.private_key, "k");

    // The original key still authenticates.
    assert!(engine.confirm_vertex_key(&created.id, "k").await);
    assert!(!engine.confirm_vertex_key(&created.id, "forged").await);
}
