//! End-to-end: a graphfs server on a local socket, driven by the proxy
//! backend over the WebSocket RPC channel.

use std::net::SocketAddr;
use std::sync::Arc;

use graphfs::engine::GraphEngine;
use graphfs::events::EventDispatcher;
use graphfs::graph::{family, Edge, Vertex};
use graphfs::storage::{MemoryStorage, ProxyStorage};

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

/// Start a memory-backed server on an ephemeral port.
async fn start_remote() -> (SocketAddr, Arc<GraphEngine>) {
    let engine = Arc::new(GraphEngine::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(EventDispatcher::new()),
    ));

    let app = graphfs::api::router(engine.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, engine)
}

async fn connect_proxy(addr: SocketAddr) -> (ProxyStorage, tempfile::TempDir) {
    let cache_dir = tempfile::TempDir::new().unwrap();
    let proxy = ProxyStorage::connect(&format!("ws://{}/graph/rpc", addr), cache_dir.path())
        .await
        .unwrap();
    (proxy, cache_dir)
}

#[tokio::test]
async fn proxy_init_probes_the_remote() {
    let (addr, _remote) = start_remote().await;
    // A healthy remote accepts the probe.
    let _ = connect_proxy(addr).await;

    // No server at all: initialization is rejected.
    let cache_dir = tempfile::TempDir::new().unwrap();
    let result = ProxyStorage::connect("ws://127.0.0.1:1/graph/rpc", cache_dir.path()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn vertices_created_through_the_proxy_land_on_the_remote() {
    let (addr, remote) = start_remote().await;
    let (proxy, _cache_dir) = connect_proxy(addr).await;
    let local = GraphEngine::new(Arc::new(proxy), Arc::new(EventDispatcher::new()));

    let created = local.create_vertex(draft("proxied")).await.unwrap();
    assert!(!created.id.is_empty());

    // The record exists on the remote engine, under the same id.
    assert!(remote.confirm_vertex(&created.id).await);
    let remote_copy = remote.get_vertex(&created.id, "k").await.unwrap();
    assert_eq!(remote_copy.name, "proxied");

    // And reads back through the proxy, redacted as usual.
    let fetched = local.get_vertex(&created.id, "").await.unwrap();
    assert_eq!(fetched.name, "proxied");
    assert_eq!(fetched.public, "p");
    assert!(fetched.private.is_empty());
}

#[tokio::test]
async fn edges_flow_through_the_rpc_channel() {
    let (addr, remote) = start_remote().await;
    let (proxy, _cache_dir) = connect_proxy(addr).await;
    let local = GraphEngine::new(Arc::new(proxy), Arc::new(EventDispatcher::new()));

    let a = local.create_vertex(draft("a")).await.unwrap();
    let b = local.create_vertex(draft("b")).await.unwrap();

    let edge = local
        .create_edge(
            &a.id,
            "",
            &b.id,
            Edge {
                family: family::PUBLIC.into(),
                kind: "link".into(),
                name: "slot".into(),
                data: "payload".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edge.to, b.id);

    // Idempotency holds across the channel: the remote keeps the original.
    let c = local.create_vertex(draft("c")).await.unwrap();
    let duplicate = local
        .create_edge(
            &a.id,
            "",
            &c.id,
            Edge {
                family: family::PUBLIC.into(),
                kind: "link".into(),
                name: "slot".into(),
                data: "other payload".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(duplicate.to, b.id);
    assert_eq!(duplicate.data, "payload");

    let listed = local
        .get_edges(&a.id, "", family::PUBLIC, "", "")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].to, b.id);

    // Same view straight from the remote engine.
    let remote_listed = remote
        .get_edges(&a.id, "", family::PUBLIC, "", "")
        .await
        .unwrap();
    assert_eq!(remote_listed.len(), 1);
}

#[tokio::test]
async fn child_creation_adopts_across_the_channel() {
    let (addr, remote) = start_remote().await;
    let (proxy, _cache_dir) = connect_proxy(addr).await;
    let local = GraphEngine::new(Arc::new(proxy), Arc::new(EventDispatcher::new()));

    let parent = local.create_vertex(draft("parent")).await.unwrap();

    let slot = Edge {
        kind: "child".into(),
        name: "slot".into(),
        ..Default::default()
    };

    let (first, first_edge) = local
        .create_child_vertex(&parent.id, "", draft("first"), slot.clone())
        .await
        .unwrap();
    assert_eq!(first_edge.family, family::OWNERSHIP);
    assert_eq!(first_edge.to, first.id);

    // A second creation against the same slot adopts the first child.
    let (second, second_edge) = local
        .create_child_vertex(&parent.id, "", draft("second"), slot)
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second_edge.to, first.id);

    let remote_child = remote.get_vertex(&first.id, "").await.unwrap();
    assert_eq!(remote_child.name, "second");
}

#[tokio::test]
async fn unsupported_operations_fail_loudly() {
    let (addr, _remote) = start_remote().await;
    let (proxy, _cache_dir) = connect_proxy(addr).await;
    let local = GraphEngine::new(Arc::new(proxy), Arc::new(EventDispatcher::new()));

    let created = local.create_vertex(draft("v")).await.unwrap();

    assert!(local.delete_vertex(&created.id).await.is_err());
    assert!(local.update_vertex(created).await.is_err());
}
