//! Storage contract and backend selection
//!
//! [`Storage`] is the contract every persistence backend satisfies: primitive
//! CRUD on vertices and edges, no validation or access-control logic. The one
//! piece of business logic pushed down here is uniqueness enforcement on edge
//! creation, because a conditional insert is cheapest at the storage layer —
//! it is what lets concurrent callers converge without a distributed lock.
//!
//! The concrete backend is selected once at startup by [`create_storage`] and
//! injected into the engine by construction; it is never swapped at runtime.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::{StorageConfig, StorageType};
use crate::core::error::{Error, Result};
use crate::graph::{family, Edge, Vertex};

pub mod memory;
pub mod proxy;
pub mod sled_store;

#[cfg(feature = "cassandra")]
pub mod cassandra;

pub use memory::MemoryStorage;
pub use proxy::ProxyStorage;
pub use sled_store::SledStorage;

#[cfg(feature = "cassandra")]
pub use cassandra::CassandraStorage;

/// Shared handle to the active backend
pub type SharedStorage = Arc<dyn Storage>;

/// The contract every backend implements.
///
/// Backends differ only in how they encode the uniqueness key
/// (`from`, `family`, `kind`, `name`) and vertex records at the byte/row
/// level; observable behavior is identical.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Release the backend connection. Errors on close are ignored.
    async fn close(&self);

    /// Wipe all data and recreate the schema.
    async fn drop_data(&self) -> Result<()>;

    /// Fetch a vertex by id. `want_private` controls whether the private
    /// payload and key are filled in; fails with `NotFound` if absent.
    async fn get_vertex(&self, id: &str, want_private: bool) -> Result<Vertex>;

    /// Insert a vertex at its already-assigned id, overwriting if present.
    /// Callers of the contract are responsible for id uniqueness.
    async fn create_vertex(&self, vertex: &Vertex) -> Result<()>;

    /// Full-record replace of all mutable fields. The stored `private_key`
    /// is preserved, never overwritten. Returns the record as stored.
    async fn update_vertex(&self, vertex: Vertex) -> Result<Vertex>;

    /// All edges under `from` in a single `family`. Empty `kind`/`name`
    /// mean "match any".
    async fn get_edges(&self, from: &str, family: &str, kind: &str, name: &str)
        -> Result<Vec<Edge>>;

    /// Insert-if-absent keyed by (`from`, `family`, `kind`, `name`). If an
    /// edge with that tuple already exists it is returned unmutated instead
    /// of being overwritten; the caller must treat the returned edge as the
    /// canonical one for that key.
    async fn create_edge(&self, edge: Edge) -> Result<Edge>;

    /// Delete a single vertex record and its outgoing edges. Edges pointing
    /// at it from elsewhere are not cleaned up.
    async fn delete_vertex(&self, id: &str) -> Result<()>;

    /// Convenience composition used for ownership traversal: resolve the
    /// edge, then fetch the vertex it points to.
    async fn get_child_vertex(&self, from: &str, family: &str, kind: &str, name: &str)
        -> Result<Vertex> {
        let edges = self.get_edges(from, family, kind, name).await?;
        let edge = edges
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("edge {}:{}:{}:{}", from, family, kind, name)))?;
        self.get_vertex(&edge.to, true).await
    }

    /// Create a child vertex behind an idempotent ownership-edge insert.
    ///
    /// `edge.to` must already carry the child's candidate id. If the edge
    /// insert finds a pre-existing edge for the tuple, the candidate id is
    /// discarded, the existing target is adopted and the call becomes an
    /// update of the vertex at that id. The two steps are independent backend
    /// writes; a crash between them can leave an edge without its vertex.
    async fn create_child_vertex(&self, child: Vertex, edge: Edge) -> Result<(Vertex, Edge)> {
        let canonical = self.create_edge(edge).await?;

        if canonical.to != child.id {
            // Lost the edge race: adopt the winner's target and update it.
            let mut adopted = child;
            adopted.id = canonical.to.clone();
            let stored = self.update_vertex(adopted).await?;
            Ok((stored, canonical))
        } else {
            self.create_vertex(&child).await?;
            Ok((child, canonical))
        }
    }

    /// Breadth-first deletion of the subtrees rooted at `roots`, following
    /// outgoing ownership edges. A closure computation, not a transaction:
    /// a failure partway leaves the remainder in place.
    async fn delete_vertex_tree(&self, roots: Vec<String>) -> Result<()> {
        let mut pending = roots;
        let mut collected: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            for edge in self.get_edges(&id, family::OWNERSHIP, "", "").await? {
                pending.push(edge.to);
            }
            collected.push(id);
        }

        for id in collected {
            self.delete_vertex(&id).await?;
        }

        Ok(())
    }
}

/// Create the storage backend selected by configuration.
pub async fn create_storage(config: &StorageConfig) -> Result<SharedStorage> {
    match config.storage_type {
        StorageType::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageType::Sled => {
            let path = if config.uri.is_empty() {
                "./data/graph.db"
            } else {
                config.uri.as_str()
            };
            Ok(Arc::new(SledStorage::open(path)?))
        }
        StorageType::Cassandra => create_cassandra(config).await,
        StorageType::Proxy => Ok(Arc::new(
            ProxyStorage::connect(&config.uri, &config.cache_dir).await?,
        )),
    }
}

#[cfg(feature = "cassandra")]
async fn create_cassandra(config: &StorageConfig) -> Result<SharedStorage> {
    Ok(Arc::new(CassandraStorage::connect(&config.uri).await?))
}

#[cfg(not(feature = "cassandra"))]
async fn create_cassandra(_config: &StorageConfig) -> Result<SharedStorage> {
    Err(Error::config(
        "graphfs was built without the cassandra feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StorageConfig;

    #[tokio::test]
    async fn memory_storage_creation() {
        let config = StorageConfig::default();
        let storage = create_storage(&config).await.unwrap();
        assert!(storage.get_vertex("missing", false).await.is_err());
    }

    #[tokio::test]
    async fn sled_storage_creation() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            storage_type: StorageType::Sled,
            uri: dir.path().join("graph.db").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let storage = create_storage(&config).await.unwrap();
        assert!(storage.get_vertex("missing", false).await.is_err());
    }
}
