//! Volatile in-memory backend
//!
//! Vertex id → record in a hash table guarded by one exclusive lock; edges
//! live as a per-vertex ordered list scanned linearly. Nothing is persisted
//! and the data is scoped to a single process — this is the development and
//! test backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::{Error, Result};
use crate::graph::{Edge, Vertex};
use crate::storage::Storage;

struct Node {
    vertex: Vertex,
    edges: Vec<Edge>,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    nodes: Mutex<HashMap<String, Node>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn close(&self) {}

    async fn drop_data(&self) -> Result<()> {
        self.nodes.lock().clear();
        Ok(())
    }

    async fn get_vertex(&self, id: &str, want_private: bool) -> Result<Vertex> {
        let nodes = self.nodes.lock();
        let node = nodes
            .get(id)
            .ok_or_else(|| Error::not_found(format!("vertex {}", id)))?;

        let mut vertex = node.vertex.clone();
        if !want_private {
            vertex.redact();
        }
        Ok(vertex)
    }

    async fn create_vertex(&self, vertex: &Vertex) -> Result<()> {
        let mut nodes = self.nodes.lock();
        match nodes.get_mut(&vertex.id) {
            Some(node) => node.vertex = vertex.clone(),
            None => {
                nodes.insert(
                    vertex.id.clone(),
                    Node {
                        vertex: vertex.clone(),
                        edges: Vec::new(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn update_vertex(&self, mut vertex: Vertex) -> Result<Vertex> {
        let mut nodes = self.nodes.lock();
        let node = nodes
            .get_mut(&vertex.id)
            .ok_or_else(|| Error::not_found(format!("vertex {}", vertex.id)))?;

        // The stored key wins, whatever the caller supplied.
        vertex.private_key = node.vertex.private_key.clone();
        node.vertex = vertex.clone();
        Ok(vertex)
    }

    async fn get_edges(&self, from: &str, family: &str, kind: &str, name: &str)
        -> Result<Vec<Edge>> {
        let nodes = self.nodes.lock();
        let node = nodes
            .get(from)
            .ok_or_else(|| Error::not_found(format!("vertex {}", from)))?;

        Ok(node
            .edges
            .iter()
            .filter(|e| e.matches(family, kind, name))
            .cloned()
            .collect())
    }

    async fn create_edge(&self, edge: Edge) -> Result<Edge> {
        // Check-then-insert under the same lock acquisition, so concurrent
        // callers racing on the same tuple see exactly one winner.
        let mut nodes = self.nodes.lock();
        let node = nodes
            .get_mut(&edge.from)
            .ok_or_else(|| Error::not_found(format!("vertex {}", edge.from)))?;

        if let Some(existing) = node
            .edges
            .iter()
            .find(|e| e.family == edge.family && e.kind == edge.kind && e.name == edge.name)
        {
            return Ok(existing.clone());
        }

        node.edges.push(edge.clone());
        Ok(edge)
    }

    async fn delete_vertex(&self, id: &str) -> Result<()> {
        self.nodes.lock().remove(id);
        Ok(())
    }
}
