//! Embedded ordered key-value backend over sled
//!
//! Two trees: `vertices` (key = vertex id, value = bincode record) and
//! `edges`. The edge key is the concatenation
//! `from:family:kind:name`, so lexicographic ordering groups every edge of a
//! vertex+family contiguously and one cursor-based prefix scan serves all
//! three lookup shapes — whole family, family+kind, and the exact tuple.
//! Multi-record mutations run inside a single sled transaction per call.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;

use crate::core::error::{Error, Result};
use crate::graph::{Edge, Vertex};
use crate::storage::Storage;

const TREE_VERTICES: &str = "vertices";
const TREE_EDGES: &str = "edges";

/// Embedded KV storage backend.
pub struct SledStorage {
    db: sled::Db,
    vertices: sled::Tree,
    edges: sled::Tree,
}

impl SledStorage {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let vertices = db.open_tree(TREE_VERTICES)?;
        let edges = db.open_tree(TREE_EDGES)?;
        Ok(Self {
            db,
            vertices,
            edges,
        })
    }
}

/// Full edge key for the uniqueness tuple.
fn edge_key(from: &str, family: &str, kind: &str, name: &str) -> String {
    format!("{}:{}:{}:{}", from, family, kind, name)
}

/// Scan prefix for a partially-specified tuple. The trailing separator keeps
/// `family` from matching `family2`.
fn edge_prefix(from: &str, family: &str, kind: &str) -> String {
    if kind.is_empty() {
        format!("{}:{}:", from, family)
    } else {
        format!("{}:{}:{}:", from, family, kind)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(raw)?)
}

fn tx_err(err: TransactionError<Error>) -> Error {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn close(&self) {
        let _ = self.db.flush();
    }

    async fn drop_data(&self) -> Result<()> {
        self.vertices.clear()?;
        self.edges.clear()?;
        Ok(())
    }

    async fn get_vertex(&self, id: &str, want_private: bool) -> Result<Vertex> {
        let raw = self
            .vertices
            .get(id.as_bytes())?
            .ok_or_else(|| Error::not_found(format!("vertex {}", id)))?;

        let mut vertex: Vertex = decode(&raw)?;
        if !want_private {
            vertex.redact();
        }
        Ok(vertex)
    }

    async fn create_vertex(&self, vertex: &Vertex) -> Result<()> {
        let encoded = encode(vertex)?;
        self.vertices.insert(vertex.id.as_bytes(), encoded)?;
        Ok(())
    }

    async fn update_vertex(&self, vertex: Vertex) -> Result<Vertex> {
        let stored = self
            .vertices
            .transaction(|tx| {
                let raw = tx.get(vertex.id.as_bytes())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(Error::not_found(format!(
                        "vertex {}",
                        vertex.id
                    )))
                })?;
                let old: Vertex =
                    decode(&raw).map_err(ConflictableTransactionError::Abort)?;

                let mut merged = vertex.clone();
                merged.private_key = old.private_key;

                let encoded =
                    encode(&merged).map_err(ConflictableTransactionError::Abort)?;
                tx.insert(merged.id.as_bytes(), encoded)?;
                Ok(merged)
            })
            .map_err(tx_err)?;

        Ok(stored)
    }

    async fn get_edges(&self, from: &str, family: &str, kind: &str, name: &str)
        -> Result<Vec<Edge>> {
        // Fully specified tuple: a point lookup, no scan.
        if !kind.is_empty() && !name.is_empty() {
            let key = edge_key(from, family, kind, name);
            return match self.edges.get(key.as_bytes())? {
                Some(raw) => Ok(vec![decode(&raw)?]),
                None => Ok(Vec::new()),
            };
        }

        let prefix = edge_prefix(from, family, kind);
        let mut result = Vec::new();
        for item in self.edges.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            let edge: Edge = decode(&raw)?;
            // A name filter without a kind cannot be expressed as a key
            // prefix, so the remainder is filtered here.
            if edge.matches(family, kind, name) {
                result.push(edge);
            }
        }
        Ok(result)
    }

    async fn create_edge(&self, edge: Edge) -> Result<Edge> {
        let key = edge_key(&edge.from, &edge.family, &edge.kind, &edge.name);
        let encoded = encode(&edge)?;

        let existing = self
            .edges
            .transaction(|tx| {
                if let Some(raw) = tx.get(key.as_bytes())? {
                    return Ok(Some(raw.to_vec()));
                }
                tx.insert(key.as_bytes(), encoded.clone())?;
                Ok(None)
            })
            .map_err(tx_err)?;

        match existing {
            Some(raw) => decode(&raw),
            None => Ok(edge),
        }
    }

    async fn delete_vertex(&self, id: &str) -> Result<()> {
        // Outgoing edge keys are collected up front; the transactional view
        // cannot iterate. Incoming edges from elsewhere stay behind.
        let prefix = format!("{}:", id);
        let mut edge_keys = Vec::new();
        for item in self.edges.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            edge_keys.push(key.to_vec());
        }

        (&self.vertices, &self.edges)
            .transaction(|(vt, et)| {
                vt.remove(id.as_bytes())?;
                for key in &edge_keys {
                    et.remove(key.as_slice())?;
                }
                Ok(())
            })
            .map_err(tx_err)?;

        Ok(())
    }
}
