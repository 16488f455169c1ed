//! Graph engine: the single trusted entry point over a storage backend
//!
//! All business rules live here, not in backends: identifier assignment,
//! access-control checks, the idempotency policy for edge and vertex
//! creation, and recursive subtree deletion. The engine is stateless between
//! calls and holds no lock across a backend call, so it is safe for unbounded
//! concurrent invocation; all exclusion belongs to the active backend.
//!
//! Validation happens before any backend is touched and fails fast; backend
//! errors pass through unchanged, never retried. The idempotent edge insert
//! is the only concurrency-coordination primitive: callers racing to create
//! the same named child converge on one edge and one vertex id without a
//! distributed lock.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{Error, Result};
use crate::events::EventDispatcher;
use crate::graph::{family, Edge, Event, Vertex};
use crate::storage::SharedStorage;

/// Event type emitted when a vertex is created.
pub const EVENT_VERTEX_CREATE: &str = "vertex:create";

/// Orchestration layer over the configured storage backend.
pub struct GraphEngine {
    storage: SharedStorage,
    events: Arc<EventDispatcher>,
}

impl GraphEngine {
    /// Build an engine over a backend and an event dispatcher. Both are
    /// injected once at startup and never swapped.
    pub fn new(storage: SharedStorage, events: Arc<EventDispatcher>) -> Self {
        Self { storage, events }
    }

    /// Generate a fresh random identifier. 128-bit, so a collision is
    /// treated as unreachable rather than handled.
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// The event dispatcher this engine publishes to.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Release the underlying backend connection.
    pub async fn shutdown(&self) {
        self.storage.close().await;
    }

    /// Create a vertex, assigning an id when the draft has none. Never
    /// overwrites an existing vertex's private key: ids are fresh.
    pub async fn create_vertex(&self, mut vertex: Vertex) -> Result<Vertex> {
        if vertex.id.is_empty() {
            vertex.id = Self::generate_id();
        }
        vertex.last_changed = Utc::now();

        self.storage.create_vertex(&vertex).await?;
        debug!(vertex = %vertex.id, "vertex created");

        self.events.dispatch(&Event {
            source: vertex.id.clone(),
            kind: EVENT_VERTEX_CREATE.into(),
            created: vertex.last_changed,
        });

        Ok(vertex)
    }

    /// Fetch a vertex. With no key the record comes back with `private` and
    /// `private_key` cleared — silent redaction, not an error; public
    /// metadata is always readable. A wrong key fails with `KeyMismatch`.
    pub async fn get_vertex(&self, id: &str, supplied_key: &str) -> Result<Vertex> {
        if id.is_empty() {
            return Err(Error::not_found("vertex id not supplied"));
        }

        if supplied_key.is_empty() {
            let mut vertex = self.storage.get_vertex(id, false).await?;
            vertex.redact();
            return Ok(vertex);
        }

        let vertex = self.storage.get_vertex(id, true).await?;
        if vertex.private_key != supplied_key {
            return Err(Error::KeyMismatch(id.into()));
        }
        Ok(vertex)
    }

    /// Replace a vertex's mutable fields. The stored private key is
    /// preserved no matter what the caller supplies.
    pub async fn update_vertex(&self, mut vertex: Vertex) -> Result<Vertex> {
        if vertex.id.is_empty() {
            return Err(Error::validation("vertex id not supplied"));
        }
        vertex.last_changed = Utc::now();
        self.storage.update_vertex(vertex).await
    }

    /// Create an edge between two existing vertices, idempotently.
    ///
    /// When an edge with the same (`from`, `family`, `kind`, `name`) already
    /// exists, the returned edge's `to` is the original target, not the
    /// requested one: a successful call means "this is the canonical edge
    /// for that key", which may silently not be the one just asked for.
    pub async fn create_edge(
        &self,
        source_id: &str,
        source_key: &str,
        dest_id: &str,
        mut edge: Edge,
    ) -> Result<Edge> {
        if !family::is_valid(&edge.family) {
            return Err(Error::validation(format!(
                "unsupported edge family: {:?}",
                edge.family
            )));
        }
        if source_id.is_empty() || dest_id.is_empty() {
            return Err(Error::validation(
                "source or destination vertex id not supplied",
            ));
        }
        if source_id == dest_id {
            return Err(Error::validation(
                "destination and source vertex are the same",
            ));
        }
        if edge.kind.is_empty() && edge.name.is_empty() {
            return Err(Error::validation("both edge type and name missing"));
        }

        let key_confirmed = if source_key.is_empty() {
            false
        } else {
            if !self.confirm_vertex_key(source_id, source_key).await {
                return Err(Error::KeyMismatch(source_id.into()));
            }
            true
        };

        // An explicitly named private edge claims a unique slot under the
        // source vertex, so anonymous callers cannot create one.
        if edge.family == family::PRIVATE && !edge.name.is_empty() && !key_confirmed {
            return Err(Error::validation(
                "creating uniquely named private edges requires the source private key",
            ));
        }

        if !key_confirmed && !self.confirm_vertex(source_id).await {
            return Err(Error::not_found(format!("vertex {}", source_id)));
        }
        if !self.confirm_vertex(dest_id).await {
            return Err(Error::not_found(format!("vertex {}", dest_id)));
        }

        edge.from = source_id.into();
        edge.to = dest_id.into();
        if edge.name.is_empty() {
            edge.name = edge.to.clone();
        }
        edge.last_changed = Utc::now();

        self.storage.create_edge(edge).await
    }

    /// List edges under a vertex, scoped to one family. For non-public
    /// families the caller must either hold the key or address the edge
    /// precisely by type and name; without the key, edge payloads come back
    /// cleared.
    pub async fn get_edges(
        &self,
        vertex_id: &str,
        supplied_key: &str,
        family_name: &str,
        kind: &str,
        name: &str,
    ) -> Result<Vec<Edge>> {
        if vertex_id.is_empty() {
            return Err(Error::validation("vertex id not supplied"));
        }
        if family_name.is_empty() {
            return Err(Error::validation("edge family not supplied"));
        }
        if !family::is_valid(family_name) {
            return Err(Error::validation(format!(
                "unsupported edge family: {:?}",
                family_name
            )));
        }

        let key_confirmed = if supplied_key.is_empty() {
            if !self.confirm_vertex(vertex_id).await {
                return Err(Error::not_found(format!("vertex {}", vertex_id)));
            }
            false
        } else {
            if !self.confirm_vertex_key(vertex_id, supplied_key).await {
                return Err(Error::KeyMismatch(vertex_id.into()));
            }
            true
        };

        if family_name != family::PUBLIC
            && !key_confirmed
            && (kind.is_empty() || name.is_empty())
        {
            return Err(Error::validation(
                "either the private key or the exact edge type and name are required \
                 for non-public edges",
            ));
        }

        let mut edges = self
            .storage
            .get_edges(vertex_id, family_name, kind, name)
            .await?;

        if family_name != family::PUBLIC && !key_confirmed {
            for edge in &mut edges {
                edge.data.clear();
            }
        }

        Ok(edges)
    }

    /// Create a vertex as a child of `parent_id`, reachable by a known
    /// ownership edge — unless that edge already exists, in which case the
    /// existing child is updated instead. This lets concurrent callers race
    /// to create the "same" named child without double-creating it or
    /// holding a lock: the loser of the edge race adopts the winner's
    /// target vertex and overwrites its mutable fields.
    pub async fn create_child_vertex(
        &self,
        parent_id: &str,
        parent_key: &str,
        mut child: Vertex,
        mut edge: Edge,
    ) -> Result<(Vertex, Edge)> {
        if parent_id.is_empty() {
            return Err(Error::validation("parent vertex id not supplied"));
        }

        edge.family = family::OWNERSHIP.into();
        edge.from = parent_id.into();

        // A well-known edge can be addressed without the key; an unnamed,
        // ambiguous child requires proof of ownership.
        let key_confirmed = if !parent_key.is_empty() {
            if !self.confirm_vertex_key(parent_id, parent_key).await {
                return Err(Error::KeyMismatch(parent_id.into()));
            }
            true
        } else {
            if edge.kind.is_empty() || edge.name.is_empty() {
                return Err(Error::validation(
                    "specify the edge type and name precisely, or supply the parent \
                     private key",
                ));
            }
            if !self.confirm_vertex(parent_id).await {
                return Err(Error::not_found(format!("vertex {}", parent_id)));
            }
            false
        };

        if child.id.is_empty() {
            child.id = Self::generate_id();
        }
        child.last_changed = Utc::now();

        edge.to = child.id.clone();
        if edge.name.is_empty() {
            edge.name = edge.to.clone();
        }
        edge.last_changed = Utc::now();

        let candidate_id = child.id.clone();
        let (mut stored, canonical) = self.storage.create_child_vertex(child, edge).await?;

        if canonical.to == candidate_id {
            debug!(parent = parent_id, child = %stored.id, "child vertex created");
            self.events.dispatch(&Event {
                source: stored.id.clone(),
                kind: EVENT_VERTEX_CREATE.into(),
                created: stored.last_changed,
            });
        } else {
            debug!(parent = parent_id, child = %stored.id, "existing child adopted");
        }

        if !key_confirmed {
            stored.redact();
        }

        Ok((stored, canonical))
    }

    /// Delete a vertex and its entire ownership subtree.
    pub async fn delete_vertex(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::validation("vertex id not supplied"));
        }
        self.delete_vertex_tree(vec![id.to_string()]).await
    }

    /// Delete the subtrees rooted at `ids`, breadth-first over outgoing
    /// ownership edges. Best-effort: a failure partway is not rolled back,
    /// and non-ownership edges pointing into the deleted region are left
    /// dangling.
    pub async fn delete_vertex_tree(&self, ids: Vec<String>) -> Result<()> {
        self.storage.delete_vertex_tree(ids).await
    }

    /// True if a vertex with this id exists. Indistinguishable from a wrong
    /// key in [`Self::confirm_vertex_key`]: both checks only ever answer
    /// false.
    pub async fn confirm_vertex(&self, id: &str) -> bool {
        self.storage.get_vertex(id, false).await.is_ok()
    }

    /// True if the vertex exists and `key` matches its private key.
    pub async fn confirm_vertex_key(&self, id: &str, key: &str) -> bool {
        match self.storage.get_vertex(id, true).await {
            Ok(vertex) => vertex.private_key == key,
            Err(_) => false,
        }
    }
}
