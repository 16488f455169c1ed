//! Wide-column cluster backend over Cassandra/Scylla
//!
//! Schema mirrors the clustered-row layout: a `vertices` table keyed by
//! vertex id whose static columns hold the vertex record and whose clustering
//! columns form a reverse-index of incoming ownership pointers, and an
//! `edges` table keyed by the (`from`, `family`, `kind`, `name`) uniqueness
//! tuple. Idempotent edge creation uses an `IF NOT EXISTS` conditional write;
//! child-vertex creation runs edge and vertex inserts in one logged batch at
//! quorum consistency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::batch::{Batch, BatchType};
use scylla::query::Query;
use scylla::statement::Consistency;
use scylla::{Session, SessionBuilder};
use tracing::info;

use crate::core::error::{Error, Result};
use crate::graph::{Edge, Vertex};
use crate::storage::Storage;

const KEYSPACE: &str = "graph";

/// Wide-column storage backend.
pub struct CassandraStorage {
    session: Session,
}

fn storage_err(err: impl std::fmt::Display) -> Error {
    Error::storage(err.to_string())
}

fn quorum(stmt: &str) -> Query {
    let mut query = Query::new(stmt);
    query.set_consistency(Consistency::Quorum);
    query
}

fn one(stmt: &str) -> Query {
    let mut query = Query::new(stmt);
    query.set_consistency(Consistency::One);
    query
}

fn parse_time(raw: Option<String>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

impl CassandraStorage {
    /// Connect to the cluster at `uri` (defaults to localhost) and make sure
    /// the keyspace and tables exist.
    pub async fn connect(uri: &str) -> Result<Self> {
        let node = if uri.is_empty() { "localhost:9042" } else { uri };
        info!(node, "connecting to cassandra cluster");

        let session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(storage_err)?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{ \
                     'class': 'SimpleStrategy', 'replication_factor': 2 }}",
                    KEYSPACE
                ),
                (),
            )
            .await
            .map_err(storage_err)?;

        session
            .use_keyspace(KEYSPACE, false)
            .await
            .map_err(storage_err)?;

        let storage = Self { session };
        storage.ensure_tables().await?;
        Ok(storage)
    }

    async fn ensure_tables(&self) -> Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS vertices (
                    vertex_id text,
                    edge_family text,
                    edge_type text,
                    edge_name text,
                    from_vertex_id text,

                    vertex_name text static,
                    vertex_type text static,
                    public_data text static,
                    private_data text static,
                    private_key text static,
                    last_changed text static,

                    PRIMARY KEY (vertex_id, edge_family, edge_type, edge_name, from_vertex_id)
                )",
                (),
            )
            .await
            .map_err(storage_err)?;

        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS edges (
                    from_vertex_id text,
                    edge_family text,
                    edge_type text,
                    edge_name text,
                    to_vertex_id text,
                    edge_data text,
                    last_changed text,

                    PRIMARY KEY (from_vertex_id, edge_family, edge_type, edge_name)
                )",
                (),
            )
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn select_edge(&self, from: &str, family: &str, kind: &str, name: &str)
        -> Result<Option<Edge>> {
        let result = self
            .session
            .query_unpaged(
                one("SELECT to_vertex_id, edge_data, last_changed FROM edges \
                     WHERE from_vertex_id = ? AND edge_family = ? AND edge_type = ? \
                     AND edge_name = ?"),
                (from, family, kind, name),
            )
            .await
            .map_err(storage_err)?;

        let row = result
            .maybe_first_row_typed::<(Option<String>, Option<String>, Option<String>)>()
            .map_err(storage_err)?;

        Ok(row.map(|(to, data, changed)| Edge {
            from: from.into(),
            family: family.into(),
            kind: kind.into(),
            name: name.into(),
            to: to.unwrap_or_default(),
            data: data.unwrap_or_default(),
            last_changed: parse_time(changed),
        }))
    }
}

#[async_trait]
impl Storage for CassandraStorage {
    async fn close(&self) {}

    async fn drop_data(&self) -> Result<()> {
        for table in ["vertices", "edges"] {
            self.session
                .query_unpaged(format!("DROP TABLE IF EXISTS {}", table), ())
                .await
                .map_err(storage_err)?;
        }
        self.ensure_tables().await
    }

    async fn get_vertex(&self, id: &str, want_private: bool) -> Result<Vertex> {
        let result = self
            .session
            .query_unpaged(
                one("SELECT vertex_name, vertex_type, public_data, private_data, \
                     private_key, last_changed FROM vertices WHERE vertex_id = ? LIMIT 1"),
                (id,),
            )
            .await
            .map_err(storage_err)?;

        let row = result
            .maybe_first_row_typed::<(
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
            )>()
            .map_err(storage_err)?
            .ok_or_else(|| Error::not_found(format!("vertex {}", id)))?;

        let (name, kind, public, private, private_key, changed) = row;
        let mut vertex = Vertex {
            id: id.into(),
            name: name.unwrap_or_default(),
            kind: kind.unwrap_or_default(),
            public: public.unwrap_or_default(),
            private: private.unwrap_or_default(),
            private_key: private_key.unwrap_or_default(),
            last_changed: parse_time(changed),
        };
        if !want_private {
            vertex.redact();
        }
        Ok(vertex)
    }

    async fn create_vertex(&self, vertex: &Vertex) -> Result<()> {
        self.session
            .query_unpaged(
                quorum(
                    "INSERT INTO vertices (vertex_id, vertex_name, vertex_type, \
                     public_data, private_data, private_key, last_changed) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                ),
                (
                    &vertex.id,
                    &vertex.name,
                    &vertex.kind,
                    &vertex.public,
                    &vertex.private,
                    &vertex.private_key,
                    vertex.last_changed.to_rfc3339(),
                ),
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn update_vertex(&self, mut vertex: Vertex) -> Result<Vertex> {
        // The stored key is read back and wins over whatever was supplied.
        let stored = self.get_vertex(&vertex.id, true).await?;
        vertex.private_key = stored.private_key;

        self.session
            .query_unpaged(
                quorum(
                    "UPDATE vertices SET vertex_name = ?, vertex_type = ?, \
                     public_data = ?, private_data = ?, last_changed = ? \
                     WHERE vertex_id = ?",
                ),
                (
                    &vertex.name,
                    &vertex.kind,
                    &vertex.public,
                    &vertex.private,
                    vertex.last_changed.to_rfc3339(),
                    &vertex.id,
                ),
            )
            .await
            .map_err(storage_err)?;

        Ok(vertex)
    }

    async fn get_edges(&self, from: &str, family: &str, kind: &str, name: &str)
        -> Result<Vec<Edge>> {
        if !kind.is_empty() && !name.is_empty() {
            return Ok(self.select_edge(from, family, kind, name).await?.into_iter().collect());
        }

        let result = if kind.is_empty() {
            self.session
                .query_unpaged(
                    one("SELECT edge_name, edge_type, edge_family, to_vertex_id, \
                         edge_data, last_changed FROM edges \
                         WHERE from_vertex_id = ? AND edge_family = ?"),
                    (from, family),
                )
                .await
        } else {
            self.session
                .query_unpaged(
                    one("SELECT edge_name, edge_type, edge_family, to_vertex_id, \
                         edge_data, last_changed FROM edges \
                         WHERE from_vertex_id = ? AND edge_family = ? AND edge_type = ?"),
                    (from, family, kind),
                )
                .await
        }
        .map_err(storage_err)?;

        let rows = result
            .rows_typed::<(
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
            )>()
            .map_err(storage_err)?;

        let mut edges = Vec::new();
        for row in rows {
            let (edge_name, edge_kind, edge_family, to, data, changed) =
                row.map_err(storage_err)?;
            let edge = Edge {
                from: from.into(),
                family: edge_family.unwrap_or_default(),
                kind: edge_kind.unwrap_or_default(),
                name: edge_name.unwrap_or_default(),
                to: to.unwrap_or_default(),
                data: data.unwrap_or_default(),
                last_changed: parse_time(changed),
            };
            if edge.matches(family, kind, name) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    async fn create_edge(&self, edge: Edge) -> Result<Edge> {
        if let Some(existing) = self
            .select_edge(&edge.from, &edge.family, &edge.kind, &edge.name)
            .await?
        {
            return Ok(existing);
        }

        self.session
            .query_unpaged(
                quorum(
                    "INSERT INTO edges (from_vertex_id, to_vertex_id, edge_family, \
                     edge_type, edge_name, edge_data, last_changed) \
                     VALUES (?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                ),
                (
                    &edge.from,
                    &edge.to,
                    &edge.family,
                    &edge.kind,
                    &edge.name,
                    &edge.data,
                    edge.last_changed.to_rfc3339(),
                ),
            )
            .await
            .map_err(storage_err)?;

        // Reverse-index the pointer on the target vertex row.
        self.session
            .query_unpaged(
                quorum(
                    "INSERT INTO vertices (vertex_id, from_vertex_id, edge_family, \
                     edge_type, edge_name) VALUES (?, ?, ?, ?, ?) IF NOT EXISTS",
                ),
                (&edge.to, &edge.from, &edge.family, &edge.kind, &edge.name),
            )
            .await
            .map_err(storage_err)?;

        // Whoever's conditional insert landed owns the tuple now.
        self.select_edge(&edge.from, &edge.family, &edge.kind, &edge.name)
            .await?
            .ok_or_else(|| Error::storage("edge vanished after conditional insert"))
    }

    async fn create_child_vertex(&self, child: Vertex, edge: Edge) -> Result<(Vertex, Edge)> {
        if let Some(existing) = self
            .select_edge(&edge.from, &edge.family, &edge.kind, &edge.name)
            .await?
        {
            let mut adopted = child;
            adopted.id = existing.to.clone();
            let stored = self.update_vertex(adopted).await?;
            return Ok((stored, existing));
        }

        let mut batch = Batch::new(BatchType::Logged);
        batch.append_statement(
            "INSERT INTO edges (from_vertex_id, to_vertex_id, edge_family, edge_type, \
             edge_name, edge_data, last_changed) VALUES (?, ?, ?, ?, ?, ?, ?)",
        );
        batch.append_statement(
            "INSERT INTO vertices (vertex_id, from_vertex_id, edge_family, edge_type, \
             edge_name) VALUES (?, ?, ?, ?, ?)",
        );
        batch.append_statement(
            "INSERT INTO vertices (vertex_id, vertex_name, vertex_type, public_data, \
             private_data, private_key, last_changed) VALUES (?, ?, ?, ?, ?, ?, ?)",
        );
        batch.set_consistency(Consistency::Quorum);

        self.session
            .batch(
                &batch,
                (
                    (
                        &edge.from,
                        &edge.to,
                        &edge.family,
                        &edge.kind,
                        &edge.name,
                        &edge.data,
                        edge.last_changed.to_rfc3339(),
                    ),
                    (&edge.to, &edge.from, &edge.family, &edge.kind, &edge.name),
                    (
                        &child.id,
                        &child.name,
                        &child.kind,
                        &child.public,
                        &child.private,
                        &child.private_key,
                        child.last_changed.to_rfc3339(),
                    ),
                ),
            )
            .await
            .map_err(storage_err)?;

        Ok((child, edge))
    }

    async fn delete_vertex(&self, id: &str) -> Result<()> {
        let mut batch = Batch::new(BatchType::Logged);
        batch.append_statement("DELETE FROM vertices WHERE vertex_id = ?");
        batch.append_statement("DELETE FROM edges WHERE from_vertex_id = ?");
        batch.set_consistency(Consistency::Quorum);

        self.session
            .batch(&batch, ((id,), (id,)))
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
