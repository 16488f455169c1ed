//! Remote-delegating proxy backend
//!
//! Stores nothing of its own except a read-through vertex cache (an embedded
//! KV instance). Every supported contract method is translated into a request
//! over a persistent WebSocket channel to a remote graphfs server speaking
//! the [`crate::graph::protocol`] envelope, and the response is checked for
//! its success flag before being unpacked.
//!
//! The remote envelope has no methods for update, delete or drop; those
//! return [`Error::Unsupported`] rather than silently reporting success the
//! way the original proxy stub did. Because the contract carries no private
//! key, the remote engine applies its own access control: records arrive
//! (and are cached) already redacted, and non-public partial edge listings
//! are rejected upstream.

use std::path::Path;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::core::error::{Error, Result};
use crate::graph::protocol::{method, ApiRequest, ApiResponse};
use crate::graph::{Edge, Vertex};
use crate::storage::{SledStorage, Storage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Proxy storage backend.
pub struct ProxyStorage {
    conn: Mutex<WsStream>,
    cache: SledStorage,
}

impl ProxyStorage {
    /// Connect to a remote graphfs server and probe it for liveness.
    /// Initialization is rejected when the probe does not return success.
    pub async fn connect(uri: &str, cache_dir: &Path) -> Result<Self> {
        let (stream, _) = connect_async(uri)
            .await
            .map_err(|e| Error::network(format!("cannot reach remote graph server: {}", e)))?;

        let proxy = Self {
            conn: Mutex::new(stream),
            cache: SledStorage::open(cache_dir)?,
        };

        proxy
            .call(ApiRequest {
                method: method::INFO.into(),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::network(format!("remote liveness probe failed: {}", e)))?;

        debug!(uri, "connected to remote graph server");
        Ok(proxy)
    }

    /// Send one request and wait for its response on the shared channel.
    /// Holding the lock across send+receive keeps responses paired with
    /// their requests.
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        let payload = serde_json::to_string(&request)?;

        let mut conn = self.conn.lock().await;
        conn.send(Message::Text(payload))
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        while let Some(msg) = conn.next().await {
            match msg.map_err(|e| Error::network(e.to_string()))? {
                Message::Text(text) => {
                    let response: ApiResponse = serde_json::from_str(&text)?;
                    if !response.success {
                        return Err(Error::storage(response.message));
                    }
                    return Ok(response);
                }
                Message::Close(_) => {
                    return Err(Error::network("remote closed the RPC channel"))
                }
                // Control frames between request and response
                _ => continue,
            }
        }

        Err(Error::network("RPC channel ended before a response arrived"))
    }
}

#[async_trait]
impl Storage for ProxyStorage {
    async fn close(&self) {
        let mut conn = self.conn.lock().await;
        let _ = conn.send(Message::Close(None)).await;
        self.cache.close().await;
    }

    async fn drop_data(&self) -> Result<()> {
        Err(Error::Unsupported("drop over the proxy backend"))
    }

    async fn get_vertex(&self, id: &str, want_private: bool) -> Result<Vertex> {
        if let Ok(cached) = self.cache.get_vertex(id, want_private).await {
            return Ok(cached);
        }

        let response = self
            .call(ApiRequest {
                method: method::VERTEX_GET.into(),
                vertex: Vertex {
                    id: id.into(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await?;

        let vertex = response
            .vertex
            .ok_or_else(|| Error::storage("remote response carried no vertex"))?;
        self.cache.create_vertex(&vertex).await?;
        Ok(vertex)
    }

    async fn create_vertex(&self, vertex: &Vertex) -> Result<()> {
        let response = self
            .call(ApiRequest {
                method: method::VERTEX_CREATE.into(),
                vertex: vertex.clone(),
                ..Default::default()
            })
            .await?;

        if let Some(created) = response.vertex {
            self.cache.create_vertex(&created).await?;
        }
        Ok(())
    }

    async fn update_vertex(&self, _vertex: Vertex) -> Result<Vertex> {
        Err(Error::Unsupported("vertex update over the proxy backend"))
    }

    async fn get_edges(&self, from: &str, family: &str, kind: &str, name: &str)
        -> Result<Vec<Edge>> {
        let response = self
            .call(ApiRequest {
                method: method::EDGE_GET.into(),
                vertex: Vertex {
                    id: from.into(),
                    ..Default::default()
                },
                edge: Edge {
                    from: from.into(),
                    family: family.into(),
                    kind: kind.into(),
                    name: name.into(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await?;

        Ok(response.edges.unwrap_or_default())
    }

    async fn create_edge(&self, edge: Edge) -> Result<Edge> {
        let response = self
            .call(ApiRequest {
                method: method::EDGE_CREATE.into(),
                vertex: Vertex {
                    id: edge.from.clone(),
                    ..Default::default()
                },
                child_vertex: Vertex {
                    id: edge.to.clone(),
                    ..Default::default()
                },
                edge,
                ..Default::default()
            })
            .await?;

        response
            .edge
            .ok_or_else(|| Error::storage("remote response carried no edge"))
    }

    async fn create_child_vertex(&self, child: Vertex, edge: Edge) -> Result<(Vertex, Edge)> {
        let response = self
            .call(ApiRequest {
                method: method::VERTEX_CREATE_CHILD.into(),
                vertex: Vertex {
                    id: edge.from.clone(),
                    ..Default::default()
                },
                child_vertex: child,
                edge,
            })
            .await?;

        let vertex = response
            .vertex
            .ok_or_else(|| Error::storage("remote response carried no vertex"))?;
        let edge = response
            .edge
            .ok_or_else(|| Error::storage("remote response carried no edge"))?;

        self.cache.create_vertex(&vertex).await?;
        Ok((vertex, edge))
    }

    async fn delete_vertex(&self, _id: &str) -> Result<()> {
        Err(Error::Unsupported("vertex deletion over the proxy backend"))
    }

    async fn delete_vertex_tree(&self, _roots: Vec<String>) -> Result<()> {
        Err(Error::Unsupported("subtree deletion over the proxy backend"))
    }
}
