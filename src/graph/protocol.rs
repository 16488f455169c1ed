//! Request/response envelope for the graph RPC channel
//!
//! The same envelope is spoken on the `/graph/rpc` WebSocket endpoint and by
//! the proxy backend when it delegates to a remote graphfs server.

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Vertex};

/// RPC method names understood by the dispatcher.
pub mod method {
    /// Liveness probe, expects a `success: true` response
    pub const INFO: &str = "/";
    /// Fetch a vertex by id (optionally with its private key)
    pub const VERTEX_GET: &str = "/vertex/get";
    /// Create a root vertex
    pub const VERTEX_CREATE: &str = "/vertex/create";
    /// Create (or adopt) a child vertex under an ownership edge
    pub const VERTEX_CREATE_CHILD: &str = "/vertex/createChild";
    /// List edges under a vertex
    pub const EDGE_GET: &str = "/edge/get";
    /// Create an edge between two existing vertices
    pub const EDGE_CREATE: &str = "/edge/create";
}

/// A single RPC request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiRequest {
    /// One of the [`method`] names
    #[serde(default)]
    pub method: String,

    /// Primary vertex argument (source/parent, carries the private key)
    #[serde(default)]
    pub vertex: Vertex,

    /// Secondary vertex argument (child draft or edge destination)
    #[serde(rename = "child_vertex", default)]
    pub child_vertex: Vertex,

    /// Edge argument or filter
    #[serde(default)]
    pub edge: Edge,
}

/// A single RPC response. Only a subset of the fields is populated,
/// depending on the method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the request succeeded
    pub success: bool,

    /// Server version stamp
    #[serde(rename = "graph-version", default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Human-readable status or error message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Vertex result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex: Option<Vertex>,

    /// Edge result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<Edge>,

    /// Edge list result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
}

impl ApiResponse {
    /// A successful empty response.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// A failed response with a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attach a vertex to the response.
    pub fn with_vertex(mut self, vertex: Vertex) -> Self {
        self.vertex = Some(vertex);
        self
    }

    /// Attach an edge to the response.
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Attach an edge list to the response.
    pub fn with_edges(mut self, edges: Vec<Edge>) -> Self {
        self.edges = Some(edges);
        self
    }
}
