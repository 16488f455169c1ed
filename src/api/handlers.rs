//! HTTP and RPC request handlers
//!
//! A thin translation layer: parse the request, call the engine, wrap the
//! outcome in the response envelope. Every failure becomes a
//! `success: false` response with a human-readable message; success maps to
//! HTTP 202, failure to 400. The one rule owned here rather than by the
//! engine: a private key is never forwarded back to a caller who did not
//! already prove they hold it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::Form;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::engine::GraphEngine;
use crate::graph::protocol::{method, ApiRequest, ApiResponse};
use crate::graph::{family, Edge, Vertex};

/// Shared handler state
pub type ApiState = Arc<GraphEngine>;

fn respond(mut response: ApiResponse) -> (StatusCode, Json<ApiResponse>) {
    response.version = crate::VERSION.to_string();
    let status = if response.success {
        StatusCode::ACCEPTED
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(response))
}

fn info_response() -> ApiResponse {
    ApiResponse {
        success: true,
        message: "A distributed graph filesystem for apps.".into(),
        ..Default::default()
    }
}

/// GET `/` — service info
pub async fn info() -> impl IntoResponse {
    respond(info_response())
}

/// Form body for root vertex creation
#[derive(Deserialize, Default)]
pub struct CreateVertexForm {
    #[serde(default)]
    vertex_name: String,
    #[serde(default)]
    vertex_type: String,
    #[serde(default)]
    public_data: String,
    #[serde(default)]
    private_data: String,
    #[serde(default)]
    private_key: String,
}

/// POST `/graph/vertex` — create a root vertex. A private key is generated
/// when the caller supplies none; the response is the only place the caller
/// ever sees it.
pub async fn create_vertex(
    State(engine): State<ApiState>,
    Form(form): Form<CreateVertexForm>,
) -> impl IntoResponse {
    if form.vertex_name.is_empty() {
        return respond(ApiResponse::error("vertex name not specified"));
    }
    if form.vertex_type.is_empty() {
        return respond(ApiResponse::error("vertex type not specified"));
    }
    if form.public_data.is_empty() {
        return respond(ApiResponse::error("vertex public data left empty"));
    }

    let vertex = Vertex {
        name: form.vertex_name,
        kind: form.vertex_type,
        public: form.public_data,
        private: form.private_data,
        private_key: if form.private_key.is_empty() {
            GraphEngine::generate_id()
        } else {
            form.private_key
        },
        ..Default::default()
    };

    match engine.create_vertex(vertex).await {
        Ok(vertex) => {
            debug!(vertex = %vertex.id, "vertex created over http");
            respond(ApiResponse::ok().with_vertex(vertex))
        }
        Err(e) => respond(ApiResponse::error(e.to_string())),
    }
}

/// Optional `private_key` query parameter
#[derive(Deserialize, Default)]
pub struct PrivateKeyParams {
    #[serde(default)]
    private_key: String,
}

/// GET `/graph/vertex/:vertex_id` — fetch a vertex, redacted unless the
/// matching private key is supplied.
pub async fn get_vertex(
    State(engine): State<ApiState>,
    Path(vertex_id): Path<String>,
    Query(params): Query<PrivateKeyParams>,
) -> impl IntoResponse {
    match engine.get_vertex(&vertex_id, &params.private_key).await {
        Ok(mut vertex) => {
            vertex.private_key.clear();
            respond(ApiResponse::ok().with_vertex(vertex))
        }
        Err(e) => respond(ApiResponse::error(e.to_string())),
    }
}

/// Form body for child vertex creation
#[derive(Deserialize, Default)]
pub struct CreateChildForm {
    /// Child vertex metadata, JSON-encoded
    #[serde(default)]
    vertex: String,
    /// Ownership edge metadata, JSON-encoded
    #[serde(default)]
    edge: String,
    #[serde(default)]
    private_key: String,
}

/// POST `/graph/vertex/:vertex_id` — create a child vertex under an
/// ownership edge.
pub async fn create_child_vertex(
    State(engine): State<ApiState>,
    Path(vertex_id): Path<String>,
    Form(form): Form<CreateChildForm>,
) -> impl IntoResponse {
    let child: Vertex = match serde_json::from_str(&form.vertex) {
        Ok(child) => child,
        Err(_) => {
            return respond(ApiResponse::error(format!(
                "can't parse vertex metadata: {}",
                form.vertex
            )))
        }
    };

    let edge: Edge = match serde_json::from_str(&form.edge) {
        Ok(edge) => edge,
        Err(_) => {
            return respond(ApiResponse::error(format!(
                "can't parse edge metadata: {}",
                form.edge
            )))
        }
    };

    match engine
        .create_child_vertex(&vertex_id, &form.private_key, child, edge)
        .await
    {
        Ok((vertex, edge)) => respond(ApiResponse::ok().with_vertex(vertex).with_edge(edge)),
        Err(e) => respond(ApiResponse::error(e.to_string())),
    }
}

/// Query parameters for edge listing
#[derive(Deserialize, Default)]
pub struct GetEdgesParams {
    #[serde(default)]
    edge_family: String,
    #[serde(default)]
    edge_type: String,
    #[serde(default)]
    edge_name: String,
    #[serde(default)]
    private_key: String,
}

/// GET `/graph/vertex/:vertex_id/edges` — list edges under a vertex.
pub async fn get_edges(
    State(engine): State<ApiState>,
    Path(vertex_id): Path<String>,
    Query(params): Query<GetEdgesParams>,
) -> impl IntoResponse {
    match engine
        .get_edges(
            &vertex_id,
            &params.private_key,
            &params.edge_family,
            &params.edge_type,
            &params.edge_name,
        )
        .await
    {
        Ok(edges) => respond(ApiResponse::ok().with_edges(edges)),
        Err(e) => respond(ApiResponse::error(e.to_string())),
    }
}

/// Form body for edge creation
#[derive(Deserialize, Default)]
pub struct CreateEdgeForm {
    /// Edge to add, JSON-encoded
    #[serde(default)]
    edge: String,
    /// Source vertex private key
    #[serde(default)]
    private_key: String,
}

/// POST `/graph/edge` — create an edge between two existing vertices.
pub async fn create_edge(
    State(engine): State<ApiState>,
    Form(form): Form<CreateEdgeForm>,
) -> impl IntoResponse {
    let edge: Edge = match serde_json::from_str(&form.edge) {
        Ok(edge) => edge,
        Err(_) => {
            return respond(ApiResponse::error(format!(
                "can't parse edge metadata: {}",
                form.edge
            )))
        }
    };

    respond(create_edge_response(&engine, &form.private_key, edge).await)
}

/// Shared by the REST and RPC paths. Only public and private edges can be
/// created directly; ownership edges exist solely through child creation.
async fn create_edge_response(engine: &GraphEngine, source_key: &str, edge: Edge) -> ApiResponse {
    if edge.family != family::PRIVATE && edge.family != family::PUBLIC {
        return ApiResponse::error(
            "invalid edge family: only private and public edges can be created directly",
        );
    }

    let from = edge.from.clone();
    let to = edge.to.clone();
    match engine.create_edge(&from, source_key, &to, edge).await {
        Ok(edge) => {
            debug!(from = %edge.from, to = %edge.to, name = %edge.name, "edge created");
            ApiResponse::ok().with_edge(edge)
        }
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

/// Dispatch one RPC envelope request against the engine.
pub async fn dispatch(engine: &GraphEngine, request: ApiRequest) -> ApiResponse {
    match request.method.as_str() {
        method::INFO => info_response(),

        method::VERTEX_GET => {
            match engine
                .get_vertex(&request.vertex.id, &request.vertex.private_key)
                .await
            {
                Ok(mut vertex) => {
                    vertex.private_key.clear();
                    ApiResponse::ok().with_vertex(vertex)
                }
                Err(e) => ApiResponse::error(e.to_string()),
            }
        }

        method::VERTEX_CREATE => {
            let vertex = request.vertex;
            if vertex.name.is_empty() {
                return ApiResponse::error("vertex name not specified");
            }
            if vertex.kind.is_empty() {
                return ApiResponse::error("vertex type not specified");
            }
            // A supplied id is honored here: remote engines delegating over
            // this channel have already assigned one.
            match engine.create_vertex(vertex).await {
                Ok(vertex) => ApiResponse::ok().with_vertex(vertex),
                Err(e) => ApiResponse::error(e.to_string()),
            }
        }

        method::VERTEX_CREATE_CHILD => {
            match engine
                .create_child_vertex(
                    &request.vertex.id,
                    &request.vertex.private_key,
                    request.child_vertex,
                    request.edge,
                )
                .await
            {
                Ok((vertex, edge)) => ApiResponse::ok().with_vertex(vertex).with_edge(edge),
                Err(e) => ApiResponse::error(e.to_string()),
            }
        }

        method::EDGE_GET => {
            match engine
                .get_edges(
                    &request.vertex.id,
                    &request.vertex.private_key,
                    &request.edge.family,
                    &request.edge.kind,
                    &request.edge.name,
                )
                .await
            {
                Ok(edges) => ApiResponse::ok().with_edges(edges),
                Err(e) => ApiResponse::error(e.to_string()),
            }
        }

        method::EDGE_CREATE => {
            let mut edge = request.edge;
            if !request.vertex.id.is_empty() {
                edge.from = request.vertex.id.clone();
            }
            if !request.child_vertex.id.is_empty() {
                edge.to = request.child_vertex.id.clone();
            }
            create_edge_response(engine, &request.vertex.private_key, edge).await
        }

        _ => ApiResponse::error("unknown request method"),
    }
}

/// GET `/graph/rpc` — upgrade to the WebSocket RPC channel.
pub async fn rpc_upgrade(
    ws: WebSocketUpgrade,
    State(engine): State<ApiState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| rpc_loop(socket, engine))
}

/// Envelope loop: read a request, dispatch it, write the response. The
/// connection stays open until the peer closes or a write fails.
async fn rpc_loop(mut socket: WebSocket, engine: ApiState) {
    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!("rpc channel error: {}", e);
                break;
            }
        };

        let mut response = match msg {
            Message::Text(text) => match serde_json::from_str::<ApiRequest>(&text) {
                Ok(request) => dispatch(&engine, request).await,
                Err(e) => ApiResponse::error(format!("error parsing api request: {}", e)),
            },
            Message::Close(_) => break,
            // Ping/pong are answered by axum itself
            _ => continue,
        };
        response.version = crate::VERSION.to_string();

        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("cannot encode rpc response: {}", e);
                break;
            }
        };

        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }
}
