//! HTTP/WebSocket surface over the graph engine

pub mod handlers;
pub mod server;

pub use handlers::dispatch;
pub use server::{router, serve};
