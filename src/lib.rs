//! graphfs — a distributed graph filesystem for applications
//!
//! Named vertices connected by typed, access-controlled edges. The core is
//! the storage engine: a contract every persistence backend satisfies, an
//! orchestration layer that owns identifier assignment, access control,
//! idempotent creation and subtree deletion, and four backends realizing the
//! same semantics over different physical storage models — an in-memory map,
//! an embedded ordered key-value store, a wide-column cluster store, and a
//! proxy that delegates to a remote instance of this same engine.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Main functional modules
pub mod api;
pub mod engine;
pub mod events;
pub mod graph;
pub mod storage;

// Re-export commonly used items for convenience
pub use crate::core::{Config, Error, Result};
pub use crate::engine::GraphEngine;
pub use crate::graph::{Edge, Event, Vertex};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
