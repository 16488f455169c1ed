//! Graph data model: vertices, edges and mutation events
//!
//! Wire field names (`vertex_id`, `edge_family`, ...) are part of the public
//! protocol and shared with remote graphfs instances, so they are pinned with
//! serde renames rather than derived from the Rust field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod protocol;

/// Edge family names. The family governs visibility and deletion semantics:
/// `ownership` edges define the subtree removed by recursive deletion, and
/// non-`public` families gate their payloads behind the source vertex key.
pub mod family {
    /// Readable by anyone who can address the source vertex
    pub const PUBLIC: &str = "public";
    /// Payload gated behind the source vertex private key
    pub const PRIVATE: &str = "private";
    /// Structural parent → child edge, walked by recursive deletion
    pub const OWNERSHIP: &str = "ownership";
    /// Edge to an event stream vertex
    pub const EVENT: &str = "event";

    /// True if `s` names one of the four supported families.
    pub fn is_valid(s: &str) -> bool {
        matches!(s, PUBLIC | PRIVATE | OWNERSHIP | EVENT)
    }
}

/// A node in the graph.
///
/// `id` and `private_key` are immutable once assigned: updates overwrite every
/// other field but never those two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Opaque unique identifier, assigned by the engine on creation
    #[serde(rename = "vertex_id", default)]
    pub id: String,

    /// Timestamp of the last mutation
    #[serde(rename = "last_changed", default = "epoch")]
    pub last_changed: DateTime<Utc>,

    /// Descriptive name, caller-supplied, not unique
    #[serde(rename = "vertex_name", default)]
    pub name: String,

    /// Descriptive type, caller-supplied, not unique
    #[serde(rename = "vertex_type", default)]
    pub kind: String,

    /// Payload visible only to holders of the matching key
    #[serde(rename = "private_data", default, skip_serializing_if = "String::is_empty")]
    pub private: String,

    /// Shared secret gating `private` and mutation of the ownership subtree.
    /// Never serialized back to a caller who does not already know it.
    #[serde(rename = "private_key", default, skip_serializing_if = "String::is_empty")]
    pub private_key: String,

    /// Payload visible to anyone who can address the vertex
    #[serde(rename = "public_data", default)]
    pub public: String,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            id: String::new(),
            last_changed: epoch(),
            name: String::new(),
            kind: String::new(),
            private: String::new(),
            private_key: String::new(),
            public: String::new(),
        }
    }
}

impl Vertex {
    /// Clear the access-controlled fields. Applied by the engine whenever the
    /// caller has not proven knowledge of the private key.
    pub fn redact(&mut self) {
        self.private.clear();
        self.private_key.clear();
    }
}

/// A directed, typed relationship between two vertices.
///
/// The tuple (`from`, `family`, `kind`, `name`) is unique: at most one edge
/// with that tuple exists at any time. `name` defaults to `to` when omitted,
/// so every stored edge has a non-empty name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Timestamp of creation
    #[serde(rename = "last_changed", default = "epoch")]
    pub last_changed: DateTime<Utc>,

    /// One of the `family` constants
    #[serde(rename = "edge_family", default)]
    pub family: String,

    /// Caller-supplied discriminator
    #[serde(rename = "edge_type", default)]
    pub kind: String,

    /// Caller-supplied discriminator, defaults to `to`
    #[serde(rename = "edge_name", default)]
    pub name: String,

    /// Source vertex id
    #[serde(rename = "vertex_from", default)]
    pub from: String,

    /// Target vertex id
    #[serde(rename = "vertex_to", default)]
    pub to: String,

    /// Opaque payload, visibility-gated like the source vertex private data
    #[serde(rename = "edge_data", default)]
    pub data: String,
}

impl Default for Edge {
    fn default() -> Self {
        Self {
            last_changed: epoch(),
            family: String::new(),
            kind: String::new(),
            name: String::new(),
            from: String::new(),
            to: String::new(),
            data: String::new(),
        }
    }
}

impl Edge {
    /// True if this edge matches the (possibly partial) filter fields.
    /// Empty `kind`/`name` in the filter mean "match any".
    pub fn matches(&self, family: &str, kind: &str, name: &str) -> bool {
        self.family == family
            && (kind.is_empty() || self.kind == kind)
            && (name.is_empty() || self.name == name)
    }
}

/// A mutation notification, consumed by the event dispatcher. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Id of the vertex the event originated from
    #[serde(rename = "vertex_id")]
    pub source: String,

    /// Event type, e.g. `vertex:create`
    #[serde(rename = "event_type")]
    pub kind: String,

    /// When the event was emitted
    #[serde(rename = "event_time")]
    pub created: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_wire_names_round_trip() {
        let vertex = Vertex {
            id: "v1".into(),
            name: "root".into(),
            kind: "test".into(),
            public: "pub".into(),
            private: "sec".into(),
            private_key: "key".into(),
            ..Default::default()
        };

        let json = serde_json::to_value(&vertex).unwrap();
        assert_eq!(json["vertex_id"], "v1");
        assert_eq!(json["vertex_type"], "test");
        assert_eq!(json["private_data"], "sec");

        let back: Vertex = serde_json::from_value(json).unwrap();
        assert_eq!(back, vertex);
    }

    #[test]
    fn redacted_fields_are_omitted_on_the_wire() {
        let mut vertex = Vertex {
            id: "v1".into(),
            private: "sec".into(),
            private_key: "key".into(),
            ..Default::default()
        };
        vertex.redact();

        let json = serde_json::to_value(&vertex).unwrap();
        assert!(json.get("private_data").is_none());
        assert!(json.get("private_key").is_none());
    }

    #[test]
    fn edge_filter_matching() {
        let edge = Edge {
            family: family::PUBLIC.into(),
            kind: "link".into(),
            name: "n1".into(),
            ..Default::default()
        };

        assert!(edge.matches("public", "", ""));
        assert!(edge.matches("public", "link", ""));
        assert!(edge.matches("public", "link", "n1"));
        assert!(!edge.matches("private", "", ""));
        assert!(!edge.matches("public", "other", ""));
    }

    #[test]
    fn family_names() {
        assert!(family::is_valid("ownership"));
        assert!(family::is_valid("event"));
        assert!(!family::is_valid("friendship"));
        assert!(!family::is_valid(""));
    }
}
