//! Per-vertex event dispatch
//!
//! A process-wide registry mapping vertex id to a broadcast channel with a
//! subscriber count. The registry is an explicit object owned by the process
//! root and injected into the engine by construction, guarded by one mutex
//! with per-entry atomic reference counts; an entry is torn down only when
//! its count returns to zero.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use crate::graph::Event;

const CHANNEL_CAPACITY: usize = 64;

struct Listener {
    sender: broadcast::Sender<Event>,
    subscribers: Arc<AtomicUsize>,
}

/// Registry of per-vertex event listeners.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Mutex<HashMap<String, Listener>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events for a vertex. Keep the receiver alive and call
    /// [`unsubscribe`](Self::unsubscribe) with the same id when done.
    pub fn subscribe(&self, vertex_id: &str) -> broadcast::Receiver<Event> {
        let mut listeners = self.listeners.lock();
        let listener = listeners.entry(vertex_id.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
            Listener {
                sender,
                subscribers: Arc::new(AtomicUsize::new(0)),
            }
        });
        listener.subscribers.fetch_add(1, Ordering::SeqCst);
        listener.sender.subscribe()
    }

    /// Drop one subscription for a vertex; the channel is removed when the
    /// last subscriber leaves.
    pub fn unsubscribe(&self, vertex_id: &str) {
        let mut listeners = self.listeners.lock();
        let last_subscriber = match listeners.get(vertex_id) {
            Some(listener) => listener.subscribers.fetch_sub(1, Ordering::SeqCst) <= 1,
            None => return,
        };
        if last_subscriber {
            listeners.remove(vertex_id);
        }
    }

    /// Deliver an event to the subscribers of its source vertex, if any.
    pub fn dispatch(&self, event: &Event) {
        let listeners = self.listeners.lock();
        if let Some(listener) = listeners.get(&event.source) {
            // Send fails only when every receiver is gone; unsubscribe
            // handles the cleanup, so the result is ignored here.
            let _ = listener.sender.send(event.clone());
            trace!(vertex = %event.source, kind = %event.kind, "event dispatched");
        }
    }

    /// Number of vertices with at least one active subscriber.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}
