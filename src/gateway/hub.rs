//! The broadcast hub: dispatcher over the connection registry and room
//! index.
//!
//! One `parking_lot::Mutex` serializes every mutation and membership
//! snapshot. No lock is held across a send: fan-out snapshots the target
//! handles under the lock, pushes outside it, and unregisters failed
//! connections afterwards (collect-then-remove, never mid-iteration).

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::registry::Registry;
use super::rooms::RoomIndex;
use super::session::{ConnectionHandle, ConnectionId};

struct HubState {
    registry: Registry,
    rooms: RoomIndex,
}

/// Process-wide dispatch hub. Constructed once at startup and carried in
/// `AppState`; event producers call [`broadcast_to_room`](Self::broadcast_to_room)
/// after committing their own state changes. Delivery is fire-and-forget,
/// at-most-once: no retries, no errors surfaced to the producer.
pub struct BroadcastHub {
    state: Mutex<HubState>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState {
                registry: Registry::new(),
                rooms: RoomIndex::new(),
            }),
        }
    }

    /// Track a newly accepted connection.
    pub fn register(&self, handle: ConnectionHandle) {
        let id = handle.id();
        self.state.lock().registry.register(handle);
        tracing::debug!(conn_id = %id, "connection registered");
    }

    /// Drop a connection and every room membership it holds. Idempotent.
    pub fn unregister(&self, id: ConnectionId) {
        let mut state = self.state.lock();
        let was_live = state.registry.unregister(id);
        state.rooms.remove_everywhere(id);
        drop(state);
        if was_live {
            tracing::debug!(conn_id = %id, "connection unregistered");
        }
    }

    /// Add a connection to a room. Idempotent. A connection that is no
    /// longer registered cannot join: membership only ever references live
    /// connections.
    pub fn join_room(&self, id: ConnectionId, room_id: &str) {
        let mut state = self.state.lock();
        if state.registry.get(id).is_none() {
            return;
        }
        state.rooms.join(id, room_id);
    }

    /// Remove a connection from a room. Idempotent.
    pub fn leave_room(&self, id: ConnectionId, room_id: &str) {
        self.state.lock().rooms.leave(id, room_id);
    }

    /// Send one event to one connection. On failure the connection is
    /// unregistered — the same cleanup path as an explicit disconnect —
    /// and `false` is returned so the caller can stop treating it as live.
    pub fn send_to(&self, id: ConnectionId, event: &Value) -> bool {
        let frame = serialize(event);
        let handle = self.state.lock().registry.get(id).cloned();
        let delivered = handle.map(|h| h.push(frame)).unwrap_or(false);
        if !delivered {
            tracing::debug!(conn_id = %id, "send failed, dropping connection");
            self.unregister(id);
        }
        delivered
    }

    /// Fan one event out to every live connection. Returns the number of
    /// connections it was queued for.
    pub fn broadcast_all(&self, event: &Value) -> usize {
        let frame = serialize(event);
        let targets = self.state.lock().registry.handles();
        self.push_to_all(&targets, frame)
    }

    /// Fan one event out to every member of a room. An unknown room means
    /// zero recipients, not an error. Returns the number of members it was
    /// queued for.
    pub fn broadcast_to_room(&self, event: &Value, room_id: &str) -> usize {
        let frame = serialize(event);
        let targets: Vec<ConnectionHandle> = {
            let state = self.state.lock();
            state
                .rooms
                .members_of(room_id)
                .into_iter()
                .filter_map(|id| state.registry.get(id).cloned())
                .collect()
        };
        let delivered = self.push_to_all(&targets, frame);
        tracing::trace!(room_id, delivered, "room broadcast");
        delivered
    }

    /// Push a serialized frame to each target; a failure on one target never
    /// aborts the rest. Failed connections are unregistered after the loop.
    fn push_to_all(&self, targets: &[ConnectionHandle], frame: Arc<str>) -> usize {
        let mut failed = Vec::new();
        let mut delivered = 0;
        for handle in targets {
            if handle.push(frame.clone()) {
                delivered += 1;
            } else {
                failed.push(handle.id());
            }
        }
        for id in failed {
            tracing::debug!(conn_id = %id, "send failed during fan-out, dropping connection");
            self.unregister(id);
        }
        delivered
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Membership size of a room (0 for unknown rooms).
    pub fn member_count(&self, room_id: &str) -> usize {
        self.state.lock().rooms.member_count(room_id)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.state.lock().rooms.room_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize(event: &Value) -> Arc<str> {
    Arc::from(event.to_string())
}
