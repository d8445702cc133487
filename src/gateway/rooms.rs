//! Room membership index: opaque room id → set of member connections.

use std::collections::{HashMap, HashSet};

use super::session::ConnectionId;

/// Maps room ids to their member sets. A room exists exactly while it has
/// members; the empty set is never stored, so listings never show stale
/// rooms.
#[derive(Default)]
pub struct RoomIndex {
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room on first join.
    /// Idempotent.
    pub fn join(&mut self, id: ConnectionId, room_id: &str) {
        self.rooms.entry(room_id.to_string()).or_default().insert(id);
    }

    /// Remove a connection from a room, pruning the room if it empties.
    /// Idempotent; unknown room or non-member is a no-op.
    pub fn leave(&mut self, id: ConnectionId, room_id: &str) {
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }

    /// Current membership of a room; empty for unknown rooms.
    pub fn members_of(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Strip a connection from every room it belongs to, pruning rooms that
    /// empty. One pass over the index; used on disconnect.
    pub fn remove_everywhere(&mut self, id: ConnectionId) {
        self.rooms.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
    }

    pub fn contains(&self, id: ConnectionId, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(&id))
    }

    /// Number of members in a room (0 for unknown rooms).
    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, HashSet::len)
    }

    /// Number of rooms currently tracked (all non-empty by construction).
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
