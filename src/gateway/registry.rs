//! Live-connection bookkeeping. All access is serialized by the hub's lock.

use std::collections::HashMap;

use super::session::{ConnectionHandle, ConnectionId};

/// The set of all open connections. Owns the hub-facing handle for each;
/// the room index references connections by id only.
#[derive(Default)]
pub struct Registry {
    live: HashMap<ConnectionId, ConnectionHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly accepted connection. Never fails.
    pub fn register(&mut self, handle: ConnectionHandle) {
        self.live.insert(handle.id(), handle);
    }

    /// Remove a connection from the live set. Idempotent; returns whether it
    /// was present. The room-membership cascade is the hub's job.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        self.live.remove(&id).is_some()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionHandle> {
        self.live.get(&id)
    }

    /// Snapshot every live handle, for broadcast-to-all.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.live.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
