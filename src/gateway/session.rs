//! Per-connection handle shared between the receive loop and the hub.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Capacity of each connection's outbox. A connection that falls this far
/// behind is treated as dead rather than allowed to stall a broadcaster.
pub const OUTBOX_CAPACITY: usize = 256;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for one live connection. Internal bookkeeping
/// only; never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The hub-facing side of one connection: its id plus the bounded outbox
/// feeding the socket's write half. The socket itself stays owned by the
/// connection's lifecycle task.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbox: mpsc::Sender<Arc<str>>,
}

impl ConnectionHandle {
    /// Allocate a fresh connection and its outbox. The receiver half goes to
    /// the lifecycle task; the handle goes to the registry.
    pub fn new() -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let handle = Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            outbox: tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue one serialized frame without blocking. A full or closed outbox
    /// means the connection is stalled or gone; the caller treats either as
    /// a failed send.
    pub fn push(&self, frame: Arc<str>) -> bool {
        self.outbox.try_send(frame).is_ok()
    }
}
