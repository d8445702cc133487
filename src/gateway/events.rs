//! Wire types: inbound client commands, acknowledgements, and the event
//! shapes known producers emit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix for rooms that address all of one user's open connections.
const USER_ROOM_PREFIX: &str = "user_";

/// Derive the room id targeting every open connection of one user. Producers
/// broadcast user-scoped events (e.g. grading results) to this room without
/// ever holding a connection handle.
pub fn user_room_id(user_id: i64) -> String {
    format!("{USER_ROOM_PREFIX}{user_id}")
}

// ---------------------------------------------------------------------------
// Client → Server commands
// ---------------------------------------------------------------------------

/// A command received from a connected client. Frames that do not parse into
/// one of these are silently ignored and the connection stays open.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    JoinUserRoom { user_id: i64 },
}

// ---------------------------------------------------------------------------
// Server → Client acknowledgements
// ---------------------------------------------------------------------------

/// Acknowledgement sent back on the same connection after a command.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Ack {
    JoinedRoom { room_id: String },
    LeftRoom { room_id: String },
    JoinedUserRoom { user_id: i64 },
}

impl Ack {
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Producer events
// ---------------------------------------------------------------------------

/// The event shapes known producers emit after committing a state change.
///
/// The dispatcher itself is payload-agnostic (`serde_json::Value` all the
/// way down); this union exists so producers and test fixtures construct
/// well-formed payloads, with a catch-all for shapes added later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProducerEvent {
    Known(KnownEvent),
    /// Forward compatibility: any other payload passes through untouched.
    Other(Value),
}

/// Course- and user-scoped notifications currently produced by the CRUD
/// handlers. Course rooms are keyed `course_<id>` by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum KnownEvent {
    RatingUpdated {
        course_id: i64,
        new_rating: f64,
        ratings_count: i64,
    },
    AssignmentGraded {
        assignment_id: i64,
        course_id: i64,
        score: i64,
        feedback: String,
        status: String,
    },
    ReviewCreated {
        course_id: i64,
        review_id: i64,
        user_id: i64,
    },
    ReviewUpdated {
        course_id: i64,
        review_id: i64,
        user_id: i64,
    },
    ReviewDeleted {
        course_id: i64,
        review_id: i64,
        user_id: i64,
    },
}

impl ProducerEvent {
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<KnownEvent> for ProducerEvent {
    fn from(event: KnownEvent) -> Self {
        Self::Known(event)
    }
}
