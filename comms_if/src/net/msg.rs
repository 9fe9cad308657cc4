//! # Link messages
//!
//! Everything sent over a [`Link`](super::Link) is wrapped in a [`Message`], which is serialised
//! to JSON on the wire.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tc::RcDemand;
use crate::tm::RoverStatus;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of characters in a generated message ID
pub const MSG_ID_LEN: usize = 10;

/// Message ID reserved for heartbeat pings
pub const PING_ID: &str = "<[[__PING__]]>";

/// Message ID reserved for replies to heartbeat pings
pub const REPING_ID: &str = "<[[_REPING_]]>";

/// Printable ASCII range message IDs are drawn from
const MSG_ID_CHARS: std::ops::RangeInclusive<u8> = 33..=126;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// A grid of class indices, indexed `[row, col]`.
pub type ClassGrid = Array2<usize>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single message sent over the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the link which sent the message
    pub sender: String,

    /// Identifier of the message, either a random [`MSG_ID_LEN`] character token or one of the
    /// heartbeat sentinels
    pub msg_id: String,

    pub priority: Priority,

    pub data: Payload,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Transmission priority of a message. Higher priorities are always sent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Med,
    High,
}

/// The data carried by a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Periodic rover status
    Status(RoverStatus),

    /// A command string from the ground station console
    Cmd(String),

    /// A remote control demand
    Rc(RcDemand),

    /// A JPEG encoded camera frame
    ImageStream(Vec<u8>),

    /// The most likely class in each cell of the occupancy map
    MapStream(ClassGrid),

    /// The raw output of the terrain classifier
    InferenceStream(ClassGrid),

    /// Ping counter carried by heartbeat pings and their replies
    Heartbeat(u64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Message {
    /// Create a new message with a freshly generated ID.
    pub fn new(sender: &str, priority: Priority, data: Payload) -> Self {
        Self {
            sender: sender.into(),
            msg_id: gen_msg_id(),
            priority,
            data,
        }
    }

    /// Create a heartbeat ping.
    pub fn ping(sender: &str, count: u64) -> Self {
        Self {
            sender: sender.into(),
            msg_id: PING_ID.into(),
            priority: Priority::High,
            data: Payload::Heartbeat(count),
        }
    }

    /// Create the reply to a heartbeat ping.
    pub fn reping(sender: &str, count: u64) -> Self {
        Self {
            sender: sender.into(),
            msg_id: REPING_ID.into(),
            priority: Priority::High,
            data: Payload::Heartbeat(count),
        }
    }

    pub fn is_ping(&self) -> bool {
        self.msg_id == PING_ID
    }

    pub fn is_reping(&self) -> bool {
        self.msg_id == REPING_ID
    }

    /// Serialise the message for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialise a message received from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Generate a random message ID of printable ASCII characters.
pub fn gen_msg_id() -> String {
    let mut rng = rand::thread_rng();

    (0..MSG_ID_LEN)
        .map(|_| rng.gen_range(MSG_ID_CHARS.clone()) as char)
        .collect()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
