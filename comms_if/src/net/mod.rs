//! # Network Module
//!
//! This module provides the [`Link`], a prioritised, heartbeat monitored message channel between
//! the rover and the ground station. The link is best effort: messages are never retransmitted and
//! the loss of the peer is only detected by missing heartbeat replies.
//!
//! The default transport is a ZMQ `PAIR` socket, one end of which binds while the other connects.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod link;
pub mod msg;
mod queue;
pub mod transport;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use util::params::{check_non_negative, check_positive, InvalidParam};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use link::{Link, LinkCore};
pub use msg::{ClassGrid, Message, Payload, Priority};
pub use queue::OutboundQueue;
pub use transport::{ChannelTransport, LinkTransport, SendOutcome, ZmqTransport};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of a [`Link`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParams {
    /// Host to connect to, unused when binding.
    pub host: String,

    pub port: u16,

    /// If true this end of the link binds to the port, otherwise it connects to `host`.
    pub bind: bool,

    /// Polling rate of the worker in normal operation.
    ///
    /// Units: Hz
    pub fast_rate_hz: f64,

    /// Polling rate of the worker while sleeping.
    ///
    /// Units: Hz
    pub slow_rate_hz: f64,

    /// Minimum time between heartbeat pings.
    ///
    /// Units: seconds
    pub ping_interval_s: f64,

    /// Time after which an unanswered ping marks the link as disconnected.
    ///
    /// Units: seconds
    pub ping_timeout_s: f64,

    /// `ZMQ_LINGER` of the socket.
    ///
    /// Units: milliseconds
    pub linger_ms: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Round trip time of the link as measured by the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Latency {
    /// No reply to the last ping was received within the timeout, or no ping has been answered
    /// yet.
    Disconnected,

    Measured(Duration),
}

#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),

    #[error("Could not bind or connect to {0}: {1}")]
    ConnectError(String, zmq::Error),

    #[error("Socket error: {0}")]
    SocketError(zmq::Error),

    #[error("Could not serialise message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialise message: {0}")]
    DeserializationError(serde_json::Error),

    #[error("Could not spawn the link worker thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The link worker thread panicked")]
    WorkerPanicked,

    #[error("Invalid link parameters: {0}")]
    InvalidParams(InvalidParam),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinkParams {
    /// The ZMQ endpoint of this end of the link.
    pub fn endpoint(&self) -> String {
        if self.bind {
            format!("tcp://*:{}", self.port)
        } else {
            format!("tcp://{}:{}", self.host, self.port)
        }
    }

    /// Check that the worker can run with these parameters.
    pub fn validate(&self) -> Result<(), InvalidParam> {
        check_positive("link.fast_rate_hz", self.fast_rate_hz)?;
        check_positive("link.slow_rate_hz", self.slow_rate_hz)?;
        check_non_negative("link.ping_interval_s", self.ping_interval_s)?;
        check_non_negative("link.ping_timeout_s", self.ping_timeout_s)
    }
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 42069,
            bind: false,
            fast_rate_hz: 200.0,
            slow_rate_hz: 10.0,
            ping_interval_s: 0.5,
            ping_timeout_s: 3.0,
            linger_ms: 0,
        }
    }
}

impl Latency {
    pub fn is_connected(&self) -> bool {
        matches!(self, Latency::Measured(_))
    }

    /// Latency in seconds, infinite when disconnected.
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            Latency::Disconnected => f64::INFINITY,
            Latency::Measured(d) => d.as_secs_f64(),
        }
    }
}

impl Default for Latency {
    fn default() -> Self {
        Latency::Disconnected
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Disconnected => write!(f, "??? ms"),
            Latency::Measured(d) => write!(f, "{:.2} ms", d.as_secs_f64() * 1000.0),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_latency_display() {
        assert_eq!(Latency::Disconnected.to_string(), "??? ms");
        assert_eq!(
            Latency::Measured(Duration::from_micros(12_340)).to_string(),
            "12.34 ms"
        );
        assert_eq!(Latency::Disconnected.as_secs_f64(), f64::INFINITY);
        assert!(!Latency::default().is_connected());
    }

    #[test]
    fn test_endpoint() {
        let mut p = LinkParams::default();
        assert_eq!(p.endpoint(), "tcp://localhost:42069");

        p.bind = true;
        p.port = 5000;
        assert_eq!(p.endpoint(), "tcp://*:5000");
    }

    #[test]
    fn test_params_partial_toml() {
        let p: LinkParams = util::params::from_str("bind = true\nping_timeout_s = 1.5").unwrap();
        assert!(p.bind);
        assert_eq!(p.ping_timeout_s, 1.5);
        assert_eq!(p.port, 42069);
    }

    #[test]
    fn test_params_validate() {
        assert!(LinkParams::default().validate().is_ok());

        let p: LinkParams = util::params::from_str("slow_rate_hz = 0.0").unwrap();
        assert_eq!(p.validate().unwrap_err().name, "link.slow_rate_hz");

        let p: LinkParams = util::params::from_str("fast_rate_hz = -5.0").unwrap();
        assert!(p.validate().is_err());

        let p: LinkParams = util::params::from_str("ping_timeout_s = -1.0").unwrap();
        assert!(p.validate().is_err());
    }
}
