//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands arrive at the rover either as plain command strings typed into the
//! ground station console, or as remote control demands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A remote control demand from the ground station.
///
/// Both axes are normalised to `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RcDemand {
    /// Forward demand, positive is forwards.
    pub forward: f64,

    /// Steer demand, positive turns to the right.
    pub steer: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Telecommands understood by the rover.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum Tc {
    /// Shut down the rover executable
    Quit,

    /// Start logging images to the session directory
    Record,

    /// Leave remote control mode and stop logging images
    Stop,

    /// Put the link into its low rate polling mode
    Sleep,

    /// Return the link to its high rate polling mode
    Wake
}

/// Possible parsing errors.
#[derive(Debug, Error, PartialEq)]
pub enum TcParseError {
    #[error("The TC is empty")]
    Empty,

    #[error("{0} is not a recognised TC")]
    InvalidType(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a TC from a command string. Commands are case insensitive and surrounding whitespace
    /// is ignored.
    pub fn from_cmd(cmd: &str) -> Result<Self, TcParseError> {
        let cmd = cmd.trim();

        if cmd.is_empty() {
            return Err(TcParseError::Empty)
        }

        match cmd.to_lowercase().as_str() {
            "quit" | "exit" => Ok(Tc::Quit),
            "rec" => Ok(Tc::Record),
            "stop" => Ok(Tc::Stop),
            "sleep" => Ok(Tc::Sleep),
            "wake" => Ok(Tc::Wake),
            _ => Err(TcParseError::InvalidType(cmd.into()))
        }
    }
}

impl RcDemand {
    /// Create a new demand, clamping both axes into `[-1, 1]`.
    pub fn new(forward: f64, steer: f64) -> Self {
        Self {
            forward: util::maths::clamp(forward, -1.0, 1.0),
            steer: util::maths::clamp(steer, -1.0, 1.0)
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_cmd() {
        assert_eq!(Tc::from_cmd("quit"), Ok(Tc::Quit));
        assert_eq!(Tc::from_cmd("EXIT"), Ok(Tc::Quit));
        assert_eq!(Tc::from_cmd("  rec\n"), Ok(Tc::Record));
        assert_eq!(Tc::from_cmd("Stop"), Ok(Tc::Stop));
        assert_eq!(Tc::from_cmd("sleep"), Ok(Tc::Sleep));
        assert_eq!(Tc::from_cmd("wake"), Ok(Tc::Wake));

        assert_eq!(Tc::from_cmd(""), Err(TcParseError::Empty));
        assert_eq!(
            Tc::from_cmd("dance"),
            Err(TcParseError::InvalidType("dance".into()))
        );
    }

    #[test]
    fn test_rc_clamped() {
        let d = RcDemand::new(1.5, -3.0);
        assert_eq!(d, RcDemand { forward: 1.0, steer: -1.0 });
    }
}
