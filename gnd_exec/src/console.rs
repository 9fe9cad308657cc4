//! # Console
//!
//! Reads command lines from the operator on a background thread and parses them into
//! [`ConsoleCmd`]s for the main loop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::{
    sync::mpsc::{self, Receiver},
    thread,
};
use thiserror::Error;

use comms_if::tc::RcDemand;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const PROMPT: &str = "rover $ ";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A line entered at the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCmd {
    /// Start or update remote control with this demand
    Rc(RcDemand),

    /// Stop sending RC demands
    RcStop,

    /// Print the current link latency
    Latency,

    /// Anything else is forwarded to the rover as a command string
    Cmd(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("Expected \"rc <forward> <steer>\" or \"rc stop\"")]
    InvalidRc,

    #[error("Could not parse \"{0}\" as a number")]
    InvalidNumber(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConsoleCmd {
    /// Parse a console line. Returns `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();

        let mut words = line.split_whitespace();

        match words.next() {
            None => Ok(None),
            Some("lat") => Ok(Some(ConsoleCmd::Latency)),
            Some("rc") => {
                let args: Vec<&str> = words.collect();

                match args.as_slice() {
                    ["stop"] => Ok(Some(ConsoleCmd::RcStop)),
                    [forward, steer] => Ok(Some(ConsoleCmd::Rc(RcDemand::new(
                        parse_num(forward)?,
                        parse_num(steer)?,
                    )))),
                    _ => Err(ConsoleError::InvalidRc),
                }
            }
            Some(_) => Ok(Some(ConsoleCmd::Cmd(line.into()))),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Start the console thread.
///
/// Each line entered is sent as a raw string. The channel disconnects when the operator ends the
/// console with Ctrl-C or Ctrl-D.
pub fn spawn() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    warn!("Could not start the console: {}", e);
                    return;
                }
            };

            loop {
                match rl.readline(PROMPT) {
                    Ok(line) => {
                        let _ = rl.add_history_entry(line.as_str());
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        info!("Console closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Console error: {}", e);
                        break;
                    }
                }
            }
        })?;

    Ok(rx)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_num(s: &str) -> Result<f64, ConsoleError> {
    s.parse()
        .map_err(|_| ConsoleError::InvalidNumber(s.into()))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ConsoleCmd::parse("   "), Ok(None));
        assert_eq!(ConsoleCmd::parse("lat"), Ok(Some(ConsoleCmd::Latency)));
        assert_eq!(ConsoleCmd::parse("rc stop"), Ok(Some(ConsoleCmd::RcStop)));
        assert_eq!(
            ConsoleCmd::parse(" rc 0.5  -0.25"),
            Ok(Some(ConsoleCmd::Rc(RcDemand::new(0.5, -0.25))))
        );
        assert_eq!(
            ConsoleCmd::parse("REC "),
            Ok(Some(ConsoleCmd::Cmd("REC".into())))
        );
    }

    #[test]
    fn test_parse_rc_errors() {
        assert_eq!(ConsoleCmd::parse("rc"), Err(ConsoleError::InvalidRc));
        assert_eq!(ConsoleCmd::parse("rc 1 2 3"), Err(ConsoleError::InvalidRc));
        assert_eq!(
            ConsoleCmd::parse("rc fast 0"),
            Err(ConsoleError::InvalidNumber("fast".into()))
        );
    }

    #[test]
    fn test_rc_demand_clamped() {
        assert_eq!(
            ConsoleCmd::parse("rc 3 -2"),
            Ok(Some(ConsoleCmd::Rc(RcDemand::new(1.0, -1.0))))
        );
    }
}
