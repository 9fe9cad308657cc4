//! # Locomotion control module
//!
//! Converts remote control demands from the ground station into motor powers, and stops the rover
//! if the demands stop arriving.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_skid_steer;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::Serialize;
use std::time::{Duration, Instant};

use comms_if::tc::RcDemand;

pub use calc_skid_steer::calc_skid_steer;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds the most recent RC demand until it times out.
#[derive(Debug, Clone)]
pub struct LocoCtrl {
    rc_timeout: Duration,

    /// Latest demand and the time it was received
    current: Option<(RcDemand, Instant)>,
}

/// Side motor powers, each in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OutputData {
    pub left: f64,
    pub right: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocoCtrl {
    pub fn new(rc_timeout: Duration) -> Self {
        Self {
            rc_timeout,
            current: None,
        }
    }

    /// Accept a new demand received at `now`, enabling RC mode.
    pub fn set_demand(&mut self, demand: RcDemand, now: Instant) {
        if self.current.is_none() {
            info!("RC mode enabled");
        }
        self.current = Some((demand, now));
    }

    /// Leave RC mode.
    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            info!("RC mode disabled");
        }
    }

    /// True while in RC mode.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Calculate the motor powers at `now`.
    ///
    /// Returns `None` when not in RC mode. If the last demand is older than the timeout RC mode is
    /// left and the motors are stopped.
    pub fn proc(&mut self, now: Instant) -> Option<OutputData> {
        let (demand, received) = self.current?;

        if now.saturating_duration_since(received) > self.rc_timeout {
            info!("RC demands timed out, stopping");
            self.current = None;
            return Some(OutputData::default());
        }

        Some(calc_skid_steer(&demand))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rc_timeout() {
        let mut lc = LocoCtrl::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert_eq!(lc.proc(t0), None);

        lc.set_demand(RcDemand::new(0.5, 0.0), t0);
        assert!(lc.is_active());
        assert_eq!(
            lc.proc(t0 + Duration::from_millis(400)),
            Some(OutputData {
                left: 0.5,
                right: 0.5
            })
        );

        // Stopped once, then out of RC mode
        assert_eq!(
            lc.proc(t0 + Duration::from_millis(600)),
            Some(OutputData::default())
        );
        assert!(!lc.is_active());
        assert_eq!(lc.proc(t0 + Duration::from_millis(700)), None);
    }

    #[test]
    fn test_new_demand_resets_timeout() {
        let mut lc = LocoCtrl::new(Duration::from_millis(500));
        let t0 = Instant::now();

        lc.set_demand(RcDemand::new(0.0, 0.2), t0);
        lc.set_demand(RcDemand::new(0.0, 0.2), t0 + Duration::from_millis(400));

        let out = lc.proc(t0 + Duration::from_millis(800)).unwrap();
        assert_eq!((out.left, out.right), (0.2, -0.2));

        lc.clear();
        assert!(!lc.is_active());
    }
}
