//! # Data Store

use log::info;

use comms_if::tm::RoverStatus;

use crate::{loco_ctrl::LocoCtrl, map::OccupancyMap, params::RovExecParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Status reported to the ground
    pub status: RoverStatus,

    // LocoCtrl
    pub loco_ctrl: LocoCtrl,

    // Mapping
    pub map: OccupancyMap,

    /// Number of points added to the map so far
    pub num_mapped_points: usize,

    /// Number of images saved this session
    pub num_images_saved: usize,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(params: &RovExecParams) -> Self {
        Self {
            num_cycles: 0,
            status: RoverStatus {
                running: true,
                ..Default::default()
            },
            loco_ctrl: LocoCtrl::new(util::time::seconds_to_duration(params.rc_timeout_s)),
            map: OccupancyMap::from_params(&params.map),
            num_mapped_points: 0,
            num_images_saved: 0,
        }
    }

    /// Stop driving and stop logging images.
    pub fn make_safe(&mut self) {
        if self.status.rc || self.status.img_logging {
            info!("Stopping RC and image logging");
        }

        self.loco_ctrl.clear();
        self.status.rc = false;
        self.status.img_logging = false;
    }

    /// Stop the control loop, and let the ground know the rover is powering down.
    pub fn shutdown(&mut self) {
        info!("Shutdown requested");
        self.make_safe();
        self.status.running = false;
        self.status.power = false;
    }

    /// Update the RC flag from locomotion control.
    pub fn sync_rc(&mut self) {
        self.status.rc = self.loco_ctrl.is_active();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::RcDemand;
    use std::time::Instant;

    #[test]
    fn test_make_safe_and_shutdown() {
        let mut ds = DataStore::new(&RovExecParams::default());
        assert!(ds.status.running);
        assert!(ds.status.power);

        ds.loco_ctrl.set_demand(RcDemand::new(1.0, 0.0), Instant::now());
        ds.sync_rc();
        ds.status.img_logging = true;
        assert!(ds.status.rc);

        ds.make_safe();
        assert!(!ds.status.rc);
        assert!(!ds.status.img_logging);
        assert!(!ds.loco_ctrl.is_active());
        assert!(ds.status.running);

        ds.shutdown();
        assert!(!ds.status.running);
        assert!(!ds.status.power);
    }
}
