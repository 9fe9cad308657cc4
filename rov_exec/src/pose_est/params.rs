//! Parameters structure for the pose estimator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::f64::consts::PI;
use util::params::{check_non_negative, check_positive, InvalidParam};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the pose estimator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- SERIAL ----

    /// Path to the controller's serial port
    pub port_path: String,

    pub baud_rate: u32,

    // ---- TIMING ----

    /// A sensor is disconnected if no frame has arrived from it within this time.
    ///
    /// Units: seconds
    pub sensor_timeout_s: f64,

    /// Time after starting during which the controller is ignored while it boots.
    ///
    /// Units: seconds
    pub startup_s: f64,

    /// Rate of the main polling loop.
    ///
    /// Units: Hz
    pub main_rate_hz: f64,

    /// Rate at which motor demands are sent to the controller.
    ///
    /// Units: Hz
    pub motor_rate_hz: f64,

    /// Rate at which the position logger is updated.
    ///
    /// Units: Hz
    pub log_rate_hz: f64,

    // ---- GEOMETRY ----

    /// Encoder pulses per wheel revolution
    pub enc_ppr: f64,

    /// Units: meters
    pub wheel_diameter_m: f64,

    /// Heading changes smaller than this are not counted as turns by the position logger.
    ///
    /// Units: degrees
    pub straight_angle_error_deg: f64,

    /// Longest distance the rover can plausibly cover between two IMU frames.
    ///
    /// Units: meters
    pub max_step_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Encoder pulses per meter travelled.
    pub fn enc_ppm(&self) -> f64 {
        self.enc_ppr / (self.wheel_diameter_m * PI)
    }

    pub fn validate(&self) -> Result<(), InvalidParam> {
        check_positive("pose_est.main_rate_hz", self.main_rate_hz)?;
        check_positive("pose_est.motor_rate_hz", self.motor_rate_hz)?;
        check_positive("pose_est.log_rate_hz", self.log_rate_hz)?;
        check_non_negative("pose_est.sensor_timeout_s", self.sensor_timeout_s)?;
        check_non_negative("pose_est.startup_s", self.startup_s)?;
        check_positive("pose_est.enc_ppr", self.enc_ppr)?;
        check_positive("pose_est.wheel_diameter_m", self.wheel_diameter_m)?;
        check_positive("pose_est.max_step_m", self.max_step_m)
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            port_path: "/dev/ttyACM0".into(),
            baud_rate: 115_200,
            sensor_timeout_s: 0.5,
            startup_s: 5.0,
            main_rate_hz: 150.0,
            motor_rate_hz: 30.0,
            log_rate_hz: 30.0,
            // 1176 pulses per motor revolution through a 25:12 reduction
            enc_ppr: 1176.0 * 25.0 / 12.0,
            wheel_diameter_m: 0.2159,
            straight_angle_error_deg: 5.0,
            max_step_m: 1.0,
        }
    }
}
