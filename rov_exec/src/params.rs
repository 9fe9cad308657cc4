//! # Rover Executable Parameters
//!
//! This module provide parameters for the rover executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::net::LinkParams;
use util::params::{check_non_negative, check_non_zero, check_positive, InvalidParam};

use crate::{map::MapParams, per::CameraGeometry, pose_est};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RovExecParams {
    /// The rover's end of the link to the ground station, which binds.
    pub link: LinkParams,

    pub pose_est: pose_est::Params,

    pub camera: CameraGeometry,

    pub map: MapParams,

    // ---- RATES ----

    /// Units: Hz
    pub main_rate_hz: f64,

    /// Units: Hz
    pub status_rate_hz: f64,

    /// Rate at which camera frames are streamed to the ground.
    ///
    /// Units: Hz
    pub stream_rate_hz: f64,

    /// Rate at which frames are saved while image logging is enabled.
    ///
    /// Units: Hz
    pub img_save_rate_hz: f64,

    /// Units: Hz
    pub map_send_rate_hz: f64,

    // ---- MISC ----

    /// Time after the last RC demand at which the motors are stopped.
    ///
    /// Units: seconds
    pub rc_timeout_s: f64,

    /// Quality of streamed JPEG frames, 1-100
    pub jpeg_quality: u8,

    /// Projected points further than this from the rover are not mapped.
    ///
    /// Units: meters
    pub projection_cutoff_m: f64,

    /// Number of frames held by the camera frame buffer
    pub frame_buffer_size: usize,

    /// Dimensions of the classifier output as (height, width)
    pub inference_dims: (usize, usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for RovExecParams {
    fn default() -> Self {
        Self {
            link: LinkParams {
                bind: true,
                ..Default::default()
            },
            pose_est: pose_est::Params::default(),
            camera: CameraGeometry::default(),
            map: MapParams::default(),
            main_rate_hz: 60.0,
            status_rate_hz: 3.0,
            stream_rate_hz: 15.0,
            img_save_rate_hz: 0.75,
            map_send_rate_hz: 2.0,
            rc_timeout_s: 0.5,
            jpeg_quality: 100,
            projection_cutoff_m: 5.0,
            frame_buffer_size: 8,
            inference_dims: (23, 30),
        }
    }
}

impl RovExecParams {
    /// Check every rate, scale and size the executable relies on.
    pub fn validate(&self) -> Result<(), InvalidParam> {
        self.link.validate()?;
        self.pose_est.validate()?;

        check_positive("main_rate_hz", self.main_rate_hz)?;
        check_positive("status_rate_hz", self.status_rate_hz)?;
        check_positive("stream_rate_hz", self.stream_rate_hz)?;
        check_positive("img_save_rate_hz", self.img_save_rate_hz)?;
        check_positive("map_send_rate_hz", self.map_send_rate_hz)?;
        check_non_negative("rc_timeout_s", self.rc_timeout_s)?;
        check_non_negative("projection_cutoff_m", self.projection_cutoff_m)?;
        check_non_zero("frame_buffer_size", self.frame_buffer_size)?;

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(InvalidParam {
                name: "jpeg_quality".into(),
                reason: format!("expected 1-100, found {}", self.jpeg_quality),
            });
        }

        check_positive("map.scale_m", self.map.scale_m)?;
        check_non_negative("map.size_m", self.map.size_m)?;
        check_non_zero("map.num_classes", self.map.num_classes)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nested_tables() {
        let p: RovExecParams = util::params::from_str(
            r#"
            main_rate_hz = 50.0

            [link]
            port = 5000

            [pose_est]
            port_path = "/dev/ttyUSB0"

            [map]
            scale_m = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(p.main_rate_hz, 50.0);
        assert_eq!(p.link.port, 5000);

        // A [link] table starts from the link defaults, so parameter files must set bind
        assert!(!p.link.bind);

        assert_eq!(p.pose_est.port_path, "/dev/ttyUSB0");
        assert_eq!(p.pose_est.baud_rate, 115_200);
        assert_eq!(p.map.scale_m, 0.25);
        assert_eq!(p.map.num_classes, 4);
        assert_eq!(p.camera.fov_deg, 160.0);

        assert!(RovExecParams::default().link.bind);
    }

    #[test]
    fn test_validate() {
        assert!(RovExecParams::default().validate().is_ok());

        let invalid = |toml: &str| {
            util::params::from_str::<RovExecParams>(toml)
                .unwrap()
                .validate()
                .unwrap_err()
                .name
        };

        assert_eq!(invalid("main_rate_hz = 0.0"), "main_rate_hz");
        assert_eq!(invalid("frame_buffer_size = 0"), "frame_buffer_size");
        assert_eq!(invalid("jpeg_quality = 0"), "jpeg_quality");
        assert_eq!(invalid("[link]\nslow_rate_hz = 0.0"), "link.slow_rate_hz");
        assert_eq!(invalid("[pose_est]\nlog_rate_hz = -1.0"), "pose_est.log_rate_hz");
        assert_eq!(invalid("[map]\nscale_m = 0.0"), "map.scale_m");
    }
}
