//! # Motor/sensor controller protocol
//!
//! The rover's microcontroller speaks a line based ASCII protocol over a serial port. Every line
//! begins with [`START_CHAR`] followed by a frame tag and comma separated fields:
//!
//! ```text
//! $GPS,sec,min,hr,day,mon,yr,lat_raw,N|S,lon_raw,E|W,speed_mm_s,heading_mdeg,status,mode
//! $IMU,yaw_mdeg,pitch_mdeg,roll_mdeg
//! $MOTORS,enc_left,enc_right
//! ```
//!
//! The only frame sent to the controller is the motor demand:
//!
//! ```text
//! $JETSON,left_milli,right_milli,aux_milli,
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Character every frame starts with
pub const START_CHAR: char = '$';

/// Tag of the GPS frame
pub const GPS_TAG: &str = "GPS";

/// Tag of the IMU frame
pub const IMU_TAG: &str = "IMU";

/// Tag of the motor encoder frame
pub const MOTORS_TAG: &str = "MOTORS";

/// Tag of the outbound motor demand frame
pub const MOTOR_CMD_TAG: &str = "JETSON";

/// Raw GPS coordinates are in units of 1e-7 degrees
const GPS_COORD_SCALE: f64 = 1e7;

/// Lines longer than this without a terminator are discarded by the [`LineBuffer`].
const MAX_LINE_LEN: usize = 256;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// UTC time reported by the GPS receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsTime {
    pub second: u32,
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

/// A GPS fix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsFrame {
    pub time: GpsTime,

    /// Latitude, negative in the southern hemisphere.
    ///
    /// Units: degrees
    pub latitude_deg: f64,

    /// Longitude, negative in the western hemisphere.
    ///
    /// Units: degrees
    pub longitude_deg: f64,

    /// Units: meters/second
    pub ground_speed_ms: f64,

    /// Heading of motion, `None` when the receiver reports exactly zero which it does when the
    /// heading is not known.
    ///
    /// Units: degrees
    pub heading_deg: Option<f64>,

    pub status: String,

    pub mode: String,
}

/// Attitude from the IMU.
///
/// Yaw has already had its sign inverted so that it increases anticlockwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuFrame {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

/// Cumulative encoder counts of the left and right drive motors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorFrame {
    pub enc_left: i64,
    pub enc_right: i64,
}

/// Power demands for the motors, each in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCmd {
    pub left: f64,
    pub right: f64,

    /// Auxiliary (mower) motor
    pub aux: f64,
}

/// Splits a stream of bytes read from the serial port into lines.
///
/// Lines are terminated by `\n`, any `\r` at either end of a line is removed.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A frame received from the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CtrlFrame {
    Gps(GpsFrame),
    Imu(ImuFrame),
    Motors(MotorFrame),
}

/// Errors which can occur while parsing a single line. None of these are fatal, the line should
/// just be dropped.
#[derive(Debug, Error, PartialEq)]
pub enum CtrlParseError {
    #[error("Line is not valid UTF-8")]
    InvalidEncoding,

    #[error("Line does not begin with the start character")]
    NoStartChar,

    #[error("Unrecognised frame tag \"{0}\"")]
    UnknownFrame(String),

    #[error("{frame} frame is missing field {index}")]
    MissingField { frame: &'static str, index: usize },

    #[error("{frame} frame field {index} (\"{value}\") is not a valid number")]
    InvalidField {
        frame: &'static str,
        index: usize,
        value: String,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlFrame {
    /// Parse a raw line, as returned by the [`LineBuffer`].
    pub fn parse_bytes(line: &[u8]) -> Result<Self, CtrlParseError> {
        let line = std::str::from_utf8(line).map_err(|_| CtrlParseError::InvalidEncoding)?;
        Self::parse(line)
    }

    /// Parse a single line of the protocol.
    ///
    /// Fields beyond those the frame needs are ignored.
    pub fn parse(line: &str) -> Result<Self, CtrlParseError> {
        let line = line.trim();

        if !line.starts_with(START_CHAR) {
            return Err(CtrlParseError::NoStartChar);
        }

        let fields: Vec<&str> = line[START_CHAR.len_utf8()..]
            .split(',')
            .map(|f| f.trim())
            .collect();

        match fields[0] {
            GPS_TAG => {
                let f = Fields::new(GPS_TAG, &fields);

                let time = GpsTime {
                    second: f.num(1)?,
                    minute: f.num(2)?,
                    hour: f.num(3)?,
                    day: f.num(4)?,
                    month: f.num(5)?,
                    year: f.num(6)?,
                };

                let mut latitude_deg = f.num::<f64>(7)? / GPS_COORD_SCALE;
                if f.str(8)? == "S" {
                    latitude_deg = -latitude_deg;
                }

                let mut longitude_deg = f.num::<f64>(9)? / GPS_COORD_SCALE;
                if f.str(10)? == "W" {
                    longitude_deg = -longitude_deg;
                }

                let ground_speed_ms = f.num::<i64>(11)? as f64 / 1000.0;

                let heading_deg = match f.num::<i64>(12)? {
                    0 => None,
                    h => Some(h as f64 / 1000.0),
                };

                Ok(CtrlFrame::Gps(GpsFrame {
                    time,
                    latitude_deg,
                    longitude_deg,
                    ground_speed_ms,
                    heading_deg,
                    status: f.str(13)?.into(),
                    mode: f.str(14)?.into(),
                }))
            }
            IMU_TAG => {
                let f = Fields::new(IMU_TAG, &fields);

                Ok(CtrlFrame::Imu(ImuFrame {
                    yaw_deg: -(f.num::<i64>(1)? as f64) / 1000.0,
                    pitch_deg: f.num::<i64>(2)? as f64 / 1000.0,
                    roll_deg: f.num::<i64>(3)? as f64 / 1000.0,
                }))
            }
            MOTORS_TAG => {
                let f = Fields::new(MOTORS_TAG, &fields);

                Ok(CtrlFrame::Motors(MotorFrame {
                    enc_left: f.num(1)?,
                    enc_right: f.num(2)?,
                }))
            }
            tag => Err(CtrlParseError::UnknownFrame(tag.into())),
        }
    }
}

impl GpsTime {
    /// Convert into a chrono timestamp, `None` if the receiver has not yet got a valid time.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(self.hour, self.minute, self.second)
    }
}

impl MotorCmd {
    /// Create a new command, clamping each power into `[-1, 1]`.
    pub fn new(left: f64, right: f64, aux: f64) -> Self {
        Self {
            left: util::maths::clamp(left, -1.0, 1.0),
            right: util::maths::clamp(right, -1.0, 1.0),
            aux: util::maths::clamp(aux, -1.0, 1.0),
        }
    }

    /// Format the command as a protocol line, including the terminator.
    ///
    /// Powers are sent as integer thousandths, truncated towards zero.
    pub fn to_line(&self) -> String {
        format!(
            "{}{},{},{},{},\r\n",
            START_CHAR,
            MOTOR_CMD_TAG,
            to_milli(self.left),
            to_milli(self.right),
            to_milli(self.aux)
        )
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the port.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes waiting which are not yet part of a complete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pop the next complete line, or `None` if no terminator has been received yet.
    ///
    /// Empty lines are skipped.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let pos = match self.buf.iter().position(|&b| b == b'\n') {
                Some(p) => p,
                None => {
                    // Garbage with no terminator would otherwise grow forever
                    if self.buf.len() > MAX_LINE_LEN {
                        self.buf.clear();
                    }
                    return None;
                }
            };

            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();

            while line.first() == Some(&b'\r') {
                line.remove(0);
            }
            while line.last() == Some(&b'\r') {
                line.pop();
            }

            if !line.is_empty() {
                return Some(line);
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE
// ------------------------------------------------------------------------------------------------

/// Indexed access into the fields of a frame with errors tagged by frame and index.
struct Fields<'a> {
    frame: &'static str,
    fields: &'a [&'a str],
}

impl<'a> Fields<'a> {
    fn new(frame: &'static str, fields: &'a [&'a str]) -> Self {
        Self { frame, fields }
    }

    fn str(&self, index: usize) -> Result<&'a str, CtrlParseError> {
        self.fields
            .get(index)
            .copied()
            .ok_or(CtrlParseError::MissingField {
                frame: self.frame,
                index,
            })
    }

    fn num<T: FromStr>(&self, index: usize) -> Result<T, CtrlParseError> {
        let value = self.str(index)?;
        value.parse().map_err(|_| CtrlParseError::InvalidField {
            frame: self.frame,
            index,
            value: value.into(),
        })
    }
}

fn to_milli(power: f64) -> i32 {
    (power * 1000.0) as i32
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
