//! # Pose estimator state
//!
//! [`PoseEstCore`] performs one cycle of the estimator at a given instant: it reads and decodes
//! the controller's frames, integrates the pose, and transmits the motor demands. [`PoseEstimator`]
//! runs the core on a background thread.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, trace, warn};
use serde::Serialize;
use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

use comms_if::eqpt::ctrl::{CtrlFrame, GpsFrame, ImuFrame, LineBuffer, MotorCmd, MotorFrame};
use util::{angle::Angle, params::InvalidParam, rate::Rate, time::seconds_to_duration};

use super::{CtrlPort, Params, Pose, PositionLogger, SerialCtrlPort};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Connection state of the controller's sensors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorStatus {
    pub gps_connected: bool,
    pub imu_connected: bool,
    pub motors_connected: bool,

    /// The most recent GPS frame, if any has been received.
    pub last_fix: Option<GpsFrame>,

    /// The most recent encoder counts.
    pub encoders: Option<MotorFrame>,
}

/// State shared between the estimator handle and the worker.
#[derive(Clone)]
struct Shared {
    pose: Arc<Mutex<Pose>>,

    logger: Arc<Mutex<PositionLogger>>,

    motor_cmd: Arc<Mutex<MotorCmd>>,

    status: Arc<Mutex<SensorStatus>>,

    state: Arc<Mutex<EstimatorState>>,

    /// Set by the handle, cleared by the worker once the IMU has been zeroed.
    calibrate: Arc<AtomicBool>,
}

/// Time at which each frame type was last received.
#[derive(Debug, Default)]
struct LastSeen {
    gps: Option<Instant>,
    imu: Option<Instant>,
    motors: Option<Instant>,
}

/// A pose estimator without a thread of its own.
///
/// Call [`PoseEstCore::cycle`] periodically to service the controller.
pub struct PoseEstCore {
    params: Params,

    port: Box<dyn CtrlPort>,

    lines: LineBuffer,

    shared: Shared,

    /// Time the first cycle was run, the start of the grace period.
    started: Option<Instant>,

    motor_rate: Rate,

    log_rate: Rate,

    sensor_timeout: Duration,

    last_seen: LastSeen,

    yaw: Angle,
    pitch: Angle,
    roll: Angle,

    /// Latest encoder counts
    enc: Option<MotorFrame>,

    /// Encoder counts used in the last integration
    last_enc: Option<MotorFrame>,

    last_fix: Option<GpsFrame>,
}

/// The pose estimator, owning the serial connection to the controller and a worker thread.
pub struct PoseEstimator {
    params: Params,

    shared: Shared,

    running: Arc<AtomicBool>,

    /// The core while the worker is not running
    core: Option<PoseEstCore>,

    worker: Option<thread::JoinHandle<PoseEstCore>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Lifecycle of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EstimatorState {
    /// Created but never cycled
    Idle,

    /// Waiting for the controller to boot, all input is discarded.
    Starting,

    Running,

    /// Worker joined and serial port closed. The estimator cannot be restarted.
    Stopped,
}

#[derive(Debug, Error)]
pub enum PoseEstError {
    #[error("Could not open the serial port {0}: {1}")]
    SerialOpenError(String, serialport::Error),

    #[error("Serial port error: {0}")]
    PortError(io::Error),

    #[error("The estimator has been stopped and cannot be restarted")]
    Stopped,

    #[error("Could not spawn the estimator worker thread: {0}")]
    SpawnError(io::Error),

    #[error("The estimator worker thread panicked")]
    WorkerPanicked,

    #[error("Invalid pose estimator parameters: {0}")]
    InvalidParams(InvalidParam),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Shared {
    fn new(params: &Params) -> Self {
        Self {
            pose: Arc::new(Mutex::new(Pose::default())),
            logger: Arc::new(Mutex::new(PositionLogger::new(
                params.straight_angle_error_deg,
            ))),
            motor_cmd: Arc::new(Mutex::new(MotorCmd::default())),
            status: Arc::new(Mutex::new(SensorStatus::default())),
            state: Arc::new(Mutex::new(EstimatorState::Idle)),
            calibrate: Arc::new(AtomicBool::new(false)),
        }
    }

    fn pose(&self) -> Pose {
        *self.pose.lock().expect("Pose mutex poisoned")
    }

    fn reset_position(&self) {
        self.pose
            .lock()
            .expect("Pose mutex poisoned")
            .reset_position();
    }

    fn state(&self) -> EstimatorState {
        *self.state.lock().expect("Estimator state mutex poisoned")
    }

    fn set_state(&self, state: EstimatorState) {
        *self.state.lock().expect("Estimator state mutex poisoned") = state;
    }

    fn sensor_status(&self) -> SensorStatus {
        self.status
            .lock()
            .expect("Sensor status mutex poisoned")
            .clone()
    }

    fn going_straight(&self, dist_m: f64) -> bool {
        self.logger
            .lock()
            .expect("Position logger mutex poisoned")
            .going_straight(dist_m)
    }
}

impl LastSeen {
    fn connected(last: Option<Instant>, now: Instant, timeout: Duration) -> bool {
        last.map_or(false, |t| now.saturating_duration_since(t) < timeout)
    }
}

impl PoseEstCore {
    /// Create a new core over the given port.
    pub fn new<P>(port: P, params: &Params) -> Self
    where
        P: CtrlPort + 'static,
    {
        Self::with_shared(Box::new(port), params, Shared::new(params))
    }

    fn with_shared(port: Box<dyn CtrlPort>, params: &Params, shared: Shared) -> Self {
        Self {
            params: params.clone(),
            port,
            lines: LineBuffer::new(),
            shared,
            started: None,
            motor_rate: Rate::new(params.motor_rate_hz),
            log_rate: Rate::new(params.log_rate_hz),
            sensor_timeout: seconds_to_duration(params.sensor_timeout_s),
            last_seen: LastSeen::default(),
            yaw: Angle::default(),
            pitch: Angle::default(),
            roll: Angle::default(),
            enc: None,
            last_enc: None,
            last_fix: None,
        }
    }

    pub fn pose(&self) -> Pose {
        self.shared.pose()
    }

    pub fn state(&self) -> EstimatorState {
        self.shared.state()
    }

    pub fn sensor_status(&self) -> SensorStatus {
        self.shared.sensor_status()
    }

    pub fn set_motor_speed(&self, left: f64, right: f64, aux: f64) {
        *self
            .shared
            .motor_cmd
            .lock()
            .expect("Motor command mutex poisoned") = MotorCmd::new(left, right, aux);
    }

    /// Current attitude as (yaw, pitch, roll).
    pub fn attitude(&self) -> (Angle, Angle, Angle) {
        (self.yaw, self.pitch, self.roll)
    }

    /// Perform one cycle of the estimator at the instant `now`.
    pub fn cycle(&mut self, now: Instant) -> Result<(), PoseEstError> {
        match self.state() {
            EstimatorState::Idle => {
                self.started = Some(now);
                self.shared.set_state(EstimatorState::Starting);
                debug!("Pose estimator waiting {} s for the controller", self.params.startup_s);
                self.wait_for_startup(now)
            }
            EstimatorState::Starting => self.wait_for_startup(now),
            EstimatorState::Running => self.run(now),
            EstimatorState::Stopped => Err(PoseEstError::Stopped),
        }
    }

    /// Discard all input until the grace period is over, then flush the port.
    fn wait_for_startup(&mut self, now: Instant) -> Result<(), PoseEstError> {
        let elapsed = self
            .started
            .map_or(Duration::from_secs(0), |s| now.saturating_duration_since(s));

        if elapsed < seconds_to_duration(self.params.startup_s) {
            let mut discard = vec![0u8; self.port.bytes_available().map_err(PoseEstError::PortError)?];
            if !discard.is_empty() {
                self.port.read(&mut discard).map_err(PoseEstError::PortError)?;
            }
            return Ok(());
        }

        self.port.clear().map_err(PoseEstError::PortError)?;
        self.lines.clear();
        self.shared.set_state(EstimatorState::Running);

        info!("Pose estimator running");

        Ok(())
    }

    fn run(&mut self, now: Instant) -> Result<(), PoseEstError> {
        if self.shared.calibrate.swap(false, Ordering::Relaxed) {
            self.yaw.calibrate();
            self.pitch.calibrate();
            self.roll.calibrate();
            info!("IMU calibrated");
        }

        let read_result = self.read_frames(now);

        let send_result = if self.motor_rate.ready_at(now) {
            let line = self
                .shared
                .motor_cmd
                .lock()
                .expect("Motor command mutex poisoned")
                .to_line();
            self.port
                .write_all(line.as_bytes())
                .map_err(PoseEstError::PortError)
        } else {
            Ok(())
        };

        if self.log_rate.ready_at(now) {
            let pose = self.shared.pose();
            self.shared
                .logger
                .lock()
                .expect("Position logger mutex poisoned")
                .set_pos(&pose);
        }

        self.update_status(now);

        read_result.and(send_result)
    }

    /// Read everything buffered on the port and handle each complete line.
    fn read_frames(&mut self, now: Instant) -> Result<(), PoseEstError> {
        let available = self.port.bytes_available().map_err(PoseEstError::PortError)?;

        if available > 0 {
            let mut buf = vec![0u8; available];
            let n = self.port.read(&mut buf).map_err(PoseEstError::PortError)?;
            self.lines.extend(&buf[..n]);
        }

        while let Some(line) = self.lines.next_line() {
            match CtrlFrame::parse_bytes(&line) {
                Ok(frame) => self.handle_frame(frame, now),
                Err(e) => trace!("Dropping controller line: {}", e),
            }
        }

        Ok(())
    }

    fn handle_frame(&mut self, frame: CtrlFrame, now: Instant) {
        match frame {
            CtrlFrame::Gps(gps) => {
                self.last_seen.gps = Some(now);
                self.last_fix = Some(gps);
            }
            CtrlFrame::Imu(imu) => {
                self.last_seen.imu = Some(now);
                self.integrate(&imu);
            }
            CtrlFrame::Motors(enc) => {
                self.last_seen.motors = Some(now);
                self.enc = Some(enc);
            }
        }
    }

    /// Advance the pose using the encoder counts accumulated since the last IMU frame.
    fn integrate(&mut self, imu: &ImuFrame) {
        self.yaw.set(imu.yaw_deg);
        self.pitch.set(imu.pitch_deg);
        self.roll.set(imu.roll_deg);

        let dist_m = match (self.enc, self.last_enc) {
            (Some(enc), Some(prev)) => self.step_m(&enc, &prev),
            _ => 0.0,
        };
        if self.enc.is_some() {
            self.last_enc = self.enc;
        }

        // Zero heading points along +y
        let dir_rad = (self.yaw.get() + 90.0).to_radians();

        let mut pose = self.shared.pose.lock().expect("Pose mutex poisoned");
        pose.x_m += dist_m * dir_rad.cos();
        pose.y_m += dist_m * dir_rad.sin();
        pose.heading.set(self.yaw.get());

        if let Some(ref fix) = self.last_fix {
            pose.latitude_deg = fix.latitude_deg;
            pose.longitude_deg = fix.longitude_deg;
        }
    }

    /// Mean distance travelled by the wheels between two encoder readings.
    ///
    /// Jumps longer than `max_step_m` are encoder glitches or resets and count as no movement.
    fn step_m(&self, enc: &MotorFrame, prev: &MotorFrame) -> f64 {
        let ticks = (i128::from(enc.enc_left) - i128::from(prev.enc_left))
            + (i128::from(enc.enc_right) - i128::from(prev.enc_right));
        let dist_m = ticks as f64 / 2.0 / self.params.enc_ppm();

        if dist_m.is_finite() && dist_m.abs() <= self.params.max_step_m {
            dist_m
        } else {
            trace!("Dropping encoder jump of {} ticks", ticks);
            0.0
        }
    }

    fn update_status(&self, now: Instant) {
        let timeout = self.sensor_timeout;
        let mut status = self.shared.status.lock().expect("Sensor status mutex poisoned");

        let gps_connected = LastSeen::connected(self.last_seen.gps, now, timeout);
        let imu_connected = LastSeen::connected(self.last_seen.imu, now, timeout);
        let motors_connected = LastSeen::connected(self.last_seen.motors, now, timeout);

        if (gps_connected, imu_connected, motors_connected)
            != (status.gps_connected, status.imu_connected, status.motors_connected)
        {
            debug!(
                "Sensors connected: GPS {}, IMU {}, motors {}",
                gps_connected, imu_connected, motors_connected
            );
        }

        status.gps_connected = gps_connected;
        status.imu_connected = imu_connected;
        status.motors_connected = motors_connected;
        status.last_fix = self.last_fix.clone();
        status.encoders = self.enc;
    }
}

impl PoseEstimator {
    /// Open the serial port given in the parameters and create an estimator over it.
    ///
    /// The worker is not started until [`PoseEstimator::start`] is called.
    pub fn open(params: &Params) -> Result<Self, PoseEstError> {
        params.validate().map_err(PoseEstError::InvalidParams)?;

        let port = SerialCtrlPort::open(params)?;
        Ok(Self::new(port, params))
    }

    /// Create an estimator over any port.
    pub fn new<P>(port: P, params: &Params) -> Self
    where
        P: CtrlPort + 'static,
    {
        let shared = Shared::new(params);
        let core = PoseEstCore::with_shared(Box::new(port), params, shared.clone());

        Self {
            params: params.clone(),
            shared,
            running: Arc::new(AtomicBool::new(false)),
            core: Some(core),
            worker: None,
        }
    }

    /// Start the worker. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<(), PoseEstError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let core = match self.core.take() {
            Some(c) => c,
            None => return Err(PoseEstError::Stopped),
        };

        self.running.store(true, Ordering::Relaxed);

        let running = self.running.clone();
        let rate_hz = self.params.main_rate_hz;

        let worker = thread::Builder::new()
            .name("pose_est".into())
            .spawn(move || run_worker(core, running, rate_hz))
            .map_err(PoseEstError::SpawnError)?;

        self.worker = Some(worker);

        Ok(())
    }

    /// Stop the worker and close the serial port, blocking until the worker has exited.
    pub fn stop(&mut self) -> Result<(), PoseEstError> {
        self.running.store(false, Ordering::Relaxed);

        let result = match self.worker.take() {
            Some(w) => w.join().map(drop).map_err(|_| PoseEstError::WorkerPanicked),
            None => Ok(()),
        };

        // Dropping the core closes the port
        self.core = None;

        if self.shared.state() != EstimatorState::Stopped {
            self.shared.set_state(EstimatorState::Stopped);
            info!("Pose estimator stopped");
        }

        result
    }

    /// Stage the motor demands sent on the next transmit cycle, each clamped to `[-1, 1]`.
    pub fn set_motor_speed(&self, left: f64, right: f64, aux: f64) {
        *self
            .shared
            .motor_cmd
            .lock()
            .expect("Motor command mutex poisoned") = MotorCmd::new(left, right, aux);
    }

    /// The most recent pose estimate.
    pub fn pose(&self) -> Pose {
        self.shared.pose()
    }

    pub fn sensor_status(&self) -> SensorStatus {
        self.shared.sensor_status()
    }

    /// Move the origin of the local frame to the current position.
    pub fn reset_position(&self) {
        self.shared.reset_position();
        info!("Local position reset");
    }

    /// Zero the IMU so that the current attitude reads as zero.
    pub fn calibrate_imu(&self) {
        self.shared.calibrate.store(true, Ordering::Relaxed);
    }

    pub fn state(&self) -> EstimatorState {
        self.shared.state()
    }

    /// True if the rover has travelled at least `dist_m` without turning.
    pub fn going_straight(&self, dist_m: f64) -> bool {
        self.shared.going_straight(dist_m)
    }
}

impl Drop for PoseEstimator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Error stopping the pose estimator: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn run_worker(mut core: PoseEstCore, running: Arc<AtomicBool>, rate_hz: f64) -> PoseEstCore {
    let mut rate = Rate::new(rate_hz);

    while running.load(Ordering::Relaxed) {
        if let Err(e) = core.cycle(Instant::now()) {
            warn!("Pose estimator: {}", e);
        }

        rate.sleep();
    }

    core
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::pose_est::{MockCtrlHandle, MockCtrlPort};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn params(startup_s: f64) -> Params {
        Params {
            startup_s,
            ..Default::default()
        }
    }

    /// A core which is already running, and the time of its first cycle.
    fn running_core() -> (PoseEstCore, MockCtrlHandle, Instant) {
        let (port, handle) = MockCtrlPort::new();
        let mut core = PoseEstCore::new(port, &params(0.0));
        let t0 = Instant::now();

        core.cycle(t0).unwrap();
        assert_eq!(core.state(), EstimatorState::Running);

        (core, handle, t0)
    }

    fn ms(t: Instant, ms: u64) -> Instant {
        t + Duration::from_millis(ms)
    }

    #[test]
    fn test_startup_grace() {
        let (port, handle) = MockCtrlPort::new();
        let mut core = PoseEstCore::new(port, &params(1.0));
        let t0 = Instant::now();

        assert_eq!(core.state(), EstimatorState::Idle);

        handle.push(b"$IMU,-90000,0,0\r\n");
        core.cycle(t0).unwrap();
        assert_eq!(core.state(), EstimatorState::Starting);
        assert_eq!(handle.pending_input(), 0);

        handle.push(b"$IMU,-90000,0,0\r\n");
        core.cycle(ms(t0, 500)).unwrap();
        assert_eq!(core.state(), EstimatorState::Starting);
        assert!(handle.take_output().is_empty());

        // Input received while starting is never used
        assert_eq!(core.pose().heading.get(), 0.0);

        core.cycle(ms(t0, 1100)).unwrap();
        assert_eq!(core.state(), EstimatorState::Running);
        assert_eq!(handle.num_clears(), 1);

        core.set_motor_speed(0.5, -2.0, 0.0);
        core.cycle(ms(t0, 1200)).unwrap();
        assert_eq!(handle.take_output(), b"$JETSON,500,-1000,0,\r\n".to_vec());
    }

    #[test]
    fn test_integration() {
        let (mut core, handle, t0) = running_core();
        let circumference = 0.2159 * PI;

        // Establishes the encoder baseline without moving
        handle.push(b"$MOTORS,1000,1000\r\n$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 10)).unwrap();
        assert_eq!(core.pose().position_m().norm(), 0.0);

        // One wheel revolution straight ahead
        handle.push(b"$MOTORS,3450,3450\r\n$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 20)).unwrap();
        let pose = core.pose();
        assert_relative_eq!(pose.x_m, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y_m, circumference, epsilon = 1e-9);

        // Turn on the spot to face -x, then drive another revolution
        handle.push(b"$MOTORS,3450,5900\r\n$IMU,-90000,0,0\r\n");
        handle.push(b"$MOTORS,5900,8350\r\n$IMU,-90000,0,0\r\n");
        core.cycle(ms(t0, 30)).unwrap();
        let pose = core.pose();
        assert_relative_eq!(pose.heading.get(), 90.0);
        assert_relative_eq!(pose.x_m, -1.5 * circumference, epsilon = 1e-9);
        assert_relative_eq!(pose.y_m, circumference, epsilon = 1e-9);
    }

    #[test]
    fn test_encoder_jumps_dropped() {
        let (mut core, handle, t0) = running_core();

        handle.push(b"$MOTORS,-9223372036854775808,-9223372036854775808\r\n$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 10)).unwrap();
        handle.push(b"$MOTORS,9223372036854775807,9223372036854775807\r\n$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 20)).unwrap();

        assert_eq!(core.state(), EstimatorState::Running);
        assert_eq!(core.pose().position_m().norm(), 0.0);

        // Integration carries on from the new counts
        handle.push(b"$MOTORS,9223372036854774807,9223372036854774807\r\n$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 30)).unwrap();

        let pose = core.pose();
        assert_relative_eq!(pose.x_m, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y_m, -1000.0 / params(0.0).enc_ppm(), epsilon = 1e-9);
        assert!(core.sensor_status().motors_connected);
    }

    #[test]
    fn test_open_rejects_zero_rates() {
        let p = Params {
            port_path: "/definitely/not/a/tty".into(),
            motor_rate_hz: 0.0,
            ..Default::default()
        };

        assert!(matches!(
            PoseEstimator::open(&p),
            Err(PoseEstError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let (mut core, handle, t0) = running_core();

        handle.push(b"garbage\r\n$IMU,abc,0,0\r\n$GPS,1,2\r\n\xff\xfe\r\n$IMU,1000,0,0\r\n");
        core.cycle(ms(t0, 10)).unwrap();

        assert_relative_eq!(core.pose().heading.get(), 359.0);

        let status = core.sensor_status();
        assert!(status.imu_connected);
        assert!(!status.gps_connected);
        assert!(!status.motors_connected);
    }

    #[test]
    fn test_connectivity_timeout() {
        let (mut core, handle, t0) = running_core();

        handle.push(b"$GPS,12,34,10,5,6,2021,515000000,N,12000000,W,1500,0,A,3\r\n");
        handle.push(b"$MOTORS,1,2\r\n");
        core.cycle(ms(t0, 10)).unwrap();

        let status = core.sensor_status();
        assert!(status.gps_connected);
        assert!(status.motors_connected);
        assert_eq!(status.encoders, Some(MotorFrame { enc_left: 1, enc_right: 2 }));

        let fix = status.last_fix.expect("No GPS fix");
        assert_relative_eq!(fix.latitude_deg, 51.5);
        assert_eq!(fix.heading_deg, None);

        core.cycle(ms(t0, 400)).unwrap();
        assert!(core.sensor_status().gps_connected);

        core.cycle(ms(t0, 600)).unwrap();
        let status = core.sensor_status();
        assert!(!status.gps_connected);
        assert!(!status.motors_connected);

        // The last fix is kept
        assert!(status.last_fix.is_some());
    }

    #[test]
    fn test_pose_takes_gps_coords() {
        let (mut core, handle, t0) = running_core();

        handle.push(b"$GPS,12,34,10,5,6,2021,515000000,N,12000000,W,1500,90000,A,3\r\n");
        handle.push(b"$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 10)).unwrap();

        let (lat, lon) = core.pose().coords();
        assert_relative_eq!(lat, 51.5);
        assert_relative_eq!(lon, -1.2);
    }

    #[test]
    fn test_calibrate_imu() {
        let (port, handle) = MockCtrlPort::new();
        let mut est = PoseEstimator::new(port, &params(0.0));
        let mut core = est.core.take().unwrap();
        let t0 = Instant::now();

        core.cycle(t0).unwrap();
        handle.push(b"$IMU,-45000,2000,3000\r\n");
        core.cycle(ms(t0, 10)).unwrap();
        assert_relative_eq!(est.pose().heading.get(), 45.0);

        est.calibrate_imu();
        handle.push(b"$IMU,-50000,2000,3000\r\n");
        core.cycle(ms(t0, 20)).unwrap();

        assert_relative_eq!(est.pose().heading.get(), 5.0, epsilon = 1e-9);
        let (_, pitch, roll) = core.attitude();
        assert_relative_eq!(pitch.get(), 0.0);
        assert_relative_eq!(roll.get(), 0.0);
    }

    #[test]
    fn test_reset_position() {
        let (port, handle) = MockCtrlPort::new();
        let mut est = PoseEstimator::new(port, &params(0.0));
        let mut core = est.core.take().unwrap();
        let t0 = Instant::now();

        core.cycle(t0).unwrap();
        handle.push(b"$MOTORS,0,0\r\n$IMU,0,0,0\r\n$MOTORS,2450,2450\r\n$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 10)).unwrap();
        assert!(est.pose().y_m > 0.5);

        est.reset_position();
        assert_eq!(est.pose().position_m().norm(), 0.0);

        handle.push(b"$MOTORS,4900,4900\r\n$IMU,0,0,0\r\n");
        core.cycle(ms(t0, 20)).unwrap();
        assert_relative_eq!(est.pose().y_m, 0.2159 * PI, epsilon = 1e-9);
    }

    #[test]
    fn test_threaded_lifecycle() {
        let (port, handle) = MockCtrlPort::new();
        let mut est = PoseEstimator::new(port, &params(0.0));

        est.set_motor_speed(0.25, 0.25, 1.0);
        est.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut output = Vec::new();
        while Instant::now() < deadline && output.is_empty() {
            output = handle.take_output();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(output.starts_with(b"$JETSON,250,250,1000,\r\n"));
        assert_eq!(est.state(), EstimatorState::Running);

        est.stop().unwrap();
        assert_eq!(est.state(), EstimatorState::Stopped);
        assert!(matches!(est.start(), Err(PoseEstError::Stopped)));
    }
}
