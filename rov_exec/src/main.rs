//! Main rover-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the link, pose estimator and perception sources
//!     - Main loop:
//!         - Telecommand and RC demand handling
//!         - Locomotion control processing
//!         - Camera frame streaming and saving
//!         - Projection of new inferences into the occupancy map
//!         - Map and status telemetry
//!
//! The link and the pose estimator each run on their own worker thread, the main loop only talks
//! to them through their handles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::{
    thread,
    time::{Duration, Instant},
};

// Internal
use comms_if::net::{Link, Payload, Priority};
use rov_lib::{
    data_store::DataStore,
    img_saver::ImageSaver,
    params::RovExecParams,
    per::{
        encode_jpeg, project_global, FrameSource, InferenceSlot, InferenceSource,
        SharedFrameBuffer,
    },
    pose_est::PoseEstimator,
};
use util::{
    logger::{logger_init, LevelFilter},
    rate::Rate,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Time the workers are given to send the final status and motor demands before being stopped.
const SHUTDOWN_LINGER: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("rov_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Rover Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: RovExecParams =
        util::params::load("rov_exec.toml").wrap_err("Could not load rov_exec params")?;
    params.validate().wrap_err("Invalid rov_exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::new(&params);

    let mut pose_est =
        PoseEstimator::open(&params.pose_est).wrap_err("Failed to open the controller")?;
    info!("PoseEstimator initialised");

    // The capture and classifier pipelines publish into these
    let camera = SharedFrameBuffer::new(params.frame_buffer_size);
    let inference = InferenceSlot::new(params.inference_dims);
    let stream = camera.new_stream();

    let mut img_saver = ImageSaver::new(&session.images_root, "image")
        .wrap_err("Failed to create the image directory")?;

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let mut link =
        Link::zmq("rover", &zmq_ctx, &params.link).wrap_err("Failed to initialise the link")?;

    info!("Network initialisation complete");

    // ---- START WORKERS ----

    link.start().wrap_err("Failed to start the link")?;
    pose_est
        .start()
        .wrap_err("Failed to start the pose estimator")?;

    // ---- MAIN LOOP ----

    let mut main_rate = Rate::new(params.main_rate_hz);
    let mut status_rate = Rate::new(params.status_rate_hz);
    let mut stream_rate = Rate::new(params.stream_rate_hz);
    let mut img_save_rate = Rate::new(params.img_save_rate_hz);
    let mut map_send_rate = Rate::new(params.map_send_rate_hz);

    info!("Begining main loop\n");

    while ds.status.running {
        let now = Instant::now();
        let was_rc = ds.status.rc;

        // ---- TELECOMMAND PROCESSING ----

        while let Some(msg) = link.receive() {
            tc_processor::handle_msg(&mut ds, msg, now);
        }

        link.set_sleep(ds.status.sleeping);

        // ---- LOCOMOTION CONTROL ----

        if let Some(out) = ds.loco_ctrl.proc(now) {
            pose_est.set_motor_speed(out.left, out.right, 0.0);
        } else if was_rc {
            // RC left by command rather than timeout
            pose_est.set_motor_speed(0.0, 0.0, 0.0);
        }
        ds.sync_rc();

        // ---- CAMERA ----

        if let Some((true, frame)) = camera.capture(stream) {
            if stream_rate.ready() {
                match encode_jpeg(&frame, params.jpeg_quality) {
                    Ok(jpeg) => {
                        link.send(Payload::ImageStream(jpeg), Priority::Low);
                    }
                    Err(e) => warn!("Could not encode frame: {}", e),
                }
            }

            if ds.status.img_logging && img_save_rate.ready() {
                match img_saver.save(&frame) {
                    Ok(path) => {
                        ds.num_images_saved += 1;
                        info!("Saved image {:?}", path);
                    }
                    Err(e) => warn!("Could not save image: {}", e),
                }
            }
        }

        // ---- MAPPING ----

        if let Some((true, grid)) = inference.get_inference() {
            match project_global(
                &grid,
                &params.camera,
                &pose_est.pose(),
                params.projection_cutoff_m,
            ) {
                Ok(points) => {
                    ds.num_mapped_points += points.len();
                    ds.map.map_projections(&points, params.map.default_extend);
                }
                Err(e) => warn!("Could not project inference: {}", e),
            }

            if map_send_rate.ready() {
                link.send(Payload::MapStream(ds.map.get_data()), Priority::Low);
            }
        }

        // ---- TELEMETRY ----

        if status_rate.ready() {
            link.send(Payload::Status(ds.status), Priority::Med);

            debug!(
                "Latency {}, pose {:?}, sensors {:?}",
                link.latency(),
                pose_est.pose(),
                pose_est.sensor_status()
            );
        }

        // ---- CYCLE MANAGEMENT ----

        ds.num_cycles += 1;
        main_rate.sleep();
    }

    // ---- SHUTDOWN ----

    // Let the ground know we're going
    link.send(Payload::Status(ds.status), Priority::High);
    pose_est.set_motor_speed(0.0, 0.0, 0.0);
    thread::sleep(SHUTDOWN_LINGER);

    let (cycles, missed) = main_rate.cycles();
    info!(
        "Ran {} cycles ({} overran), mapped {} points, saved {} images",
        cycles, missed, ds.num_mapped_points, ds.num_images_saved
    );

    pose_est
        .stop()
        .wrap_err("Failed to stop the pose estimator")?;
    link.stop().wrap_err("Failed to stop the link")?;

    info!("End of execution");

    Ok(())
}
