//! # Ground station executable
//!
//! Connects to the rover over the link, forwards operator commands typed into the console and
//! reports the telemetry the rover sends back.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod console;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::sync::mpsc::TryRecvError;

// Internal
use comms_if::{
    net::{Link, Payload, Priority},
    tc::RcDemand,
    tm::RoverStatus,
};
use console::ConsoleCmd;
use params::GndExecParams;
use util::{
    logger::{logger_init, LevelFilter},
    rate::Rate,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("gnd_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Info, &session).wrap_err("Failed to initialise logging")?;

    info!("Ground Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    let params: GndExecParams =
        util::params::load("gnd_exec.toml").wrap_err("Could not load gnd_exec params")?;
    params.validate().wrap_err("Invalid gnd_exec params")?;

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let mut link =
        Link::zmq("ground", &zmq_ctx, &params.link).wrap_err("Failed to initialise the link")?;
    link.start().wrap_err("Failed to start the link")?;

    info!("Connecting to {}", params.link.endpoint());

    // ---- CONSOLE ----

    let console = console::spawn().wrap_err("Failed to start the console")?;

    // ---- MAIN LOOP ----

    let mut main_rate = Rate::new(params.main_rate_hz);
    let mut rc_rate = Rate::new(params.rc_send_rate_hz);

    let mut rc_demand: Option<RcDemand> = None;
    let mut last_status: Option<RoverStatus> = None;

    'main: loop {
        // ---- CONSOLE INPUT ----

        loop {
            let line = match console.try_recv() {
                Ok(l) => l,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Console closed, exiting");
                    break 'main;
                }
            };

            match ConsoleCmd::parse(&line) {
                Ok(Some(ConsoleCmd::Rc(demand))) => {
                    if rc_demand.is_none() {
                        info!("RC started");
                    }
                    rc_demand = Some(demand);
                    link.send(Payload::Rc(demand), Priority::Med);
                }
                Ok(Some(ConsoleCmd::RcStop)) => {
                    info!("RC stopped");
                    rc_demand = None;
                }
                Ok(Some(ConsoleCmd::Latency)) => info!("Latency: {}", link.latency()),
                Ok(Some(ConsoleCmd::Cmd(cmd))) => {
                    link.send(Payload::Cmd(cmd), Priority::High);
                }
                Ok(None) => (),
                Err(e) => warn!("{}", e),
            }
        }

        // The rover stops the motors if demands stop arriving
        if let Some(demand) = rc_demand {
            if rc_rate.ready() {
                link.send(Payload::Rc(demand), Priority::Med);
            }
        }

        // ---- TELEMETRY ----

        while let Some(msg) = link.receive() {
            match msg.data {
                Payload::Status(status) => {
                    if last_status != Some(status) {
                        info!("Rover status: {:?}", status);
                        last_status = Some(status);
                    }

                    if !status.power {
                        info!("Rover has powered down, exiting");
                        break 'main;
                    }
                }
                Payload::ImageStream(jpeg) => debug!("Frame received ({} bytes)", jpeg.len()),
                Payload::MapStream(map) => debug!("Map received ({:?})", map.dim()),
                Payload::InferenceStream(grid) => {
                    debug!("Inference received ({:?})", grid.dim())
                }
                other => debug!("Ignoring unexpected message from {}: {:?}", msg.sender, other),
            }
        }

        main_rate.sleep();
    }

    // ---- SHUTDOWN ----

    link.stop().wrap_err("Failed to stop the link")?;

    info!("End of execution");

    Ok(())
}
