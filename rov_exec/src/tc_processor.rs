//! # Telecommand processor module
//!
//! The telecommand processor handles messages coming from the ground station.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::time::Instant;

// Internal
use comms_if::{
    net::{Message, Payload},
    tc::Tc,
};
use rov_lib::data_store::DataStore;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Handle a message received from the ground at `now`.
pub(crate) fn handle_msg(ds: &mut DataStore, msg: Message, now: Instant) {
    match msg.data {
        Payload::Cmd(cmd) => match Tc::from_cmd(&cmd) {
            Ok(tc) => exec(ds, &tc),
            Err(e) => warn!("Could not parse command \"{}\": {}", cmd, e),
        },
        Payload::Rc(demand) => {
            ds.loco_ctrl.set_demand(demand, now);
            ds.sync_rc();
        }
        other => debug!("Ignoring unexpected message from {}: {:?}", msg.sender, other),
    }
}

/// Execute a telecommand.
///
/// Mutates the datastore to send commands to different modules.
pub(crate) fn exec(ds: &mut DataStore, tc: &Tc) {
    match tc {
        Tc::Quit => ds.shutdown(),
        Tc::Record => {
            info!("Image logging enabled");
            ds.status.img_logging = true;
        }
        Tc::Stop => ds.make_safe(),
        Tc::Sleep => ds.status.sleeping = true,
        Tc::Wake => ds.status.sleeping = false,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
