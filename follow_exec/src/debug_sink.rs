//! Debug telemetry sink
//!
//! Records one snapshot of the control loop per cycle into the session
//! directory, so a run can be inspected after the fact. Writes go through the
//! session's background save thread and never block the control path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::track_ctrl::{DriveCommand, FrameObservation, Mode, StatusReport};
use util::session::Session;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Session-relative path the latest record is written to.
const RECORD_PATH: &str = "debug/status.json";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Snapshot of one control cycle.
#[derive(Clone, Serialize)]
pub struct DebugRecord {
    /// Control cycle counter, starting at 0.
    pub cycle: u64,

    /// Session-elapsed time at which the cycle ran.
    pub elapsed_s: f64,

    /// The observation fed into the controller.
    pub obs: FrameObservation,

    /// Controller mode after the cycle.
    pub mode: Mode,

    /// Controller status report for the cycle.
    pub report: StatusReport,

    /// The command issued to the motors.
    pub cmd: DriveCommand,
}

/// Sink which writes [`DebugRecord`]s into the session directory.
pub struct DebugSink {
    session: Session,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DebugSink {
    pub fn new(session: &Session) -> Self {
        DebugSink {
            session: session.clone(),
        }
    }

    /// Record a cycle snapshot. Best-effort, failures are logged by the
    /// session and never surface here.
    pub fn record(&self, record: DebugRecord) {
        self.session.save(RECORD_PATH, record);
    }
}
