//! Commands output by TrackCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A drive command to be executed by the motor driver.
///
/// The variant emitted depends on the configured steering policy. Speeds are
/// in pulse-width microseconds above neutral and are always within the
/// configured safe range by the time the command leaves the controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum DriveCommand {
    /// Continuous steering - drive forward with a steering ratio.
    ///
    /// `ratio` is in [-1, 1]: -1 is a full left curve, +1 a full right curve,
    /// 0 is straight ahead.
    Steer { ratio: f64, speed: f64 },

    /// Stepped steering - turn in place or drive straight.
    Step { dir: DriveDir, speed: f64 },
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction for a stepped drive command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DriveDir {
    Left,
    Right,
    Forward,
    Stop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCommand {
    /// The full-stop command under the continuous steering policy.
    pub fn stop_steer() -> Self {
        DriveCommand::Steer {
            ratio: 0.0,
            speed: 0.0,
        }
    }

    /// The full-stop command under the stepped steering policy.
    pub fn stop_step() -> Self {
        DriveCommand::Step {
            dir: DriveDir::Stop,
            speed: 0.0,
        }
    }

    /// Determine if this command demands no motion.
    pub fn is_stop(&self) -> bool {
        match self {
            DriveCommand::Steer { speed, .. } => *speed == 0.0,
            DriveCommand::Step { dir, speed } => *dir == DriveDir::Stop || *speed == 0.0,
        }
    }

    /// The speed demand carried by this command.
    pub fn speed(&self) -> f64 {
        match self {
            DriveCommand::Steer { speed, .. } => *speed,
            DriveCommand::Step { speed, .. } => *speed,
        }
    }
}
