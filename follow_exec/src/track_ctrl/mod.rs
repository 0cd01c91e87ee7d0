//! Tracking control module
//!
//! TrackCtrl is the closed-loop controller at the heart of the follow bot. It
//! consumes one [`FrameObservation`] per camera frame and produces one
//! [`DriveCommand`] per tick, keeping the tracked target centred in the frame
//! and sustaining the last known heading for a bounded interval if the target
//! drops out.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_discrete;
mod calc_proportional;
mod cmd;
mod obs;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use obs::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TrackCtrl cyclic processing.
///
/// The controller never fails on a valid observation, it has no I/O. The only
/// processing error is an observation carrying non-finite values, which
/// indicates a broken detector upstream.
#[derive(Debug, thiserror::Error)]
pub enum TrackCtrlError {
    #[error("Recieved an observation with non-finite centroid or area")]
    NonFiniteObservation,
}
