//! # Motor driver module
//!
//! This module interfaces with the robot's drive motors. It takes in a
//! [`DriveCommand`](crate::track_ctrl::DriveCommand) from tracking control
//! and converts it into per-channel PWM pulse widths, applying the forward
//! trim and per-channel direction inversion so that the controller never has
//! to know about either.
//!
//! Actual signal generation is behind the [`PulseOutput`] trait: the shipped
//! implementations talk to a pigpiod daemon or discard demands entirely for
//! detection-only dry runs.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod output;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use output::*;
pub use params::*;
pub use state::*;
