//! # Follow bot library.
//!
//! This library allows other crates in the workspace (and the integration
//! tests) to access items defined inside the follow bot executable crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Tracking control module - converts per-frame target detections into drive commands
pub mod track_ctrl;

/// Motor driver - converts drive commands into per-channel PWM pulse widths
pub mod motor_driver;

/// Detector interface - the seam between the vision pipeline and the controller
pub mod detector;

/// Debug sink - best-effort diagnostic output, never feeds back into control
pub mod debug_sink;
