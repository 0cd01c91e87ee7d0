//! # Detector module
//!
//! The detector is the seam between the vision pipeline and tracking
//! control. Everything image-shaped (camera acquisition, colour
//! segmentation, morphology) lives on the far side of this trait; the
//! controller only ever sees [`FrameObservation`]s.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Scripted observation source for dry runs and integration tests.
pub mod replay;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::track_ctrl::FrameObservation;
use thiserror::Error;

// Re-exports
pub use replay::ReplayDetector;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of per-frame target observations.
pub trait Detector {
    /// Produce the observation for the next frame, blocking until it is
    /// available.
    ///
    /// A frame in which the target does not appear is not an error: it
    /// yields an observation with `detected` false. `Ok(None)` signals the
    /// end of the observation stream (a finite source such as a replay
    /// script ran out), on which the control loop shuts down cleanly.
    fn next_observation(&mut self) -> Result<Option<FrameObservation>, DetectorError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by a detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),
}
