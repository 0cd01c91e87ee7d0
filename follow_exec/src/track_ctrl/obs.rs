//! Per-frame observations input to TrackCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::time::Duration;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An immutable per-tick fact produced by the detector.
///
/// Exactly one observation is produced per camera frame, whether or not the
/// target was found in it. `centroid_px` and `area_px2` are only meaningful
/// when `detected` is true.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrameObservation {
    /// Monotonic timestamp of the frame, measured from process start.
    pub timestamp: Duration,

    /// Whether the target blob was found in this frame.
    pub detected: bool,

    /// Centroid of the target blob.
    ///
    /// Units: pixels, origin at the top-left of the frame
    pub centroid_px: (f64, f64),

    /// Area of the target blob.
    ///
    /// Units: pixels squared
    pub area_px2: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameObservation {
    /// Build an observation for a frame in which the target was found.
    pub fn detection(timestamp: Duration, centroid_px: (f64, f64), area_px2: f64) -> Self {
        FrameObservation {
            timestamp,
            detected: true,
            centroid_px,
            area_px2,
        }
    }

    /// Build an observation for a frame with no target in it.
    pub fn empty(timestamp: Duration) -> Self {
        FrameObservation {
            timestamp,
            detected: false,
            centroid_px: (0.0, 0.0),
            area_px2: 0.0,
        }
    }
}
