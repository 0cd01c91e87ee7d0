//! Scripted observation replay
//!
//! Plays back a TOML script of timed observations, pacing itself against the
//! wall clock so the control loop sees the same cadence it would from a live
//! camera. Observation timestamps come from the script, not the wall clock,
//! so a given script always produces the same controller behaviour.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

// Internal
use super::{Detector, DetectorError};
use crate::track_ctrl::FrameObservation;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A detector which replays a pre-recorded observation script.
pub struct ReplayDetector {
    entries: Vec<ObsEntry>,

    /// Index of the next entry to emit.
    next: usize,

    epoch: Instant,
}

/// On-disk script format.
#[derive(Deserialize)]
struct ObsScript {
    obs: Vec<ObsEntry>,
}

/// One scripted observation.
#[derive(Deserialize)]
struct ObsEntry {
    /// Time of the frame relative to the start of the replay.
    time_s: f64,

    /// Centroid of the detected blob, absent if the frame has no target.
    centroid_px: Option<[f64; 2]>,

    /// Blob area, defaults to 0 if not given.
    area_px2: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur when loading an observation script.
#[derive(Debug, Error)]
pub enum ReplayLoadError {
    #[error("Cannot load the observation script: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the observation script: {0}")]
    DeserialiseError(toml::de::Error),

    #[error("Observation times must be non-negative, finite, and non-decreasing")]
    TimesNotMonotonic,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReplayDetector {
    /// Load an observation script from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReplayLoadError> {
        let script_str = match read_to_string(path) {
            Ok(s) => s,
            Err(e) => return Err(ReplayLoadError::FileLoadError(e)),
        };

        Self::from_str(&script_str)
    }

    /// Parse an observation script from a TOML string.
    pub fn from_str(script_str: &str) -> Result<Self, ReplayLoadError> {
        let script: ObsScript = match toml::from_str(script_str) {
            Ok(s) => s,
            Err(e) => return Err(ReplayLoadError::DeserialiseError(e)),
        };

        let mut last_time = 0.0;
        for entry in &script.obs {
            if !entry.time_s.is_finite() || entry.time_s < last_time {
                return Err(ReplayLoadError::TimesNotMonotonic);
            }
            last_time = entry.time_s;
        }

        Ok(ReplayDetector {
            entries: script.obs,
            next: 0,
            epoch: Instant::now(),
        })
    }

    /// Duration of the loaded script in seconds.
    pub fn get_duration(&self) -> f64 {
        self.entries.last().map(|e| e.time_s).unwrap_or(0.0)
    }

    /// Number of observations in the loaded script.
    pub fn get_num_obs(&self) -> usize {
        self.entries.len()
    }
}

impl Detector for ReplayDetector {
    fn next_observation(&mut self) -> Result<Option<FrameObservation>, DetectorError> {
        let entry = match self.entries.get(self.next) {
            Some(e) => e,
            None => return Ok(None),
        };
        self.next += 1;

        // Pace against the wall clock, like a blocking camera capture
        let due = Duration::from_secs_f64(entry.time_s);
        let elapsed = self.epoch.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }

        let timestamp = due;

        Ok(Some(match entry.centroid_px {
            Some([x, y]) => {
                FrameObservation::detection(timestamp, (x, y), entry.area_px2.unwrap_or(0.0))
            }
            None => FrameObservation::empty(timestamp),
        }))
    }
}
