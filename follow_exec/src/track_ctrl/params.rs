//! Parameters structure for TrackCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for tracking control.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Params {
    // ---- FRAME GEOMETRY ----
    /// Width of the camera frame.
    ///
    /// Units: pixels
    pub frame_width_px: u32,

    /// Height of the camera frame.
    ///
    /// Units: pixels
    pub frame_height_px: u32,

    /// Half-width of the band around the frame centre within which no
    /// corrective steering is issued. Must be less than half the frame width.
    ///
    /// Units: pixels
    pub centre_deadzone_px: f64,

    // ---- DETECTION GATING ----
    /// Detections with a blob area below this value are treated as no
    /// detection at all. Filters sensor noise and small spurious blobs.
    ///
    /// Units: pixels squared
    pub min_area_px2: f64,

    // ---- DRIVE ----
    /// Nominal drive speed.
    ///
    /// Units: pulse-width microseconds above neutral
    pub base_speed: f64,

    /// Maximum speed the controller will ever command. Must be at least
    /// `base_speed`.
    ///
    /// Units: pulse-width microseconds above neutral
    pub max_speed: f64,

    /// The steering policy to run, including its lost-target hold timeouts.
    pub steering_policy: SteeringPolicy,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Selectable steering policy.
///
/// The two policies differ both in how they map a centroid offset to a
/// command and in how they decay after the target is lost.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SteeringPolicy {
    /// Continuous steering ratio proportional to the centroid offset, with a
    /// single symmetric lost-target hold timeout.
    Proportional {
        /// Time to keep repeating the last command after losing the target.
        ///
        /// Units: seconds
        hold_timeout_s: f64,
    },

    /// Stepped left/right/forward commands with speed ramped by offset
    /// magnitude, and asymmetric lost-target hold timeouts.
    Discrete {
        /// Minimum fraction of `base_speed` commanded while steering.
        speed_ratio_floor: f64,

        /// Hold timeout after losing the target mid-turn.
        ///
        /// Units: seconds
        hold_timeout_turn_s: f64,

        /// Hold timeout after losing the target while driving straight.
        ///
        /// Units: seconds
        hold_timeout_fwd_s: f64,
    },
}

/// Ways in which a set of TrackCtrl parameters can be invalid.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Frame dimensions must be non-zero (got {0}x{1})")]
    ZeroFrameDims(u32, u32),

    #[error("Deadzone ({0} px) must be non-negative and less than half the frame width ({1} px)")]
    InvalidDeadzone(f64, f64),

    #[error("Minimum blob area must be non-negative (got {0})")]
    NegativeMinArea(f64),

    #[error("Base speed must be positive and no greater than max speed (got base {0}, max {1})")]
    InvalidSpeeds(f64, f64),

    #[error("Speed ratio floor must be in [0, 1] (got {0})")]
    InvalidSpeedRatioFloor(f64),

    #[error("Hold timeouts must be finite and non-negative (got {0} s)")]
    InvalidHoldTimeout(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SteeringPolicy {
    fn default() -> Self {
        SteeringPolicy::Proportional { hold_timeout_s: 0.0 }
    }
}

impl Params {
    /// Determines if the parameters are valid.
    ///
    /// Rejecting bad configuration here means it is never discovered
    /// mid-loop.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if self.frame_width_px == 0 || self.frame_height_px == 0 {
            return Err(ParamsError::ZeroFrameDims(
                self.frame_width_px,
                self.frame_height_px,
            ));
        }

        let half_width = (self.frame_width_px as f64) / 2.0;
        if !self.centre_deadzone_px.is_finite()
            || self.centre_deadzone_px < 0.0
            || self.centre_deadzone_px >= half_width
        {
            return Err(ParamsError::InvalidDeadzone(
                self.centre_deadzone_px,
                half_width,
            ));
        }

        if !self.min_area_px2.is_finite() || self.min_area_px2 < 0.0 {
            return Err(ParamsError::NegativeMinArea(self.min_area_px2));
        }

        if !self.base_speed.is_finite()
            || !self.max_speed.is_finite()
            || self.base_speed <= 0.0
            || self.base_speed > self.max_speed
        {
            return Err(ParamsError::InvalidSpeeds(self.base_speed, self.max_speed));
        }

        match self.steering_policy {
            SteeringPolicy::Proportional { hold_timeout_s } => {
                check_timeout(hold_timeout_s)?;
            }
            SteeringPolicy::Discrete {
                speed_ratio_floor,
                hold_timeout_turn_s,
                hold_timeout_fwd_s,
            } => {
                if !speed_ratio_floor.is_finite()
                    || speed_ratio_floor < 0.0
                    || speed_ratio_floor > 1.0
                {
                    return Err(ParamsError::InvalidSpeedRatioFloor(speed_ratio_floor));
                }
                check_timeout(hold_timeout_turn_s)?;
                check_timeout(hold_timeout_fwd_s)?;
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_timeout(timeout_s: f64) -> Result<(), ParamsError> {
    if !timeout_s.is_finite() || timeout_s < 0.0 {
        return Err(ParamsError::InvalidHoldTimeout(timeout_s));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn valid_params() -> Params {
        Params {
            frame_width_px: 320,
            frame_height_px: 240,
            centre_deadzone_px: 50.0,
            min_area_px2: 500.0,
            base_speed: 110.0,
            max_speed: 400.0,
            steering_policy: SteeringPolicy::Proportional { hold_timeout_s: 0.5 },
        }
    }

    #[test]
    fn test_valid_params_accepted() {
        assert!(valid_params().are_valid().is_ok());
    }

    #[test]
    fn test_deadzone_must_be_less_than_half_width() {
        let mut p = valid_params();
        p.centre_deadzone_px = 160.0;
        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::InvalidDeadzone(_, _))
        ));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let mut p = valid_params();
        p.steering_policy = SteeringPolicy::Proportional {
            hold_timeout_s: -0.1,
        };
        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::InvalidHoldTimeout(_))
        ));
    }

    #[test]
    fn test_negative_min_area_rejected() {
        let mut p = valid_params();
        p.min_area_px2 = -1.0;
        assert!(matches!(p.are_valid(), Err(ParamsError::NegativeMinArea(_))));
    }

    #[test]
    fn test_base_speed_above_max_rejected() {
        let mut p = valid_params();
        p.base_speed = 500.0;
        assert!(matches!(p.are_valid(), Err(ParamsError::InvalidSpeeds(_, _))));
    }

    #[test]
    fn test_speed_ratio_floor_out_of_range_rejected() {
        let mut p = valid_params();
        p.steering_policy = SteeringPolicy::Discrete {
            speed_ratio_floor: 1.2,
            hold_timeout_turn_s: 0.15,
            hold_timeout_fwd_s: 0.5,
        };
        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::InvalidSpeedRatioFloor(_))
        ));
    }

    #[test]
    fn test_policy_deserialises_from_toml() {
        let p: Params = util::params::from_str(
            r#"
            frame_width_px = 320
            frame_height_px = 240
            centre_deadzone_px = 50.0
            min_area_px2 = 1000.0
            base_speed = 110.0
            max_speed = 400.0

            [steering_policy]
            type = "discrete"
            speed_ratio_floor = 0.6
            hold_timeout_turn_s = 0.15
            hold_timeout_fwd_s = 0.5
            "#,
        )
        .unwrap();

        assert!(matches!(
            p.steering_policy,
            SteeringPolicy::Discrete { .. }
        ));
        assert!(p.are_valid().is_ok());
    }
}
