//! Discrete (stepped) steering calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use util::maths;

// Internal imports
use super::{DriveCommand, DriveDir, FrameObservation, Mode, SteeringPolicy, TrackCtrl};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrackCtrl {
    /// Derive the command for a detected target under the discrete policy.
    ///
    /// Rather than a continuous ratio the robot turns in place left or right,
    /// with the turn speed ramped between `speed_ratio_floor * base_speed`
    /// and `base_speed` by the offset magnitude.
    pub(crate) fn calc_discrete(&mut self, obs: &FrameObservation) -> DriveCommand {
        let floor = match self.params.steering_policy {
            SteeringPolicy::Discrete {
                speed_ratio_floor, ..
            } => speed_ratio_floor,
            // Dispatched on policy in proc, so this arm is unreachable; fall
            // back to no ramp floor.
            _ => 0.0,
        };

        let offset = self.centre_offset_px(obs);

        if offset.abs() < self.params.centre_deadzone_px {
            self.mode = Mode::Centered;

            return DriveCommand::Step {
                dir: DriveDir::Forward,
                speed: self.params.base_speed,
            };
        }

        let magnitude = self.steer_magnitude(offset);
        if magnitude >= 1.0 {
            self.report.steer_saturated = true;
        }

        let raw_speed = self.params.base_speed * (floor + (1.0 - floor) * magnitude);
        let speed = maths::clamp(&raw_speed, &0.0, &self.params.max_speed);
        if speed < raw_speed {
            self.report.speed_limited = true;
        }

        self.mode = if offset < 0.0 {
            Mode::SteeringLeft
        } else {
            Mode::SteeringRight
        };

        DriveCommand::Step {
            dir: if offset < 0.0 {
                DriveDir::Left
            } else {
                DriveDir::Right
            },
            speed,
        }
    }
}
