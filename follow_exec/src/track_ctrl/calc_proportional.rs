//! Proportional steering calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::{DriveCommand, FrameObservation, Mode, TrackCtrl};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrackCtrl {
    /// Derive the command for a detected target under the proportional
    /// policy.
    ///
    /// The steering ratio is proportional to the centroid's offset from the
    /// frame centre, saturating at full deflection. Within the deadzone the
    /// robot drives straight.
    pub(crate) fn calc_proportional(&mut self, obs: &FrameObservation) -> DriveCommand {
        let offset = self.centre_offset_px(obs);

        if offset.abs() < self.params.centre_deadzone_px {
            self.mode = Mode::Centered;

            return DriveCommand::Steer {
                ratio: 0.0,
                speed: self.params.base_speed,
            };
        }

        let magnitude = self.steer_magnitude(offset);
        if magnitude >= 1.0 {
            self.report.steer_saturated = true;
        }

        self.mode = if offset < 0.0 {
            Mode::SteeringLeft
        } else {
            Mode::SteeringRight
        };

        DriveCommand::Steer {
            ratio: offset.signum() * magnitude,
            speed: self.params.base_speed,
        }
    }
}
