//! Implementations for the TrackCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

// Internal
use super::{DriveCommand, DriveDir, FrameObservation, Params, ParamsError, SteeringPolicy};
use util::{maths, module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tracking control module state.
///
/// Owned exclusively by the control loop thread and mutated exactly once per
/// tick by [`State::proc`].
#[derive(Default)]
pub struct TrackCtrl {
    pub(crate) params: Params,

    pub(crate) report: StatusReport,

    /// Current controller mode.
    pub(crate) mode: Mode,

    /// The last command issued while the target was in view, reissued during
    /// the hold interval after a dropout.
    pub(crate) last_cmd: Option<DriveCommand>,

    /// Timestamp of the last gated detection.
    pub(crate) last_detected_at: Option<Duration>,
}

/// Status report for TrackCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// Controller mode after this tick.
    pub mode: Mode,

    /// Raised when the steering demand hit full deflection.
    pub steer_saturated: bool,

    /// Raised when the speed demand had to be limited to the safe range.
    pub speed_limited: bool,

    /// Seconds since the target was last seen, set only while holding.
    pub hold_elapsed_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Controller modes.
///
/// There is no terminal mode, the controller runs until the loop driving it
/// is cancelled. Every tick performs exactly one transition
/// (self-transitions included).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// No target and no recent memory of one - motors stopped.
    Searching,
    /// Target within the centre deadzone - driving straight.
    Centered,
    /// Target left of the deadzone - steering left.
    SteeringLeft,
    /// Target right of the deadzone - steering right.
    SteeringRight,
    /// Target recently lost - repeating the last command.
    Holding,
}

/// Errors which can occur when initialising TrackCtrl.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Loaded parameters are invalid: {0}")]
    ParamsInvalid(ParamsError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Mode {
    fn default() -> Self {
        Mode::Searching
    }
}

impl State for TrackCtrl {
    type InitData = &'static str;
    type InitError = InitError;

    type InputData = FrameObservation;
    type OutputData = DriveCommand;
    type StatusReport = StatusReport;
    type ProcError = super::TrackCtrlError;

    /// Initialise the TrackCtrl module.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), InitError> {
        // Load the parameters
        let loaded = match params::load(init_data) {
            Ok(p) => p,
            Err(e) => return Err(InitError::ParamLoadError(e)),
        };

        *self = Self::from_params(loaded)?;

        Ok(())
    }

    /// Perform cyclic processing of tracking control.
    ///
    /// Pure function of (previous state, observation, parameters): the same
    /// sequence of observations always produces the same sequence of
    /// commands.
    fn proc(
        &mut self,
        obs: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        if obs.detected
            && !(obs.centroid_px.0.is_finite()
                && obs.centroid_px.1.is_finite()
                && obs.area_px2.is_finite())
        {
            return Err(super::TrackCtrlError::NonFiniteObservation);
        }

        // Gate the raw detection flag: blobs below the minimum area are
        // sensor noise and count as no detection at all.
        let detected = obs.detected && obs.area_px2 >= self.params.min_area_px2;

        let cmd = if detected {
            let cmd = match self.params.steering_policy {
                SteeringPolicy::Proportional { .. } => self.calc_proportional(obs),
                SteeringPolicy::Discrete { .. } => self.calc_discrete(obs),
            };

            self.last_detected_at = Some(obs.timestamp);
            self.last_cmd = Some(cmd);

            cmd
        } else {
            self.calc_lost(obs)
        };

        self.report.mode = self.mode;

        trace!("TrackCtrl output: {:?} (mode {:?})", cmd, self.mode);

        Ok((cmd, self.report))
    }
}

impl TrackCtrl {
    /// Build a controller directly from a parameter set.
    ///
    /// Used by embedders and tests which don't load parameters from disk.
    pub fn from_params(params: Params) -> Result<Self, InitError> {
        match params.are_valid() {
            Ok(_) => (),
            Err(e) => return Err(InitError::ParamsInvalid(e)),
        }

        Ok(TrackCtrl {
            params,
            ..Default::default()
        })
    }

    /// Current controller mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Signed horizontal offset of the centroid from the frame centre.
    pub(crate) fn centre_offset_px(&self, obs: &FrameObservation) -> f64 {
        obs.centroid_px.0 - (self.params.frame_width_px as f64) / 2.0
    }

    /// Steering magnitude in [0, 1] for the given offset.
    ///
    /// Saturates at full deflection once the centroid is
    /// `frame_width/2 - deadzone` pixels or more from centre.
    pub(crate) fn steer_magnitude(&self, offset_px: f64) -> f64 {
        let max_offset =
            (self.params.frame_width_px as f64) / 2.0 - self.params.centre_deadzone_px;

        maths::clamp(&(offset_px.abs() / max_offset), &0.0, &1.0)
    }

    /// Derive the command for a tick with no (gated) detection.
    ///
    /// While within the hold timeout the last command is reissued unchanged,
    /// after it the controller gives up and stops.
    fn calc_lost(&mut self, obs: &FrameObservation) -> DriveCommand {
        let held = match (self.last_cmd, self.last_detected_at) {
            (Some(cmd), Some(t)) => {
                let elapsed = obs.timestamp.saturating_sub(t);

                if elapsed < self.hold_timeout_for(&cmd) {
                    Some((cmd, elapsed))
                } else {
                    None
                }
            }
            // Never detected: no heading to hold
            _ => None,
        };

        match held {
            Some((cmd, elapsed)) => {
                self.mode = Mode::Holding;
                self.report.hold_elapsed_s = Some(elapsed.as_secs_f64());
                cmd
            }
            None => {
                self.mode = Mode::Searching;
                self.last_cmd = None;

                match self.params.steering_policy {
                    SteeringPolicy::Proportional { .. } => DriveCommand::stop_steer(),
                    SteeringPolicy::Discrete { .. } => DriveCommand::stop_step(),
                }
            }
        }
    }

    /// The hold timeout applicable to the given last command.
    fn hold_timeout_for(&self, cmd: &DriveCommand) -> Duration {
        let timeout_s = match self.params.steering_policy {
            SteeringPolicy::Proportional { hold_timeout_s } => hold_timeout_s,
            SteeringPolicy::Discrete {
                hold_timeout_turn_s,
                hold_timeout_fwd_s,
                ..
            } => match cmd {
                // Turning decays faster than forward motion so that a
                // momentary dropout mid-turn doesn't over-rotate the robot,
                // while it can still coast forward briefly.
                DriveCommand::Step {
                    dir: DriveDir::Left,
                    ..
                }
                | DriveCommand::Step {
                    dir: DriveDir::Right,
                    ..
                } => hold_timeout_turn_s,
                _ => hold_timeout_fwd_s,
            },
        };

        Duration::from_secs_f64(timeout_s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn proportional_params() -> Params {
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

    fn discrete_params() -> Params {
        Params {
            steering_policy: SteeringPolicy::Discrete {
                speed_ratio_floor: 0.6,
                hold_timeout_turn_s: 0.15,
                hold_timeout_fwd_s: 0.5,
            },
            ..proportional_params()
        }
    }

    fn obs_at(t_s: f64, x_px: f64) -> FrameObservation {
        FrameObservation::detection(Duration::from_secs_f64(t_s), (x_px, 120.0), 1500.0)
    }

    fn empty_at(t_s: f64) -> FrameObservation {
        FrameObservation::empty(Duration::from_secs_f64(t_s))
    }

    fn step(ctrl: &mut TrackCtrl, obs: FrameObservation) -> (DriveCommand, StatusReport) {
        ctrl.proc(&obs).unwrap()
    }

    #[test]
    fn test_centered_within_deadzone() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        let (cmd, report) = step(&mut ctrl, obs_at(0.0, 160.0));

        assert_eq!(report.mode, Mode::Centered);
        match cmd {
            DriveCommand::Steer { ratio, speed } => {
                assert_eq!(ratio, 0.0);
                assert_eq!(speed, 110.0);
            }
            _ => panic!("expected a Steer command, got {:?}", cmd),
        }

        // Just inside the deadzone edge still counts as centered
        let (_, report) = step(&mut ctrl, obs_at(0.1, 160.0 + 49.9));
        assert_eq!(report.mode, Mode::Centered);
    }

    #[test]
    fn test_proportional_steering_ratio() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        // offset = 90, max_offset = 110
        let (cmd, report) = step(&mut ctrl, obs_at(0.0, 250.0));

        assert_eq!(report.mode, Mode::SteeringRight);
        match cmd {
            DriveCommand::Steer { ratio, .. } => {
                assert!((ratio - 90.0 / 110.0).abs() < EPSILON);
            }
            _ => panic!("expected a Steer command, got {:?}", cmd),
        }

        // Mirrored on the left side
        let (cmd, report) = step(&mut ctrl, obs_at(0.1, 70.0));
        assert_eq!(report.mode, Mode::SteeringLeft);
        match cmd {
            DriveCommand::Steer { ratio, .. } => {
                assert!((ratio + 90.0 / 110.0).abs() < EPSILON);
            }
            _ => panic!("expected a Steer command, got {:?}", cmd),
        }
    }

    #[test]
    fn test_steering_saturates_at_full_deflection() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        // |offset| = 110 = max_offset: exactly full deflection
        let (cmd, report) = step(&mut ctrl, obs_at(0.0, 270.0));
        match cmd {
            DriveCommand::Steer { ratio, .. } => assert_eq!(ratio, 1.0),
            _ => panic!("expected a Steer command, got {:?}", cmd),
        }
        assert!(report.steer_saturated);

        // Beyond it still exactly 1.0
        let (cmd, _) = step(&mut ctrl, obs_at(0.1, 315.0));
        match cmd {
            DriveCommand::Steer { ratio, .. } => assert_eq!(ratio, 1.0),
            _ => panic!("expected a Steer command, got {:?}", cmd),
        }
    }

    #[test]
    fn test_magnitude_monotonic_in_offset() {
        let ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        let mut last = 0.0;
        for offset in (50..=160).step_by(5) {
            let mag = ctrl.steer_magnitude(offset as f64);
            assert!(mag >= last, "magnitude decreased at offset {}", offset);
            last = mag;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_small_blobs_filtered_as_not_detected() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        // detected flag raised but area below min_area_px2
        let noise = FrameObservation::detection(Duration::from_secs(0), (250.0, 120.0), 100.0);
        let (cmd, report) = step(&mut ctrl, noise);

        assert_eq!(report.mode, Mode::Searching);
        assert!(cmd.is_stop());
        assert!(ctrl.last_cmd.is_none());
    }

    #[test]
    fn test_hold_reissues_last_command_then_stops() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        // Target at x=250 at t=0 produces a known command
        let (held_cmd, _) = step(&mut ctrl, obs_at(0.0, 250.0));

        // Lost at t=0.1, 0.2, 0.3: reissue unchanged every tick
        for t in &[0.1, 0.2, 0.3] {
            let (cmd, report) = step(&mut ctrl, empty_at(*t));
            assert_eq!(report.mode, Mode::Holding);
            assert_eq!(cmd, held_cmd);
        }

        // At 0.6 s >= 0.5 s timeout: stop and search
        let (cmd, report) = step(&mut ctrl, empty_at(0.6));
        assert_eq!(report.mode, Mode::Searching);
        assert!(cmd.is_stop());

        // Still stopped afterwards, nothing left to hold
        let (cmd, report) = step(&mut ctrl, empty_at(0.7));
        assert_eq!(report.mode, Mode::Searching);
        assert!(cmd.is_stop());
    }

    #[test]
    fn test_hold_boundary_is_exclusive() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        step(&mut ctrl, obs_at(0.0, 250.0));

        // elapsed == timeout: the hold is over
        let (cmd, report) = step(&mut ctrl, empty_at(0.5));
        assert_eq!(report.mode, Mode::Searching);
        assert!(cmd.is_stop());
    }

    #[test]
    fn test_never_detected_stays_searching() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        let (cmd, report) = step(&mut ctrl, empty_at(0.0));
        assert_eq!(report.mode, Mode::Searching);
        assert!(cmd.is_stop());
    }

    #[test]
    fn test_discrete_full_deflection_left() {
        let mut ctrl = TrackCtrl::from_params(discrete_params()).unwrap();

        // offset = -130 beyond deadzone 50, max_offset = 110: magnitude 1.0
        let (cmd, report) = step(&mut ctrl, obs_at(0.0, 30.0));

        assert_eq!(report.mode, Mode::SteeringLeft);
        match cmd {
            DriveCommand::Step { dir, speed } => {
                assert_eq!(dir, DriveDir::Left);
                assert!((speed - 110.0).abs() < EPSILON);
            }
            _ => panic!("expected a Step command, got {:?}", cmd),
        }
    }

    #[test]
    fn test_discrete_speed_ramp() {
        let mut ctrl = TrackCtrl::from_params(discrete_params()).unwrap();

        // offset = 90: magnitude = 90/110
        let (cmd, _) = step(&mut ctrl, obs_at(0.0, 250.0));

        let magnitude = 90.0 / 110.0;
        let expected = 110.0 * (0.6 + 0.4 * magnitude);

        match cmd {
            DriveCommand::Step { dir, speed } => {
                assert_eq!(dir, DriveDir::Right);
                assert!((speed - expected).abs() < EPSILON);
            }
            _ => panic!("expected a Step command, got {:?}", cmd),
        }
    }

    #[test]
    fn test_discrete_centered_drives_forward() {
        let mut ctrl = TrackCtrl::from_params(discrete_params()).unwrap();

        let (cmd, report) = step(&mut ctrl, obs_at(0.0, 165.0));

        assert_eq!(report.mode, Mode::Centered);
        match cmd {
            DriveCommand::Step { dir, speed } => {
                assert_eq!(dir, DriveDir::Forward);
                assert_eq!(speed, 110.0);
            }
            _ => panic!("expected a Step command, got {:?}", cmd),
        }
    }

    #[test]
    fn test_discrete_hold_timeouts_are_asymmetric() {
        // A turn is held for only 0.15 s...
        let mut ctrl = TrackCtrl::from_params(discrete_params()).unwrap();
        step(&mut ctrl, obs_at(0.0, 30.0));

        let (_, report) = step(&mut ctrl, empty_at(0.1));
        assert_eq!(report.mode, Mode::Holding);

        let (cmd, report) = step(&mut ctrl, empty_at(0.2));
        assert_eq!(report.mode, Mode::Searching);
        assert!(cmd.is_stop());

        // ...while a forward command survives until 0.5 s
        let mut ctrl = TrackCtrl::from_params(discrete_params()).unwrap();
        step(&mut ctrl, obs_at(0.0, 160.0));

        let (cmd, report) = step(&mut ctrl, empty_at(0.4));
        assert_eq!(report.mode, Mode::Holding);
        match cmd {
            DriveCommand::Step { dir, .. } => assert_eq!(dir, DriveDir::Forward),
            _ => panic!("expected a Step command, got {:?}", cmd),
        }

        let (cmd, report) = step(&mut ctrl, empty_at(0.55));
        assert_eq!(report.mode, Mode::Searching);
        assert!(cmd.is_stop());
    }

    #[test]
    fn test_reacquisition_during_hold() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        step(&mut ctrl, obs_at(0.0, 250.0));
        step(&mut ctrl, empty_at(0.3));
        assert_eq!(ctrl.mode(), Mode::Holding);

        // Target comes back on the other side: fresh command, fresh hold epoch
        let (cmd, report) = step(&mut ctrl, obs_at(0.4, 70.0));
        assert_eq!(report.mode, Mode::SteeringLeft);
        match cmd {
            DriveCommand::Steer { ratio, .. } => assert!(ratio < 0.0),
            _ => panic!("expected a Steer command, got {:?}", cmd),
        }

        // Hold window now counts from 0.4
        let (_, report) = step(&mut ctrl, empty_at(0.85));
        assert_eq!(report.mode, Mode::Holding);
    }

    #[test]
    fn test_non_finite_observation_rejected() {
        let mut ctrl = TrackCtrl::from_params(proportional_params()).unwrap();

        let bad =
            FrameObservation::detection(Duration::from_secs(0), (f64::NAN, 120.0), 1500.0);

        assert!(ctrl.proc(&bad).is_err());
    }

    #[test]
    fn test_invalid_params_rejected_at_construction() {
        let mut p = proportional_params();
        p.centre_deadzone_px = 200.0;

        assert!(TrackCtrl::from_params(p).is_err());
    }
}
