//! # Motor driver state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use thiserror::Error;

// Internal
use super::{Params, ParamsError, PulseOutput, PulseOutputError};
use crate::track_ctrl::{DriveCommand, DriveDir};
use util::maths;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Driver converting [`DriveCommand`]s into pulse-width demands on the two
/// drive channels.
pub struct MotorDriver<P: PulseOutput> {
    params: Params,

    output: P,

    /// Set once the PWM outputs have been powered down. After this no
    /// further demands are accepted.
    released: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur when initialising the motor driver.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Loaded parameters are invalid: {0}")]
    ParamsInvalid(ParamsError),

    #[error("Could not reach the motor outputs: {0}")]
    OutputUnavailable(PulseOutputError),
}

/// Errors which can occur while driving the motors.
///
/// A failed actuation is fatal to the control loop: retrying would mean
/// issuing commands into an unknown hardware state.
#[derive(Debug, Error)]
pub enum MotorDriverError {
    #[error("Pulse output failed: {0}")]
    PulseOutput(#[from] PulseOutputError),

    #[error("Command issued after the motor driver was released")]
    Released,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<P: PulseOutput> MotorDriver<P> {
    /// Create a new motor driver over the given pulse output backend.
    ///
    /// Validates the parameters and brings both channels to neutral, so the
    /// robot is known to be stationary before the first command arrives.
    pub fn new(params: Params, output: P) -> Result<Self, InitError> {
        match params.are_valid() {
            Ok(_) => (),
            Err(e) => return Err(InitError::ParamsInvalid(e)),
        }

        let mut driver = MotorDriver {
            params,
            output,
            released: false,
        };

        match driver.stop() {
            Ok(_) => (),
            Err(MotorDriverError::PulseOutput(e)) => return Err(InitError::OutputUnavailable(e)),
            Err(_) => unreachable!("a fresh driver cannot be released"),
        }

        info!("Motors initialised and at neutral");

        Ok(driver)
    }

    /// Apply a drive command to the motors.
    pub fn apply(&mut self, cmd: &DriveCommand) -> Result<(), MotorDriverError> {
        if self.released {
            return Err(MotorDriverError::Released);
        }

        // Zero-speed commands land at exact neutral, trim only applies while
        // driving
        if cmd.is_stop() {
            return self.stop();
        }

        let (left_speed, right_speed, trimmed) = self.wheel_speeds(cmd);

        let (trim_left, trim_right) = if trimmed {
            (-self.params.fwd_trim_us, self.params.fwd_trim_us)
        } else {
            (0.0, 0.0)
        };

        let left_us = self.params.neutral_us + left_speed + trim_left;
        let right_us = self.params.neutral_us + right_speed + trim_right;

        trace!(
            "Motor demands: left {:.1} us, right {:.1} us ({:?})",
            left_us,
            right_us,
            cmd
        );

        self.set_channels(left_us, right_us)
    }

    /// Stop both motors.
    ///
    /// Idempotent: calling this any number of times leaves both channels at
    /// neutral.
    pub fn stop(&mut self) -> Result<(), MotorDriverError> {
        if self.released {
            return Err(MotorDriverError::Released);
        }

        self.set_channels(self.params.neutral_us, self.params.neutral_us)
    }

    /// Power down the PWM outputs.
    pub fn release(&mut self) -> Result<(), MotorDriverError> {
        if self.released {
            return Ok(());
        }

        self.released = true;

        self.output.set_pulse_us(self.params.left_gpio, 0)?;
        self.output.set_pulse_us(self.params.right_gpio, 0)?;

        Ok(())
    }

    /// Safety shutdown: stop the motors, then power down the outputs.
    ///
    /// Runs at most once; later calls (including the one from `Drop`) are
    /// no-ops. Failures are logged rather than propagated, there is nothing
    /// further to do with the hardware at this point.
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }

        info!("Motor safety shutdown");

        if let Err(e) = self.stop() {
            warn!("Could not stop motors during shutdown: {}", e);
        }

        // Give the ESCs a moment at neutral before cutting the signal
        std::thread::sleep(std::time::Duration::from_millis(100));

        if let Err(e) = self.release() {
            warn!("Could not release motor outputs during shutdown: {}", e);
        }
    }

    /// Per-wheel speed demands for a command, as signed offsets from
    /// neutral. The third element is whether forward trim applies.
    fn wheel_speeds(&self, cmd: &DriveCommand) -> (f64, f64, bool) {
        match *cmd {
            DriveCommand::Steer { ratio, speed } => {
                // Curving slows the inner wheel, the outer stays at speed
                let left = if ratio < 0.0 {
                    speed * (1.0 + ratio)
                } else {
                    speed
                };
                let right = if ratio > 0.0 {
                    speed * (1.0 - ratio)
                } else {
                    speed
                };

                (left, right, true)
            }
            DriveCommand::Step { dir, speed } => match dir {
                DriveDir::Left => (-speed, speed, false),
                DriveDir::Right => (speed, -speed, false),
                DriveDir::Forward => (speed, speed, true),
                DriveDir::Stop => (0.0, 0.0, false),
            },
        }
    }

    /// Issue raw pulse widths to both channels, applying inversion and the
    /// safe range clamp.
    fn set_channels(&mut self, left_us: f64, right_us: f64) -> Result<(), MotorDriverError> {
        let left_us = self.finalise_pulse(left_us, self.params.left_inverted);
        let right_us = self.finalise_pulse(right_us, self.params.right_inverted);

        self.output.set_pulse_us(self.params.left_gpio, left_us)?;
        self.output.set_pulse_us(self.params.right_gpio, right_us)?;

        Ok(())
    }

    /// Apply direction inversion and the pulse range clamp, rounding to
    /// whole microseconds.
    fn finalise_pulse(&self, pulse_us: f64, inverted: bool) -> u32 {
        let pulse_us = if inverted {
            // Mirror about neutral
            2.0 * self.params.neutral_us - pulse_us
        } else {
            pulse_us
        };

        maths::clamp(
            &pulse_us,
            &self.params.min_pulse_us,
            &self.params.max_pulse_us,
        )
        .round() as u32
    }
}

impl<P: PulseOutput> Drop for MotorDriver<P> {
    fn drop(&mut self) {
        // Backstop for exit paths which didn't run the scoped shutdown
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every demand so tests can assert on the exact pulse stream.
    #[derive(Clone, Default)]
    struct RecordingOutput {
        demands: Rc<RefCell<Vec<(u32, u32)>>>,
    }

    impl PulseOutput for RecordingOutput {
        fn set_pulse_us(&mut self, gpio: u32, pulse_us: u32) -> Result<(), PulseOutputError> {
            self.demands.borrow_mut().push((gpio, pulse_us));
            Ok(())
        }
    }

    fn test_params() -> Params {
        Params {
            left_gpio: 18,
            right_gpio: 13,
            left_inverted: false,
            right_inverted: false,
            neutral_us: 1500.0,
            fwd_trim_us: 2.0,
            min_pulse_us: 1000.0,
            max_pulse_us: 2000.0,
            pigpiod_addr: String::from("127.0.0.1:8888"),
        }
    }

    fn make_driver(params: Params) -> (MotorDriver<RecordingOutput>, RecordingOutput) {
        let output = RecordingOutput::default();
        let driver = MotorDriver::new(params, output.clone()).unwrap();

        // Discard the neutral demands issued at construction
        output.demands.borrow_mut().clear();

        (driver, output)
    }

    fn last_two(output: &RecordingOutput) -> ((u32, u32), (u32, u32)) {
        let demands = output.demands.borrow();
        let n = demands.len();
        (demands[n - 2], demands[n - 1])
    }

    #[test]
    fn test_straight_steer_applies_trim() {
        let (mut driver, output) = make_driver(test_params());

        driver
            .apply(&DriveCommand::Steer {
                ratio: 0.0,
                speed: 110.0,
            })
            .unwrap();

        let ((_, left), (_, right)) = last_two(&output);
        assert_eq!(left, 1608); // 1500 + 110 - 2
        assert_eq!(right, 1612); // 1500 + 110 + 2
    }

    #[test]
    fn test_steer_right_slows_right_wheel() {
        let (mut driver, output) = make_driver(test_params());

        driver
            .apply(&DriveCommand::Steer {
                ratio: 1.0,
                speed: 110.0,
            })
            .unwrap();

        let ((_, left), (_, right)) = last_two(&output);
        assert_eq!(left, 1608); // outer wheel at full speed, trimmed
        assert_eq!(right, 1502); // inner wheel stopped, trimmed
    }

    #[test]
    fn test_inversion_mirrors_about_neutral() {
        let mut params = test_params();
        params.left_inverted = true;
        let (mut driver, output) = make_driver(params);

        driver
            .apply(&DriveCommand::Steer {
                ratio: 0.0,
                speed: 110.0,
            })
            .unwrap();

        let ((_, left), (_, right)) = last_two(&output);
        assert_eq!(left, 1392); // 3000 - 1608
        assert_eq!(right, 1612);
    }

    #[test]
    fn test_step_left_counter_rotates() {
        let (mut driver, output) = make_driver(test_params());

        driver
            .apply(&DriveCommand::Step {
                dir: DriveDir::Left,
                speed: 110.0,
            })
            .unwrap();

        let ((_, left), (_, right)) = last_two(&output);
        assert_eq!(left, 1390); // no trim on in-place turns
        assert_eq!(right, 1610);
    }

    #[test]
    fn test_pulse_range_clamped() {
        let (mut driver, output) = make_driver(test_params());

        driver
            .apply(&DriveCommand::Step {
                dir: DriveDir::Forward,
                speed: 900.0,
            })
            .unwrap();

        let ((_, left), (_, right)) = last_two(&output);
        assert_eq!(left, 2000);
        assert_eq!(right, 2000);
    }

    #[test]
    fn test_stop_commands_land_exactly_at_neutral() {
        // fwd_trim_us is 2.0 here: a zero-speed command must still come out
        // at exact neutral, not neutral +/- trim
        let (mut driver, output) = make_driver(test_params());

        driver.apply(&DriveCommand::stop_steer()).unwrap();
        assert_eq!(last_two(&output), ((18, 1500), (13, 1500)));

        driver.apply(&DriveCommand::stop_step()).unwrap();
        assert_eq!(last_two(&output), ((18, 1500), (13, 1500)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut driver, output) = make_driver(test_params());

        driver.stop().unwrap();
        let first = last_two(&output);

        driver.stop().unwrap();
        let second = last_two(&output);

        assert_eq!(first, second);
        assert_eq!(first, ((18, 1500), (13, 1500)));
    }

    #[test]
    fn test_shutdown_runs_exactly_once() {
        let (mut driver, output) = make_driver(test_params());

        driver.shutdown();
        let after_first: Vec<_> = output.demands.borrow().clone();

        driver.shutdown();
        drop(driver);
        let after_all: Vec<_> = output.demands.borrow().clone();

        // stop (2 demands at neutral) then release (2 demands at 0), nothing
        // more from the repeated shutdown or the drop
        assert_eq!(after_first.len(), 4);
        assert_eq!(after_first[2..], [(18, 0), (13, 0)]);
        assert_eq!(after_first, after_all);
    }

    #[test]
    fn test_apply_after_release_rejected() {
        let (mut driver, _output) = make_driver(test_params());

        driver.release().unwrap();

        assert!(matches!(
            driver.apply(&DriveCommand::stop_steer()),
            Err(MotorDriverError::Released)
        ));
    }

    #[test]
    fn test_duplicate_gpio_rejected() {
        let mut params = test_params();
        params.right_gpio = params.left_gpio;

        assert!(MotorDriver::new(params, RecordingOutput::default()).is_err());
    }
}
