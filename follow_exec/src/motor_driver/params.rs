//! # Motor driver parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Params {
    /// GPIO pin driving the left motor's ESC.
    pub left_gpio: u32,

    /// GPIO pin driving the right motor's ESC.
    pub right_gpio: u32,

    /// Set when the left motor is wired to run backwards.
    pub left_inverted: bool,

    /// Set when the right motor is wired to run backwards.
    pub right_inverted: bool,

    /// Pulse width at which the ESCs are at rest.
    ///
    /// Units: microseconds
    pub neutral_us: f64,

    /// Trim subtracted from the left channel and added to the right channel
    /// while driving forward, correcting lateral drift.
    ///
    /// Units: microseconds
    pub fwd_trim_us: f64,

    /// Lowest pulse width that will ever be commanded.
    ///
    /// Units: microseconds
    pub min_pulse_us: f64,

    /// Highest pulse width that will ever be commanded.
    ///
    /// Units: microseconds
    pub max_pulse_us: f64,

    /// Address of the pigpiod daemon, e.g. "127.0.0.1:8888".
    pub pigpiod_addr: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Left and right motors must use distinct GPIO pins (both {0})")]
    NonUniqueGpio(u32),

    #[error("Pulse range [{0}, {1}] us must be non-empty and contain the neutral point {2} us")]
    InvalidPulseRange(f64, f64, f64),

    #[error("Forward trim must be finite (got {0})")]
    NonFiniteTrim(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Params {
            left_gpio: 18,
            right_gpio: 13,
            left_inverted: false,
            right_inverted: false,
            neutral_us: 1500.0,
            fwd_trim_us: 0.0,
            min_pulse_us: 1000.0,
            max_pulse_us: 2000.0,
            pigpiod_addr: String::from("127.0.0.1:8888"),
        }
    }
}

impl Params {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if self.left_gpio == self.right_gpio {
            return Err(ParamsError::NonUniqueGpio(self.left_gpio));
        }

        let range_ok = self.min_pulse_us.is_finite()
            && self.max_pulse_us.is_finite()
            && self.neutral_us.is_finite()
            && self.min_pulse_us < self.max_pulse_us
            && self.neutral_us > self.min_pulse_us
            && self.neutral_us < self.max_pulse_us;

        if !range_ok {
            return Err(ParamsError::InvalidPulseRange(
                self.min_pulse_us,
                self.max_pulse_us,
                self.neutral_us,
            ));
        }

        if !self.fwd_trim_us.is_finite() {
            return Err(ParamsError::NonFiniteTrim(self.fwd_trim_us));
        }

        Ok(())
    }
}
