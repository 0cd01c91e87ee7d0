//! Pulse output backends
//!
//! The [`PulseOutput`] trait is the seam between the motor driver and the
//! hardware. The driver only ever asks for "this pulse width on this pin";
//! signal generation itself happens elsewhere (the pigpiod daemon on the
//! robot, nothing at all in a dry run).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use std::io::{Read, Write};
use std::net::TcpStream;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// pigpiod command code for setting a servo pulse width.
const PI_CMD_SERVO: u32 = 8;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Trait to provide a unified API for issuing PWM pulse-width demands.
pub trait PulseOutput {
    /// Demand the given pulse width on the given GPIO pin.
    ///
    /// A pulse width of 0 powers the channel down.
    fn set_pulse_us(&mut self, gpio: u32, pulse_us: u32) -> Result<(), PulseOutputError>;
}

impl<T: PulseOutput + ?Sized> PulseOutput for Box<T> {
    fn set_pulse_us(&mut self, gpio: u32, pulse_us: u32) -> Result<(), PulseOutputError> {
        (**self).set_pulse_us(gpio, pulse_us)
    }
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by a pulse output backend.
#[derive(Debug, Error)]
pub enum PulseOutputError {
    #[error("Could not reach the pigpiod daemon: {0}")]
    Io(#[from] std::io::Error),

    #[error("The pigpiod daemon rejected the demand (code {0})")]
    Rejected(i32),
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Backend which discards all demands, for detection-only dry runs.
pub struct DisabledOutput;

/// Backend which sends demands to a pigpiod daemon over its socket
/// interface.
///
/// Each demand is a 16 byte little-endian command frame (command code, pin,
/// pulse width, extension length) answered by a 16 byte frame whose last
/// word is the signed result.
pub struct PigpiodOutput {
    stream: TcpStream,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PulseOutput for DisabledOutput {
    fn set_pulse_us(&mut self, gpio: u32, pulse_us: u32) -> Result<(), PulseOutputError> {
        trace!("Motors disabled, dropping demand: gpio {} <- {} us", gpio, pulse_us);
        Ok(())
    }
}

impl PigpiodOutput {
    /// Connect to a pigpiod daemon at the given address.
    pub fn connect(addr: &str) -> Result<Self, PulseOutputError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        Ok(PigpiodOutput { stream })
    }
}

impl PulseOutput for PigpiodOutput {
    fn set_pulse_us(&mut self, gpio: u32, pulse_us: u32) -> Result<(), PulseOutputError> {
        let mut frame = [0u8; 16];
        frame[0..4].copy_from_slice(&PI_CMD_SERVO.to_le_bytes());
        frame[4..8].copy_from_slice(&gpio.to_le_bytes());
        frame[8..12].copy_from_slice(&pulse_us.to_le_bytes());

        self.stream.write_all(&frame)?;

        let mut response = [0u8; 16];
        self.stream.read_exact(&mut response)?;

        let mut result_bytes = [0u8; 4];
        result_bytes.copy_from_slice(&response[12..16]);
        let result = i32::from_le_bytes(result_bytes);

        if result < 0 {
            return Err(PulseOutputError::Rejected(result));
        }

        Ok(())
    }
}
