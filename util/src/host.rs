//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable giving the root of the software installation.
pub const SW_ROOT_ENV_VAR: &str = "FOLLOW_SW_ROOT";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with host information.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable (FOLLOW_SW_ROOT) is not set")]
    SwRootNotSet,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the root directory of the software installation.
///
/// This is read from the `FOLLOW_SW_ROOT` environment variable, which must be
/// set before any executable is run.
pub fn get_follow_sw_root() -> Result<PathBuf, HostError> {
    match env::var(SW_ROOT_ENV_VAR) {
        Ok(v) => Ok(PathBuf::from(v)),
        Err(_) => Err(HostError::SwRootNotSet),
    }
}

/// Get a short description of the host platform.
pub fn get_host_info() -> String {
    format!(
        "{} ({}, {})",
        env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown-host")),
        env::consts::OS,
        env::consts::ARCH
    )
}
