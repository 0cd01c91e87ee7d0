//! Main follow bot executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Acquire the next frame observation from the detector
//!         - Tracking control processing
//!         - Motor driver execution
//!         - Debug output
//!     - Safety shutdown of the motors
//!
//! The loop runs until the observation stream ends or the process is
//! interrupted, and on every exit path the motors are stopped and the PWM
//! outputs powered down before the process terminates.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use follow_lib::{
    debug_sink::{DebugRecord, DebugSink},
    detector::{Detector, ReplayDetector},
    motor_driver::{self, DisabledOutput, MotorDriver, PigpiodOutput, PulseOutput},
    track_ctrl::TrackCtrl,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

// Internal
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period between frame rate reports in the log.
const RATE_REPORT_PERIOD_S: f64 = 5.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new("follow_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Follow Bot Executable\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- PARSE ARGUMENTS ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let mut obs_script_path: Option<String> = None;
    let mut motors_enabled = true;
    let mut debug_output = false;

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--no-motors" => motors_enabled = false,
            "--debug" => debug_output = true,
            a if a.starts_with("--") => return Err(eyre!("Unrecognised flag \"{}\"", a)),
            a => match obs_script_path {
                None => obs_script_path = Some(a.to_string()),
                Some(_) => return Err(eyre!("Expected a single observation script path")),
            },
        }
    }

    let obs_script_path =
        obs_script_path.ok_or_else(|| eyre!("Expected the path to an observation script"))?;

    // ---- INITIALISE DETECTOR ----

    info!("Loading observations from \"{}\"", obs_script_path);

    let mut detector = ReplayDetector::from_file(&obs_script_path)
        .wrap_err("Failed to load the observation script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} observations\n",
        detector.get_duration(),
        detector.get_num_obs()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut track_ctrl = TrackCtrl::default();
    track_ctrl
        .init("track_ctrl.toml", &session)
        .wrap_err("Failed to initialise TrackCtrl")?;
    info!("TrackCtrl init complete");

    let motor_params: motor_driver::Params =
        util::params::load("motor_driver.toml").wrap_err("Could not load motor driver params")?;

    let output: Box<dyn PulseOutput> = if motors_enabled {
        let o = PigpiodOutput::connect(&motor_params.pigpiod_addr)
            .wrap_err("Failed to connect to the pigpiod daemon")?;
        info!("Connected to pigpiod at {}", motor_params.pigpiod_addr);
        Box::new(o)
    } else {
        info!("Motors disabled, demands will be dropped");
        Box::new(DisabledOutput)
    };

    let mut motor_driver =
        MotorDriver::new(motor_params, output).wrap_err("Failed to initialise MotorDriver")?;
    info!("MotorDriver init complete");

    let debug_sink = if debug_output {
        Some(DebugSink::new(&session))
    } else {
        None
    };

    info!("Module initialisation complete\n");

    // ---- CANCELLATION ----

    let cancelled = Arc::new(AtomicBool::new(false));

    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            cancelled.store(true, Ordering::Relaxed);
        })
        .wrap_err("Failed to install the interrupt handler")?;
    }

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let loop_result = run_loop(
        &mut track_ctrl,
        &mut motor_driver,
        &mut detector,
        debug_sink,
        &cancelled,
    );

    // ---- SHUTDOWN ----

    // Runs on every exit path, loop error included, before the error is
    // propagated.
    motor_driver.shutdown();

    info!("End of execution");

    session.exit();

    loop_result
}

/// Run the control loop until the observation stream ends, the process is
/// interrupted, or an actuation error occurs.
fn run_loop<P: PulseOutput, D: Detector>(
    track_ctrl: &mut TrackCtrl,
    motor_driver: &mut MotorDriver<P>,
    detector: &mut D,
    debug_sink: Option<DebugSink>,
    cancelled: &AtomicBool,
) -> Result<(), Report> {
    let mut num_cycles: u64 = 0;
    let mut last_mode = track_ctrl.mode();
    let mut rate_report_instant = Instant::now();
    let mut rate_report_cycles: u64 = 0;

    loop {
        if cancelled.load(Ordering::Relaxed) {
            info!("Interrupted, stopping");
            break;
        }

        // ---- DATA INPUT ----

        // Blocks until the next frame is due
        let obs = match detector
            .next_observation()
            .wrap_err("Failed to acquire an observation")?
        {
            Some(obs) => obs,
            None => {
                info!("End of observation stream reached, stopping");
                break;
            }
        };

        // ---- CONTROL ALGORITHM PROCESSING ----

        let (cmd, report) = track_ctrl
            .proc(&obs)
            .wrap_err("Error during TrackCtrl processing")?;

        if report.mode != last_mode {
            info!("TrackCtrl mode: {:?} -> {:?}", last_mode, report.mode);
            last_mode = report.mode;
        }
        if report.steer_saturated {
            debug!("Steering demand saturated");
        }
        if report.speed_limited {
            warn!("Speed demand limited to the safe range");
        }

        // ---- MOTOR DRIVER EXECUTION ----

        // An actuation error is fatal: the hardware state is unknown, so
        // break out to the safety shutdown rather than keep commanding it.
        motor_driver
            .apply(&cmd)
            .wrap_err("Error during MotorDriver processing")?;

        // ---- DEBUG OUTPUT ----

        if let Some(ref sink) = debug_sink {
            sink.record(DebugRecord {
                cycle: num_cycles,
                elapsed_s: session::get_elapsed_seconds(),
                obs,
                mode: report.mode,
                report,
                cmd,
            });
        }

        // ---- CYCLE MANAGEMENT ----

        num_cycles += 1;
        rate_report_cycles += 1;

        let report_elapsed = rate_report_instant.elapsed().as_secs_f64();
        if report_elapsed >= RATE_REPORT_PERIOD_S {
            info!(
                "Processed {} frames in {:.02} s ({:.01} Hz)",
                rate_report_cycles,
                report_elapsed,
                (rate_report_cycles as f64) / report_elapsed
            );
            rate_report_instant = Instant::now();
            rate_report_cycles = 0;
        }
    }

    info!("Processed {} frames in total", num_cycles);

    Ok(())
}
