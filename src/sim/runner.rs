use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::vessel::SimVessel;
use crate::ascent::{AscentPhase, Autopilot, Schedule, TickReport, UpStatus};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub dt: f64,       // s
    pub max_time: f64, // s
    /// Keep integrating this long after the autopilot goes idle.
    pub coast_time: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { dt: 1.0 / 60.0, max_time: 1200.0, coast_time: 0.0 }
    }
}

/// One recorded point of the flight.
#[derive(Debug, Clone)]
pub struct Sample {
    pub time: f64,
    pub altitude: f64,
    pub vertical_speed: f64,
    pub lateral_speed: f64,
    pub gravity: f64,
    pub alignment: f64,
    pub phase: AscentPhase,
    pub up_status: UpStatus,
    pub correction_factor: f64,
}

impl Sample {
    fn record(time: f64, vessel: &SimVessel, report: &TickReport) -> Self {
        Self {
            time,
            altitude: vessel.altitude(),
            vertical_speed: vessel.vertical_speed(),
            lateral_speed: vessel.lateral_speed(),
            gravity: vessel.gravity().norm(),
            alignment: report.alignment,
            phase: report.phase,
            up_status: report.up_status,
            correction_factor: report.correction_factor,
        }
    }
}

// ---------------------------------------------------------------------------
// Flight loop
// ---------------------------------------------------------------------------

/// Ticks the autopilot and integrates the vessel at a fixed step for as long as
/// the autopilot asks to be scheduled (then `coast_time` more), or `max_time`.
/// Tick failures are logged; the autopilot handles its own fail-safe.
pub fn simulate(vessel: &mut SimVessel, autopilot: &mut Autopilot, config: &SimConfig) -> Vec<Sample> {
    let epoch = Instant::now();
    let capacity = ((config.max_time / config.dt) as usize + 1).min(200_000);
    let mut samples = Vec::with_capacity(capacity);
    let mut report = idle_report(autopilot);
    let mut idle_since: Option<f64> = None;
    let mut time = 0.0;

    while time < config.max_time {
        if idle_since.is_none() {
            let now = epoch + Duration::from_secs_f64(time);
            match autopilot.tick(vessel, now) {
                Ok(r) => report = r,
                Err(e) => warn!(time, "{e}"),
            }
            if report.schedule == Schedule::Idle {
                info!(time, altitude = vessel.altitude(), "autopilot idle");
                idle_since = Some(time);
            }
        }
        samples.push(Sample::record(time, vessel, &report));
        if idle_since.is_some_and(|t| time - t >= config.coast_time) {
            break;
        }

        vessel.step(config.dt);
        time += config.dt;
    }

    samples
}

fn idle_report(autopilot: &Autopilot) -> TickReport {
    TickReport {
        phase: autopilot.phase(),
        up_status: autopilot.up_status(),
        schedule: autopilot.schedule(),
        correction_factor: autopilot.correction_factor(),
        alignment: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
