use std::io::{self, Write};
use std::path::Path;

use crate::ascent::{AscentPhase, UpStatus};
use crate::sim::Sample;

/// Summary statistics computed from a flight.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSummary {
    pub max_altitude: f64,
    pub max_vertical_speed: f64,
    pub max_lateral_speed: f64,
    pub min_alignment: f64,
    /// First time the speed hold engaged, if it did.
    pub speed_hold_time: Option<f64>,
    /// First time gravity read zero.
    pub free_space_time: Option<f64>,
    pub flight_time: f64,
    pub final_phase: AscentPhase,
}

impl FlightSummary {
    /// Compute summary from flight samples; `None` for an empty flight.
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        let last = samples.last()?;

        let max_altitude = samples.iter().map(|s| s.altitude).fold(f64::MIN, f64::max);
        let max_vertical_speed = samples.iter().map(|s| s.vertical_speed).fold(f64::MIN, f64::max);
        let max_lateral_speed = samples.iter().map(|s| s.lateral_speed).fold(0.0_f64, f64::max);
        let min_alignment = samples
            .iter()
            .filter(|s| s.phase == AscentPhase::GoingUp)
            .map(|s| s.alignment)
            .fold(1.0_f64, f64::min);

        let speed_hold_time = samples
            .iter()
            .find(|s| s.up_status == UpStatus::SpeedHold)
            .map(|s| s.time);
        let free_space_time = samples.iter().find(|s| s.gravity == 0.0).map(|s| s.time);

        Some(FlightSummary {
            max_altitude,
            max_vertical_speed,
            max_lateral_speed,
            min_alignment,
            speed_hold_time,
            free_space_time,
            flight_time: last.time,
            final_phase: last.phase,
        })
    }
}

fn optional(v: Option<f64>) -> String {
    v.map_or_else(|| "null".to_string(), |t| format!("{t:.2}"))
}

/// Write flight summary as JSON.
pub fn write_summary<W: Write>(
    writer: &mut W,
    vessel: &str,
    summary: &FlightSummary,
) -> io::Result<()> {
    writeln!(writer, "{{")?;
    writeln!(writer, "  \"vessel\": \"{vessel}\",")?;
    writeln!(writer, "  \"performance\": {{")?;
    writeln!(writer, "    \"max_altitude_m\": {:.2},", summary.max_altitude)?;
    writeln!(writer, "    \"max_vertical_speed_ms\": {:.2},", summary.max_vertical_speed)?;
    writeln!(writer, "    \"max_lateral_speed_ms\": {:.3},", summary.max_lateral_speed)?;
    writeln!(writer, "    \"min_alignment\": {:.5},", summary.min_alignment)?;
    writeln!(writer, "    \"speed_hold_time_s\": {},", optional(summary.speed_hold_time))?;
    writeln!(writer, "    \"free_space_time_s\": {},", optional(summary.free_space_time))?;
    writeln!(writer, "    \"flight_time_s\": {:.2},", summary.flight_time)?;
    writeln!(writer, "    \"final_phase\": \"{}\"", summary.final_phase)?;
    writeln!(writer, "  }}")?;
    writeln!(writer, "}}")?;
    Ok(())
}

/// Write flight summary JSON to a file.
pub fn write_summary_file(
    path: impl AsRef<Path>,
    vessel: &str,
    summary: &FlightSummary,
) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_summary(&mut file, vessel, summary)
}
