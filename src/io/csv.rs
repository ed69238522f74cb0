use std::io::{self, Write};
use std::path::Path;

use crate::sim::Sample;

/// Write flight samples to CSV format.
///
/// Columns: time, altitude, vertical_speed, lateral_speed, gravity,
///          alignment, phase, up_status, correction_factor
pub fn write_trajectory<W: Write>(writer: &mut W, samples: &[Sample]) -> io::Result<()> {
    writeln!(
        writer,
        "time,altitude,vertical_speed,lateral_speed,gravity,\
         alignment,phase,up_status,correction_factor"
    )?;

    for s in samples {
        writeln!(
            writer,
            "{:.4},{:.2},{:.3},{:.3},{:.4},{:.6},{},{},{:.6}",
            s.time,
            s.altitude,
            s.vertical_speed,
            s.lateral_speed,
            s.gravity,
            s.alignment,
            s.phase,
            s.up_status,
            s.correction_factor,
        )?;
    }

    Ok(())
}

/// Write flight samples to a CSV file at the given path.
pub fn write_trajectory_file(path: impl AsRef<Path>, samples: &[Sample]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_trajectory(&mut file, samples)
}
