use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// Unit conversions
// ---------------------------------------------------------------------------

pub const DEG2RAD: f64 = PI / 180.0;
pub const RAD2DEG: f64 = 180.0 / PI;
pub const RPM_TO_RAD_PER_SEC: f64 = PI / 30.0;
pub const RAD_PER_SEC_TO_RPM: f64 = 30.0 / PI;

// ---------------------------------------------------------------------------
// Shaping helpers
// ---------------------------------------------------------------------------

pub fn clamp_abs(x: f64, limit: f64) -> f64 {
    x.clamp(-limit, limit)
}

/// Clips out a region of half-width `clip` around zero and closes the gap linearly.
pub fn dead_zone(x: f64, clip: f64) -> f64 {
    if x < -clip {
        x + clip
    } else if x > clip {
        x - clip
    } else {
        0.0
    }
}

/// Slides any non-zero value away from zero by `pad`.
pub fn boost_zone(x: f64, pad: f64) -> f64 {
    if x < -f64::EPSILON {
        x - pad
    } else if x > f64::EPSILON {
        x + pad
    } else {
        0.0
    }
}

/// Divides, treating a zero, negative or non-finite capacity as "contributes nothing".
/// The result is clamped to the override range [0, 1].
pub fn override_fraction(needed: f64, capacity: f64) -> f64 {
    if !capacity.is_finite() || capacity <= 0.0 {
        return 0.0;
    }
    let f = needed / capacity;
    if f.is_nan() {
        0.0
    } else {
        f.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Minimum-delta write filter
// ---------------------------------------------------------------------------

/// Thresholds for the minimum-delta filter applied to actuator settings.
#[derive(Debug, Clone, Copy)]
pub struct MinDelta {
    /// Values smaller than this are flushed to zero.
    pub tiny: f64,
    /// Required change as a fraction of the current magnitude.
    pub fraction: f64,
    /// Absolute floor added to the required change.
    pub floor: f64,
}

impl MinDelta {
    pub const GYRO: MinDelta = MinDelta { tiny: 0.05, fraction: 0.05, floor: 0.002 };
    pub const FORCED: MinDelta = MinDelta { tiny: 0.0, fraction: 0.0, floor: 0.002 };

    /// Returns the value to write, or `None` when `old` is already close enough.
    pub fn filter(&self, old: f64, new: f64, limit: f64) -> Option<f64> {
        let mut v = clamp_abs(new, limit);
        if v.abs() < self.tiny {
            v = 0.0;
        }
        let min_delta = old.abs() * self.fraction + self.floor;
        if (v == 0.0 && old == 0.0) || (old - v).abs() < min_delta {
            None
        } else {
            Some(v)
        }
    }
}
