use std::ops::{Index, IndexMut};

use tracing::debug;

use crate::config::AscentTuning;
use crate::error::Result;
use crate::math::override_fraction;
use crate::vehicle::actuators::ThrusterId;
use crate::vehicle::{ActuatorSink, FuelClass};

// ---------------------------------------------------------------------------
// Per fuel class values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerClass<T> {
    pub atmospheric: T,
    pub hydrogen: T,
    pub ion: T,
}

impl<T> Index<FuelClass> for PerClass<T> {
    type Output = T;

    fn index(&self, fuel: FuelClass) -> &T {
        match fuel {
            FuelClass::Atmospheric => &self.atmospheric,
            FuelClass::Hydrogen => &self.hydrogen,
            FuelClass::Ion => &self.ion,
        }
    }
}

impl<T> IndexMut<FuelClass> for PerClass<T> {
    fn index_mut(&mut self, fuel: FuelClass) -> &mut T {
        match fuel {
            FuelClass::Atmospheric => &mut self.atmospheric,
            FuelClass::Hydrogen => &mut self.hydrogen,
            FuelClass::Ion => &mut self.ion,
        }
    }
}

/// The two secondary classes, preferred one first.
pub fn secondary_order(prefer_hydrogen: bool) -> [FuelClass; 2] {
    if prefer_hydrogen {
        [FuelClass::Hydrogen, FuelClass::Ion]
    } else {
        [FuelClass::Ion, FuelClass::Hydrogen]
    }
}

// ---------------------------------------------------------------------------
// Override fractions
// ---------------------------------------------------------------------------

/// Secondary class fractions in priority order. The atmospheric total counts
/// as committed in full; the second class covers what the first two leave.
pub fn priority_overrides(
    minimum: f64,
    totals: &PerClass<f64>,
    prefer_hydrogen: bool,
) -> PerClass<f64> {
    let [first, second] = secondary_order(prefer_hydrogen);
    let mut out = PerClass::default();
    out[first] = override_fraction(minimum - totals.atmospheric, totals[first]);
    out[second] =
        override_fraction(minimum - (totals.atmospheric + totals[first]), totals[second]);
    out
}

/// FIRST_MAX: atmospheric flat out when it works at all; secondaries cover the
/// rest of `weight + added acceleration`, or run flat out while falling.
pub fn first_max_overrides(
    minimum: f64,
    totals: &PerClass<f64>,
    atmo_available: bool,
    falling: bool,
    prefer_hydrogen: bool,
) -> PerClass<f64> {
    let mut out = if falling {
        PerClass { atmospheric: 0.0, hydrogen: 1.0, ion: 1.0 }
    } else {
        priority_overrides(minimum, totals, prefer_hydrogen)
    };
    out.atmospheric = if atmo_available { 1.0 } else { 0.0 };
    out
}

/// SPEED_HOLD: atmospheric throttled to the held thrust, secondaries by priority.
pub fn speed_hold_overrides(
    minimum: f64,
    totals: &PerClass<f64>,
    atmo_available: bool,
    prefer_hydrogen: bool,
) -> PerClass<f64> {
    let mut out = priority_overrides(minimum, totals, prefer_hydrogen);
    out.atmospheric =
        if atmo_available { override_fraction(minimum, totals.atmospheric) } else { 0.0 };
    out
}

/// Classes to switch on to keep from falling, in escalation order.
/// The last one is also the only class left enabled on non-up thrusters.
pub fn hover_hold_classes(
    minimum: f64,
    totals: &PerClass<f64>,
    atmo_available: bool,
    prefer_hydrogen: bool,
) -> Vec<FuelClass> {
    let mut classes = Vec::with_capacity(3);
    if atmo_available {
        classes.push(FuelClass::Atmospheric);
    }
    if totals.atmospheric < minimum {
        let [first, second] = secondary_order(prefer_hydrogen);
        classes.push(first);
        if totals.atmospheric + totals[first] < minimum {
            classes.push(second);
        }
    }
    classes
}

// ---------------------------------------------------------------------------
// Speed regulation
// ---------------------------------------------------------------------------

/// Scalar cruise regulator. Overspeed pulls the factor down a full step,
/// underspeed or deceleration pushes it up half a step.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedRegulator {
    correction_factor: f64,
}

impl SpeedRegulator {
    pub const INITIAL: f64 = 1.01;

    pub fn new() -> Self {
        Self { correction_factor: Self::INITIAL }
    }

    pub fn with_factor(correction_factor: f64) -> Self {
        Self { correction_factor }
    }

    pub fn correction_factor(&self) -> f64 {
        self.correction_factor
    }

    pub fn reset(&mut self) {
        self.correction_factor = Self::INITIAL;
    }

    /// `speed` is the total ship speed; `vdiff` the change of speed against
    /// gravity since the previous tick. Returns the new factor.
    pub fn update(&mut self, speed: f64, vdiff: f64, tuning: &AscentTuning) -> f64 {
        let high = tuning.speed_high_threshold;
        let eps = tuning.deceleration_epsilon;
        if speed > high && vdiff > eps {
            self.correction_factor -= tuning.correction_step;
        }
        if speed < high || vdiff < eps {
            self.correction_factor += tuning.correction_step / 2.0;
        }
        self.correction_factor
    }
}

impl Default for SpeedRegulator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Writing overrides
// ---------------------------------------------------------------------------

/// Clamps to [0, 1], writes the override to every thruster, and switches the
/// thrusters off when the override is zero.
pub fn set_overrides_and_shut<H>(hw: &mut H, ids: &[ThrusterId], fraction: f64) -> Result<()>
where
    H: ActuatorSink + ?Sized,
{
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    for &id in ids {
        hw.set_thrust_override(id, fraction)?;
        hw.set_thruster_enabled(id, fraction != 0.0)?;
    }
    Ok(())
}

pub fn set_overrides<H>(hw: &mut H, ids: &[ThrusterId], fraction: f64) -> Result<()>
where
    H: ActuatorSink + ?Sized,
{
    for &id in ids {
        hw.set_thrust_override(id, fraction)?;
    }
    Ok(())
}

pub fn enable_all<H>(hw: &mut H, ids: &[ThrusterId], enabled: bool) -> Result<()>
where
    H: ActuatorSink + ?Sized,
{
    for &id in ids {
        hw.set_thruster_enabled(id, enabled)?;
    }
    Ok(())
}

pub(crate) fn log_overrides(stage: &'static str, minimum: f64, o: &PerClass<f64>) {
    debug!(stage, minimum, atmo = o.atmospheric, hydrogen = o.hydrogen, ion = o.ion, "overrides");
}
