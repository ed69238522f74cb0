use std::time::Instant;

use nalgebra::{UnitQuaternion, Vector3};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::warn;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FuelClass {
    Atmospheric,
    Hydrogen,
    Ion,
}

/// Base directions in the reference controller's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Backward,
}

impl Direction {
    pub fn vector(self) -> Vector3<f64> {
        match self {
            Direction::Up => Vector3::y(),
            Direction::Down => -Vector3::y(),
            Direction::Left => -Vector3::x(),
            Direction::Right => Vector3::x(),
            Direction::Forward => -Vector3::z(),
            Direction::Backward => Vector3::z(),
        }
    }
}

pub type ThrusterId = usize;
pub type GyroId = usize;

/// Static description of one thruster.
#[derive(Debug, Clone)]
pub struct ThrusterSpec {
    pub id: ThrusterId,
    pub fuel: FuelClass,
    /// Direction of the force the thruster applies to the vehicle.
    pub force_direction: Direction,
}

/// Static description of one gyroscope.
#[derive(Debug, Clone)]
pub struct GyroSpec {
    pub id: GyroId,
    /// gyro-local → vehicle-local
    pub mount: UnitQuaternion<f64>,
    /// Rated torque in kN·m.
    pub rated_torque: f64,
    /// Power setting, 0..1.
    pub power: f64,
    /// Largest settable rate per axis, RPM.
    pub max_rpm: f64,
}

// ---------------------------------------------------------------------------
// Classified snapshot, rebuilt on rescan
// ---------------------------------------------------------------------------

/// Thrusters split by mounting direction and fuel class.
/// Up-direction lists are disjoint and together hold every up thruster.
#[derive(Debug, Clone, Default)]
pub struct ActuatorSet {
    pub up_atmo: Vec<ThrusterId>,
    pub up_hydrogen: Vec<ThrusterId>,
    pub up_ion: Vec<ThrusterId>,
    pub not_up: Vec<(ThrusterId, FuelClass)>,
    pub version: u64,
}

impl ActuatorSet {
    pub fn rescan(thrusters: &[ThrusterSpec], version: u64) -> Self {
        let mut set = ActuatorSet { version, ..Default::default() };
        for t in thrusters {
            if t.force_direction != Direction::Up {
                set.not_up.push((t.id, t.fuel));
                continue;
            }
            match t.fuel {
                FuelClass::Atmospheric => set.up_atmo.push(t.id),
                FuelClass::Hydrogen => set.up_hydrogen.push(t.id),
                FuelClass::Ion => set.up_ion.push(t.id),
            }
        }
        if set.up_count() == 0 {
            warn!("no thrusters push along the controller's up axis");
        }
        set
    }

    pub fn up(&self, fuel: FuelClass) -> &[ThrusterId] {
        match fuel {
            FuelClass::Atmospheric => &self.up_atmo,
            FuelClass::Hydrogen => &self.up_hydrogen,
            FuelClass::Ion => &self.up_ion,
        }
    }

    pub fn up_count(&self) -> usize {
        self.up_atmo.len() + self.up_hydrogen.len() + self.up_ion.len()
    }

    /// Every up thruster with its class.
    pub fn all_up(&self) -> impl Iterator<Item = (ThrusterId, FuelClass)> + '_ {
        self.up_atmo
            .iter()
            .map(|&id| (id, FuelClass::Atmospheric))
            .chain(self.up_hydrogen.iter().map(|&id| (id, FuelClass::Hydrogen)))
            .chain(self.up_ion.iter().map(|&id| (id, FuelClass::Ion)))
    }
}

// ---------------------------------------------------------------------------
// Gyros with per-actuator rate limiting state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GyroSlot {
    pub spec: GyroSpec,
    /// Do not write new settings before this instant.
    pub next_update: Instant,
    /// Last override flag written, if any.
    pub overridden: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct GyroSet {
    pub slots: Vec<GyroSlot>,
    /// Combined torque of the vessel, kN·m.
    pub total_torque: f64,
}

impl GyroSet {
    pub fn rescan(gyros: &[GyroSpec], now: Instant) -> Self {
        let slots: Vec<GyroSlot> = gyros
            .iter()
            .map(|g| GyroSlot { spec: g.clone(), next_update: now, overridden: None })
            .collect();
        let total_torque = gyros.iter().map(|g| g.rated_torque * g.power).sum();
        if slots.is_empty() {
            warn!("no gyros found; orientation is display-only");
        }
        Self { slots, total_torque }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
