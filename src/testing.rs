//! In-memory host used by unit tests. Records every write.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};

use crate::error::SinkError;
use crate::vehicle::actuators::{GyroId, ThrusterId};
use crate::vehicle::{
    ActuatorSink, Direction, FuelClass, GyroAxis, GyroSpec, PilotInput, Telemetry, ThrusterSpec,
    VehicleState,
};

#[derive(Debug, Clone)]
pub struct FakeHost {
    pub state: VehicleState,
    pub thruster_specs: Vec<ThrusterSpec>,
    pub gyro_specs: Vec<GyroSpec>,
    pub layout_version: u64,
    pub effective: HashMap<ThrusterId, f64>,

    pub overrides: HashMap<ThrusterId, f64>,
    pub enabled: HashMap<ThrusterId, bool>,
    pub gyro_override: HashMap<GyroId, bool>,
    pub gyro_settings: HashMap<GyroId, Vector3<f64>>,
    pub dampeners: Option<bool>,
    pub restraint_releases: usize,
    pub completions: usize,
    pub writes: usize,
    /// Makes every write fail as if the block was torn off.
    pub detached: bool,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    /// Hovering at rest in 9.81 m/s² gravity, no actuators.
    pub fn new() -> Self {
        Self {
            state: VehicleState {
                mass: 10_000.0,
                position: Vector3::zeros(),
                velocity: Vector3::zeros(),
                angular_velocity: Vector3::zeros(),
                orientation: UnitQuaternion::identity(),
                gravity: Vector3::new(0.0, -9.81, 0.0),
                pilot: PilotInput::default(),
            },
            thruster_specs: Vec::new(),
            gyro_specs: Vec::new(),
            layout_version: 1,
            effective: HashMap::new(),
            overrides: HashMap::new(),
            enabled: HashMap::new(),
            gyro_override: HashMap::new(),
            gyro_settings: HashMap::new(),
            dampeners: None,
            restraint_releases: 0,
            completions: 0,
            writes: 0,
            detached: false,
        }
    }

    pub fn with_gyros(n: usize) -> Self {
        let mut host = Self::new();
        for id in 0..n {
            host.gyro_specs.push(GyroSpec {
                id,
                mount: UnitQuaternion::identity(),
                rated_torque: 1.35e5,
                power: 1.0,
                max_rpm: 60.0,
            });
        }
        host
    }

    /// Adds a thruster and returns its id.
    pub fn add_thruster(&mut self, fuel: FuelClass, dir: Direction, effective: f64) -> ThrusterId {
        let id = self.thruster_specs.len();
        self.thruster_specs.push(ThrusterSpec { id, fuel, force_direction: dir });
        self.effective.insert(id, effective);
        self.layout_version += 1;
        id
    }

    pub fn override_of(&self, id: ThrusterId) -> f64 {
        self.overrides.get(&id).copied().unwrap_or(0.0)
    }

    pub fn is_enabled(&self, id: ThrusterId) -> bool {
        self.enabled.get(&id).copied().unwrap_or(true)
    }

    fn write(&mut self) -> Result<(), SinkError> {
        if self.detached {
            return Err(SinkError::Detached("fake host".into()));
        }
        self.writes += 1;
        Ok(())
    }

    fn known_thruster(&self, id: ThrusterId) -> Result<(), SinkError> {
        if id < self.thruster_specs.len() {
            Ok(())
        } else {
            Err(SinkError::UnknownThruster(id))
        }
    }

    fn known_gyro(&self, id: GyroId) -> Result<(), SinkError> {
        if self.gyro_specs.iter().any(|g| g.id == id) {
            Ok(())
        } else {
            Err(SinkError::UnknownGyro(id))
        }
    }
}

impl Telemetry for FakeHost {
    fn sample(&self) -> VehicleState {
        self.state.clone()
    }

    fn thrusters(&self) -> Vec<ThrusterSpec> {
        self.thruster_specs.clone()
    }

    fn gyros(&self) -> Vec<GyroSpec> {
        self.gyro_specs.clone()
    }

    fn layout_version(&self) -> u64 {
        self.layout_version
    }

    fn effective_thrust(&self, id: ThrusterId) -> f64 {
        self.effective.get(&id).copied().unwrap_or(0.0)
    }

    fn gyro_setting(&self, id: GyroId) -> Vector3<f64> {
        self.gyro_settings.get(&id).copied().unwrap_or_else(Vector3::zeros)
    }
}

impl ActuatorSink for FakeHost {
    fn set_thrust_override(&mut self, id: ThrusterId, fraction: f64) -> Result<(), SinkError> {
        self.known_thruster(id)?;
        self.write()?;
        self.overrides.insert(id, fraction);
        Ok(())
    }

    fn set_thruster_enabled(&mut self, id: ThrusterId, enabled: bool) -> Result<(), SinkError> {
        self.known_thruster(id)?;
        self.write()?;
        self.enabled.insert(id, enabled);
        Ok(())
    }

    fn set_gyro_override(&mut self, id: GyroId, enabled: bool) -> Result<(), SinkError> {
        self.known_gyro(id)?;
        self.write()?;
        self.gyro_override.insert(id, enabled);
        Ok(())
    }

    fn set_gyro_axis(&mut self, id: GyroId, axis: GyroAxis, rpm: f64) -> Result<(), SinkError> {
        self.known_gyro(id)?;
        self.write()?;
        let s = self.gyro_settings.entry(id).or_insert_with(Vector3::zeros);
        match axis {
            GyroAxis::Pitch => s.x = rpm,
            GyroAxis::Yaw => s.y = rpm,
            GyroAxis::Roll => s.z = rpm,
        }
        Ok(())
    }

    fn set_dampeners(&mut self, enabled: bool) -> Result<(), SinkError> {
        self.write()?;
        self.dampeners = Some(enabled);
        Ok(())
    }

    fn release_restraints(&mut self) -> Result<(), SinkError> {
        self.write()?;
        self.restraint_releases += 1;
        Ok(())
    }

    fn trigger_completion(&mut self) -> Result<(), SinkError> {
        self.write()?;
        self.completions += 1;
        Ok(())
    }
}
