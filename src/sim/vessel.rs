use nalgebra::{UnitQuaternion, Vector3};
use strum::IntoEnumIterator;

use crate::error::SinkError;
use crate::gnc::rotation::GYRO_AXIS_SIGN;
use crate::math::RPM_TO_RAD_PER_SEC;
use crate::physics::atmosphere::{atmospheric_efficiency, density_ratio, ion_efficiency};
use crate::physics::gravity::{local_up, Planet};
use crate::vehicle::actuators::{GyroId, ThrusterId};
use crate::vehicle::{
    ActuatorSink, Direction, FuelClass, GyroAxis, GyroSpec, PilotInput, Telemetry, ThrusterSpec,
    VehicleState,
};

/// Time constant of the inertial dampeners' velocity cancellation, s.
const DAMPENER_TIME: f64 = 0.5;

// ---------------------------------------------------------------------------
// Simulated actuators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimThruster {
    pub spec: ThrusterSpec,
    pub max_thrust: f64, // N, rated
    pub thrust_override: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct SimGyro {
    pub spec: GyroSpec,
    pub overridden: bool,
    pub setting: Vector3<f64>, // RPM, gyro convention
}

// ---------------------------------------------------------------------------
// Rigid body host
// ---------------------------------------------------------------------------

/// A vessel flying in one planet's gravity well. Implements both host traits
/// so the autopilot can drive it directly.
#[derive(Debug, Clone)]
pub struct SimVessel {
    pub name: String,
    pub planet: Planet,
    pub mass: f64,                        // kg
    pub inertia: f64,                     // kg·m^2, same about every axis
    pub position: Vector3<f64>,           // m, world
    pub velocity: Vector3<f64>,           // m/s, world
    pub angular_velocity: Vector3<f64>,   // rad/s, world
    pub orientation: UnitQuaternion<f64>, // local→world
    pub thrusters: Vec<SimThruster>,
    pub gyros: Vec<SimGyro>,
    pub dampeners: bool,
    pub restrained: bool,
    pub completed: bool,
    pub pilot: PilotInput,
    pub layout_version: u64,
}

impl SimVessel {
    pub fn altitude(&self) -> f64 {
        self.planet.altitude(&self.position)
    }

    pub fn gravity(&self) -> Vector3<f64> {
        self.planet.gravity_accel(&self.position)
    }

    pub fn up(&self) -> Vector3<f64> {
        local_up(&self.planet, &self.position)
    }

    pub fn vertical_speed(&self) -> f64 {
        self.velocity.dot(&self.up())
    }

    pub fn lateral_speed(&self) -> f64 {
        let up = self.up();
        (self.velocity - up * self.velocity.dot(&up)).norm()
    }

    pub fn density(&self) -> f64 {
        density_ratio(&self.planet, self.altitude())
    }

    /// Combined gyro torque, N·m.
    pub fn gyro_torque(&self) -> f64 {
        self.gyros.iter().map(|g| g.spec.rated_torque * g.spec.power * 1000.0).sum()
    }

    fn thruster_effective(&self, t: &SimThruster) -> f64 {
        let density = self.density();
        match t.spec.fuel {
            FuelClass::Atmospheric => t.max_thrust * atmospheric_efficiency(density),
            FuelClass::Hydrogen => t.max_thrust,
            FuelClass::Ion => t.max_thrust * ion_efficiency(density),
        }
    }

    fn thruster(&mut self, id: ThrusterId) -> Result<&mut SimThruster, SinkError> {
        self.thrusters
            .iter_mut()
            .find(|t| t.spec.id == id)
            .ok_or(SinkError::UnknownThruster(id))
    }

    fn gyro(&mut self, id: GyroId) -> Result<&mut SimGyro, SinkError> {
        self.gyros.iter_mut().find(|g| g.spec.id == id).ok_or(SinkError::UnknownGyro(id))
    }

    /// Net thrust force in the vessel frame, N.
    pub fn thrust_force_local(&self) -> Vector3<f64> {
        let mut force = Vector3::zeros();
        let mut capacity = [0.0; 6];
        for t in self.thrusters.iter().filter(|t| t.enabled) {
            let eff = self.thruster_effective(t);
            if t.thrust_override > 0.0 {
                force += t.spec.force_direction.vector() * eff * t.thrust_override;
            } else {
                capacity[t.spec.force_direction as usize] += eff;
            }
        }
        if !self.dampeners {
            return force;
        }

        // dampeners fill the gap with whatever is not overridden
        let wanted_world = self.mass * (-self.gravity() - self.velocity / DAMPENER_TIME);
        let wanted = self.orientation.inverse_transform_vector(&wanted_world) - force;
        for dir in Direction::iter() {
            let demand = wanted.dot(&dir.vector());
            let cap = capacity[dir as usize];
            if demand > 0.0 && cap > 0.0 {
                force += dir.vector() * demand.min(cap);
            }
        }
        force
    }

    /// Angular velocity the overridden gyros ask for (world), if any is overridden.
    fn gyro_target(&self) -> Option<Vector3<f64>> {
        let mut sum = Vector3::zeros();
        let mut n = 0;
        for g in self.gyros.iter().filter(|g| g.overridden) {
            let local = g.setting.component_mul(&GYRO_AXIS_SIGN) * RPM_TO_RAD_PER_SEC;
            sum += self.orientation * (g.spec.mount * local);
            n += 1;
        }
        (n > 0).then(|| sum / n as f64)
    }

    /// Advances the body by `dt` seconds (semi-implicit Euler).
    pub fn step(&mut self, dt: f64) {
        // rotation: gyros chase their target, or damp rotation when free
        let max_change = if self.inertia > 0.0 { self.gyro_torque() / self.inertia * dt } else { 0.0 };
        if !self.gyros.is_empty() {
            let target = self.gyro_target().unwrap_or_else(Vector3::zeros);
            let delta = target - self.angular_velocity;
            let n = delta.norm();
            self.angular_velocity += if n > max_change { delta * (max_change / n) } else { delta };
        }
        if self.restrained {
            self.velocity = Vector3::zeros();
            self.angular_velocity = Vector3::zeros();
            return;
        }
        self.orientation = UnitQuaternion::from_scaled_axis(self.angular_velocity * dt) * self.orientation;

        let force = self.orientation * self.thrust_force_local();
        let accel = self.gravity() + force / self.mass;
        self.velocity += accel * dt;
        self.position += self.velocity * dt;

        // ground contact
        if self.altitude() < 0.0 {
            let up = self.up();
            self.position = self.planet.center + up * self.planet.radius;
            let into_ground = self.velocity.dot(&up).min(0.0);
            self.velocity -= up * into_ground;
        }
    }
}

impl Telemetry for SimVessel {
    fn sample(&self) -> VehicleState {
        VehicleState {
            mass: self.mass,
            position: self.position,
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
            orientation: self.orientation,
            gravity: self.gravity(),
            pilot: self.pilot,
        }
    }

    fn thrusters(&self) -> Vec<ThrusterSpec> {
        self.thrusters.iter().map(|t| t.spec.clone()).collect()
    }

    fn gyros(&self) -> Vec<GyroSpec> {
        self.gyros.iter().map(|g| g.spec.clone()).collect()
    }

    fn layout_version(&self) -> u64 {
        self.layout_version
    }

    fn effective_thrust(&self, id: ThrusterId) -> f64 {
        self.thrusters
            .iter()
            .find(|t| t.spec.id == id)
            .map(|t| self.thruster_effective(t))
            .unwrap_or(0.0)
    }

    fn gyro_setting(&self, id: GyroId) -> Vector3<f64> {
        self.gyros
            .iter()
            .find(|g| g.spec.id == id)
            .map(|g| g.setting)
            .unwrap_or_else(Vector3::zeros)
    }
}

impl ActuatorSink for SimVessel {
    fn set_thrust_override(&mut self, id: ThrusterId, fraction: f64) -> Result<(), SinkError> {
        self.thruster(id)?.thrust_override = fraction.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_thruster_enabled(&mut self, id: ThrusterId, enabled: bool) -> Result<(), SinkError> {
        self.thruster(id)?.enabled = enabled;
        Ok(())
    }

    fn set_gyro_override(&mut self, id: GyroId, enabled: bool) -> Result<(), SinkError> {
        let g = self.gyro(id)?;
        g.overridden = enabled;
        if !enabled {
            g.setting = Vector3::zeros();
        }
        Ok(())
    }

    fn set_gyro_axis(&mut self, id: GyroId, axis: GyroAxis, rpm: f64) -> Result<(), SinkError> {
        let g = self.gyro(id)?;
        let rpm = rpm.clamp(-g.spec.max_rpm, g.spec.max_rpm);
        match axis {
            GyroAxis::Pitch => g.setting.x = rpm,
            GyroAxis::Yaw => g.setting.y = rpm,
            GyroAxis::Roll => g.setting.z = rpm,
        }
        Ok(())
    }

    fn set_dampeners(&mut self, enabled: bool) -> Result<(), SinkError> {
        self.dampeners = enabled;
        Ok(())
    }

    fn release_restraints(&mut self) -> Result<(), SinkError> {
        self.restrained = false;
        Ok(())
    }

    fn trigger_completion(&mut self) -> Result<(), SinkError> {
        self.completed = true;
        Ok(())
    }
}
