use nalgebra::{UnitQuaternion, Vector3};

use super::vessel::{SimGyro, SimThruster, SimVessel};
use crate::math::DEG2RAD;
use crate::physics::Planet;
use crate::vehicle::{Direction, FuelClass, GyroSpec, PilotInput, ThrusterSpec};

// ---------------------------------------------------------------------------
// Vessel builder
// ---------------------------------------------------------------------------

pub struct VesselBuilder {
    name: String,
    mass: f64,
    radius_of_gyration: f64,
    planet: Planet,
    tilt_degrees: f64,
    thrusters: Vec<(FuelClass, Direction, f64)>,
    gyros: Vec<(f64, f64)>,
    gyro_max_rpm: f64,
}

impl VesselBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mass: 10_000.0,
            radius_of_gyration: 5.0,
            planet: Planet::earthlike(),
            tilt_degrees: 0.0,
            thrusters: Vec::new(),
            gyros: Vec::new(),
            gyro_max_rpm: 60.0,
        }
    }

    pub fn mass(mut self, v: f64) -> Self { self.mass = v; self }
    pub fn radius_of_gyration(mut self, v: f64) -> Self { self.radius_of_gyration = v; self }
    pub fn planet(mut self, v: Planet) -> Self { self.planet = v; self }
    pub fn tilt_degrees(mut self, v: f64) -> Self { self.tilt_degrees = v; self }
    pub fn gyro_max_rpm(mut self, v: f64) -> Self { self.gyro_max_rpm = v; self }

    pub fn thruster(mut self, fuel: FuelClass, dir: Direction, max_thrust: f64) -> Self {
        self.thrusters.push((fuel, dir, max_thrust));
        self
    }

    pub fn thrusters(mut self, n: usize, fuel: FuelClass, dir: Direction, max_thrust: f64) -> Self {
        self.thrusters.extend(std::iter::repeat((fuel, dir, max_thrust)).take(n));
        self
    }

    /// Thrusters of one class on every side but up.
    pub fn side_thrusters(mut self, fuel: FuelClass, max_thrust: f64) -> Self {
        for dir in [
            Direction::Down,
            Direction::Left,
            Direction::Right,
            Direction::Forward,
            Direction::Backward,
        ] {
            self.thrusters.push((fuel, dir, max_thrust));
        }
        self
    }

    /// Torque in kN·m, full power.
    pub fn gyro(mut self, rated_torque: f64) -> Self {
        self.gyros.push((rated_torque, 1.0));
        self
    }

    pub fn gyros(mut self, n: usize, rated_torque: f64) -> Self {
        self.gyros.extend(std::iter::repeat((rated_torque, 1.0)).take(n));
        self
    }

    /// Sitting on the surface, locked down, dampeners on.
    pub fn build(self) -> SimVessel {
        let thrusters = self
            .thrusters
            .iter()
            .enumerate()
            .map(|(id, &(fuel, force_direction, max_thrust))| SimThruster {
                spec: ThrusterSpec { id, fuel, force_direction },
                max_thrust,
                thrust_override: 0.0,
                enabled: true,
            })
            .collect();
        let gyros = self
            .gyros
            .iter()
            .enumerate()
            .map(|(id, &(rated_torque, power))| SimGyro {
                spec: GyroSpec {
                    id,
                    mount: UnitQuaternion::identity(),
                    rated_torque,
                    power,
                    max_rpm: self.gyro_max_rpm,
                },
                overridden: false,
                setting: Vector3::zeros(),
            })
            .collect();
        let position = self.planet.center + Vector3::y() * self.planet.radius;
        SimVessel {
            name: self.name,
            mass: self.mass,
            inertia: self.mass * self.radius_of_gyration.powi(2),
            position,
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            orientation: UnitQuaternion::from_axis_angle(
                &Vector3::z_axis(),
                self.tilt_degrees * DEG2RAD,
            ),
            planet: self.planet,
            thrusters,
            gyros,
            dampeners: true,
            restrained: true,
            completed: false,
            pilot: PilotInput::default(),
            layout_version: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// 60 t cargo hauler with every fuel class, parked slightly tilted.
pub fn hauler() -> SimVessel {
    VesselBuilder::new("Hauler")
        .mass(60_000.0)
        .tilt_degrees(3.0)
        .thrusters(2, FuelClass::Atmospheric, Direction::Up, 400_000.0)
        .thrusters(2, FuelClass::Hydrogen, Direction::Up, 500_000.0)
        .thrusters(4, FuelClass::Ion, Direction::Up, 150_000.0)
        .side_thrusters(FuelClass::Hydrogen, 100_000.0)
        .side_thrusters(FuelClass::Atmospheric, 80_000.0)
        .gyros(2, 1.35e5)
        .build()
}

/// Light ion lifter with a hydrogen reserve; meant to run ion-first.
pub fn ion_lifter() -> SimVessel {
    VesselBuilder::new("Ion Lifter")
        .mass(12_000.0)
        .radius_of_gyration(3.0)
        .thrusters(6, FuelClass::Ion, Direction::Up, 60_000.0)
        .thrusters(2, FuelClass::Hydrogen, Direction::Up, 98_000.0)
        .side_thrusters(FuelClass::Ion, 15_000.0)
        .side_thrusters(FuelClass::Hydrogen, 20_000.0)
        .gyro(1.35e5)
        .build()
}

pub fn by_name(name: &str) -> Option<SimVessel> {
    match name.to_ascii_lowercase().as_str() {
        "hauler" => Some(hauler()),
        "ion_lifter" | "ion-lifter" | "ion" => Some(ion_lifter()),
        _ => None,
    }
}
