use nalgebra::{UnitQuaternion, Vector2, Vector3};

use crate::error::{AutopilotError, Result};

/// Below this strength (m/s²) a gravity reading counts as "no gravity".
pub const NO_GRAVITY_EPSILON: f64 = 0.01;

// ---------------------------------------------------------------------------
// Telemetry snapshot, sampled once per tick
// ---------------------------------------------------------------------------

/// Pilot steering input from the reference controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct PilotInput {
    /// x = pitch, y = yaw (mouse / arrow keys).
    pub rotation: Vector2<f64>,
    pub roll: f64,
    pub under_control: bool,
}

/// Frame: world is inertial; vehicle-local axes follow the reference
/// controller (+X right, +Y up, +Z backward).
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub mass: f64,                        // kg
    pub position: Vector3<f64>,           // m, world
    pub velocity: Vector3<f64>,           // m/s, world
    pub angular_velocity: Vector3<f64>,   // rad/s, world
    pub orientation: UnitQuaternion<f64>, // local→world
    pub gravity: Vector3<f64>,            // m/s², world
    pub pilot: PilotInput,
}

impl VehicleState {
    pub fn world_to_local(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.inverse_transform_vector(v)
    }

    pub fn local_to_world(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * v
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Rejects NaN/∞ in anything the control law consumes.
    pub fn validate(&self) -> Result<()> {
        let finite = |v: &Vector3<f64>| v.iter().all(|c| c.is_finite());
        if !self.mass.is_finite() {
            return Err(AutopilotError::NonFinite("mass"));
        }
        if !finite(&self.velocity) {
            return Err(AutopilotError::NonFinite("velocity"));
        }
        if !finite(&self.angular_velocity) {
            return Err(AutopilotError::NonFinite("angular velocity"));
        }
        if !finite(&self.gravity) {
            return Err(AutopilotError::NonFinite("gravity"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gravity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct GravityReading {
    pub strength: f64,            // m/s²
    pub world: Vector3<f64>,      // m/s²
    pub world_dir: Vector3<f64>,  // unit, or zero without gravity
    pub local: Vector3<f64>,      // m/s²
    pub local_dir: Vector3<f64>,  // unit, or zero without gravity
}

impl GravityReading {
    pub fn new(world: Vector3<f64>, orientation: &UnitQuaternion<f64>) -> Self {
        let strength = world.norm();
        let local = orientation.inverse_transform_vector(&world);
        if strength < NO_GRAVITY_EPSILON {
            // normalized directions would be bogus
            return Self {
                strength,
                world,
                world_dir: Vector3::zeros(),
                local,
                local_dir: Vector3::zeros(),
            };
        }
        Self {
            strength,
            world,
            world_dir: world / strength,
            local,
            local_dir: local / strength,
        }
    }

    pub fn from_state(state: &VehicleState) -> Self {
        Self::new(state.gravity, &state.orientation)
    }

    pub fn is_present(&self) -> bool {
        self.strength >= NO_GRAVITY_EPSILON
    }

    /// Signed speed along the direction opposite to gravity.
    pub fn speed_against(&self, velocity: &Vector3<f64>) -> f64 {
        if !self.is_present() {
            return 0.0;
        }
        -velocity.dot(&self.world_dir)
    }

    /// Part of `velocity` perpendicular to gravity.
    pub fn lateral(&self, velocity: &Vector3<f64>) -> Vector3<f64> {
        if !self.is_present() {
            return *velocity;
        }
        let up = -self.world_dir;
        velocity - up * velocity.dot(&up)
    }
}
