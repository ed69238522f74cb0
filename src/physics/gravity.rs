use nalgebra::Vector3;

pub const G0: f64 = 9.81; // m/s^2

// ---------------------------------------------------------------------------
// Planetary gravity well with a hard edge
// ---------------------------------------------------------------------------

/// Spherical gravity well. Full strength inside `hill_radius`, then falling off
/// as (hill_radius / r)^falloff until it drops below `min_gravity`, where it
/// ends abruptly.
#[derive(Debug, Clone)]
pub struct Planet {
    pub name: String,
    pub center: Vector3<f64>,    // m, world
    pub radius: f64,             // surface radius, m
    pub hill_radius: f64,        // m
    pub surface_gravity: f64,    // m/s^2
    pub falloff: f64,
    pub min_gravity: f64,        // m/s^2
    pub atmosphere_height: f64,  // m above the surface, 0 for airless bodies
}

impl Planet {
    /// Earth-like moon-sized body.
    pub fn earthlike() -> Self {
        Self {
            name: "Earthlike".into(),
            center: Vector3::zeros(),
            radius: 60_000.0,
            hill_radius: 60_000.0 * 1.06,
            surface_gravity: G0,
            falloff: 7.0,
            min_gravity: 0.05 * G0,
            atmosphere_height: 6_000.0,
        }
    }

    /// Distance from the center at which the field ends.
    pub fn field_limit(&self) -> f64 {
        if self.min_gravity <= 0.0 || self.surface_gravity <= self.min_gravity {
            return self.hill_radius;
        }
        self.hill_radius * (self.surface_gravity / self.min_gravity).powf(1.0 / self.falloff)
    }

    pub fn altitude(&self, pos: &Vector3<f64>) -> f64 {
        (pos - self.center).norm() - self.radius
    }

    /// Gravity acceleration at `pos`; exactly zero outside the field.
    pub fn gravity_accel(&self, pos: &Vector3<f64>) -> Vector3<f64> {
        let offset = pos - self.center;
        let r = offset.norm();
        if r < 1.0 {
            return Vector3::zeros();
        }
        let g = if r <= self.hill_radius {
            self.surface_gravity
        } else {
            self.surface_gravity * (self.hill_radius / r).powf(self.falloff)
        };
        if g < self.min_gravity {
            return Vector3::zeros();
        }
        -offset / r * g
    }
}

/// Straight-up unit vector at `pos`.
pub fn local_up(planet: &Planet, pos: &Vector3<f64>) -> Vector3<f64> {
    let offset = pos - planet.center;
    let r = offset.norm();
    if r < 1.0 {
        Vector3::y()
    } else {
        offset / r
    }
}
