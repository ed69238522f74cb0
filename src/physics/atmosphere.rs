use super::gravity::Planet;

// ---------------------------------------------------------------------------
// Planetary atmosphere (density ratio only)
// ---------------------------------------------------------------------------

/// Air-breathing thrusters produce nothing below this density ratio.
pub const ATMO_MIN_DENSITY: f64 = 0.3;

/// Ion thrusters keep this share of their thrust at full density.
pub const ION_SEA_LEVEL_EFFICIENCY: f64 = 0.2;

/// Air density relative to the surface, 1 at ground level and 0 at the top of
/// the atmosphere. Linear in altitude, clamped.
pub fn density_ratio(planet: &Planet, altitude: f64) -> f64 {
    if planet.atmosphere_height <= 0.0 {
        return 0.0;
    }
    (1.0 - altitude / planet.atmosphere_height).clamp(0.0, 1.0)
}

/// Fraction of rated thrust an atmospheric thruster delivers at `density`.
pub fn atmospheric_efficiency(density: f64) -> f64 {
    ((density - ATMO_MIN_DENSITY) / (1.0 - ATMO_MIN_DENSITY)).clamp(0.0, 1.0)
}

/// Fraction of rated thrust an ion thruster delivers at `density`.
pub fn ion_efficiency(density: f64) -> f64 {
    1.0 - (1.0 - ION_SEA_LEVEL_EFFICIENCY) * density.clamp(0.0, 1.0)
}
