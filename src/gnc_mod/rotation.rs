use std::time::{Duration, Instant};

use nalgebra::Vector3;
use tracing::debug;

use crate::config::RotationTuning;
use crate::error::Result;
use crate::math::{MinDelta, RAD_PER_SEC_TO_RPM, RPM_TO_RAD_PER_SEC};
use crate::vehicle::actuators::{GyroSet, GyroSlot, GyroSpec};
use crate::vehicle::{ActuatorSink, GyroAxis, Telemetry, VehicleState};

/// Gyros spin about some axes opposite to the right-hand convention.
pub const GYRO_AXIS_SIGN: Vector3<f64> = Vector3::new(1.0, -1.0, -1.0);

/// kN·m → N·m
const TORQUE_UNIT: f64 = 1000.0;

// ---------------------------------------------------------------------------
// Rotation actuation: desired angular velocity → gyro overrides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Rotation {
    gyros: GyroSet,
    /// Last requested vessel-local angular velocity and why.
    last_request: (Vector3<f64>, &'static str),
}

impl Rotation {
    pub fn new(specs: &[GyroSpec], now: Instant) -> Self {
        Self { gyros: GyroSet::rescan(specs, now), last_request: (Vector3::zeros(), "free") }
    }

    pub fn rescan(&mut self, specs: &[GyroSpec], now: Instant) {
        self.gyros = GyroSet::rescan(specs, now);
    }

    pub fn gyros(&self) -> &GyroSet {
        &self.gyros
    }

    pub fn last_request(&self) -> (Vector3<f64>, &'static str) {
        self.last_request
    }

    /// Torque available about a unit axis, N·m. Gyro torque is treated as isotropic.
    pub fn rot_cap_on_axis(&self, _axis: &Vector3<f64>) -> f64 {
        self.gyros.total_torque * TORQUE_UNIT
    }

    /// Releases every gyro override so the platform's own angular damping settles the vessel.
    pub fn no_turn_vessel<H>(&mut self, hw: &mut H) -> Result<()>
    where
        H: ActuatorSink + ?Sized,
    {
        self.last_request = (Vector3::zeros(), "free");
        for slot in &mut self.gyros.slots {
            set_override(hw, slot, false)?;
        }
        Ok(())
    }

    /// Turns when the request is meaningfully non-zero, releases otherwise.
    pub fn rotate_vessel<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        local: Vector3<f64>,
        tuning: &RotationTuning,
        now: Instant,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        if local.norm_squared() > 1e-6 {
            self.turn_vessel(hw, state, local, tuning, now, "rot")
        } else {
            self.no_turn_vessel(hw)
        }
    }

    /// Requests the vessel to rotate at `local` rad/s (vessel frame) as soon as the gyros allow.
    pub fn turn_vessel<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        local: Vector3<f64>,
        tuning: &RotationTuning,
        now: Instant,
        why: &'static str,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        self.last_request = (local, why);
        let max_rate = tuning.rpm_limit * RPM_TO_RAD_PER_SEC;
        let clamped = local.map(|c| c.clamp(-max_rate, max_rate));
        let world = state.local_to_world(&clamped);
        let period = tuning.steering_period();
        debug!(?clamped, why, "turn vessel");
        for slot in &mut self.gyros.slots {
            turn_gyro(hw, slot, state, &world, period, now)?;
        }
        Ok(())
    }

    /// Cancels existing rotation proportionally to its magnitude and its square.
    /// `mask` selects which local axes are damped.
    pub fn angular_dampen<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        mask: Vector3<f64>,
        tuning: &RotationTuning,
        now: Instant,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        const V: f64 = 0.0001;
        const V2: f64 = 0.04;
        if state.angular_velocity.norm_squared() > 2e-5 {
            let mut local = state.world_to_local(&state.angular_velocity).component_mul(&mask);
            local *= -(V2 * local.norm() + V);
            if local.norm_squared() > 1e-6 {
                return self.turn_vessel(hw, state, local, tuning, now, "damp");
            }
        }
        self.no_turn_vessel(hw)
    }
}

fn set_override<H>(hw: &mut H, slot: &mut GyroSlot, enabled: bool) -> Result<()>
where
    H: ActuatorSink + ?Sized,
{
    if slot.overridden != Some(enabled) {
        hw.set_gyro_override(slot.spec.id, enabled)?;
        slot.overridden = Some(enabled);
    }
    Ok(())
}

fn turn_gyro<H>(
    hw: &mut H,
    slot: &mut GyroSlot,
    state: &VehicleState,
    world: &Vector3<f64>,
    period: Duration,
    now: Instant,
) -> Result<()>
where
    H: Telemetry + ActuatorSink + ?Sized,
{
    set_override(hw, slot, true)?;
    if slot.next_update > now {
        return Ok(());
    }
    let gyro_to_world = state.orientation * slot.spec.mount;
    let rpm = gyro_to_world
        .inverse_transform_vector(world)
        .component_mul(&GYRO_AXIS_SIGN)
        * RAD_PER_SEC_TO_RPM;

    // overdue gyros skip the minimum-delta filter so they converge
    let filter = if slot.next_update + period < now { MinDelta::FORCED } else { MinDelta::GYRO };
    let old = hw.gyro_setting(slot.spec.id);
    let mut changed = false;
    for (i, axis) in [GyroAxis::Pitch, GyroAxis::Yaw, GyroAxis::Roll].into_iter().enumerate() {
        if let Some(v) = filter.filter(old[i], rpm[i], slot.spec.max_rpm) {
            hw.set_gyro_axis(slot.spec.id, axis, v)?;
            changed = true;
        }
    }
    if changed {
        slot.next_update = now + period;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use nalgebra::UnitQuaternion;

    fn tuning() -> RotationTuning {
        RotationTuning::default()
    }

    #[test]
    fn no_turn_is_idempotent() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(2);
        let mut rot = Rotation::new(&hw.gyros(), now);
        rot.no_turn_vessel(&mut hw).unwrap();
        let writes = hw.writes;
        assert_eq!(writes, 2);
        rot.no_turn_vessel(&mut hw).unwrap();
        assert_eq!(hw.writes, writes, "Second release must not write");
        assert!(hw.gyro_override.values().all(|o| !o));
    }

    #[test]
    fn turn_sets_flipped_axes_in_rpm() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(1);
        let mut rot = Rotation::new(&hw.gyros(), now);
        let state = hw.sample();
        let cmd = Vector3::new(0.1, 0.2, -0.3);
        rot.turn_vessel(&mut hw, &state, cmd, &tuning(), now, "test").unwrap();
        let s = hw.gyro_settings[&0];
        assert!((s.x - 0.1 * RAD_PER_SEC_TO_RPM).abs() < 1e-9);
        assert!((s.y + 0.2 * RAD_PER_SEC_TO_RPM).abs() < 1e-9);
        assert!((s.z - 0.3 * RAD_PER_SEC_TO_RPM).abs() < 1e-9);
        assert!(hw.gyro_override[&0]);
    }

    #[test]
    fn turn_is_clamped_by_rpm_limit() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(1);
        let mut rot = Rotation::new(&hw.gyros(), now);
        let state = hw.sample();
        let mut t = tuning();
        t.rpm_limit = 5.0;
        rot.turn_vessel(&mut hw, &state, Vector3::new(10.0, 0.0, 0.0), &t, now, "test").unwrap();
        assert!((hw.gyro_settings[&0].x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn gyro_mount_rotates_command() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(1);
        hw.gyro_specs[0].mount =
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let mut rot = Rotation::new(&hw.gyros(), now);
        let state = hw.sample();
        // vessel X is gyro +Z, whose sign is flipped
        rot.turn_vessel(&mut hw, &state, Vector3::new(0.5, 0.0, 0.0), &tuning(), now, "test").unwrap();
        let s = hw.gyro_settings[&0];
        assert!(s.x.abs() < 1e-9);
        assert!((s.z + 0.5 * RAD_PER_SEC_TO_RPM).abs() < 1e-9, "got {:?}", s);
    }

    #[test]
    fn rate_limited_until_period_passes() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(1);
        let mut rot = Rotation::new(&hw.gyros(), now);
        let state = hw.sample();
        rot.turn_vessel(&mut hw, &state, Vector3::new(0.5, 0.0, 0.0), &tuning(), now, "a").unwrap();
        let first = hw.gyro_settings[&0];

        let soon = now + Duration::from_millis(20);
        rot.turn_vessel(&mut hw, &state, Vector3::new(-0.5, 0.0, 0.0), &tuning(), soon, "b").unwrap();
        assert_eq!(hw.gyro_settings[&0], first, "Too soon to update again");

        let later = now + Duration::from_millis(120);
        rot.turn_vessel(&mut hw, &state, Vector3::new(-0.5, 0.0, 0.0), &tuning(), later, "c").unwrap();
        assert!(hw.gyro_settings[&0].x < 0.0);
    }

    #[test]
    fn small_change_filtered_unless_overdue() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(1);
        let mut rot = Rotation::new(&hw.gyros(), now);
        let state = hw.sample();
        let base = 1.0 * RPM_TO_RAD_PER_SEC * 10.0;
        rot.turn_vessel(&mut hw, &state, Vector3::new(base, 0.0, 0.0), &tuning(), now, "a").unwrap();
        let nudged = Vector3::new(base * 1.02, 0.0, 0.0);

        let t1 = now + Duration::from_millis(150);
        rot.turn_vessel(&mut hw, &state, nudged, &tuning(), t1, "b").unwrap();
        assert!((hw.gyro_settings[&0].x - 10.0).abs() < 1e-9, "2% change is below the filter");

        let t2 = now + Duration::from_millis(400);
        rot.turn_vessel(&mut hw, &state, nudged, &tuning(), t2, "c").unwrap();
        assert!((hw.gyro_settings[&0].x - 10.2).abs() < 1e-9, "Overdue gyro must converge");
    }

    #[test]
    fn rotate_vessel_releases_tiny_requests() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(1);
        let mut rot = Rotation::new(&hw.gyros(), now);
        let state = hw.sample();
        rot.rotate_vessel(&mut hw, &state, Vector3::new(1e-4, 0.0, 0.0), &tuning(), now).unwrap();
        assert!(!hw.gyro_override[&0]);
        assert_eq!(rot.last_request().1, "free");
    }

    #[test]
    fn dampen_opposes_spin() {
        let now = Instant::now();
        let mut hw = FakeHost::with_gyros(1);
        hw.state.angular_velocity = Vector3::new(0.0, 1.0, 0.0);
        let mut rot = Rotation::new(&hw.gyros(), now);
        let state = hw.sample();
        rot.angular_dampen(&mut hw, &state, Vector3::new(1.0, 1.0, 1.0), &tuning(), now).unwrap();
        let (req, why) = rot.last_request();
        assert_eq!(why, "damp");
        assert!(req.y < 0.0);
    }

    #[test]
    fn rot_cap_uses_total_torque() {
        let hw = FakeHost::with_gyros(2);
        let rot = Rotation::new(&hw.gyros(), Instant::now());
        let expected = 2.0 * hw.gyro_specs[0].rated_torque * 1000.0;
        assert!((rot.rot_cap_on_axis(&Vector3::x()) - expected).abs() < 1e-6);
    }
}
