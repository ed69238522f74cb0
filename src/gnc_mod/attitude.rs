use std::time::Instant;

use nalgebra::Vector3;
use tracing::{debug, trace};

use super::pid::{max_velocity_for_distance_stoprate, Pid};
use super::rotation::Rotation;
use crate::config::{AlignerTuning, Tunables};
use crate::error::Result;
use crate::math::{boost_zone, clamp_abs, dead_zone, DEG2RAD, RAD2DEG};
use crate::vehicle::{ActuatorSink, GravityReading, Telemetry, VehicleState};

const STEER_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Attitude alignment: vehicle "down" onto local gravity
// ---------------------------------------------------------------------------

/// Keeps the configured down axis on the gravity vector.
///
/// Only pitch (X) and roll (Z) are corrected: a single gravity vector fixes two
/// rotational degrees of freedom, so yaw is left to the pilot. Errors inside the
/// clip angle are ignored; correction engages once an axis is past clip + slop
/// and stays engaged until both axes are back inside the clip.
#[derive(Debug, Clone)]
pub struct Aligner {
    pitch: Pid,
    roll: Pid,
    correcting: bool,
    last_response: Vector3<f64>,
}

impl Aligner {
    pub fn new(tuning: &AlignerTuning) -> Self {
        let mut aligner = Self {
            pitch: Pid::new(0.0, 0.0, 0.0),
            roll: Pid::new(0.0, 0.0, 0.0),
            correcting: false,
            last_response: Vector3::zeros(),
        };
        aligner.apply_gains(tuning);
        aligner
    }

    /// Copies the response gains into both axis controllers.
    pub fn apply_gains(&mut self, tuning: &AlignerTuning) {
        for pid in [&mut self.pitch, &mut self.roll] {
            pid.kp2 = tuning.response_p2;
            pid.kp = tuning.response_p;
            pid.ki = tuning.response_i;
            pid.kd = tuning.response_d;
            pid.kd2 = tuning.response_d2;
            pid.integral_leak = tuning.integral_leak;
        }
    }

    pub fn reset(&mut self) {
        self.pitch.reset();
        self.roll.reset();
        self.correcting = false;
        self.last_response = Vector3::zeros();
    }

    pub fn is_correcting(&self) -> bool {
        self.correcting
    }

    /// Last angular velocity request (vessel frame, rad/s).
    pub fn last_response(&self) -> Vector3<f64> {
        self.last_response
    }

    /// Reference down axis: pitched forward by offset + tilt, tilt clamped to its maximum.
    pub fn down(tuning: &AlignerTuning) -> Vector3<f64> {
        let tilt = clamp_abs(tuning.pitch_tilt_degrees, tuning.pitch_tilt_max_degrees);
        let a = (tuning.pitch_offset_degrees + tilt) * DEG2RAD;
        Vector3::new(0.0, -a.cos(), a.sin())
    }

    /// Signed angle (rad) on each local axis from `down` to the gravity direction.
    pub fn current_angles(down: &Vector3<f64>, gravity: &GravityReading) -> Vector3<f64> {
        down.cross(&gravity.local_dir).map(|c| c.clamp(-1.0, 1.0).asin())
    }

    /// Vessel pitch against the horizon in degrees, ignoring offset and tilt.
    pub fn current_pitch(gravity: &GravityReading) -> f64 {
        Self::current_angles(&-Vector3::y(), gravity).x * RAD2DEG
    }

    /// One control step. Skips everything when there is no gravity to align to.
    #[allow(clippy::too_many_arguments)]
    pub fn update<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        gravity: &GravityReading,
        rotation: &mut Rotation,
        tunables: &Tunables,
        dt: f64,
        now: Instant,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        if !gravity.is_present() {
            trace!("no gravity reference, alignment skipped");
            return Ok(());
        }
        let tuning = &tunables.aligner;
        self.apply_gains(tuning);

        let angles = Self::current_angles(&Self::down(tuning), gravity);
        let mut clipped = Vector3::new(
            dead_zone(angles.x, tuning.pitch_clip_degrees * DEG2RAD),
            0.0,
            dead_zone(angles.z, tuning.roll_clip_degrees * DEG2RAD),
        );
        let past_limit = clipped.x.abs() > tuning.pitch_slop_degrees * DEG2RAD
            || clipped.z.abs() > tuning.roll_slop_degrees * DEG2RAD;
        if past_limit {
            self.correcting = true;
        } else if clipped.x == 0.0 && clipped.z == 0.0 {
            self.correcting = false;
        }
        if !self.correcting {
            clipped = Vector3::zeros();
        }

        // controllers track zero; the boosted negated error is their measurement
        let boost = tuning.boundary_boost;
        let mut response = Vector3::new(
            self.pitch.advance(dt, boost_zone(-clipped.x, boost))?,
            0.0,
            self.roll.advance(dt, boost_zone(-clipped.z, boost))?,
        );

        // never spin faster than we can stop within the remaining error
        for (i, axis) in [(0, Vector3::x()), (2, Vector3::z())] {
            let decel = if state.mass > 0.0 {
                rotation.rot_cap_on_axis(&axis) * tuning.stoppability / state.mass
            } else {
                0.0
            };
            let limit = max_velocity_for_distance_stoprate(clipped[i].abs(), decel)?;
            response[i] = clamp_abs(response[i], limit);
        }

        if state.pilot.under_control {
            response += steering(state, gravity, tuning, &response);
        }

        debug!(
            pitch = angles.x * RAD2DEG,
            roll = angles.z * RAD2DEG,
            correcting = self.correcting,
            ?response,
            "align"
        );
        self.last_response = response;
        rotation.turn_vessel(hw, state, response, &tunables.rotation, now, "align")
    }
}

/// Pilot input to add to the alignment response. Yaw turns about gravity;
/// pitch and roll are dropped when they would fight the correction.
fn steering(
    state: &VehicleState,
    gravity: &GravityReading,
    tuning: &AlignerTuning,
    response: &Vector3<f64>,
) -> Vector3<f64> {
    let pilot = &state.pilot;
    let pitch = pilot.rotation.x;
    let yaw = pilot.rotation.y;
    let mut sv = gravity.local_dir * (yaw * tuning.sensitivity);
    if pitch * response.x <= STEER_EPSILON {
        sv.x -= pitch * tuning.pitch_sensitivity;
    }
    if pilot.roll * response.z <= STEER_EPSILON {
        sv.z -= pilot.roll * tuning.sensitivity;
    }
    sv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use crate::vehicle::PilotInput;
    use nalgebra::{UnitQuaternion, Vector2};

    const DT: f64 = 1.0 / 30.0;

    fn pilot(pitch: f64, yaw: f64) -> PilotInput {
        PilotInput { rotation: Vector2::new(pitch, yaw), roll: 0.0, under_control: true }
    }

    fn rolled(hw: &mut FakeHost, degrees: f64) {
        hw.state.orientation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), degrees * DEG2RAD);
    }

    fn step(hw: &mut FakeHost, aligner: &mut Aligner, rot: &mut Rotation, t: &Tunables) {
        let state = hw.sample();
        let g = GravityReading::from_state(&state);
        aligner.update(hw, &state, &g, rot, t, DT, Instant::now()).unwrap();
    }

    #[test]
    fn no_gravity_skips_everything() {
        let mut hw = FakeHost::with_gyros(1);
        hw.state.gravity = Vector3::new(0.0, -0.005, 0.0);
        let t = Tunables::default();
        let mut rot = Rotation::new(&hw.gyros(), Instant::now());
        let mut aligner = Aligner::new(&t.aligner);
        step(&mut hw, &mut aligner, &mut rot, &t);
        assert_eq!(hw.writes, 0, "Nothing may be commanded without a gravity reference");
    }

    #[test]
    fn aligned_vessel_requests_no_rotation() {
        let mut hw = FakeHost::with_gyros(1);
        let t = Tunables::default();
        let mut rot = Rotation::new(&hw.gyros(), Instant::now());
        let mut aligner = Aligner::new(&t.aligner);
        step(&mut hw, &mut aligner, &mut rot, &t);
        assert_eq!(aligner.last_response(), Vector3::zeros());
        assert!(!aligner.is_correcting());
    }

    #[test]
    fn rolled_vessel_rolls_back() {
        let mut hw = FakeHost::with_gyros(1);
        rolled(&mut hw, 10.0);
        let t = Tunables::default();
        let mut rot = Rotation::new(&hw.gyros(), Instant::now());
        let mut aligner = Aligner::new(&t.aligner);
        step(&mut hw, &mut aligner, &mut rot, &t);

        let r = aligner.last_response();
        assert!(aligner.is_correcting());
        assert!(r.z < 0.0, "Rolled +10° about Z must turn back negatively, got {:?}", r);
        assert!(r.x.abs() < 1e-12);
    }

    #[test]
    fn response_clamped_to_stopping_distance() {
        let mut hw = FakeHost::with_gyros(1);
        rolled(&mut hw, 10.0);
        let t = Tunables::default();
        let mut rot = Rotation::new(&hw.gyros(), Instant::now());
        let mut aligner = Aligner::new(&t.aligner);
        step(&mut hw, &mut aligner, &mut rot, &t);

        let remaining = (10.0 - t.aligner.roll_clip_degrees) * DEG2RAD;
        let decel = rot.rot_cap_on_axis(&Vector3::z()) * t.aligner.stoppability / hw.state.mass;
        let expected = (2.0 * decel * remaining).sqrt();
        let r = aligner.last_response();
        assert!((r.z + expected).abs() < 1e-9, "expected -{expected}, got {}", r.z);
    }

    #[test]
    fn slop_engages_late_and_releases_inside_clip() {
        let mut hw = FakeHost::with_gyros(1);
        let t = Tunables::default();
        let mut rot = Rotation::new(&hw.gyros(), Instant::now());
        let mut aligner = Aligner::new(&t.aligner);

        // past the clip but inside the slop
        rolled(&mut hw, 0.1);
        step(&mut hw, &mut aligner, &mut rot, &t);
        assert!(!aligner.is_correcting());
        assert_eq!(aligner.last_response(), Vector3::zeros());

        rolled(&mut hw, 0.2);
        step(&mut hw, &mut aligner, &mut rot, &t);
        assert!(aligner.is_correcting());

        // back inside the slop: keeps correcting
        rolled(&mut hw, 0.1);
        step(&mut hw, &mut aligner, &mut rot, &t);
        assert!(aligner.is_correcting());
        assert!(aligner.last_response().z < 0.0);

        rolled(&mut hw, 0.01);
        step(&mut hw, &mut aligner, &mut rot, &t);
        assert!(!aligner.is_correcting());
    }

    #[test]
    fn pilot_yaw_turns_about_gravity() {
        let mut hw = FakeHost::with_gyros(1);
        hw.state.pilot = pilot(0.0, 1.0);
        let t = Tunables::default();
        let mut rot = Rotation::new(&hw.gyros(), Instant::now());
        let mut aligner = Aligner::new(&t.aligner);
        step(&mut hw, &mut aligner, &mut rot, &t);
        let r = aligner.last_response();
        assert!((r.y + 1.0).abs() < 1e-12, "got {:?}", r);
    }

    #[test]
    fn pilot_pitch_blocked_when_fighting_correction() {
        let t = Tunables::default();
        let mut hw = FakeHost::with_gyros(1);
        hw.state.orientation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 5.0 * DEG2RAD);
        let mut rot = Rotation::new(&hw.gyros(), Instant::now());
        let mut aligner = Aligner::new(&t.aligner);
        step(&mut hw, &mut aligner, &mut rot, &t);
        let correction = aligner.last_response().x;
        assert!(correction != 0.0);

        // would push against the correction: dropped
        let mut aligner2 = Aligner::new(&t.aligner);
        hw.state.pilot = pilot(correction.signum(), 0.0);
        step(&mut hw, &mut aligner2, &mut rot, &t);
        assert!((aligner2.last_response().x - correction).abs() < 1e-12);

        // pushes along the correction: blended in
        let mut aligner3 = Aligner::new(&t.aligner);
        hw.state.pilot = pilot(-correction.signum(), 0.0);
        step(&mut hw, &mut aligner3, &mut rot, &t);
        let expected = correction + correction.signum() * t.aligner.pitch_sensitivity;
        assert!((aligner3.last_response().x - expected).abs() < 1e-12);
    }

    #[test]
    fn down_honours_offset_and_tilt_limit() {
        let mut tuning = AlignerTuning { pitch_tilt_degrees: 90.0, ..Default::default() };
        let d = Aligner::down(&tuning);
        let a = 60.0 * DEG2RAD;
        assert!((d - Vector3::new(0.0, -a.cos(), a.sin())).norm() < 1e-12);

        tuning.pitch_tilt_degrees = 0.0;
        tuning.pitch_offset_degrees = 90.0;
        assert!((Aligner::down(&tuning) - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn current_pitch_reads_degrees() {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 20.0 * DEG2RAD);
        let g = GravityReading::new(Vector3::new(0.0, -9.81, 0.0), &rot);
        assert!((Aligner::current_pitch(&g).abs() - 20.0).abs() < 1e-9);
    }
}
