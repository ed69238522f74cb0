use std::time::{Duration, Instant};

use nalgebra::Vector3;
use tracing::{debug, error, info, warn};

use super::allocator::{
    enable_all, first_max_overrides, hover_hold_classes, log_overrides, secondary_order,
    set_overrides, set_overrides_and_shut, speed_hold_overrides, PerClass, SpeedRegulator,
};
use super::persist::PersistedState;
use super::{AscentPhase, Schedule, TickReport, UpStatus};
use crate::config::Tunables;
use crate::error::{AutopilotError, Result};
use crate::gnc::attitude::Aligner;
use crate::gnc::rotation::Rotation;
use crate::vehicle::{
    ActuatorSet, ActuatorSink, FuelClass, GravityReading, Telemetry, VehicleState,
};

/// Restarting the aligner right after a stop is refused for this long.
const STOP_FLUSH_PERIOD: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Aligner pacing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct AlignerClock {
    running: bool,
    last_run: Option<Instant>,
    stop_until: Option<Instant>,
}

impl AlignerClock {
    fn go(&mut self, now: Instant) -> bool {
        if self.stop_until.is_some_and(|t| now < t) {
            return false;
        }
        self.running = true;
        self.last_run = None;
        true
    }

    fn stop(&mut self, now: Instant) {
        self.running = false;
        self.stop_until = Some(now + STOP_FLUSH_PERIOD);
    }

    fn flushing(&self, now: Instant) -> bool {
        self.stop_until.is_some_and(|t| now < t)
    }

    /// Seconds since the last run if a full period has passed.
    fn due(&mut self, now: Instant, period: Duration) -> Option<f64> {
        if !self.running {
            return None;
        }
        let dt = match self.last_run {
            None => period,
            Some(last) if now.duration_since(last) >= period => now.duration_since(last),
            Some(_) => return None,
        };
        self.last_run = Some(now);
        Some(dt.as_secs_f64())
    }
}

// ---------------------------------------------------------------------------
// Top-level sequencer
// ---------------------------------------------------------------------------

/// Owns every piece of mission state and runs one tick at a time.
#[derive(Debug, Clone)]
pub struct Autopilot {
    pub tunables: Tunables,
    phase: AscentPhase,
    up_status: UpStatus,
    regulator: SpeedRegulator,
    last_speed_against_gravity: f64,
    schedule: Schedule,

    actuators: ActuatorSet,
    layout: Option<u64>,
    rotation: Rotation,
    aligner: Aligner,
    clock: AlignerClock,

    start_request: Option<bool>,
    release_gyros: bool,
    last_velocity: Option<(Instant, Vector3<f64>)>,
    acceleration: Vector3<f64>,
}

impl Autopilot {
    pub fn new(tunables: Tunables, now: Instant) -> Self {
        let aligner = Aligner::new(&tunables.aligner);
        Self {
            tunables,
            phase: AscentPhase::Stopped,
            up_status: UpStatus::FirstMax,
            regulator: SpeedRegulator::new(),
            last_speed_against_gravity: 0.0,
            schedule: Schedule::Idle,
            actuators: ActuatorSet::default(),
            layout: None,
            rotation: Rotation::new(&[], now),
            aligner,
            clock: AlignerClock::default(),
            start_request: None,
            release_gyros: false,
            last_velocity: None,
            acceleration: Vector3::zeros(),
        }
    }

    pub fn phase(&self) -> AscentPhase {
        self.phase
    }

    pub fn up_status(&self) -> UpStatus {
        self.up_status
    }

    pub fn correction_factor(&self) -> f64 {
        self.regulator.correction_factor()
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn aligner(&self) -> &Aligner {
        &self.aligner
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn actuators(&self) -> &ActuatorSet {
        &self.actuators
    }

    /// Linear acceleration estimated from the last two velocity samples (world, m/s²).
    pub fn acceleration(&self) -> Vector3<f64> {
        self.acceleration
    }

    /// Asks for an ascent; it begins on the next tick if there is gravity.
    pub fn start(&mut self, prefer_hydrogen: Option<bool>) {
        if self.phase != AscentPhase::Stopped {
            debug!(phase = %self.phase, "already running, start ignored");
            return;
        }
        if let Some(prefer) = prefer_hydrogen {
            self.tunables.ascent.prefer_hydrogen = prefer;
        }
        self.start_request = Some(self.tunables.ascent.prefer_hydrogen);
        self.schedule = Schedule::EveryTick;
    }

    /// Stopping happens on the next tick. A stopped autopilot ignores this.
    pub fn stop(&mut self) {
        self.start_request = None;
        if self.phase == AscentPhase::Stopped {
            return;
        }
        info!(from = %self.phase, "stop requested");
        self.phase = AscentPhase::StoppingAligner;
        self.schedule = Schedule::EveryTick;
    }

    /// Typed command entry point. Tunables take exactly one value.
    pub fn handle_command(&mut self, token: &str, args: &[&str], now: Instant) -> Result<()> {
        match (token, args) {
            ("start", []) => self.start(None),
            ("start", [prefer]) => {
                let prefer = prefer.trim().parse::<bool>().map_err(|_| {
                    AutopilotError::InvalidConfiguration {
                        key: "start".into(),
                        value: prefer.to_string(),
                        reason: "expected true or false",
                    }
                })?;
                self.start(Some(prefer));
            }
            ("stop", []) => {
                self.stop();
                self.clock.stop(now);
                self.release_gyros = true;
            }
            ("go", []) => {
                if !self.clock.go(now) {
                    warn!("aligner restart refused while stop is flushing");
                }
            }
            ("reset", []) => {
                self.aligner.reset();
                self.release_gyros = true;
            }
            (key, [value]) => self.tunables.set_by_name(key, value)?,
            _ => return Err(AutopilotError::UnknownCommand(token.to_string())),
        }
        Ok(())
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            phase: self.phase,
            up_status: self.up_status,
            correction_factor: self.regulator.correction_factor(),
            last_speed_against_gravity: self.last_speed_against_gravity,
            schedule: self.schedule,
            prefer_hydrogen: self.tunables.ascent.prefer_hydrogen,
        }
    }

    /// Restores saved mission state. On a decoding failure everything resets to
    /// defaults and the error is returned. A running mission resumes aligning.
    pub fn restore(&mut self, pairs: &[(&str, &str)], now: Instant) -> Result<()> {
        let (state, result) = match PersistedState::from_pairs(pairs) {
            Ok(s) => (s, Ok(())),
            Err(e) => {
                warn!("{e}; starting from defaults");
                (PersistedState::default(), Err(e))
            }
        };
        self.phase = state.phase;
        self.up_status = state.up_status;
        self.regulator = SpeedRegulator::with_factor(state.correction_factor);
        self.last_speed_against_gravity = state.last_speed_against_gravity;
        self.schedule = state.schedule;
        self.tunables.ascent.prefer_hydrogen = state.prefer_hydrogen;
        if self.phase != AscentPhase::Stopped {
            info!(phase = %self.phase, "resuming");
            self.aligner.reset();
            self.clock.go(now);
        }
        result
    }

    /// Runs one control tick. On failure the gyros are released, thrust
    /// overrides are zeroed, and the next tick stops the mission.
    pub fn tick<H>(&mut self, hw: &mut H, now: Instant) -> Result<TickReport>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        let state = hw.sample();
        match self.step(hw, &state, now) {
            Ok(alignment) => Ok(TickReport {
                phase: self.phase,
                up_status: self.up_status,
                schedule: self.schedule,
                correction_factor: self.regulator.correction_factor(),
                alignment,
            }),
            Err(e) => {
                let phase = self.phase;
                error!(%phase, "tick failed: {e}");
                self.fail_safe(hw);
                Err(AutopilotError::TickFailed { phase, source: Box::new(e) })
            }
        }
    }

    fn fail_safe<H>(&mut self, hw: &mut H)
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        if let Err(e) = self.rotation.no_turn_vessel(hw) {
            warn!("could not release gyros: {e}");
        }
        // no mission to abort: thrusters stay as the pilot left them
        if self.phase == AscentPhase::Stopped {
            warn!("fail-safe: released gyros while stopped");
            return;
        }
        warn!("fail-safe: releasing gyros and thrust overrides");
        let up: Vec<_> = self.actuators.all_up().map(|(id, _)| id).collect();
        if let Err(e) = set_overrides(hw, &up, 0.0) {
            warn!("could not zero thrust overrides: {e}");
        }
        if let Err(e) = hw.set_dampeners(true) {
            warn!("could not enable dampeners: {e}");
        }
        self.phase = AscentPhase::StoppingAligner;
        self.schedule = Schedule::EveryTick;
    }

    fn rescan_if_needed<H>(&mut self, hw: &H, now: Instant)
    where
        H: Telemetry + ?Sized,
    {
        let version = hw.layout_version();
        if self.layout == Some(version) {
            return;
        }
        self.actuators = ActuatorSet::rescan(&hw.thrusters(), version);
        self.rotation.rescan(&hw.gyros(), now);
        self.layout = Some(version);
        info!(
            version,
            up = self.actuators.up_count(),
            other = self.actuators.not_up.len(),
            gyros = self.rotation.gyros().len(),
            "actuators rescanned"
        );
    }

    fn estimate_acceleration(&mut self, state: &VehicleState, now: Instant) {
        if let Some((t, v)) = self.last_velocity {
            let dt = now.duration_since(t).as_secs_f64();
            if dt > 0.0 {
                self.acceleration = (state.velocity - v) / dt;
            }
        }
        self.last_velocity = Some((now, state.velocity));
    }

    /// Phases fall through: a tick may move several phases forward.
    fn step<H>(&mut self, hw: &mut H, state: &VehicleState, now: Instant) -> Result<f64>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        state.validate()?;
        self.rescan_if_needed(hw, now);
        self.estimate_acceleration(state, now);
        if self.release_gyros {
            self.rotation.no_turn_vessel(hw)?;
            self.release_gyros = false;
        }

        let gravity = GravityReading::from_state(state);
        let alignment = alignment(state, &gravity);

        if self.phase == AscentPhase::Stopped {
            let Some(prefer) = self.start_request.take() else {
                return Ok(alignment);
            };
            if !gravity.is_present() {
                warn!("no gravity, ascent not started");
                self.schedule = Schedule::Idle;
                return Ok(alignment);
            }
            if self.clock.flushing(now) {
                warn!("start refused while stop is flushing");
                self.schedule = Schedule::Idle;
                return Ok(alignment);
            }
            info!(prefer_hydrogen = prefer, "starting ascent");
            self.phase = AscentPhase::StartingAligner;
            self.schedule = Schedule::EveryTick;
        }

        if self.phase == AscentPhase::StartingAligner {
            hw.set_dampeners(true)?;
            hw.release_restraints()?;
            self.aligner.reset();
            self.clock.go(now);
            self.enter(AscentPhase::WaitingOrientation);
        }

        if self.phase == AscentPhase::WaitingOrientation {
            hw.release_restraints()?;
            self.align(hw, state, &gravity, now)?;
            self.avoid_falling_and_stop(hw, state, &gravity, alignment)?;

            let lateral = gravity.lateral(&state.velocity).norm();
            let t = &self.tunables.ascent;
            if alignment > t.alignment_threshold && lateral < t.lateral_speed_threshold {
                self.enter(AscentPhase::GoingUp);
                self.up_status = UpStatus::FirstMax;
                self.last_speed_against_gravity = 0.0;
            }
        }

        if self.phase == AscentPhase::GoingUp {
            let not_up: Vec<_> = self.actuators.not_up.iter().map(|&(id, _)| id).collect();
            enable_all(hw, &not_up, false)?;
            hw.set_dampeners(false)?;
            self.align(hw, state, &gravity, now)?;
            if gravity.is_present() {
                self.climb(hw, state, &gravity, alignment)?;
            } else {
                info!("left the gravity well");
                self.enter(AscentPhase::StoppingAligner);
            }
        }

        if self.phase == AscentPhase::StoppingAligner {
            self.finish(hw, state, &gravity, alignment, now)?;
        }

        Ok(alignment)
    }

    fn enter(&mut self, phase: AscentPhase) {
        info!(from = %self.phase, to = %phase, "phase");
        self.phase = phase;
    }

    fn align<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        gravity: &GravityReading,
        now: Instant,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        let Some(dt) = self.clock.due(now, self.tunables.update_period()) else {
            return Ok(());
        };
        self.aligner.update(hw, state, gravity, &mut self.rotation, &self.tunables, dt, now)
    }

    fn class_totals<H>(&self, hw: &H, alignment: f64) -> PerClass<f64>
    where
        H: Telemetry + ?Sized,
    {
        let sum = |fuel| -> f64 {
            self.actuators.up(fuel).iter().map(|&id| hw.effective_thrust(id)).sum()
        };
        PerClass {
            atmospheric: sum(FuelClass::Atmospheric) * alignment,
            hydrogen: sum(FuelClass::Hydrogen) * alignment,
            ion: sum(FuelClass::Ion) * alignment,
        }
    }

    fn atmo_available<H>(&self, hw: &H) -> bool
    where
        H: Telemetry + ?Sized,
    {
        self.actuators.up_atmo.iter().any(|&id| hw.effective_thrust(id) > 0.0)
    }

    /// Hover-hold: switch on classes until the vessel can at least hold its
    /// weight plus the minimum added acceleration.
    fn avoid_falling_and_stop<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        gravity: &GravityReading,
        alignment: f64,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        let t = &self.tunables.ascent;
        let minimum = state.mass * gravity.strength + t.minimum_added_acceleration * state.mass;
        let totals = self.class_totals(hw, alignment);
        let classes =
            hover_hold_classes(minimum, &totals, self.atmo_available(hw), t.prefer_hydrogen);

        hw.set_dampeners(true)?;
        for &fuel in &classes {
            enable_all(hw, self.actuators.up(fuel), true)?;
        }
        if let Some(&last) = classes.last() {
            for &(id, fuel) in &self.actuators.not_up {
                hw.set_thruster_enabled(id, fuel == last)?;
            }
        }
        Ok(())
    }

    fn climb<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        gravity: &GravityReading,
        alignment: f64,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        let t = self.tunables.ascent.clone();
        let v_up = gravity.speed_against(&state.velocity);
        let vdiff = v_up - self.last_speed_against_gravity;
        let weight = state.mass * gravity.strength;
        let totals = self.class_totals(hw, alignment);
        let atmo = self.atmo_available(hw);

        if self.up_status == UpStatus::FirstMax {
            let minimum = weight + t.minimum_added_acceleration * state.mass;
            let falling = v_up < t.falling_speed;
            if falling {
                warn!(v_up, "falling, secondary thrust flat out");
            }
            let o = first_max_overrides(minimum, &totals, atmo, falling, t.prefer_hydrogen);
            log_overrides("first_max", minimum, &o);
            self.apply(hw, &o)?;

            if v_up > t.speed_low_threshold {
                info!(v_up, "cruise speed reached, holding");
                self.up_status = UpStatus::SpeedHold;
                self.regulator.reset();
            }
        }

        if self.up_status == UpStatus::SpeedHold {
            let cf = self.regulator.update(state.speed(), vdiff, &t);
            let minimum = weight * cf;
            let o = speed_hold_overrides(minimum, &totals, atmo, t.prefer_hydrogen);
            debug!(cf, vdiff, "speed hold");
            log_overrides("speed_hold", minimum, &o);
            self.apply(hw, &o)?;
        }

        self.last_speed_against_gravity = v_up;
        Ok(())
    }

    fn apply<H>(&self, hw: &mut H, o: &PerClass<f64>) -> Result<()>
    where
        H: ActuatorSink + ?Sized,
    {
        set_overrides_and_shut(hw, &self.actuators.up_atmo, o.atmospheric)?;
        let [first, second] = secondary_order(self.tunables.ascent.prefer_hydrogen);
        set_overrides_and_shut(hw, self.actuators.up(first), o[first])?;
        set_overrides_and_shut(hw, self.actuators.up(second), o[second])
    }

    fn finish<H>(
        &mut self,
        hw: &mut H,
        state: &VehicleState,
        gravity: &GravityReading,
        alignment: f64,
        now: Instant,
    ) -> Result<()>
    where
        H: Telemetry + ActuatorSink + ?Sized,
    {
        hw.set_dampeners(true)?;
        let up: Vec<_> = self.actuators.all_up().map(|(id, _)| id).collect();
        set_overrides(hw, &up, 0.0)?;

        if gravity.is_present() {
            warn!("stopped inside the gravity well, holding hover");
            self.avoid_falling_and_stop(hw, state, gravity, alignment)?;
        } else {
            let keep = if self.tunables.ascent.prefer_hydrogen {
                FuelClass::Hydrogen
            } else {
                FuelClass::Ion
            };
            let all = self.actuators.all_up().chain(self.actuators.not_up.iter().copied());
            for (id, fuel) in all.collect::<Vec<_>>() {
                hw.set_thruster_enabled(id, fuel == keep)?;
            }
            hw.trigger_completion()?;
            info!(%keep, "reached free space, ascent complete");
        }

        self.rotation.no_turn_vessel(hw)?;
        self.clock.stop(now);
        self.enter(AscentPhase::Stopped);
        self.schedule = Schedule::Idle;
        Ok(())
    }
}

/// Fraction of up thrust opposing gravity: the vessel's down axis against gravity.
pub fn alignment(state: &VehicleState, gravity: &GravityReading) -> f64 {
    let down = state.local_to_world(&-Vector3::y());
    down.dot(&gravity.world_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DEG2RAD;
    use crate::testing::FakeHost;
    use crate::vehicle::Direction;
    use nalgebra::UnitQuaternion;

    struct Rig {
        hw: FakeHost,
        ap: Autopilot,
        now: Instant,
        atmo: usize,
        hydrogen: usize,
        ion: usize,
        side: usize,
    }

    impl Rig {
        fn new() -> Self {
            let mut hw = FakeHost::with_gyros(1);
            hw.state.mass = 1000.0;
            let atmo = hw.add_thruster(FuelClass::Atmospheric, Direction::Up, 5000.0);
            let hydrogen = hw.add_thruster(FuelClass::Hydrogen, Direction::Up, 10000.0);
            let ion = hw.add_thruster(FuelClass::Ion, Direction::Up, 8000.0);
            let side = hw.add_thruster(FuelClass::Hydrogen, Direction::Left, 2000.0);
            let now = Instant::now();
            Self { hw, ap: Autopilot::new(Tunables::default(), now), now, atmo, hydrogen, ion, side }
        }

        fn tick(&mut self) -> TickReport {
            self.now += Duration::from_millis(40);
            self.ap.tick(&mut self.hw, self.now).unwrap()
        }

        fn tilt(&mut self, alignment: f64) {
            let angle = alignment.acos();
            self.hw.state.orientation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle);
        }

        fn to_going_up(&mut self) {
            self.ap.start(None);
            self.tick();
            assert_eq!(self.ap.phase(), AscentPhase::GoingUp);
        }
    }

    #[test]
    fn start_needs_gravity() {
        let mut rig = Rig::new();
        rig.hw.state.gravity = Vector3::zeros();
        rig.ap.start(None);
        let report = rig.tick();
        assert_eq!(report.phase, AscentPhase::Stopped);
        assert_eq!(report.schedule, Schedule::Idle);
    }

    #[test]
    fn aligned_start_falls_through_to_going_up() {
        let mut rig = Rig::new();
        rig.ap.start(None);
        let report = rig.tick();
        assert_eq!(report.phase, AscentPhase::GoingUp);
        assert_eq!(report.up_status, UpStatus::FirstMax);
        assert_eq!(report.schedule, Schedule::EveryTick);
        assert!(rig.hw.restraint_releases >= 2);
        assert_eq!(rig.hw.dampeners, Some(false));
        assert!(!rig.hw.is_enabled(rig.side));
    }

    #[test]
    fn waits_for_orientation_threshold() {
        let mut rig = Rig::new();
        rig.tilt(0.98);
        rig.ap.start(None);
        assert_eq!(rig.tick().phase, AscentPhase::WaitingOrientation);
        assert_eq!(rig.tick().phase, AscentPhase::WaitingOrientation);

        rig.tilt(0.995);
        rig.hw.state.velocity = Vector3::new(0.05, 0.0, 0.0);
        let report = rig.tick();
        assert_eq!(report.phase, AscentPhase::GoingUp);
        assert!((report.alignment - 0.995).abs() < 1e-9);
    }

    #[test]
    fn lateral_drift_blocks_going_up() {
        let mut rig = Rig::new();
        rig.hw.state.velocity = Vector3::new(0.2, 0.0, 0.0);
        rig.ap.start(None);
        assert_eq!(rig.tick().phase, AscentPhase::WaitingOrientation);
    }

    #[test]
    fn waiting_enables_hover_classes() {
        let mut rig = Rig::new();
        rig.tilt(0.9);
        rig.ap.start(None);
        rig.tick();
        // 4500 atmo < 11310 and 4500 + 9000 covers it: hydrogen is the last class
        assert!(rig.hw.is_enabled(rig.atmo));
        assert!(rig.hw.is_enabled(rig.hydrogen));
        assert!(rig.hw.is_enabled(rig.side), "Side hydrogen thruster follows the last class");
        assert_eq!(rig.hw.dampeners, Some(true));
    }

    #[test]
    fn first_max_allocation() {
        let mut rig = Rig::new();
        rig.to_going_up();
        assert_eq!(rig.hw.override_of(rig.atmo), 1.0);
        assert!((rig.hw.override_of(rig.hydrogen) - 0.631).abs() < 1e-9);
        assert_eq!(rig.hw.override_of(rig.ion), 0.0);
        assert!(!rig.hw.is_enabled(rig.ion));
    }

    #[test]
    fn falling_forces_full_thrust() {
        let mut rig = Rig::new();
        rig.to_going_up();
        rig.hw.state.velocity = Vector3::new(0.0, -3.0, 0.0);
        rig.tick();
        assert_eq!(rig.hw.override_of(rig.hydrogen), 1.0);
        assert_eq!(rig.hw.override_of(rig.ion), 1.0);
    }

    #[test]
    fn speed_hold_entered_and_regulated_in_same_tick() {
        let mut rig = Rig::new();
        rig.to_going_up();
        rig.hw.state.velocity = Vector3::new(0.0, 100.0, 0.0);
        let report = rig.tick();
        assert_eq!(report.up_status, UpStatus::SpeedHold);
        // entered at 1.01; overspeed and still accelerating: one full step down
        assert!((report.correction_factor - 1.0098).abs() < 1e-12);

        let report = rig.tick();
        // same speed: vdiff 0 still counts as not decelerating
        assert!((report.correction_factor - 1.0096).abs() < 1e-12);
    }

    #[test]
    fn free_space_completes_mission() {
        let mut rig = Rig::new();
        rig.to_going_up();
        rig.hw.state.gravity = Vector3::zeros();
        let report = rig.tick();
        assert_eq!(report.phase, AscentPhase::Stopped);
        assert_eq!(report.schedule, Schedule::Idle);
        assert_eq!(rig.hw.completions, 1);
        assert!(rig.hw.is_enabled(rig.hydrogen));
        assert!(rig.hw.is_enabled(rig.side));
        assert!(!rig.hw.is_enabled(rig.ion));
        assert!(!rig.hw.is_enabled(rig.atmo));
        assert_eq!(rig.hw.override_of(rig.hydrogen), 0.0);
        assert!(rig.hw.gyro_override.values().all(|o| !o));
    }

    #[test]
    fn stop_in_gravity_holds_hover() {
        let mut rig = Rig::new();
        rig.to_going_up();
        rig.ap.stop();
        let report = rig.tick();
        assert_eq!(report.phase, AscentPhase::Stopped);
        assert_eq!(rig.hw.completions, 0);
        assert_eq!(rig.hw.dampeners, Some(true));
        assert_eq!(rig.hw.override_of(rig.hydrogen), 0.0);
        assert!(rig.hw.is_enabled(rig.hydrogen));
    }

    #[test]
    fn stop_when_stopped_is_noop() {
        let mut rig = Rig::new();
        rig.ap.stop();
        assert_eq!(rig.tick().phase, AscentPhase::Stopped);
        assert_eq!(rig.hw.writes, 0);
    }

    #[test]
    fn failure_releases_and_stops() {
        let mut rig = Rig::new();
        rig.to_going_up();
        rig.hw.state.velocity = Vector3::new(f64::NAN, 0.0, 0.0);
        rig.now += Duration::from_millis(40);
        let err = rig.ap.tick(&mut rig.hw, rig.now).unwrap_err();
        assert!(matches!(err, AutopilotError::TickFailed { phase: AscentPhase::GoingUp, .. }));
        assert_eq!(rig.ap.phase(), AscentPhase::StoppingAligner);
        assert!(rig.hw.gyro_override.values().all(|o| !o));
        assert_eq!(rig.hw.override_of(rig.hydrogen), 0.0);

        rig.hw.state.velocity = Vector3::zeros();
        assert_eq!(rig.tick().phase, AscentPhase::Stopped);
    }

    #[test]
    fn failure_while_stopped_keeps_mission_closed() {
        let mut rig = Rig::new();
        rig.hw.state.gravity = Vector3::zeros();
        rig.hw.state.velocity = Vector3::new(f64::NAN, 0.0, 0.0);
        rig.now += Duration::from_millis(40);
        let err = rig.ap.tick(&mut rig.hw, rig.now).unwrap_err();
        assert!(matches!(err, AutopilotError::TickFailed { phase: AscentPhase::Stopped, .. }));
        assert_eq!(rig.ap.phase(), AscentPhase::Stopped);
        assert_eq!(rig.ap.schedule(), Schedule::Idle);

        rig.hw.state.velocity = Vector3::zeros();
        let report = rig.tick();
        assert_eq!(report.phase, AscentPhase::Stopped);
        assert_eq!(rig.hw.completions, 0, "No completion without a mission");
        assert!(rig.hw.enabled.is_empty(), "Thrusters untouched");
        assert!(rig.hw.overrides.is_empty());
    }

    #[test]
    fn actuator_failure_is_surfaced() {
        let mut rig = Rig::new();
        rig.ap.start(None);
        rig.hw.detached = true;
        rig.now += Duration::from_millis(40);
        let err = rig.ap.tick(&mut rig.hw, rig.now).unwrap_err();
        match err {
            AutopilotError::TickFailed { source, .. } => {
                assert!(matches!(*source, AutopilotError::Actuator(_)))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rig.ap.phase(), AscentPhase::StoppingAligner);
    }

    #[test]
    fn commands_route_to_tunables_and_phases() {
        let mut rig = Rig::new();
        let now = rig.now;
        rig.ap.handle_command("fallingspeed", &["-5"], now).unwrap();
        assert_eq!(rig.ap.tunables.ascent.falling_speed, -5.0);
        assert!(rig.ap.handle_command("fallingspeed", &["5"], now).is_err());
        assert!(matches!(
            rig.ap.handle_command("launch", &[], now),
            Err(AutopilotError::UnknownCommand(_))
        ));
        rig.ap.handle_command("start", &["false"], now).unwrap();
        assert!(!rig.ap.tunables.ascent.prefer_hydrogen);
        assert_eq!(rig.tick().phase, AscentPhase::GoingUp);
        rig.ap.handle_command("stop", &[], rig.now).unwrap();
        assert_eq!(rig.ap.phase(), AscentPhase::StoppingAligner);
    }

    #[test]
    fn restart_refused_while_flushing() {
        let mut rig = Rig::new();
        rig.to_going_up();
        rig.ap.handle_command("stop", &[], rig.now).unwrap();
        rig.tick();
        assert_eq!(rig.ap.phase(), AscentPhase::Stopped);

        rig.ap.start(None);
        assert_eq!(rig.tick().phase, AscentPhase::Stopped, "Within the flush period");

        rig.now += Duration::from_millis(200);
        rig.ap.start(None);
        assert_eq!(rig.tick().phase, AscentPhase::GoingUp);
    }

    #[test]
    fn persisted_state_round_trips_through_restore() {
        let mut rig = Rig::new();
        rig.to_going_up();
        let saved = rig.ap.persisted().to_pairs();
        let pairs: Vec<_> = saved.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let mut fresh = Autopilot::new(Tunables::default(), rig.now);
        fresh.restore(&pairs, rig.now).unwrap();
        assert_eq!(fresh.phase(), AscentPhase::GoingUp);
        assert_eq!(fresh.schedule(), Schedule::EveryTick);

        let mut broken = Autopilot::new(Tunables::default(), rig.now);
        assert!(broken.restore(&[("status", "GOING_UP")], rig.now).is_err());
        assert_eq!(broken.phase(), AscentPhase::Stopped);
        assert_eq!(broken.correction_factor(), SpeedRegulator::INITIAL);
    }

    #[test]
    fn rescans_on_layout_change() {
        let mut rig = Rig::new();
        rig.tick();
        assert_eq!(rig.ap.actuators().up_count(), 3);
        rig.hw.add_thruster(FuelClass::Ion, Direction::Up, 1000.0);
        rig.tick();
        assert_eq!(rig.ap.actuators().up_ion.len(), 2);
    }

    #[test]
    fn acceleration_from_velocity_samples() {
        let mut rig = Rig::new();
        rig.tick();
        rig.hw.state.velocity = Vector3::new(0.0, 0.4, 0.0);
        rig.tick();
        assert!((rig.ap.acceleration().y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn alignment_is_cosine_of_tilt() {
        let mut hw = FakeHost::new();
        hw.state.orientation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 60.0 * DEG2RAD);
        let state = hw.sample();
        let g = GravityReading::from_state(&state);
        assert!((alignment(&state, &g) - 0.5).abs() < 1e-12);
    }
}
