use std::str::FromStr;
use std::time::Duration;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::warn;

use crate::error::{AutopilotError, Result};

// ---------------------------------------------------------------------------
// Tuning groups
// ---------------------------------------------------------------------------

/// Gravity alignment. Angles in degrees; the clip is a dead zone, and
/// correction engages only once the error passes clip + slop.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignerTuning {
    pub pitch_offset_degrees: f64,
    pub pitch_tilt_degrees: f64,
    pub pitch_tilt_max_degrees: f64,
    pub pitch_clip_degrees: f64,
    pub roll_clip_degrees: f64,
    pub pitch_slop_degrees: f64,
    pub roll_slop_degrees: f64,
    pub response_p2: f64,
    pub response_p: f64,
    pub response_i: f64,
    pub response_d: f64,
    pub response_d2: f64,
    pub integral_leak: f64,
    pub boundary_boost: f64,
    /// Estimated stopping power per unit torque and mass.
    pub stoppability: f64,
    pub sensitivity: f64,
    pub pitch_sensitivity: f64,
}

impl Default for AlignerTuning {
    fn default() -> Self {
        Self {
            pitch_offset_degrees: 0.0,
            pitch_tilt_degrees: 0.0,
            pitch_tilt_max_degrees: 60.0,
            pitch_clip_degrees: 0.05,
            roll_clip_degrees: 0.03,
            pitch_slop_degrees: 0.1,
            roll_slop_degrees: 0.1,
            response_p2: 1.0,
            response_p: 10.0,
            response_i: 0.1,
            response_d: 0.0,
            response_d2: 0.1,
            integral_leak: 0.001,
            boundary_boost: 0.001,
            stoppability: 1e-5,
            sensitivity: 1.0,
            pitch_sensitivity: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotationTuning {
    pub rpm_limit: f64,
    pub steering_hz: f64,
}

impl RotationTuning {
    pub fn steering_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.steering_hz)
    }
}

impl Default for RotationTuning {
    fn default() -> Self {
        Self { rpm_limit: 60.0, steering_hz: 10.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AscentTuning {
    pub prefer_hydrogen: bool,
    /// m/s² demanded on top of hovering while accelerating.
    pub minimum_added_acceleration: f64,
    pub speed_low_threshold: f64,
    pub speed_high_threshold: f64,
    /// Vertical speed (negative = falling) that triggers full emergency thrust.
    pub falling_speed: f64,
    pub correction_step: f64,
    pub deceleration_epsilon: f64,
    pub alignment_threshold: f64,
    pub lateral_speed_threshold: f64,
}

impl Default for AscentTuning {
    fn default() -> Self {
        Self {
            prefer_hydrogen: true,
            minimum_added_acceleration: 1.5,
            speed_low_threshold: 99.5,
            speed_high_threshold: 99.5,
            falling_speed: -2.0,
            correction_step: 0.0002,
            deceleration_epsilon: -0.0001,
            alignment_threshold: 0.99,
            lateral_speed_threshold: 0.1,
        }
    }
}

/// Every tunable of the autopilot.
#[derive(Debug, Clone, PartialEq)]
pub struct Tunables {
    pub aligner: AlignerTuning,
    pub rotation: RotationTuning,
    pub ascent: AscentTuning,
    /// Control update rate, Hz.
    pub update_frequency: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            aligner: AlignerTuning::default(),
            rotation: RotationTuning::default(),
            ascent: AscentTuning::default(),
            update_frequency: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum Tunable {
    #[strum(to_string = "updatefrequency")]
    UpdateFrequency,
    #[strum(to_string = "gyrolimitrpm")]
    GyroLimitRpm,
    #[strum(to_string = "steeringfrequency")]
    SteeringFrequency,
    #[strum(to_string = "pitchoffsetdegrees", serialize = "pitchofs")]
    PitchOffsetDegrees,
    #[strum(to_string = "tiltmaxdegrees")]
    TiltMaxDegrees,
    #[strum(to_string = "pitchangleclipdegrees", serialize = "pitchclip")]
    PitchClipDegrees,
    #[strum(to_string = "rollangleclipdegrees", serialize = "rollclip")]
    RollClipDegrees,
    #[strum(to_string = "pitchangleslopdegrees", serialize = "pitchslop")]
    PitchSlopDegrees,
    #[strum(to_string = "rollangleslopdegrees", serialize = "rollslop")]
    RollSlopDegrees,
    #[strum(to_string = "steeringsensitivity")]
    SteeringSensitivity,
    #[strum(to_string = "pitchsensitivity")]
    PitchSensitivity,
    #[strum(to_string = "gyrostoppability")]
    GyroStoppability,
    #[strum(to_string = "alignangularresponsep2")]
    ResponseP2,
    #[strum(to_string = "alignangularresponsep")]
    ResponseP,
    #[strum(to_string = "alignangularresponsei")]
    ResponseI,
    #[strum(to_string = "alignangularresponsed")]
    ResponseD,
    #[strum(to_string = "alignangularresponsed2")]
    ResponseD2,
    #[strum(to_string = "alignintegralleak")]
    IntegralLeak,
    #[strum(to_string = "preferhydrogen")]
    PreferHydrogen,
    #[strum(to_string = "minimumaddedacceleration")]
    MinimumAddedAcceleration,
    #[strum(to_string = "speedlowthreshold")]
    SpeedLowThreshold,
    #[strum(to_string = "speedhighthreshold")]
    SpeedHighThreshold,
    #[strum(to_string = "fallingspeed")]
    FallingSpeed,
    #[strum(to_string = "correctionstep")]
    CorrectionStep,
}

fn reject(key: Tunable, value: &str, reason: &'static str) -> AutopilotError {
    AutopilotError::InvalidConfiguration { key: key.to_string(), value: value.to_string(), reason }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Wraps degrees into (-180, 180].
fn wrap_degrees(d: f64) -> f64 {
    let w = (d + 180.0).rem_euclid(360.0) - 180.0;
    if w == -180.0 {
        180.0
    } else {
        w
    }
}

impl Tunables {
    /// Parses and validates `value` for `key`. On rejection the previous value is kept.
    pub fn set(&mut self, key: Tunable, value: &str) -> Result<()> {
        if key == Tunable::PreferHydrogen {
            let b = parse_bool(value).ok_or_else(|| reject(key, value, "expected a boolean"))?;
            self.ascent.prefer_hydrogen = b;
            return Ok(());
        }
        let v = f64::from_str(value.trim())
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| reject(key, value, "expected a number"))?;
        let non_negative = |v: f64| if v >= 0.0 { Ok(v) } else { Err(reject(key, value, "must be >= 0")) };
        let positive = |v: f64| if v > 0.0 { Ok(v) } else { Err(reject(key, value, "must be > 0")) };

        let a = &mut self.aligner;
        match key {
            Tunable::UpdateFrequency => {
                if !(1.0..=60.5).contains(&v) {
                    return Err(reject(key, value, "must be within 1..=60.5"));
                }
                self.update_frequency = v.clamp(1.0, 60.0);
            }
            Tunable::GyroLimitRpm => self.rotation.rpm_limit = non_negative(v)?,
            Tunable::SteeringFrequency => {
                if !(1.0..=60.0).contains(&v) {
                    return Err(reject(key, value, "must be within 1..=60"));
                }
                self.rotation.steering_hz = v;
            }
            Tunable::PitchOffsetDegrees => a.pitch_offset_degrees = wrap_degrees(v),
            Tunable::TiltMaxDegrees => a.pitch_tilt_max_degrees = non_negative(v)?,
            Tunable::PitchClipDegrees => a.pitch_clip_degrees = non_negative(v)?,
            Tunable::RollClipDegrees => a.roll_clip_degrees = non_negative(v)?,
            Tunable::PitchSlopDegrees => a.pitch_slop_degrees = non_negative(v)?,
            Tunable::RollSlopDegrees => a.roll_slop_degrees = non_negative(v)?,
            Tunable::SteeringSensitivity => a.sensitivity = non_negative(v)?,
            Tunable::PitchSensitivity => a.pitch_sensitivity = non_negative(v)?,
            Tunable::GyroStoppability => a.stoppability = non_negative(v)?,
            Tunable::ResponseP2 => a.response_p2 = v,
            Tunable::ResponseP => a.response_p = v,
            Tunable::ResponseI => a.response_i = v,
            Tunable::ResponseD => a.response_d = v,
            Tunable::ResponseD2 => a.response_d2 = v,
            Tunable::IntegralLeak => a.integral_leak = non_negative(v)?,
            Tunable::MinimumAddedAcceleration => {
                self.ascent.minimum_added_acceleration = non_negative(v)?
            }
            Tunable::SpeedLowThreshold => self.ascent.speed_low_threshold = positive(v)?,
            Tunable::SpeedHighThreshold => self.ascent.speed_high_threshold = positive(v)?,
            Tunable::FallingSpeed => {
                if v > 0.0 {
                    return Err(reject(key, value, "must be <= 0"));
                }
                self.ascent.falling_speed = v;
            }
            Tunable::CorrectionStep => self.ascent.correction_step = positive(v)?,
            Tunable::PreferHydrogen => {}
        }
        Ok(())
    }

    /// Parses the key as well; unknown keys are `UnknownCommand`.
    pub fn set_by_name(&mut self, key: &str, value: &str) -> Result<()> {
        let tunable =
            Tunable::from_str(key).map_err(|_| AutopilotError::UnknownCommand(key.to_string()))?;
        self.set(tunable, value).inspect_err(|e| warn!("{e}"))
    }

    pub fn get(&self, key: Tunable) -> String {
        let a = &self.aligner;
        match key {
            Tunable::UpdateFrequency => self.update_frequency.round().to_string(),
            Tunable::GyroLimitRpm => self.rotation.rpm_limit.to_string(),
            Tunable::SteeringFrequency => self.rotation.steering_hz.to_string(),
            Tunable::PitchOffsetDegrees => a.pitch_offset_degrees.to_string(),
            Tunable::TiltMaxDegrees => a.pitch_tilt_max_degrees.to_string(),
            Tunable::PitchClipDegrees => a.pitch_clip_degrees.to_string(),
            Tunable::RollClipDegrees => a.roll_clip_degrees.to_string(),
            Tunable::PitchSlopDegrees => a.pitch_slop_degrees.to_string(),
            Tunable::RollSlopDegrees => a.roll_slop_degrees.to_string(),
            Tunable::SteeringSensitivity => a.sensitivity.to_string(),
            Tunable::PitchSensitivity => a.pitch_sensitivity.to_string(),
            Tunable::GyroStoppability => a.stoppability.to_string(),
            Tunable::ResponseP2 => a.response_p2.to_string(),
            Tunable::ResponseP => a.response_p.to_string(),
            Tunable::ResponseI => a.response_i.to_string(),
            Tunable::ResponseD => a.response_d.to_string(),
            Tunable::ResponseD2 => a.response_d2.to_string(),
            Tunable::IntegralLeak => a.integral_leak.to_string(),
            Tunable::PreferHydrogen => self.ascent.prefer_hydrogen.to_string(),
            Tunable::MinimumAddedAcceleration => self.ascent.minimum_added_acceleration.to_string(),
            Tunable::SpeedLowThreshold => self.ascent.speed_low_threshold.to_string(),
            Tunable::SpeedHighThreshold => self.ascent.speed_high_threshold.to_string(),
            Tunable::FallingSpeed => self.ascent.falling_speed.to_string(),
            Tunable::CorrectionStep => self.ascent.correction_step.to_string(),
        }
    }

    /// `key=value` pairs for every tunable.
    pub fn save(&self) -> Vec<(String, String)> {
        Tunable::iter().map(|k| (k.to_string(), self.get(k))).collect()
    }

    /// Applies every saved pair. Rejected pairs keep their old value; the
    /// first rejection is returned once all pairs are applied.
    pub fn load<'a, I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut first_error = None;
        for (k, v) in pairs {
            if let Err(e) = self.set_by_name(k, v) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Core update period, with a small bias so rounding never skips an update.
    pub fn update_period(&self) -> Duration {
        const FREQ_BIAS: f64 = 0.9;
        Duration::from_secs_f64(1.0 / (self.update_frequency + FREQ_BIAS))
    }
}
