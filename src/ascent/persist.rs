use std::str::FromStr;

use super::{AscentPhase, Schedule, SpeedRegulator, UpStatus};
use crate::error::{AutopilotError, Result};

const KEY_PHASE: &str = "status";
const KEY_UP_STATUS: &str = "upstatus";
const KEY_CORRECTION: &str = "correctionfactor";
const KEY_LAST_SPEED: &str = "lastspeed";
const KEY_SCHEDULE: &str = "schedule";
const KEY_PREFER_HYDROGEN: &str = "preferhydrogen";

/// Mission state that survives a host restart.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub phase: AscentPhase,
    pub up_status: UpStatus,
    pub correction_factor: f64,
    pub last_speed_against_gravity: f64,
    pub schedule: Schedule,
    pub prefer_hydrogen: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            phase: AscentPhase::Stopped,
            up_status: UpStatus::FirstMax,
            correction_factor: SpeedRegulator::INITIAL,
            last_speed_against_gravity: 0.0,
            schedule: Schedule::Idle,
            prefer_hydrogen: true,
        }
    }
}

fn corrupt(key: &str, value: &str) -> AutopilotError {
    AutopilotError::Corrupt { key: key.to_string(), value: value.to_string() }
}

fn field<'a>(pairs: &[(&'a str, &'a str)], key: &'static str) -> Result<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim())
        .ok_or_else(|| corrupt(key, ""))
}

fn parse<T: FromStr>(pairs: &[(&str, &str)], key: &'static str) -> Result<T> {
    let raw = field(pairs, key)?;
    raw.parse().map_err(|_| corrupt(key, raw))
}

impl PersistedState {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            (KEY_PHASE.into(), self.phase.to_string()),
            (KEY_UP_STATUS.into(), self.up_status.to_string()),
            (KEY_CORRECTION.into(), self.correction_factor.to_string()),
            (KEY_LAST_SPEED.into(), self.last_speed_against_gravity.to_string()),
            (KEY_SCHEDULE.into(), self.schedule.to_string()),
            (KEY_PREFER_HYDROGEN.into(), self.prefer_hydrogen.to_string()),
        ]
    }

    /// Every key must be present and well formed.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let correction_factor: f64 = parse(pairs, KEY_CORRECTION)?;
        let last_speed: f64 = parse(pairs, KEY_LAST_SPEED)?;
        if !correction_factor.is_finite() {
            return Err(corrupt(KEY_CORRECTION, &correction_factor.to_string()));
        }
        if !last_speed.is_finite() {
            return Err(corrupt(KEY_LAST_SPEED, &last_speed.to_string()));
        }
        Ok(Self {
            phase: parse(pairs, KEY_PHASE)?,
            up_status: parse(pairs, KEY_UP_STATUS)?,
            correction_factor,
            last_speed_against_gravity: last_speed,
            schedule: parse(pairs, KEY_SCHEDULE)?,
            prefer_hydrogen: parse(pairs, KEY_PREFER_HYDROGEN)?,
        })
    }
}
