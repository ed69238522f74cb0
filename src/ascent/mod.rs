//! Ascent sequencing and thrust allocation.

pub mod allocator;
pub mod autopilot;
pub mod persist;

use strum_macros::{Display, EnumIter, EnumString};

pub use allocator::{PerClass, SpeedRegulator};
pub use autopilot::Autopilot;
pub use persist::PersistedState;

/// Top-level mission phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AscentPhase {
    #[default]
    Stopped,
    StartingAligner,
    WaitingOrientation,
    GoingUp,
    StoppingAligner,
}

/// Thrust allocation policy while going up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UpStatus {
    #[default]
    FirstMax,
    /// Declared for storage compatibility; no transition leads here.
    FirstDecrease,
    SpeedHold,
}

/// How the host should schedule the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Schedule {
    EveryTick,
    #[default]
    Idle,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub phase: AscentPhase,
    pub up_status: UpStatus,
    pub schedule: Schedule,
    pub correction_factor: f64,
    /// Fraction of up thrust opposing gravity (0 without gravity).
    pub alignment: f64,
}
