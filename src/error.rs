use thiserror::Error;

use crate::ascent::AscentPhase;

/// Failures reported by an actuator command sink.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("no thruster with id {0}")]
    UnknownThruster(usize),
    #[error("no gyro with id {0}")]
    UnknownGyro(usize),
    #[error("actuator detached: {0}")]
    Detached(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutopilotError {
    #[error("invalid argument `{name}` = {value}")]
    InvalidArgument { name: &'static str, value: f64 },

    #[error("rejected `{key}` = {value}: {reason}")]
    InvalidConfiguration {
        key: String,
        value: String,
        reason: &'static str,
    },

    #[error("unhandled command `{0}`")]
    UnknownCommand(String),

    #[error("corrupt persisted value `{key}` = `{value}`")]
    Corrupt { key: String, value: String },

    #[error(transparent)]
    Actuator(#[from] SinkError),

    #[error("non-finite telemetry: {0}")]
    NonFinite(&'static str),

    #[error("tick failed during {phase}: {source}")]
    TickFailed {
        phase: AscentPhase,
        source: Box<AutopilotError>,
    },
}

pub type Result<T, E = AutopilotError> = std::result::Result<T, E>;
