use nalgebra::Vector3;

use super::actuators::{GyroId, GyroSpec, ThrusterId, ThrusterSpec};
use super::state::VehicleState;
use crate::error::SinkError;

/// Gyro setting axes, in the gyro's own (sign-flipped) convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GyroAxis {
    Pitch,
    Yaw,
    Roll,
}

/// Read side of the host: telemetry and actuator capabilities.
pub trait Telemetry {
    /// Sampled once per tick; every derived value in the tick uses this snapshot.
    fn sample(&self) -> VehicleState;

    /// Current thruster inventory; rescanned only when `layout_version` changes.
    fn thrusters(&self) -> Vec<ThrusterSpec>;

    fn gyros(&self) -> Vec<GyroSpec>;

    /// Bumped on any structural change (actuator added or removed).
    fn layout_version(&self) -> u64;

    /// Maximum deliverable thrust right now, N, after environmental derating.
    fn effective_thrust(&self, id: ThrusterId) -> f64;

    /// Current pitch/yaw/roll settings in RPM.
    fn gyro_setting(&self, id: GyroId) -> Vector3<f64>;
}

/// Write side of the host.
pub trait ActuatorSink {
    fn set_thrust_override(&mut self, id: ThrusterId, fraction: f64) -> Result<(), SinkError>;

    fn set_thruster_enabled(&mut self, id: ThrusterId, enabled: bool) -> Result<(), SinkError>;

    fn set_gyro_override(&mut self, id: GyroId, enabled: bool) -> Result<(), SinkError>;

    /// Rate in RPM.
    fn set_gyro_axis(&mut self, id: GyroId, axis: GyroAxis, rpm: f64) -> Result<(), SinkError>;

    fn set_dampeners(&mut self, enabled: bool) -> Result<(), SinkError>;

    fn release_restraints(&mut self) -> Result<(), SinkError>;

    /// Mission complete: start any configured follow-on countdown.
    fn trigger_completion(&mut self) -> Result<(), SinkError>;
}
