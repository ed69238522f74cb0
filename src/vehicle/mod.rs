pub mod actuators;
pub mod io;
pub mod state;

pub use actuators::{ActuatorSet, Direction, FuelClass, GyroSet, GyroSpec, ThrusterSpec};
pub use io::{ActuatorSink, GyroAxis, Telemetry};
pub use state::{GravityReading, PilotInput, VehicleState};
