pub mod presets;
pub mod runner;
pub mod vessel;

pub use presets::VesselBuilder;
pub use runner::{simulate, Sample, SimConfig};
pub use vessel::SimVessel;
