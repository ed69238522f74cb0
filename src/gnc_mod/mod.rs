pub mod attitude;
pub mod pid;
pub mod rotation;

pub use attitude::Aligner;
pub use pid::{max_velocity_for_distance_stoprate, Pid};
pub use rotation::Rotation;
