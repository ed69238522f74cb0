pub mod atmosphere;
pub mod gravity;

pub use gravity::{Planet, G0};
