pub mod ascent;
pub mod commands;
pub mod config;
pub mod error;
pub mod io;
pub mod math;
pub mod physics;
pub mod sim;
pub mod vehicle;
mod gnc_mod;

// The gnc module: expose gnc_mod as `gnc` publicly
pub mod gnc {
    pub use crate::gnc_mod::*;
}

#[cfg(test)]
mod testing;

pub use ascent::{AscentPhase, Autopilot, TickReport};
pub use config::Tunables;
pub use error::{AutopilotError, Result};
