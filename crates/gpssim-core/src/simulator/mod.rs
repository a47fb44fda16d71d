//! Simulator engine and its control handle
//!
//! - The engine owning every component ([`engine`])
//! - A dedicated thread plus async command handle ([`handle`])

pub mod engine;
pub mod handle;

pub use engine::{Simulator, StatusSnapshot};
pub use handle::{ControlError, SimulatorCommand, SimulatorHandle, TransitionGuard};
