//! Simulation driver.
//!
//! Owns a [`Pipeline`](crate::core::Pipeline) together with its collaborators and steps it,
//! skipping idle cycles when idling is enabled.

/// The simulator driver and run summaries.
pub mod simulator;

pub use simulator::{RunSummary, Simulator, StopReason};
