//! Core pipeline model.
//!
//! This module contains the instruction records, the staged pipeline and the execution
//! resources it schedules onto.

/// Static and dynamic instruction records.
pub mod inst;

/// Fetch1, Fetch2, Decode and Execute stages with their buffers, LSQ and scoreboard.
pub mod pipeline;

/// Functional units and branch prediction.
pub mod units;

pub use self::pipeline::Pipeline;
