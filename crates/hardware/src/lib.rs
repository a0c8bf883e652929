//! CVA6 pipeline timing model library.
//!
//! This crate implements a cycle-level timing model of a CVA6-style in-order pipeline with:
//! 1. **Core:** Fetch1, Fetch2, Decode and Execute stages joined by delay latches and bounded
//!    input buffers, evaluated in reverse order once per cycle.
//! 2. **Execute resources:** A functional unit pool with per-instruction timing rules, register
//!    scoreboards, and a load/store queue with a store buffer and store-to-load forwarding.
//! 3. **Threads:** Several hardware thread contexts sharing the pipeline under a fetch
//!    arbitration policy, with generation-based cancellation of mispredicted streams.
//! 4. **Collaborators:** Memory, instruction source, branch predictor and trap handler traits,
//!    with reference implementations.
//! 5. **Simulation:** Configuration, an idling-aware driver and statistics collection.

/// Common types (cycles, thread ids, op classes, registers, errors and faults).
pub mod common;
/// Pipeline configuration (defaults, validation, JSON loading).
pub mod config;
/// Pipeline core (instructions, stages, functional units, branch prediction).
pub mod core;
/// Simulation driver.
pub mod sim;
/// Collaborators (memory, workloads, traps).
pub mod soc;
/// Pipeline statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The pipeline model.
pub use crate::core::Pipeline;
/// Driver owning a pipeline and its collaborators.
pub use crate::sim::Simulator;
/// Pipeline statistics.
pub use crate::stats::PipelineStats;
