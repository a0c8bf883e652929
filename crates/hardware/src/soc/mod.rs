//! Collaborators of the pipeline.
//!
//! The timing engine talks to the rest of the simulated system through the traits in
//! [`traits`]. This module also carries small reference implementations used by the driver,
//! the CLI and the tests: a flat memory, a JSON workload and a halting trap handler.

/// Flat reference memory with fixed latencies.
pub mod memory;

/// Workloads made of per-thread instruction lists.
pub mod program;

/// Memory, instruction source and trap handler interfaces.
pub mod traits;

pub use memory::{FlatMemory, MemoryConfig};
pub use program::{Program, ThreadProgram};
pub use traits::{HaltOnFault, InstSource, MemResponse, MemoryPort, Translation, TrapAction, TrapHandler};
