//! Common types shared by every part of the pipeline model.
//!
//! This module provides the small vocabulary the rest of the crate is written in:
//! 1. **Time and identity:** Cycle counts, thread indices and sequence numbers.
//! 2. **Errors:** Configuration errors, run-time driver errors and architectural faults.
//! 3. **Operation classes:** The op-class taxonomy used to route instructions to functional units.
//! 4. **Registers:** Register identifiers tracked by the scoreboard.

/// Configuration errors, driver errors and architectural faults.
pub mod error;

/// Instruction operation classes and op-class sets.
pub mod op_class;

/// Register identifiers.
pub mod reg;

pub use error::{ConfigError, Fault, SimError};
pub use op_class::{OpClass, OpClassSet};
pub use reg::{RegClass, RegId};

/// A simulated clock cycle.
pub type Cycle = u64;

/// Index of a hardware thread context.
pub type ThreadId = usize;

/// Per-thread instruction sequence number.
pub type InstSeqNum = u64;

/// Size in bytes of one instruction slot in a fetched line.
pub const INST_BYTES: u64 = 4;
