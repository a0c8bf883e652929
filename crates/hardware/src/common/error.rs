//! Error and fault definitions.
//!
//! This module separates the three kinds of failure the model knows about:
//! 1. **Configuration errors:** Invalid parameter combinations, rejected before simulation starts.
//! 2. **Driver errors:** A run that cannot make progress, or that was built from a bad configuration.
//! 3. **Architectural faults:** Carried through the pipeline inside instruction tokens and resolved
//!    at commit. These are data, not engine errors.

use thiserror::Error;

use super::{Cycle, OpClass, ThreadId};

/// A configuration rejected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter that must be at least one was zero.
    #[error("{name} must be >= 1")]
    ZeroParameter {
        /// Parameter name as it appears in the configuration.
        name: &'static str,
    },

    /// A delay parameter was below its minimum.
    #[error("{name} must be >= {min} (got {value})")]
    DelayTooShort {
        /// Parameter name as it appears in the configuration.
        name: &'static str,
        /// Configured value.
        value: Cycle,
        /// Smallest accepted value.
        min: Cycle,
    },

    /// The fetch line snap width and line width do not describe a valid line.
    #[error("invalid fetch line geometry: {detail}")]
    LineGeometry {
        /// Which constraint was violated.
        detail: String,
    },

    /// The SingleThreaded policy was combined with more than one thread.
    #[error("SingleThreaded thread policy cannot schedule {threads} threads")]
    SingleThreadedPolicy {
        /// Configured thread count.
        threads: usize,
    },

    /// Trace times were requested at both issue and commit.
    #[error("executeSetTraceTimeOnCommit and executeSetTraceTimeOnIssue are mutually exclusive")]
    TraceTimeConflict,

    /// The functional unit pool has no units.
    #[error("functional unit pool is empty")]
    EmptyFuPool,

    /// A forwarding restriction names a unit outside the pool.
    #[error("functional unit {unit}: cantForwardFromFUIndices entry {index} is outside the pool")]
    ForwardingIndex {
        /// Index of the unit carrying the restriction.
        unit: usize,
        /// The out-of-range index.
        index: usize,
    },

    /// No unit in the pool accepts a required op class.
    #[error("no functional unit accepts op class {op_class}")]
    UnservicedOpClass {
        /// The op class nobody accepts.
        op_class: OpClass,
    },

    /// A workload instruction is rejected by every unit in the pool.
    #[error("thread {thread}: no functional unit accepts the instruction at {pc:#x}")]
    UnservicedInstruction {
        /// Thread owning the instruction.
        thread: ThreadId,
        /// Address of the instruction.
        pc: u64,
    },

    /// The workload uses more threads than the pipeline was configured with.
    #[error("workload uses {workload} threads but only {configured} are configured")]
    TooManyThreads {
        /// Threads in the workload.
        workload: usize,
        /// Configured `numThreads`.
        configured: usize,
    },

    /// A JSON document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure of the simulation driver.
#[derive(Debug, Error)]
pub enum SimError {
    /// The simulator was built from an invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Work is pending but no stage can ever make progress.
    #[error("pipeline has undrained work but nothing left to wait for at cycle {cycle}")]
    NoProgress {
        /// Cycle at which the stall was detected.
        cycle: Cycle,
    },
}

/// Result type for simulator driver operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// An architectural fault carried by an instruction token.
///
/// Faults are produced by the memory and decode collaborators and resolved at commit by the
/// trap handler. The pipeline never aborts because of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// The instruction line fetch was refused by the memory system.
    #[error("instruction access fault at {addr:#x}")]
    FetchAccess {
        /// Faulting line address.
        addr: u64,
    },

    /// The decoder has no instruction at this address.
    #[error("no instruction at {pc:#x}")]
    NoInstruction {
        /// Address that was decoded.
        pc: u64,
    },

    /// A load was refused during translation or transfer.
    #[error("load access fault at {addr:#x}")]
    LoadAccess {
        /// Faulting data address.
        addr: u64,
    },

    /// A store was refused during translation.
    #[error("store access fault at {addr:#x}")]
    StoreAccess {
        /// Faulting data address.
        addr: u64,
    },

    /// A data access was not naturally aligned.
    #[error("misaligned {size}-byte access at {addr:#x}")]
    Misaligned {
        /// Faulting data address.
        addr: u64,
        /// Access size in bytes.
        size: u8,
    },
}
