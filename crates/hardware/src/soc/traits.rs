//! Collaborator interfaces.
//!
//! The pipeline models timing only. Everything it needs to know about instructions, memory,
//! branch prediction and exceptions comes from collaborators behind these traits:
//! 1. **Memory:** Line fetches, address translation, data reads and writes, each reporting a
//!    latency in cycles. The pipeline schedules completion itself.
//! 2. **Instruction source:** Decodes the instruction a thread would execute at a pc.
//! 3. **Trap handling:** Decides what a thread does after a fault reaches commit.
//!
//! The branch predictor interface lives with the predictors in
//! [`crate::core::units::bru::BranchPredictor`].

use crate::common::{Cycle, Fault, ThreadId};
use crate::core::inst::{MemKind, StaticInst};

/// Completion of a memory access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemResponse {
    /// Cycles until the access completes.
    pub latency: Cycle,
    /// Fault raised by the access.
    pub fault: Option<Fault>,
    /// Data read (little-endian, low bytes first). Zero for fetches and writes.
    pub data: u64,
}

/// Result of translating a data address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    /// Physical address.
    pub paddr: u64,
    /// Cycles until translation completes.
    pub latency: Cycle,
    /// Fault raised by translation.
    pub fault: Option<Fault>,
}

/// Memory system seen by Fetch1 and the LSQ.
pub trait MemoryPort {
    /// Fetches `size` bytes of instructions at `addr` for `thread`.
    fn fetch(&mut self, thread: ThreadId, addr: u64, size: u64) -> MemResponse;

    /// Translates a data access.
    fn translate(&mut self, thread: ThreadId, addr: u64, size: u8, kind: MemKind) -> Translation;

    /// Reads `size` bytes at physical address `addr`.
    fn read(&mut self, addr: u64, size: u8) -> MemResponse;

    /// Writes the low `size` bytes of `data` at physical address `addr`.
    fn write(&mut self, addr: u64, size: u8, data: u64) -> MemResponse;
}

/// Source of decoded instructions.
pub trait InstSource {
    /// The instruction `thread` executes at `pc`.
    ///
    /// # Errors
    ///
    /// Returns the fault a decode of `pc` raises, for example when nothing is mapped there.
    fn decode(&self, thread: ThreadId, pc: u64) -> Result<StaticInst, Fault>;

    /// Number of threads the source provides instructions for.
    fn threads(&self) -> usize {
        1
    }

    /// Entry pc of `thread`, if it should start running.
    fn entry(&self, thread: ThreadId) -> Option<u64> {
        (thread == 0).then_some(0)
    }

    /// Every instruction of `thread` with its pc, for start-up validation.
    fn static_insts(&self, _thread: ThreadId) -> Vec<(u64, StaticInst)> {
        Vec::new()
    }
}

/// What a thread does after a fault commits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapAction {
    /// Restart fetching at this pc.
    Redirect(u64),
    /// Stop the thread.
    Halt,
}

/// Exception collaborator consulted at commit.
pub trait TrapHandler {
    /// Resolves `fault` raised by the instruction at `pc`.
    fn handle(&mut self, thread: ThreadId, pc: u64, fault: &Fault) -> TrapAction;
}

/// Trap handler that halts the faulting thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct HaltOnFault;

impl TrapHandler for HaltOnFault {
    fn handle(&mut self, _thread: ThreadId, _pc: u64, _fault: &Fault) -> TrapAction {
        TrapAction::Halt
    }
}
