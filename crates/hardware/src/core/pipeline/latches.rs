//! Data carried between pipeline stages.
//!
//! This module defines what travels on each edge of the Fetch1 → Fetch2 → Decode → Execute
//! pipeline and on the single backward edge from Execute to Fetch1:
//! 1. **Lines:** Fetched instruction lines with their useful range and prediction.
//! 2. **Instruction groups:** Single-thread groups of tokens from Fetch2 and Decode.
//! 3. **Redirects:** Stream changes decided at commit.
//! 4. **Commit records:** What the commit log reports for each retired instruction.

use std::collections::VecDeque;

use crate::common::{Cycle, Fault, InstSeqNum, OpClass, ThreadId};
use crate::core::inst::{DynInst, InstId};

/// A fetched instruction line on its way from Fetch1 to Fetch2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardLine {
    /// Fetching thread.
    pub thread: ThreadId,
    /// Stream generation the line was fetched under.
    pub generation: u64,
    /// Per-thread line sequence number.
    pub line_seq: InstSeqNum,
    /// Snapped start address of the request.
    pub line_addr: u64,
    /// Next instruction to decode. Advanced by Fetch2 as it consumes the line.
    pub pc: u64,
    /// End (exclusive) of the useful part of the line.
    pub end_pc: u64,
    /// Predicted-taken slot and its target, if the predictor cut the line short.
    pub predicted: Option<(u64, u64)>,
    /// Fault raised by the line fetch.
    pub fault: Option<Fault>,
}

impl ForwardLine {
    /// True once every useful instruction has been decoded.
    pub const fn is_exhausted(&self) -> bool {
        self.pc >= self.end_pc
    }

    /// Predicted next pc after the instruction at `pc`.
    pub fn predicted_next(&self, pc: u64) -> (u64, bool) {
        match self.predicted {
            Some((slot, target)) if slot == pc => (target, true),
            _ => (pc + crate::common::INST_BYTES, false),
        }
    }
}

/// Instructions moved between stages in one cycle. All belong to the same thread.
pub type InstGroup = VecDeque<DynInst>;

/// Why Execute changed a thread's stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectKind {
    /// A control instruction resolved differently than predicted.
    Mispredict,
    /// A fault was handled by redirecting to a handler.
    Trap,
    /// A fault stopped the thread.
    Halt,
}

/// A stream change sent from Execute to Fetch1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchData {
    /// Redirected thread.
    pub thread: ThreadId,
    /// New stream generation.
    pub generation: u64,
    /// New fetch address (unused for [`RedirectKind::Halt`]).
    pub target: u64,
    /// Cause.
    pub kind: RedirectKind,
}

/// One committed instruction as reported in the commit log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRecord {
    /// Instruction identity.
    pub id: InstId,
    /// Address.
    pub pc: u64,
    /// Op class (`No_OpClass` for faults).
    pub op_class: OpClass,
    /// Issue cycle.
    pub issue_cycle: Cycle,
    /// Commit cycle.
    pub commit_cycle: Cycle,
    /// Trace time: commit or issue cycle depending on configuration.
    pub trace_time: Cycle,
    /// Unit that executed it, if any.
    pub fu_index: Option<usize>,
    /// Value returned to a load.
    pub load_value: Option<u64>,
    /// Fault resolved at commit.
    pub fault: Option<Fault>,
    /// Whether the instruction redirected fetch after a misprediction.
    pub mispredicted: bool,
}
