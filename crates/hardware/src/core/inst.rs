//! Instruction records.
//!
//! This module defines the two views of an instruction the pipeline works with:
//! 1. **Static instruction:** What the decode collaborator reports about the instruction at a pc
//!    (op class, encoding, registers, memory reference, architecturally correct control flow).
//! 2. **Dynamic instruction:** The in-flight token carried from Fetch2 to commit, with its
//!    identity, predicted path and per-stage timestamps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{Cycle, Fault, INST_BYTES, InstSeqNum, OpClass, RegId, ThreadId};

/// Direction of a memory reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemKind {
    /// Reads memory into a destination register.
    Load,
    /// Writes `data` to memory.
    Store,
}

/// Effective address and size of a memory instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemRef {
    /// Load or store.
    pub kind: MemKind,
    /// Virtual address.
    pub addr: u64,
    /// Access size in bytes (1, 2, 4 or 8).
    pub size: u8,
    /// Store data (ignored for loads).
    #[serde(default)]
    pub data: u64,
}

/// Architecturally correct control flow of a control instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOutcome {
    /// Whether control transfers to `target`.
    pub taken: bool,
    /// Destination when taken.
    pub target: u64,
}

impl BranchOutcome {
    /// The pc that follows the instruction at `pc`.
    pub const fn next_pc(&self, pc: u64) -> u64 {
        if self.taken {
            self.target
        } else {
            pc.wrapping_add(INST_BYTES)
        }
    }
}

/// A decoded instruction as reported by the decode collaborator.
///
/// The core never interprets the instruction; it only routes on `op_class`, tests
/// `encoding` against timing rule masks and tracks register dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticInst {
    /// Operation class used to select a functional unit.
    #[serde(default)]
    pub op_class: OpClass,
    /// Encoded bit pattern tested by timing rule mask/match pairs.
    #[serde(default)]
    pub encoding: u64,
    /// Source registers, in operand order.
    #[serde(default)]
    pub src_regs: Vec<RegId>,
    /// Destination registers.
    #[serde(default)]
    pub dest_regs: Vec<RegId>,
    /// Memory reference of loads and stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<MemRef>,
    /// Resolved control flow of branches and jumps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchOutcome>,
}

impl StaticInst {
    /// An instruction of `op_class` with no operands.
    pub fn new(op_class: OpClass) -> Self {
        Self {
            op_class,
            encoding: 0,
            src_regs: Vec::new(),
            dest_regs: Vec::new(),
            mem: None,
            branch: None,
        }
    }

    /// Sets the encoded bit pattern.
    #[must_use]
    pub fn with_encoding(mut self, encoding: u64) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the source registers.
    #[must_use]
    pub fn with_srcs(mut self, regs: &[RegId]) -> Self {
        self.src_regs = regs.to_vec();
        self
    }

    /// Sets the destination registers.
    #[must_use]
    pub fn with_dests(mut self, regs: &[RegId]) -> Self {
        self.dest_regs = regs.to_vec();
        self
    }

    /// A `MemRead` load of `size` bytes from `addr` into `dest`.
    pub fn load(dest: RegId, addr: u64, size: u8) -> Self {
        Self {
            mem: Some(MemRef {
                kind: MemKind::Load,
                addr,
                size,
                data: 0,
            }),
            ..Self::new(OpClass::MemRead)
        }
        .with_dests(&[dest])
    }

    /// A `MemWrite` store of the low `size` bytes of `data` to `addr`.
    pub fn store(addr: u64, size: u8, data: u64) -> Self {
        Self {
            mem: Some(MemRef {
                kind: MemKind::Store,
                addr,
                size,
                data,
            }),
            ..Self::new(OpClass::MemWrite)
        }
    }

    /// An `IntAlu` control instruction with the given outcome.
    pub fn branch(taken: bool, target: u64) -> Self {
        Self {
            branch: Some(BranchOutcome { taken, target }),
            ..Self::new(OpClass::IntAlu)
        }
    }

    /// True for loads and stores.
    pub const fn is_mem(&self) -> bool {
        self.mem.is_some()
    }

    /// True for loads.
    pub fn is_load(&self) -> bool {
        self.mem.is_some_and(|m| m.kind == MemKind::Load)
    }

    /// True for stores.
    pub fn is_store(&self) -> bool {
        self.mem.is_some_and(|m| m.kind == MemKind::Store)
    }

    /// True for branches and jumps.
    pub const fn is_control(&self) -> bool {
        self.branch.is_some()
    }
}

/// Identity of an in-flight instruction.
///
/// Printed as `T/S/L/F.E`: thread, stream generation, line sequence number, fetch sequence
/// number and execute sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstId {
    /// Owning hardware thread.
    pub thread: ThreadId,
    /// Stream generation the instruction was fetched under.
    pub generation: u64,
    /// Sequence number of the fetched line it came from.
    pub line: InstSeqNum,
    /// Per-thread sequence number assigned by Fetch2.
    pub fetch: InstSeqNum,
    /// Per-thread sequence number assigned by Decode (0 until decoded).
    pub exec: InstSeqNum,
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}.{}",
            self.thread, self.generation, self.line, self.fetch, self.exec
        )
    }
}

/// An instruction token in flight between Fetch2 and commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynInst {
    /// Identity and stream generation.
    pub id: InstId,
    /// Address of the instruction.
    pub pc: u64,
    /// Address fetch continued from after this instruction.
    pub predicted_next: u64,
    /// Whether the predictor redirected fetch at this instruction.
    pub predicted_taken: bool,
    /// Decoded instruction, or the fault raised while fetching or decoding it.
    pub decoded: Result<StaticInst, Fault>,
    /// Cycle Execute issued the instruction.
    pub issue_cycle: Option<Cycle>,
    /// Functional unit that executed it.
    pub fu_index: Option<usize>,
}

impl DynInst {
    /// A token for a decoded instruction.
    pub fn new(id: InstId, pc: u64, inst: StaticInst) -> Self {
        Self {
            id,
            pc,
            predicted_next: pc.wrapping_add(INST_BYTES),
            predicted_taken: false,
            decoded: Ok(inst),
            issue_cycle: None,
            fu_index: None,
        }
    }

    /// A token carrying `fault` instead of an instruction.
    pub fn fault(id: InstId, pc: u64, fault: Fault) -> Self {
        Self {
            decoded: Err(fault),
            ..Self::new(id, pc, StaticInst::new(OpClass::NoOpClass))
        }
    }

    /// The decoded instruction, unless this is a fault token.
    pub fn static_inst(&self) -> Option<&StaticInst> {
        self.decoded.as_ref().ok()
    }

    /// The carried fault, if any.
    pub fn fault_kind(&self) -> Option<Fault> {
        self.decoded.as_ref().err().copied()
    }

    /// True for fault tokens.
    pub const fn is_fault(&self) -> bool {
        self.decoded.is_err()
    }

    /// True for loads and stores.
    pub fn is_mem(&self) -> bool {
        self.static_inst().is_some_and(StaticInst::is_mem)
    }

    /// Op class used for routing (`No_OpClass` for fault tokens).
    pub fn op_class(&self) -> OpClass {
        self.static_inst().map_or(OpClass::NoOpClass, |si| si.op_class)
    }
}

impl fmt::Display for DynInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.decoded {
            Ok(si) => write!(f, "{} pc={:#x} {}", self.id, self.pc, si.op_class),
            Err(fault) => write!(f, "F;{} pc={:#x} {fault}", self.id, self.pc),
        }
    }
}
