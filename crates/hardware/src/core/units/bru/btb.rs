//! Branch Target Buffer (BTB).
//!
//! The BTB is a direct-mapped table of target addresses for control instructions, tagged by
//! thread and pc. [`BtbPredictor`] predicts taken whenever the last resolved outcome of a
//! tagged instruction was taken.

use super::BranchPredictor;
use crate::common::ThreadId;
use crate::core::inst::BranchOutcome;

/// An entry in the Branch Target Buffer.
#[derive(Debug, Clone, Copy, Default)]
struct BtbEntry {
    /// Thread owning the entry.
    thread: ThreadId,
    /// Full pc of the control instruction.
    tag: u64,
    /// The predicted target address.
    target: u64,
    /// Indicates if this entry contains valid data.
    valid: bool,
}

/// Branch Target Buffer structure.
#[derive(Debug, Clone)]
pub struct Btb {
    table: Vec<BtbEntry>,
    mask: usize,
}

impl Btb {
    /// Creates a Branch Target Buffer with at least `size` entries (rounded up to a power of two).
    pub fn new(size: usize) -> Self {
        let slots = size.max(1).next_power_of_two();
        Self {
            table: vec![BtbEntry::default(); slots],
            mask: slots - 1,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Always false; a BTB has at least one entry.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Shifts out instruction alignment and folds in the thread.
    fn index(&self, thread: ThreadId, pc: u64) -> usize {
        (((pc >> 2) as usize) ^ thread.wrapping_mul(0x9e37)) & self.mask
    }

    /// Looks up the target recorded for `pc` in `thread`.
    pub fn lookup(&self, thread: ThreadId, pc: u64) -> Option<u64> {
        let e = self.table[self.index(thread, pc)];
        (e.valid && e.tag == pc && e.thread == thread).then_some(e.target)
    }

    /// Records `target` for `pc`, replacing whatever the slot held.
    pub fn update(&mut self, thread: ThreadId, pc: u64, target: u64) {
        let idx = self.index(thread, pc);
        self.table[idx] = BtbEntry {
            thread,
            tag: pc,
            target,
            valid: true,
        };
    }

    /// Drops the entry for `pc` if present.
    pub fn invalidate(&mut self, thread: ThreadId, pc: u64) {
        let idx = self.index(thread, pc);
        let e = &mut self.table[idx];
        if e.tag == pc && e.thread == thread {
            e.valid = false;
        }
    }
}

/// Predictor that follows the BTB: a hit predicts taken to the recorded target.
#[derive(Debug, Clone)]
pub struct BtbPredictor {
    btb: Btb,
}

impl BtbPredictor {
    /// Creates a predictor backed by a BTB of `size` entries.
    pub fn new(size: usize) -> Self {
        Self { btb: Btb::new(size) }
    }
}

impl BranchPredictor for BtbPredictor {
    fn predict(&self, thread: ThreadId, pc: u64) -> Option<u64> {
        self.btb.lookup(thread, pc)
    }

    fn resolve(&mut self, thread: ThreadId, pc: u64, outcome: &BranchOutcome, _mispredicted: bool) {
        if outcome.taken {
            self.btb.update(thread, pc, outcome.target);
        } else {
            self.btb.invalidate(thread, pc);
        }
    }
}
