//! Return-time scoreboard for register dependency tracking.
//!
//! Each thread has one scoreboard. For every register with outstanding writers it records how
//! many results are pending, how many of those have an unpredictable return time, the cycle the
//! newest result becomes visible, and which unit and instruction produce it. Execute consults it
//! before issuing: a source operand is ready once its return cycle is no later than the issue
//! cycle plus the consumer's relative latency for that operand.

use std::collections::HashMap;

use crate::common::{Cycle, InstSeqNum, RegId};
use crate::core::inst::StaticInst;

/// Pending-result state of one register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegSlot {
    /// Outstanding results.
    pub num_results: u32,
    /// Outstanding results whose return time is unknown.
    pub num_unpredictable: u32,
    /// Cycle the newest result becomes visible.
    pub return_cycle: Cycle,
    /// Unit producing the newest result.
    pub fu_index: Option<usize>,
    /// Execute sequence number of the newest writer.
    pub writing_inst: InstSeqNum,
}

/// Per-thread scoreboard.
#[derive(Clone, Debug, Default)]
pub struct Scoreboard {
    slots: HashMap<RegId, RegSlot>,
}

impl Scoreboard {
    /// Create a new scoreboard with no pending writers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending state of `reg`, if it has outstanding writers.
    pub fn slot(&self, reg: RegId) -> Option<&RegSlot> {
        self.slots.get(&reg)
    }

    /// True when no register has an outstanding writer.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Records the destinations of an issued instruction.
    ///
    /// `retire_time` is when dependents may read the results; `unpredictable` blocks them
    /// until the instruction commits.
    pub fn markup(
        &mut self,
        inst: &StaticInst,
        exec_seq: InstSeqNum,
        fu_index: usize,
        retire_time: Cycle,
        unpredictable: bool,
    ) {
        for &reg in inst.dest_regs.iter().filter(|reg| reg.is_tracked()) {
            let slot = self.slots.entry(reg).or_default();
            if unpredictable {
                slot.num_unpredictable += 1;
            }
            slot.num_results += 1;
            slot.return_cycle = retire_time;
            if exec_seq > slot.writing_inst {
                slot.writing_inst = exec_seq;
                slot.fu_index = Some(fu_index);
            }
        }
    }

    /// Releases the destinations of a committed or discarded instruction.
    pub fn clear(&mut self, inst: &StaticInst, clear_unpredictable: bool) {
        for &reg in inst.dest_regs.iter().filter(|reg| reg.is_tracked()) {
            let Some(slot) = self.slots.get_mut(&reg) else {
                continue;
            };
            if clear_unpredictable {
                slot.num_unpredictable = slot.num_unpredictable.saturating_sub(1);
            }
            slot.num_results = slot.num_results.saturating_sub(1);
            if slot.num_results == 0 {
                let _ = self.slots.remove(&reg);
            }
        }
    }

    /// Whether every source operand of `inst` is available for issue at `now`.
    ///
    /// Operand `i` may issue up to `rel_lats[i]` cycles before its producer's return cycle
    /// (the last entry repeats, an empty list means zero). If `cant_forward` reports the
    /// producing unit as barred, the allowance is zero.
    pub fn can_issue<F>(&self, inst: &StaticInst, rel_lats: &[Cycle], cant_forward: F, now: Cycle) -> bool
    where
        F: Fn(usize) -> bool,
    {
        let default_rel = rel_lats.last().copied().unwrap_or(0);
        inst.src_regs.iter().enumerate().all(|(i, reg)| {
            let Some(slot) = self.slots.get(reg) else {
                return true;
            };
            let barred = slot.fu_index.is_some_and(&cant_forward);
            let rel = if barred {
                0
            } else {
                rel_lats.get(i).copied().unwrap_or(default_rel)
            };
            slot.return_cycle <= now + rel && slot.num_unpredictable == 0
        })
    }

    /// Execute sequence number of the newest producer of any source of `inst` (0 if none).
    pub fn exec_seq_to_wait_for(&self, inst: &StaticInst) -> InstSeqNum {
        inst.src_regs
            .iter()
            .filter_map(|reg| self.slots.get(reg))
            .map(|slot| slot.writing_inst)
            .max()
            .unwrap_or(0)
    }

    /// Earliest future cycle at which some operand may become ready for a consumer whose
    /// relative latency is at most `max_rel`.
    pub fn next_event(&self, now: Cycle, max_rel: Cycle) -> Option<Cycle> {
        self.slots
            .values()
            .filter(|slot| slot.num_unpredictable == 0 && slot.return_cycle > now)
            .map(|slot| slot.return_cycle.saturating_sub(max_rel).max(now + 1))
            .min()
    }

    /// Busy registers as `(reg,results/unpredictable/return/writer)`, sorted by register.
    pub fn describe(&self) -> String {
        let mut regs: Vec<_> = self.slots.iter().collect();
        regs.sort_by_key(|(reg, _)| **reg);
        regs.iter()
            .map(|(reg, s)| {
                format!(
                    "({reg},{}/{}/{}/{})",
                    s.num_results, s.num_unpredictable, s.return_cycle, s.writing_inst
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}
