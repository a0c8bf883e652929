//! Fetch2 Stage: line decomposition into instruction tokens.
//!
//! Fetch2 takes fetched lines from its input buffer and cuts them into instructions, asking
//! the instruction source what lives at each pc. One cycle produces a single-thread group of
//! up to `decodeInputWidth` tokens. A faulting line becomes one faulting token. With
//! `fetch2CycleInput` unset a group never spans two lines.

use tracing::trace;

use crate::common::{Cycle, INST_BYTES, InstSeqNum};
use crate::config::Config;
use crate::core::inst::{DynInst, InstId, StaticInst};
use crate::core::pipeline::buffers::{InputBuffer, Latch};
use crate::core::pipeline::latches::{ForwardLine, InstGroup};
use crate::soc::InstSource;
use crate::stats::PipelineStats;

/// The Fetch2 stage.
#[derive(Debug)]
pub struct Fetch2 {
    fetch_seq: Vec<InstSeqNum>,
    output_width: usize,
    cycle_input: bool,
}

impl Fetch2 {
    /// Builds Fetch2 from a validated configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            fetch_seq: vec![0; config.num_threads],
            output_width: config.decode_input_width,
            cycle_input: config.fetch2_cycle_input,
        }
    }

    fn count_mix(si: &StaticInst, stats: &mut PipelineStats) {
        if si.is_load() {
            stats.load_insts += 1;
        } else if si.is_store() {
            stats.store_insts += 1;
        } else if si.op_class.is_float() {
            stats.fp_insts += 1;
        } else if si.op_class.is_vector() {
            stats.vec_insts += 1;
        } else if si.op_class.is_int() {
            stats.int_insts += 1;
        }
    }

    /// Runs one cycle. Returns whether the stage did anything.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        now: Cycle,
        input_latch: &mut Latch<ForwardLine>,
        input: &mut InputBuffer<ForwardLine>,
        output: &mut Latch<InstGroup>,
        next_input: &mut InputBuffer<InstGroup>,
        generations: &[u64],
        decoder: &dyn InstSource,
        stats: &mut PipelineStats,
    ) -> bool {
        while let Some(line) = input_latch.pop_ready(now) {
            input.push_reserved(line);
        }

        let stale = |line: &ForwardLine| generations.get(line.thread) != Some(&line.generation);
        let mut active = false;
        while input.front().is_some_and(stale) {
            let _ = input.pop();
            stats.lines_discarded += 1;
            active = true;
        }

        let Some(thread) = input.front().map(|line| line.thread) else {
            return active;
        };
        if !next_input.can_reserve() {
            stats.fetch2_backpressure += 1;
            return active;
        }

        let mut group = InstGroup::new();
        while group.len() < self.output_width {
            let Some(line) = input.front_mut() else {
                break;
            };
            if line.thread != thread {
                break;
            }
            if stale(line) {
                let _ = input.pop();
                stats.lines_discarded += 1;
                continue;
            }

            let seq = &mut self.fetch_seq[thread];
            *seq += 1;
            let id = InstId {
                thread,
                generation: line.generation,
                line: line.line_seq,
                fetch: *seq,
                exec: 0,
            };

            let mut line_done = false;
            if let Some(fault) = line.fault {
                group.push_back(DynInst::fault(id, line.pc, fault));
                line_done = true;
            } else {
                let pc = line.pc;
                match decoder.decode(thread, pc) {
                    Ok(si) => {
                        Self::count_mix(&si, stats);
                        let (predicted_next, predicted_taken) = line.predicted_next(pc);
                        let mut token = DynInst::new(id, pc, si);
                        token.predicted_next = predicted_next;
                        token.predicted_taken = predicted_taken;
                        group.push_back(token);
                        line.pc += INST_BYTES;
                        line_done = line.is_exhausted();
                    }
                    Err(fault) => {
                        group.push_back(DynInst::fault(id, pc, fault));
                        line_done = true;
                    }
                }
            }

            if line_done {
                let _ = input.pop();
                if !self.cycle_input {
                    break;
                }
            }
        }

        if group.is_empty() {
            return active;
        }
        trace!(target: "fetch2", thread, size = group.len(), "group");
        let _ = next_input.reserve();
        output.push(now, group);
        true
    }
}
