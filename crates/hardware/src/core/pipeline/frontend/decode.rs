//! Decode Stage: regrouping and execute sequence numbering.
//!
//! Instructions already carry their decoded form from Fetch2. Decode packs tokens from its
//! input groups into output groups of up to `decodeInputWidth` same-thread tokens, drops
//! tokens of dead streams and gives every surviving token its per-thread execute sequence
//! number.

use tracing::trace;

use crate::common::{Cycle, InstSeqNum};
use crate::config::Config;
use crate::core::pipeline::buffers::{InputBuffer, Latch};
use crate::core::pipeline::latches::InstGroup;
use crate::stats::PipelineStats;

/// The Decode stage.
#[derive(Debug)]
pub struct Decode {
    exec_seq: Vec<InstSeqNum>,
    output_width: usize,
    cycle_input: bool,
}

impl Decode {
    /// Builds Decode from a validated configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            exec_seq: vec![0; config.num_threads],
            output_width: config.decode_input_width,
            cycle_input: config.decode_cycle_input,
        }
    }

    /// Runs one cycle. Returns whether the stage did anything.
    pub fn evaluate(
        &mut self,
        now: Cycle,
        input_latch: &mut Latch<InstGroup>,
        input: &mut InputBuffer<InstGroup>,
        output: &mut Latch<InstGroup>,
        next_input: &mut InputBuffer<InstGroup>,
        generations: &[u64],
        stats: &mut PipelineStats,
    ) -> bool {
        while let Some(group) = input_latch.pop_ready(now) {
            input.push_reserved(group);
        }

        let live = |g: u64, thread: usize| generations.get(thread) == Some(&g);
        let mut active = false;
        while let Some(group) = input.front_mut() {
            let before = group.len();
            group.retain(|inst| live(inst.id.generation, inst.id.thread));
            if before != group.len() {
                stats.insts_discarded += (before - group.len()) as u64;
                active = true;
            }
            if !group.is_empty() {
                break;
            }
            let _ = input.pop();
            active = true;
        }

        let Some(thread) = input.front().and_then(|g| g.front()).map(|inst| inst.id.thread) else {
            return active;
        };
        if !next_input.can_reserve() {
            stats.decode_backpressure += 1;
            return active;
        }

        let mut out = InstGroup::new();
        while out.len() < self.output_width {
            let Some(group) = input.front_mut() else {
                break;
            };
            let Some(mut inst) = group.pop_front() else {
                let _ = input.pop();
                if !self.cycle_input {
                    break;
                }
                continue;
            };
            if inst.id.thread != thread {
                group.push_front(inst);
                break;
            }
            if !live(inst.id.generation, inst.id.thread) {
                stats.insts_discarded += 1;
                continue;
            }
            let seq = &mut self.exec_seq[thread];
            *seq += 1;
            inst.id.exec = *seq;
            out.push_back(inst);
        }
        if input.front().is_some_and(InstGroup::is_empty) {
            let _ = input.pop();
        }

        if out.is_empty() {
            return active;
        }
        trace!(target: "decode", thread, size = out.len(), "group");
        let _ = next_input.reserve();
        output.push(now, out);
        true
    }
}
