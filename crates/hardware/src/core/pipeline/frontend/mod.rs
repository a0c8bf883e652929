//! Frontend pipeline stages.
//!
//! The frontend handles Fetch1 -> Fetch2 -> Decode and owns the buffers between them. Stages
//! are evaluated in reverse order each cycle so a stage sees its downstream neighbour's
//! buffer space as freed by that neighbour in the same cycle.

pub mod decode;
pub mod fetch1;
pub mod fetch2;

use crate::common::Cycle;
use crate::config::Config;
use crate::core::pipeline::Collaborators;
use crate::core::pipeline::activity::{Activity, ActivityRecorder};
use crate::core::pipeline::buffers::{InputBuffer, Latch};
use crate::core::pipeline::latches::{BranchData, ForwardLine, InstGroup};
use crate::stats::PipelineStats;

pub use decode::Decode;
pub use fetch1::{Fetch1, Fetch1Thread, FetchStatus};
pub use fetch2::Fetch2;

/// Structures outside the frontend that it reads and writes each cycle.
pub struct FrontendIo<'a> {
    /// Current stream generation of every thread.
    pub generations: &'a [u64],
    /// Redirects from Execute.
    pub branches: &'a mut Latch<BranchData>,
    /// Decode -> Execute latch.
    pub to_execute: &'a mut Latch<InstGroup>,
    /// Execute's input buffer, for reservations.
    pub execute_input: &'a mut InputBuffer<InstGroup>,
    /// Activity bits of the current cycle.
    pub activity: &'a mut ActivityRecorder,
    /// Statistics.
    pub stats: &'a mut PipelineStats,
    /// Whether Fetch1 should stop issuing new fetches.
    pub draining: bool,
}

/// The frontend stages and their buffers.
#[derive(Debug)]
pub struct Frontend {
    /// Fetch1 stage.
    pub fetch1: Fetch1,
    /// Fetch2 stage.
    pub fetch2: Fetch2,
    /// Decode stage.
    pub decode: Decode,
    /// Fetch1 -> Fetch2 latch.
    pub fetch1_fetch2: Latch<ForwardLine>,
    /// Fetch2 input buffer.
    pub fetch2_input: InputBuffer<ForwardLine>,
    /// Fetch2 -> Decode latch.
    pub fetch2_decode: Latch<InstGroup>,
    /// Decode input buffer.
    pub decode_input: InputBuffer<InstGroup>,
}

impl Frontend {
    /// Creates the frontend from a validated configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            fetch1: Fetch1::new(config),
            fetch2: Fetch2::new(config),
            decode: Decode::new(config),
            fetch1_fetch2: Latch::new(config.fetch1_to_fetch2_forward_delay),
            fetch2_input: InputBuffer::new(config.fetch2_input_buffer_size),
            fetch2_decode: Latch::new(config.fetch2_to_decode_forward_delay),
            decode_input: InputBuffer::new(config.decode_input_buffer_size),
        }
    }

    /// Executes one cycle of all frontend stages (reverse order).
    pub fn tick(&mut self, now: Cycle, io: &mut FrontendIo<'_>, env: &mut Collaborators<'_>) {
        if self.decode.evaluate(
            now,
            &mut self.fetch2_decode,
            &mut self.decode_input,
            io.to_execute,
            io.execute_input,
            io.generations,
            io.stats,
        ) {
            io.activity.activate(Activity::Decode);
        }

        if self.fetch2.evaluate(
            now,
            &mut self.fetch1_fetch2,
            &mut self.fetch2_input,
            &mut self.fetch2_decode,
            &mut self.decode_input,
            io.generations,
            env.decoder,
            io.stats,
        ) {
            io.activity.activate(Activity::Fetch2);
        }

        if self.fetch1.evaluate(
            now,
            io.branches,
            &mut self.fetch1_fetch2,
            &mut self.fetch2_input,
            env.memory,
            &*env.predictor,
            io.stats,
            io.draining,
        ) {
            io.activity.activate(Activity::Fetch1);
        }
    }

    /// True when no line or instruction is held anywhere in the frontend.
    pub fn is_empty(&self) -> bool {
        self.fetch1.is_empty()
            && self.fetch1_fetch2.is_empty()
            && self.fetch2_input.is_empty()
            && self.fetch2_decode.is_empty()
            && self.decode_input.is_empty()
    }

    /// Earliest future cycle at which some frontend latch or request becomes ready.
    pub fn next_event(&self, now: Cycle) -> Option<Cycle> {
        [
            self.fetch1.next_event(now),
            self.fetch1_fetch2.next_event(now),
            self.fetch2_decode.next_event(now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Buffer occupancies for state traces.
    pub fn describe(&self) -> String {
        format!(
            "fetch1=[{}] f1f2={} f2in={}/{} f2d={} din={}/{}",
            self.fetch1.describe(),
            self.fetch1_fetch2.len(),
            self.fetch2_input.occupancy(),
            self.fetch2_input.capacity(),
            self.fetch2_decode.len(),
            self.decode_input.occupancy(),
            self.decode_input.capacity(),
        )
    }
}
