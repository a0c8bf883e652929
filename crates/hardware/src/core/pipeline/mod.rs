//! Instruction pipeline implementation.
//!
//! This module contains the four-stage Fetch1 -> Fetch2 -> Decode -> Execute pipeline.
//! It includes the following components:
//! 1. **Buffers:** Delay latches and bounded input buffers between stages.
//! 2. **Latches:** The data carried on each stage boundary.
//! 3. **Stages:** Frontend (Fetch1, Fetch2, Decode) and backend (Execute).
//! 4. **Execute resources:** Scoreboards, LSQ and store buffer.
//! 5. **Scheduling:** Thread arbitration and per-cycle activity recording.
//!
//! Stages are evaluated in reverse order once per cycle. Cancellation is by stream
//! generation: Execute bumps a thread's generation when it redirects, and every stage drops
//! tokens whose generation is no longer current.

/// Per-cycle stage activity bits.
pub mod activity;

/// Execute stage.
pub mod backend;

/// Delay latches and bounded input buffers.
pub mod buffers;

/// Fetch1, Fetch2 and Decode stages.
pub mod frontend;

/// Data carried between stages.
pub mod latches;

/// Load/store queue.
pub mod lsq;

/// Register return-time scoreboard.
pub mod scoreboard;

/// Committed store buffer with store-to-load forwarding.
pub mod store_buffer;

/// Fetch thread arbitration.
pub mod threads;

use tracing::trace;

use crate::common::{ConfigError, Cycle, ThreadId};
use crate::config::Config;
use crate::core::units::bru::BranchPredictor;
use crate::soc::{InstSource, MemoryPort, TrapHandler};
use crate::stats::PipelineStats;

use self::activity::{Activity, ActivityRecorder};
use self::backend::{Execute, ExecuteIo};
use self::buffers::{InputBuffer, Latch};
use self::frontend::{FetchStatus, Frontend, FrontendIo};
use self::latches::{BranchData, CommitRecord, InstGroup};

/// The collaborators a cycle of the pipeline talks to.
pub struct Collaborators<'a> {
    /// Instruction and data memory.
    pub memory: &'a mut dyn MemoryPort,
    /// Instruction source.
    pub decoder: &'a dyn InstSource,
    /// Branch predictor.
    pub predictor: &'a mut dyn BranchPredictor,
    /// Exception handler.
    pub traps: &'a mut dyn TrapHandler,
}

impl std::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// The pipeline model.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    cycle: Cycle,
    generations: Vec<u64>,
    frontend: Frontend,
    decode_execute: Latch<InstGroup>,
    execute_input: InputBuffer<InstGroup>,
    execute_fetch1: Latch<BranchData>,
    execute: Execute,
    activity: ActivityRecorder,
    draining: bool,
    stats: PipelineStats,
    commits: Vec<CommitRecord>,
}

impl Pipeline {
    /// Builds a pipeline after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in `config`.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            cycle: 0,
            generations: vec![0; config.num_threads],
            frontend: Frontend::new(&config),
            decode_execute: Latch::new(config.decode_to_execute_forward_delay),
            execute_input: InputBuffer::new(config.execute_input_buffer_size),
            execute_fetch1: Latch::new(config.execute_branch_delay),
            execute: Execute::new(&config),
            activity: ActivityRecorder::default(),
            draining: false,
            stats: PipelineStats::new(config.num_threads),
            commits: Vec::new(),
            config,
        })
    }

    /// The validated configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The next cycle to be evaluated.
    pub const fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Statistics so far.
    pub const fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Every commit so far, in commit order.
    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    /// Takes the commit log, leaving it empty.
    pub fn take_commits(&mut self) -> Vec<CommitRecord> {
        std::mem::take(&mut self.commits)
    }

    /// Current stream generation of `thread`.
    pub fn generation(&self, thread: ThreadId) -> Option<u64> {
        self.generations.get(thread).copied()
    }

    /// The frontend stages.
    pub const fn frontend(&self) -> &Frontend {
        &self.frontend
    }

    /// The Execute stage.
    pub const fn execute(&self) -> &Execute {
        &self.execute
    }

    /// Execute's input buffer.
    pub const fn execute_input(&self) -> &InputBuffer<InstGroup> {
        &self.execute_input
    }

    /// Fetch state of `thread`.
    pub fn thread_status(&self, thread: ThreadId) -> Option<FetchStatus> {
        self.frontend.fetch1.thread(thread).map(|t| t.status)
    }

    /// Starts (or restarts) `thread` at `pc` in a new stream.
    pub fn activate_thread(&mut self, thread: ThreadId, pc: u64) {
        let Some(generation) = self.generations.get_mut(thread) else {
            return;
        };
        *generation += 1;
        self.frontend.fetch1.activate(thread, pc, *generation, self.cycle);
        self.activity.activate(Activity::Cpu);
        trace!(target: "pipeline", thread, pc, "activate thread");
    }

    /// Stops new fetches for `thread`. Work already in flight completes.
    pub fn suspend_thread(&mut self, thread: ThreadId) {
        self.frontend.fetch1.suspend(thread);
        trace!(target: "pipeline", thread, "suspend thread");
    }

    /// Marks the pipeline active so the next cycle is evaluated.
    pub const fn wakeup_on_event(&mut self) {
        self.activity.activate(Activity::Cpu);
    }

    /// Stops Fetch1 from issuing. Returns whether the pipeline is already drained.
    pub fn drain(&mut self) -> bool {
        self.draining = true;
        self.is_drained()
    }

    /// Restarts fetching after [`Pipeline::drain`].
    pub const fn drain_resume(&mut self) {
        self.draining = false;
        self.activity.activate(Activity::Cpu);
    }

    /// True when every stage, latch and memory queue is empty.
    pub fn is_drained(&self) -> bool {
        self.frontend.is_empty()
            && self.decode_execute.is_empty()
            && self.execute_input.is_empty()
            && self.execute_fetch1.is_empty()
            && self.execute.is_empty()
    }

    /// True when no thread will fetch again.
    pub fn all_halted(&self) -> bool {
        self.frontend.fetch1.all_halted()
    }

    /// Evaluates one cycle. Returns whether any stage was active.
    pub fn evaluate(&mut self, env: &mut Collaborators<'_>) -> bool {
        let now = self.cycle;

        let mut execute_io = ExecuteIo {
            input_latch: &mut self.decode_execute,
            input: &mut self.execute_input,
            branches: &mut self.execute_fetch1,
            generations: &mut self.generations,
            stats: &mut self.stats,
            commits: &mut self.commits,
        };
        if self.execute.evaluate(now, &mut execute_io, env) {
            self.activity.activate(Activity::Execute);
        }

        let mut frontend_io = FrontendIo {
            generations: &self.generations,
            branches: &mut self.execute_fetch1,
            to_execute: &mut self.decode_execute,
            execute_input: &mut self.execute_input,
            activity: &mut self.activity,
            stats: &mut self.stats,
            draining: self.draining,
        };
        self.frontend.tick(now, &mut frontend_io, env);

        let active = self.activity.any();
        trace!(target: "pipeline", cycle = now, activity = %self.activity, "cycle");
        self.activity.clear();
        self.stats.cycles += 1;
        self.cycle += 1;
        active
    }

    /// Earliest cycle after the last evaluated one at which something is scheduled to happen.
    pub fn next_event_cycle(&self) -> Option<Cycle> {
        let now = self.cycle.saturating_sub(1);
        [
            self.frontend.next_event(now),
            self.decode_execute.next_event(now),
            self.execute_fetch1.next_event(now),
            self.execute.next_event(now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Advances the clock to `cycle` without evaluating, counting the gap as quiesce cycles.
    pub fn skip_to(&mut self, cycle: Cycle) {
        if cycle > self.cycle {
            let skipped = cycle - self.cycle;
            self.stats.cycles += skipped;
            self.stats.quiesce_cycles += skipped;
            trace!(target: "pipeline", from = self.cycle, to = cycle, "skip");
            self.cycle = cycle;
        }
    }

    /// Logs the state of every stage buffer at `trace` level.
    pub fn trace_state(&self) {
        trace!(target: "pipeline", cycle = self.cycle, "frontend {}", self.frontend.describe());
        trace!(
            target: "pipeline",
            cycle = self.cycle,
            "d2e={} ein={}/{} e2f1={}",
            self.decode_execute.len(),
            self.execute_input.occupancy(),
            self.execute_input.capacity(),
            self.execute_fetch1.len()
        );
        trace!(target: "pipeline", cycle = self.cycle, "execute {}", self.execute.describe());
    }
}
