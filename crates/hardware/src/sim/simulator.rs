//! Simulator: owns the pipeline and its collaborators side by side.
//!
//! The pipeline borrows its collaborators for the length of one cycle, so the driver keeps them
//! in separate fields and lends them out through [`Collaborators`] on every tick. The driver also
//! implements idling: after an inactive cycle it either jumps the clock to the next scheduled
//! event or, when nothing is scheduled, stops the run.

use serde::Serialize;
use tracing::{debug, info};

use crate::common::{ConfigError, Cycle, SimError};
use crate::config::Config;
use crate::core::Pipeline;
use crate::core::pipeline::Collaborators;
use crate::core::pipeline::latches::CommitRecord;
use crate::core::units::bru::{BranchPredictor, BranchPredictorWrapper};
use crate::soc::{FlatMemory, HaltOnFault, InstSource, MemoryPort, TrapHandler};
use crate::stats::PipelineStats;

/// Why a call to [`Simulator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Every thread halted and the pipeline drained.
    AllHalted,
    /// The pipeline drained with no thread left to fetch and nothing scheduled.
    Quiesced,
    /// The cycle limit was reached first.
    MaxCycles,
}

/// Outcome of [`Simulator::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Why the run stopped.
    pub stop: StopReason,
    /// Clock value when it stopped.
    pub cycles: Cycle,
    /// Instructions committed by all threads so far.
    pub committed: u64,
}

/// Top-level simulator: pipeline plus memory, decoder, predictor and trap handler.
pub struct Simulator {
    pipeline: Pipeline,
    memory: Box<dyn MemoryPort>,
    decoder: Box<dyn InstSource>,
    predictor: Box<dyn BranchPredictor>,
    traps: Box<dyn TrapHandler>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// Builds a simulator with the reference collaborators.
    ///
    /// The branch predictor is the one `config.branch_predictor` selects and faults halt the
    /// faulting thread.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration is invalid or the workload does not fit it.
    pub fn new<D>(config: Config, decoder: D, memory: FlatMemory) -> crate::common::error::Result<Self>
    where
        D: InstSource + 'static,
    {
        let predictor = BranchPredictorWrapper::new(&config);
        Self::with_components(
            config,
            Box::new(memory),
            Box::new(decoder),
            Box::new(predictor),
            Box::new(HaltOnFault),
        )
    }

    /// Builds a simulator from explicit collaborators.
    ///
    /// Every thread the decoder reports an entry point for is activated at that entry point.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration is invalid, the workload names more
    /// threads than are configured, or a workload instruction is accepted by no functional unit.
    pub fn with_components(
        config: Config,
        memory: Box<dyn MemoryPort>,
        decoder: Box<dyn InstSource>,
        predictor: Box<dyn BranchPredictor>,
        traps: Box<dyn TrapHandler>,
    ) -> crate::common::error::Result<Self> {
        let pipeline = Pipeline::new(config)?;
        Self::check_workload(pipeline.config(), &*decoder)?;

        let mut sim = Self {
            pipeline,
            memory,
            decoder,
            predictor,
            traps,
        };
        for thread in 0..sim.decoder.threads() {
            if let Some(pc) = sim.decoder.entry(thread) {
                sim.pipeline.activate_thread(thread, pc);
            }
        }
        info!(
            threads = sim.decoder.threads(),
            policy = ?sim.pipeline.config().thread_policy,
            "simulator ready"
        );
        Ok(sim)
    }

    fn check_workload(config: &Config, decoder: &dyn InstSource) -> Result<(), ConfigError> {
        if decoder.threads() > config.num_threads {
            return Err(ConfigError::TooManyThreads {
                workload: decoder.threads(),
                configured: config.num_threads,
            });
        }
        for thread in 0..decoder.threads() {
            for (pc, inst) in decoder.static_insts(thread) {
                if !config.execute_func_units.services(&inst) {
                    return Err(ConfigError::UnservicedInstruction { thread, pc });
                }
            }
        }
        Ok(())
    }

    /// The pipeline.
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The pipeline, for thread control and draining.
    pub const fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// Statistics so far.
    pub const fn stats(&self) -> &PipelineStats {
        self.pipeline.stats()
    }

    /// Every commit so far, in commit order.
    pub fn commit_log(&self) -> &[CommitRecord] {
        self.pipeline.commits()
    }

    /// Evaluates one cycle. Returns whether any stage was active.
    pub fn tick(&mut self) -> bool {
        let mut env = Collaborators {
            memory: &mut *self.memory,
            decoder: &*self.decoder,
            predictor: &mut *self.predictor,
            traps: &mut *self.traps,
        };
        self.pipeline.evaluate(&mut env)
    }

    /// Runs for at most `max_cycles` more cycles.
    ///
    /// With `enableIdling` set, inactive stretches are skipped up to the next scheduled event
    /// and counted as quiesce cycles. Otherwise every cycle is evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NoProgress`] if the pipeline holds work that no future event can move.
    pub fn run(&mut self, max_cycles: Cycle) -> crate::common::error::Result<RunSummary> {
        let limit = self.pipeline.cycle().saturating_add(max_cycles);
        let idling = self.pipeline.config().enable_idling;

        while self.pipeline.cycle() < limit {
            if self.tick() {
                continue;
            }
            if self.pipeline.is_drained() && self.pipeline.all_halted() {
                return Ok(self.summary(StopReason::AllHalted));
            }
            match self.pipeline.next_event_cycle() {
                Some(event) => {
                    if idling {
                        self.pipeline.skip_to(event.min(limit));
                    }
                }
                None if self.pipeline.is_drained() => {
                    return Ok(self.summary(StopReason::Quiesced));
                }
                None => {
                    self.pipeline.trace_state();
                    return Err(SimError::NoProgress {
                        cycle: self.pipeline.cycle(),
                    });
                }
            }
        }
        Ok(self.summary(StopReason::MaxCycles))
    }

    fn summary(&self, stop: StopReason) -> RunSummary {
        let summary = RunSummary {
            stop,
            cycles: self.pipeline.cycle(),
            committed: self.pipeline.stats().total_committed(),
        };
        debug!(?summary, "run stopped");
        summary
    }
}
