//! Fetch1 Stage: thread selection, line requests, branch prediction.
//!
//! This is the first stage of the frontend. Each cycle it:
//! 1. Applies redirects arriving from Execute, restarting the redirected thread's stream.
//! 2. Delivers at most one returned line to Fetch2, discarding lines of dead streams.
//! 3. Asks the thread arbiter for one eligible thread and issues a line fetch for it, cutting
//!    the line short at the first slot the branch predictor expects to be taken.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::common::{Cycle, Fault, INST_BYTES, InstSeqNum, ThreadId};
use crate::config::Config;
use crate::core::pipeline::buffers::{InputBuffer, Latch};
use crate::core::pipeline::latches::{BranchData, ForwardLine, RedirectKind};
use crate::core::pipeline::threads::ThreadArbiter;
use crate::core::units::bru::BranchPredictor;
use crate::soc::MemoryPort;
use crate::stats::PipelineStats;

/// Fetch state of one thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Never activated.
    #[default]
    Idle,
    /// Fetching.
    Running,
    /// Stopped by a faulting fetch until a redirect arrives.
    Blocked,
    /// Stopped by the driver.
    Suspended,
    /// Stopped for good by a trap.
    Halted,
}

/// Per-thread Fetch1 state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fetch1Thread {
    /// Fetch state.
    pub status: FetchStatus,
    /// Next address to fetch.
    pub pc: u64,
    /// Stream generation Fetch1 currently fetches for.
    pub generation: u64,
    line_seq: InstSeqNum,
    resume_at: Cycle,
}

/// An issued line fetch waiting for memory.
#[derive(Clone, Debug)]
struct FetchRequest {
    thread: ThreadId,
    generation: u64,
    line_seq: InstSeqNum,
    addr: u64,
    pc: u64,
    end_pc: u64,
    predicted: Option<(u64, u64)>,
    ready_at: Cycle,
    fault: Option<Fault>,
}

/// Outcome of one delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Discarded,
    Blocked,
    Nothing,
}

impl Delivery {
    const fn progressed(self) -> bool {
        matches!(self, Self::Delivered | Self::Discarded)
    }
}

/// The Fetch1 stage.
#[derive(Debug)]
pub struct Fetch1 {
    threads: Vec<Fetch1Thread>,
    requests: VecDeque<FetchRequest>,
    arbiter: ThreadArbiter,
    fetch_limit: usize,
    snap_width: u64,
    line_width: u64,
    backward_delay: Cycle,
}

impl Fetch1 {
    /// Builds Fetch1 from a validated configuration. Every thread starts idle.
    pub fn new(config: &Config) -> Self {
        Self {
            threads: vec![Fetch1Thread::default(); config.num_threads],
            requests: VecDeque::with_capacity(config.fetch1_fetch_limit),
            arbiter: ThreadArbiter::new(config.thread_policy, config.num_threads),
            fetch_limit: config.fetch1_fetch_limit,
            snap_width: config.line_snap_width(),
            line_width: config.line_width(),
            backward_delay: config.fetch1_to_fetch2_backward_delay,
        }
    }

    /// State of `thread`.
    pub fn thread(&self, thread: ThreadId) -> Option<&Fetch1Thread> {
        self.threads.get(thread)
    }

    /// Starts fetching `thread` at `pc` under stream `generation`.
    pub fn activate(&mut self, thread: ThreadId, pc: u64, generation: u64, now: Cycle) {
        if let Some(t) = self.threads.get_mut(thread) {
            t.status = FetchStatus::Running;
            t.pc = pc;
            t.generation = generation;
            t.resume_at = now;
        }
    }

    /// Stops new fetches for `thread`.
    pub fn suspend(&mut self, thread: ThreadId) {
        if let Some(t) = self.threads.get_mut(thread)
            && t.status != FetchStatus::Halted
        {
            t.status = FetchStatus::Suspended;
        }
    }

    /// True when no line fetch is outstanding.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// True when no thread can fetch again without an external event.
    pub fn all_halted(&self) -> bool {
        self.threads
            .iter()
            .all(|t| matches!(t.status, FetchStatus::Halted | FetchStatus::Idle))
    }

    /// Earliest future cycle at which a line returns or a thread may restart.
    pub fn next_event(&self, now: Cycle) -> Option<Cycle> {
        let lines = self.requests.iter().map(|r| r.ready_at);
        let restarts = self
            .threads
            .iter()
            .filter(|t| t.status == FetchStatus::Running)
            .map(|t| t.resume_at);
        lines.chain(restarts).filter(|&c| c > now).min()
    }

    /// Runs one cycle. Returns whether the stage did anything.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        now: Cycle,
        branches: &mut Latch<BranchData>,
        output: &mut Latch<ForwardLine>,
        next_input: &mut InputBuffer<ForwardLine>,
        memory: &mut dyn MemoryPort,
        predictor: &dyn BranchPredictor,
        stats: &mut PipelineStats,
        draining: bool,
    ) -> bool {
        let mut active = false;
        while let Some(branch) = branches.pop_ready(now) {
            active |= self.apply_redirect(&branch, now);
        }

        let mut delivery = self.deliver(now, output, next_input, stats);
        active |= delivery.progressed();

        if !draining && self.requests.len() < self.fetch_limit {
            active |= self.issue(now, memory, predictor, stats);
        }
        if delivery != Delivery::Delivered {
            delivery = self.deliver(now, output, next_input, stats);
            active |= delivery.progressed();
        }
        if delivery == Delivery::Blocked {
            stats.fetch1_backpressure += 1;
        }
        active
    }

    fn apply_redirect(&mut self, branch: &BranchData, now: Cycle) -> bool {
        let backward_delay = self.backward_delay;
        let Some(t) = self.threads.get_mut(branch.thread) else {
            return false;
        };
        if branch.generation <= t.generation {
            return false;
        }
        t.generation = branch.generation;
        match branch.kind {
            RedirectKind::Mispredict | RedirectKind::Trap => {
                t.pc = branch.target;
                if matches!(t.status, FetchStatus::Blocked | FetchStatus::Running) {
                    t.status = FetchStatus::Running;
                }
                t.resume_at = now + backward_delay;
            }
            RedirectKind::Halt => t.status = FetchStatus::Halted,
        }
        debug!(
            target: "fetch1",
            thread = branch.thread,
            generation = branch.generation,
            target_pc = branch.target,
            kind = ?branch.kind,
            "redirect"
        );
        true
    }

    fn deliver(
        &mut self,
        now: Cycle,
        output: &mut Latch<ForwardLine>,
        next_input: &mut InputBuffer<ForwardLine>,
        stats: &mut PipelineStats,
    ) -> Delivery {
        let mut discarded = false;
        while let Some(head) = self.requests.front() {
            if head.ready_at > now {
                break;
            }
            let live = self
                .threads
                .get(head.thread)
                .is_some_and(|t| t.generation == head.generation);
            if live {
                if !next_input.reserve() {
                    return Delivery::Blocked;
                }
                let Some(req) = self.requests.pop_front() else {
                    break;
                };
                trace!(target: "fetch1", thread = req.thread, line = req.line_seq, addr = req.addr, "deliver");
                output.push(
                    now,
                    ForwardLine {
                        thread: req.thread,
                        generation: req.generation,
                        line_seq: req.line_seq,
                        line_addr: req.addr,
                        pc: req.pc,
                        end_pc: req.end_pc,
                        predicted: req.predicted,
                        fault: req.fault,
                    },
                );
                stats.lines_fetched += 1;
                return Delivery::Delivered;
            }
            let _ = self.requests.pop_front();
            stats.lines_discarded += 1;
            discarded = true;
        }
        if discarded {
            Delivery::Discarded
        } else {
            Delivery::Nothing
        }
    }

    fn issue(
        &mut self,
        now: Cycle,
        memory: &mut dyn MemoryPort,
        predictor: &dyn BranchPredictor,
        stats: &mut PipelineStats,
    ) -> bool {
        let threads = &self.threads;
        let eligible = |t: ThreadId| threads[t].status == FetchStatus::Running && now >= threads[t].resume_at;
        // The Random policy consumes generator state per grant attempt.
        if !(0..threads.len()).any(eligible) {
            return false;
        }
        let Some(tid) = self.arbiter.grant(eligible) else {
            return false;
        };

        let (snap, width) = (self.snap_width, self.line_width);
        let t = &mut self.threads[tid];
        let pc = t.pc;
        let aligned = pc & !(snap - 1);
        let line_end = aligned + width;

        let predicted = (pc..line_end)
            .step_by(INST_BYTES as usize)
            .find_map(|slot| predictor.predict(tid, slot).map(|target| (slot, target)));
        let (end_pc, next_pc) = match predicted {
            Some((slot, target)) => (slot + INST_BYTES, target),
            None => (line_end, line_end),
        };

        let response = memory.fetch(tid, aligned, width);
        t.line_seq += 1;
        t.pc = next_pc;
        if response.fault.is_some() {
            t.status = FetchStatus::Blocked;
        }
        trace!(
            target: "fetch1",
            thread = tid,
            line = t.line_seq,
            addr = aligned,
            pc,
            end = end_pc,
            ready = now + response.latency,
            "issue"
        );
        self.requests.push_back(FetchRequest {
            thread: tid,
            generation: t.generation,
            line_seq: t.line_seq,
            addr: aligned,
            pc,
            end_pc,
            predicted,
            ready_at: now + response.latency,
            fault: response.fault,
        });
        stats.fetch_requests += 1;
        true
    }

    /// Short state summary for traces.
    pub fn describe(&self) -> String {
        let threads: Vec<String> = self
            .threads
            .iter()
            .enumerate()
            .map(|(i, t)| format!("T{i}:{:?}@{:#x}/{}", t.status, t.pc, t.generation))
            .collect();
        format!("{} requests={}", threads.join(","), self.requests.len())
    }
}
