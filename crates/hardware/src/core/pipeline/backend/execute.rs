//! Execute Stage: issue, memory submission, commit.
//!
//! Execute owns the functional unit pool, the LSQ and one scoreboard per thread. Each cycle it:
//! 1. Accepts arriving instruction groups into its input buffer.
//! 2. Steps the LSQ and frees functional unit slots.
//! 3. Commits finished instructions in program order per thread, resolving branches and
//!    faults. A misprediction or trap bumps the thread's generation, squashes its younger
//!    in-flight work and sends a redirect to Fetch1.
//! 4. Hands memory instructions that left their unit to the LSQ.
//! 5. Issues new instructions to free units whose operands are ready.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::common::{Cycle, INST_BYTES, ThreadId};
use crate::config::{Config, FuPoolConfig};
use crate::core::inst::{BranchOutcome, DynInst};
use crate::core::pipeline::Collaborators;
use crate::core::pipeline::buffers::{InputBuffer, Latch};
use crate::core::pipeline::latches::{BranchData, CommitRecord, InstGroup, RedirectKind};
use crate::core::pipeline::lsq::{Lsq, LsqParams, LsqState};
use crate::core::pipeline::scoreboard::Scoreboard;
use crate::core::units::fu::{FuPool, IssueContext};
use crate::soc::TrapAction;
use crate::stats::PipelineStats;

/// An issued instruction waiting to commit.
#[derive(Clone, Debug)]
pub struct InFlight {
    /// The instruction.
    pub inst: DynInst,
    /// Earliest commit cycle.
    pub done_at: Cycle,
    /// Cycle the instruction leaves its functional unit.
    pub fu_done_at: Cycle,
    /// Whether a memory instruction has entered the LSQ.
    pub submitted: bool,
    /// Whether dependents wait for this instruction's commit.
    pub unpredictable: bool,
}

/// Stage-boundary structures Execute reads and writes.
pub struct ExecuteIo<'a> {
    /// Groups arriving from Decode.
    pub input_latch: &'a mut Latch<InstGroup>,
    /// Execute's input buffer.
    pub input: &'a mut InputBuffer<InstGroup>,
    /// Redirects to Fetch1.
    pub branches: &'a mut Latch<BranchData>,
    /// Current stream generation of every thread.
    pub generations: &'a mut [u64],
    /// Statistics.
    pub stats: &'a mut PipelineStats,
    /// Commit log.
    pub commits: &'a mut Vec<CommitRecord>,
}

#[derive(Clone, Copy, Debug)]
struct Limits {
    input_width: usize,
    cycle_input: bool,
    issue: usize,
    mem_issue: usize,
    commit: usize,
    mem_commit: usize,
    allow_early_memory: bool,
    trace_on_issue: bool,
}

fn max_relative_latency(pool: &FuPoolConfig) -> Cycle {
    pool.func_units
        .iter()
        .flat_map(|unit| &unit.timings)
        .flat_map(|rule| rule.src_regs_relative_lats.iter().copied())
        .max()
        .unwrap_or(0)
}

/// The Execute stage.
#[derive(Debug)]
pub struct Execute {
    fu_pool: FuPool,
    lsq: Lsq,
    scoreboards: Vec<Scoreboard>,
    in_flight: Vec<VecDeque<InFlight>>,
    commit_cursor: ThreadId,
    limits: Limits,
    max_rel: Cycle,
}

impl Execute {
    /// Builds Execute from a validated configuration.
    pub fn new(config: &Config) -> Self {
        let threads = config.num_threads;
        Self {
            fu_pool: FuPool::new(&config.execute_func_units),
            lsq: Lsq::new(LsqParams {
                requests: config.execute_lsq_requests_queue_size,
                transfers: config.execute_lsq_transfers_queue_size,
                store_buffer: config.execute_lsq_store_buffer_size,
                stores_per_cycle: config.execute_lsq_max_store_buffer_stores_per_cycle,
                max_accesses: config.execute_max_accesses_in_memory,
                memory_width: config.memory_width(),
            }),
            scoreboards: vec![Scoreboard::new(); threads],
            in_flight: vec![VecDeque::new(); threads],
            commit_cursor: 0,
            limits: Limits {
                input_width: config.execute_input_width,
                cycle_input: config.execute_cycle_input,
                issue: config.execute_issue_limit,
                mem_issue: config.execute_memory_issue_limit,
                commit: config.execute_commit_limit,
                mem_commit: config.execute_memory_commit_limit,
                allow_early_memory: config.execute_allow_early_memory_issue,
                trace_on_issue: config.execute_set_trace_time_on_issue,
            },
            max_rel: max_relative_latency(&config.execute_func_units),
        }
    }

    /// The functional unit pool.
    pub const fn fu_pool(&self) -> &FuPool {
        &self.fu_pool
    }

    /// The load/store queue.
    pub const fn lsq(&self) -> &Lsq {
        &self.lsq
    }

    /// Scoreboard of `thread`.
    pub fn scoreboard(&self, thread: ThreadId) -> Option<&Scoreboard> {
        self.scoreboards.get(thread)
    }

    /// Issued, uncommitted instructions of `thread`, oldest first.
    pub fn in_flight(&self, thread: ThreadId) -> impl Iterator<Item = &InFlight> {
        self.in_flight.get(thread).into_iter().flatten()
    }

    /// True when nothing is in flight and the LSQ is empty.
    pub fn is_empty(&self) -> bool {
        self.in_flight.iter().all(VecDeque::is_empty) && self.lsq.is_empty()
    }

    /// Earliest future cycle at which Execute can make progress on its own.
    pub fn next_event(&self, now: Cycle) -> Option<Cycle> {
        let in_flight = self
            .in_flight
            .iter()
            .flatten()
            .flat_map(|e| [e.done_at, e.fu_done_at]);
        let scoreboards = self
            .scoreboards
            .iter()
            .filter_map(|sb| sb.next_event(now, self.max_rel));
        in_flight
            .filter(|&c| c > now)
            .chain(scoreboards)
            .chain(self.fu_pool.next_event(now))
            .chain(self.lsq.next_event(now))
            .min()
    }

    /// Runs one cycle. Returns whether the stage did anything.
    pub fn evaluate(&mut self, now: Cycle, io: &mut ExecuteIo<'_>, env: &mut Collaborators<'_>) -> bool {
        let mut active = false;
        while let Some(group) = io.input_latch.pop_ready(now) {
            io.input.push_reserved(group);
            active = true;
        }

        active |= self.lsq.step(now, env.memory, io.stats);
        let _ = self.fu_pool.retire(now);

        active |= self.commit(now, io, env);
        active |= self.submit_memory(now, io, env);
        active |= self.issue(now, io);
        active
    }

    fn commit(&mut self, now: Cycle, io: &mut ExecuteIo<'_>, env: &mut Collaborators<'_>) -> bool {
        let threads = self.in_flight.len();
        let (mut committed, mut mem_committed) = (0, 0);

        'threads: for k in 0..threads {
            let tid = (self.commit_cursor + k) % threads;
            loop {
                if committed == self.limits.commit {
                    break 'threads;
                }
                let Some(head) = self.in_flight[tid].front() else {
                    break;
                };
                if now < head.done_at {
                    break;
                }
                let id = head.inst.id;
                let is_mem = head.inst.is_mem();
                let mut fault = head.inst.fault_kind();
                let mut load_value = None;
                if is_mem {
                    if mem_committed == self.limits.mem_commit || !head.submitted {
                        break;
                    }
                    let is_load = head.inst.static_inst().is_some_and(|si| si.is_load());
                    match self.lsq.state(id) {
                        Some(LsqState::Complete) if is_load => load_value = self.lsq.retire_load(id),
                        Some(LsqState::Complete) => {
                            if !self.lsq.retire_store(id) {
                                io.stats.store_buffer_full_stalls += 1;
                                break;
                            }
                        }
                        Some(LsqState::Faulted) => fault = self.lsq.take(id).and_then(|e| e.fault),
                        _ => break,
                    }
                    mem_committed += 1;
                }

                let Some(entry) = self.in_flight[tid].pop_front() else {
                    break;
                };
                committed += 1;
                if let Some(si) = entry.inst.static_inst() {
                    self.scoreboards[tid].clear(si, entry.unpredictable);
                }

                let pc = entry.inst.pc;
                let mut mispredicted = false;
                let mut redirected = false;
                if let Some(fault) = fault {
                    io.stats.faults += 1;
                    let (target, kind) = match env.traps.handle(tid, pc, &fault) {
                        TrapAction::Redirect(target) => (target, RedirectKind::Trap),
                        TrapAction::Halt => (pc, RedirectKind::Halt),
                    };
                    debug!(target: "execute", inst = %entry.inst, %fault, ?kind, "fault");
                    self.redirect(tid, target, kind, now, io);
                    redirected = true;
                } else {
                    io.stats.committed_insts[tid] += 1;
                    if is_mem {
                        io.stats.committed_mem_refs[tid] += 1;
                    }
                    if let Some(si) = entry.inst.static_inst()
                        && (si.is_control() || entry.inst.predicted_taken)
                    {
                        let outcome = si.branch.unwrap_or(BranchOutcome {
                            taken: false,
                            target: pc.wrapping_add(INST_BYTES),
                        });
                        let actual = outcome.next_pc(pc);
                        mispredicted = actual != entry.inst.predicted_next;
                        env.predictor.resolve(tid, pc, &outcome, mispredicted);
                        if mispredicted {
                            io.stats.mispredictions += 1;
                            self.redirect(tid, actual, RedirectKind::Mispredict, now, io);
                            redirected = true;
                        }
                    }
                }

                let issue_cycle = entry.inst.issue_cycle.unwrap_or(now);
                let record = CommitRecord {
                    id,
                    pc,
                    op_class: entry.inst.op_class(),
                    issue_cycle,
                    commit_cycle: now,
                    trace_time: if self.limits.trace_on_issue { issue_cycle } else { now },
                    fu_index: entry.inst.fu_index,
                    load_value,
                    fault,
                    mispredicted,
                };
                debug!(
                    target: "commit",
                    inst = %record.id,
                    pc = format_args!("{:#x}", record.pc),
                    op = %record.op_class,
                    time = record.trace_time,
                    "commit"
                );
                io.commits.push(record);
                if redirected {
                    break;
                }
            }
        }

        if committed > 0 && threads > 0 {
            self.commit_cursor = (self.commit_cursor + 1) % threads;
        }
        committed > 0
    }

    /// Bumps `thread`'s generation, squashes its in-flight work and tells Fetch1.
    fn redirect(&mut self, thread: ThreadId, target: u64, kind: RedirectKind, now: Cycle, io: &mut ExecuteIo<'_>) {
        let Some(generation) = io.generations.get_mut(thread) else {
            return;
        };
        *generation += 1;
        io.branches.push(
            now,
            BranchData {
                thread,
                generation: *generation,
                target,
                kind,
            },
        );
        for squashed in self.in_flight[thread].drain(..) {
            if let Some(si) = squashed.inst.static_inst() {
                self.scoreboards[thread].clear(si, squashed.unpredictable);
            }
            io.stats.insts_discarded += 1;
            trace!(target: "execute", inst = %squashed.inst, "squash");
        }
        self.lsq.cancel(thread);
    }

    fn submit_memory(&mut self, now: Cycle, io: &mut ExecuteIo<'_>, env: &mut Collaborators<'_>) -> bool {
        let mut submitted = false;
        for tid in 0..self.in_flight.len() {
            let queue = &mut self.in_flight[tid];
            let Some(index) = queue.iter().position(|e| e.inst.is_mem() && !e.submitted) else {
                continue;
            };
            let entry = &mut queue[index];
            if now < entry.fu_done_at || (!self.limits.allow_early_memory && index != 0) {
                continue;
            }
            let Some(mem) = entry.inst.static_inst().and_then(|si| si.mem) else {
                continue;
            };
            if !self.lsq.submit(entry.inst.id, &mem, now, env.memory) {
                io.stats.lsq_full_stalls += 1;
                continue;
            }
            entry.submitted = true;
            submitted = true;
        }
        submitted
    }

    fn issue(&mut self, now: Cycle, io: &mut ExecuteIo<'_>) -> bool {
        let (mut issued, mut mem_issued, mut taken) = (0, 0, 0);
        let mut active = false;

        while issued < self.limits.issue && taken < self.limits.input_width {
            let Some(group) = io.input.front_mut() else {
                break;
            };
            let Some(inst) = group.front() else {
                let _ = io.input.pop();
                active = true;
                if !self.limits.cycle_input {
                    break;
                }
                continue;
            };
            let tid = inst.id.thread;
            if io.generations.get(tid) != Some(&inst.id.generation) {
                let _ = group.pop_front();
                io.stats.insts_discarded += 1;
                active = true;
                continue;
            }

            let decision = match inst.static_inst() {
                None => None,
                Some(si) => {
                    let is_mem = si.is_mem();
                    if is_mem && mem_issued == self.limits.mem_issue {
                        io.stats.mem_issue_stalls += 1;
                        break;
                    }
                    let ctx = IssueContext {
                        cycle: now,
                        thread: tid,
                        in_flight: self.in_flight[tid].len(),
                    };
                    let scoreboard = &self.scoreboards[tid];
                    let pool = &self.fu_pool;
                    let alloc = pool.candidates(si, &ctx).find(|a| {
                        scoreboard.can_issue(si, &a.src_rel_lats, |p| pool.cant_forward(a.fu_index, p), now)
                    });
                    let Some(alloc) = alloc else {
                        if pool.allocate(si, &ctx).is_none() {
                            io.stats.fu_stalls += 1;
                        } else {
                            io.stats.scoreboard_stalls += 1;
                        }
                        break;
                    };
                    Some((alloc, is_mem))
                }
            };

            let Some(mut inst) = group.pop_front() else {
                break;
            };
            inst.issue_cycle = Some(now);
            let entry = match decision {
                None => InFlight {
                    inst,
                    done_at: now,
                    fu_done_at: now,
                    submitted: false,
                    unpredictable: false,
                },
                Some((alloc, is_mem)) => {
                    self.fu_pool.issue(&alloc, inst.id, now);
                    let done_at = now + alloc.latency();
                    let unpredictable = is_mem && alloc.extra_assumed_lat == 0;
                    if let Some(si) = inst.static_inst() {
                        self.scoreboards[tid].markup(
                            si,
                            inst.id.exec,
                            alloc.fu_index,
                            done_at + alloc.extra_assumed_lat,
                            unpredictable,
                        );
                    }
                    inst.fu_index = Some(alloc.fu_index);
                    if is_mem {
                        mem_issued += 1;
                    }
                    InFlight {
                        inst,
                        done_at,
                        fu_done_at: now + alloc.op_lat,
                        submitted: false,
                        unpredictable,
                    }
                }
            };
            trace!(target: "execute", inst = %entry.inst, done = entry.done_at, "issue");
            self.in_flight[tid].push_back(entry);
            issued += 1;
            taken += 1;
            active = true;
        }

        if io.input.front().is_some_and(InstGroup::is_empty) {
            let _ = io.input.pop();
        }
        active
    }

    /// Busy structures for state traces.
    pub fn describe(&self) -> String {
        let in_flight: Vec<String> = self
            .in_flight
            .iter()
            .enumerate()
            .map(|(tid, q)| format!("T{tid}:{}", q.len()))
            .collect();
        let scoreboards: Vec<String> = self
            .scoreboards
            .iter()
            .enumerate()
            .map(|(tid, sb)| format!("T{tid}:[{}]", sb.describe()))
            .collect();
        format!(
            "in_flight={} scoreboard={} {}",
            in_flight.join(","),
            scoreboards.join(","),
            self.lsq.describe()
        )
    }
}

