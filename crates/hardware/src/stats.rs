//! Pipeline statistics collection and reporting.
//!
//! This module tracks performance counters for the pipeline model. It provides:
//! 1. **Cycles and IPC:** Evaluated cycles, skipped (quiesce) cycles, committed instructions.
//! 2. **Instruction mix:** Fetch2 counts by category (integer, float, vector, load, store).
//! 3. **Front end:** Lines fetched, discarded lines and tokens, redirects.
//! 4. **Stalls:** Per-cause stall counters for each stage.
//! 5. **Memory:** LSQ accesses, forwarded loads and drained stores.

use std::fmt::Write as _;

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"instruction_mix"`, `"frontend"`, `"stalls"`, `"memory"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "instruction_mix", "frontend", "stalls", "memory"];

/// Pipeline statistics.
///
/// Stall counters count evaluated cycles only; cycles skipped while idling are reported
/// separately as `quiesce_cycles`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Total simulated cycles, evaluated or skipped.
    pub cycles: u64,
    /// Cycles skipped while the pipeline was idle.
    pub quiesce_cycles: u64,
    /// Instructions committed, per thread.
    pub committed_insts: Vec<u64>,
    /// Memory references committed, per thread.
    pub committed_mem_refs: Vec<u64>,

    /// Integer instructions decoded by Fetch2.
    pub int_insts: u64,
    /// Floating-point instructions decoded by Fetch2.
    pub fp_insts: u64,
    /// Vector and SIMD instructions decoded by Fetch2.
    pub vec_insts: u64,
    /// Loads decoded by Fetch2.
    pub load_insts: u64,
    /// Stores decoded by Fetch2.
    pub store_insts: u64,

    /// Line fetch requests issued by Fetch1.
    pub fetch_requests: u64,
    /// Lines delivered to Fetch2.
    pub lines_fetched: u64,
    /// Lines discarded as stale (by Fetch1 or Fetch2).
    pub lines_discarded: u64,
    /// Instruction tokens discarded as stale or squashed.
    pub insts_discarded: u64,
    /// Control mispredictions detected at commit.
    pub mispredictions: u64,
    /// Faults resolved at commit.
    pub faults: u64,

    /// Fetch1 cycles with a deliverable line but no room in Fetch2.
    pub fetch1_backpressure: u64,
    /// Fetch2 cycles with input but no room in Decode.
    pub fetch2_backpressure: u64,
    /// Decode cycles with input but no room in Execute.
    pub decode_backpressure: u64,
    /// Execute issue stalls: no free functional unit.
    pub fu_stalls: u64,
    /// Execute issue stalls: operands not ready.
    pub scoreboard_stalls: u64,
    /// Execute issue stalls: memory issue limit reached.
    pub mem_issue_stalls: u64,
    /// Memory submissions refused by a full LSQ requests queue.
    pub lsq_full_stalls: u64,
    /// Store commits refused by a full store buffer.
    pub store_buffer_full_stalls: u64,

    /// Loads that read memory.
    pub loads_sent: u64,
    /// Loads satisfied by store-to-load forwarding.
    pub loads_forwarded: u64,
    /// Loads delayed by a partially overlapping older store.
    pub forward_stalls: u64,
    /// Accesses split across a memory width boundary.
    pub split_accesses: u64,
    /// Stores written to memory from the store buffer.
    pub stores_drained: u64,
    /// LSQ entries freed after cancellation.
    pub lsq_cancelled: u64,
}

impl PipelineStats {
    /// Statistics for `threads` hardware threads.
    pub fn new(threads: usize) -> Self {
        Self {
            committed_insts: vec![0; threads],
            committed_mem_refs: vec![0; threads],
            ..Self::default()
        }
    }

    /// Instructions committed by all threads.
    pub fn total_committed(&self) -> u64 {
        self.committed_insts.iter().sum()
    }

    /// Committed instructions per simulated cycle.
    pub fn ipc(&self) -> f64 {
        let cyc = self.cycles.max(1);
        self.total_committed() as f64 / cyc as f64
    }

    /// Renders the requested sections. An empty slice renders all of them.
    pub fn render_sections(&self, sections: &[String]) -> String {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let mut out = String::new();
        let cyc = self.cycles.max(1);
        let line = "----------------------------------------------------------";

        let _ = writeln!(out, "==========================================================");
        let _ = writeln!(out, "CVA6 PIPELINE STATISTICS");
        let _ = writeln!(out, "==========================================================");
        if want("summary") {
            let total = self.total_committed();
            let _ = writeln!(out, "sim_cycles               {}", self.cycles);
            let _ = writeln!(
                out,
                "quiesce_cycles           {} ({:.2}%)",
                self.quiesce_cycles,
                (self.quiesce_cycles as f64 / cyc as f64) * 100.0
            );
            let _ = writeln!(out, "sim_insts                {total}");
            let _ = writeln!(out, "sim_ipc                  {:.4}", self.ipc());
            for (tid, (insts, mem)) in self
                .committed_insts
                .iter()
                .zip(&self.committed_mem_refs)
                .enumerate()
            {
                let _ = writeln!(out, "  thread{tid}.committed     {insts} (mem refs {mem})");
            }
            let _ = writeln!(out, "{line}");
        }
        if want("instruction_mix") {
            let total = (self.int_insts
                + self.fp_insts
                + self.vec_insts
                + self.load_insts
                + self.store_insts)
                .max(1) as f64;
            let _ = writeln!(out, "INSTRUCTION MIX (fetch2)");
            for (name, count) in [
                ("op.int", self.int_insts),
                ("op.fp", self.fp_insts),
                ("op.vector", self.vec_insts),
                ("op.load", self.load_insts),
                ("op.store", self.store_insts),
            ] {
                let _ = writeln!(
                    out,
                    "  {name:<22} {count} ({:.2}%)",
                    (count as f64 / total) * 100.0
                );
            }
            let _ = writeln!(out, "{line}");
        }
        if want("frontend") {
            let _ = writeln!(out, "FRONT END");
            let _ = writeln!(out, "  fetch.requests         {}", self.fetch_requests);
            let _ = writeln!(out, "  fetch.lines            {}", self.lines_fetched);
            let _ = writeln!(out, "  fetch.lines_discarded  {}", self.lines_discarded);
            let _ = writeln!(out, "  insts.discarded        {}", self.insts_discarded);
            let _ = writeln!(out, "  branch.mispredicts     {}", self.mispredictions);
            let _ = writeln!(out, "  faults                 {}", self.faults);
            let _ = writeln!(out, "{line}");
        }
        if want("stalls") {
            let _ = writeln!(out, "STALLS");
            for (name, count) in [
                ("fetch1.backpressure", self.fetch1_backpressure),
                ("fetch2.backpressure", self.fetch2_backpressure),
                ("decode.backpressure", self.decode_backpressure),
                ("execute.fu_busy", self.fu_stalls),
                ("execute.scoreboard", self.scoreboard_stalls),
                ("execute.mem_issue", self.mem_issue_stalls),
                ("execute.lsq_full", self.lsq_full_stalls),
                ("execute.sb_full", self.store_buffer_full_stalls),
            ] {
                let _ = writeln!(
                    out,
                    "  {name:<22} {count} ({:.2}%)",
                    (count as f64 / cyc as f64) * 100.0
                );
            }
            let _ = writeln!(out, "{line}");
        }
        if want("memory") {
            let _ = writeln!(out, "MEMORY");
            let _ = writeln!(out, "  lsq.loads_sent         {}", self.loads_sent);
            let _ = writeln!(out, "  lsq.loads_forwarded    {}", self.loads_forwarded);
            let _ = writeln!(out, "  lsq.forward_stalls     {}", self.forward_stalls);
            let _ = writeln!(out, "  lsq.split_accesses     {}", self.split_accesses);
            let _ = writeln!(out, "  lsq.stores_drained     {}", self.stores_drained);
            let _ = writeln!(out, "  lsq.cancelled          {}", self.lsq_cancelled);
        }
        let _ = writeln!(out, "==========================================================");
        out
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]. Pass an empty slice to
    /// print all sections.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.render_sections(sections));
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
