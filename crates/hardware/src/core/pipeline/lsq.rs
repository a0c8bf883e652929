//! Load/Store Queue.
//!
//! Memory instructions leave Execute's functional units and enter the LSQ, which runs them
//! through three queues:
//! 1. **Requests:** Submitted accesses waiting for address translation.
//! 2. **Transfers:** Translated accesses. Loads forward from older stores or read memory;
//!    stores wait here, complete, until they commit.
//! 3. **Store buffer:** Committed stores draining to memory.
//!
//! Entries are identified by the owning instruction's [`InstId`]. Cancelled entries stay in
//! place until any memory transfer they started has finished, then they are freed.

use std::collections::VecDeque;

use tracing::trace;

use crate::common::{Cycle, Fault, ThreadId};
use crate::core::inst::{InstId, MemKind, MemRef};
use crate::core::pipeline::store_buffer::{ForwardResult, StoreBuffer, extract_covered, overlaps};
use crate::soc::{MemResponse, MemoryPort};
use crate::stats::PipelineStats;

/// Progress of one LSQ entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LsqState {
    /// Waiting in the requests queue for translation to finish.
    Requested,
    /// Translated load waiting to forward or to be sent to memory.
    Translated,
    /// Load data in flight from memory.
    Transferring {
        /// Cycle the data returns.
        done_at: Cycle,
    },
    /// Ready to commit.
    Complete,
    /// The access faulted. The fault is raised when the instruction commits.
    Faulted,
}

/// One memory access tracked by the LSQ.
#[derive(Clone, Debug)]
pub struct LsqEntry {
    /// Owning instruction.
    pub id: InstId,
    /// Load or store.
    pub kind: MemKind,
    /// Virtual address.
    pub vaddr: u64,
    /// Physical address from translation.
    pub paddr: u64,
    /// Access size in bytes.
    pub size: u8,
    /// Store data.
    pub data: u64,
    /// Load result.
    pub value: u64,
    /// Current state.
    pub state: LsqState,
    /// Cycle translation finishes.
    pub ready_at: Cycle,
    /// Memory accesses this entry occupies while transferring.
    accesses: usize,
    /// The owning instruction was squashed.
    pub cancelled: bool,
    /// Fault raised by translation or transfer.
    pub fault: Option<Fault>,
}

impl LsqEntry {
    const fn thread(&self) -> ThreadId {
        self.id.thread
    }

    const fn is_transferring(&self) -> bool {
        matches!(self.state, LsqState::Transferring { .. })
    }
}

/// Queue sizes and limits.
#[derive(Clone, Copy, Debug)]
pub struct LsqParams {
    /// Capacity of the requests queue.
    pub requests: usize,
    /// Capacity of the transfers queue.
    pub transfers: usize,
    /// Capacity of the store buffer.
    pub store_buffer: usize,
    /// Stores the store buffer may send per cycle.
    pub stores_per_cycle: usize,
    /// Memory accesses allowed in flight at once.
    pub max_accesses: usize,
    /// Accesses crossing a multiple of this width are split in two.
    pub memory_width: u64,
}

/// The load/store queue owned by Execute.
#[derive(Debug)]
pub struct Lsq {
    params: LsqParams,
    requests: VecDeque<LsqEntry>,
    transfers: VecDeque<LsqEntry>,
    store_buffer: StoreBuffer,
}

impl Lsq {
    /// An empty LSQ.
    pub fn new(params: LsqParams) -> Self {
        Self {
            params,
            requests: VecDeque::with_capacity(params.requests),
            transfers: VecDeque::with_capacity(params.transfers),
            store_buffer: StoreBuffer::new(params.store_buffer),
        }
    }

    /// The committed-store buffer.
    pub const fn store_buffer(&self) -> &StoreBuffer {
        &self.store_buffer
    }

    /// Whether the requests queue has room for another access.
    pub fn can_submit(&self) -> bool {
        self.requests.len() < self.params.requests
    }

    /// Enters a memory access and starts its translation.
    ///
    /// Returns false when the requests queue is full.
    pub fn submit(&mut self, id: InstId, mem: &MemRef, now: Cycle, memory: &mut dyn MemoryPort) -> bool {
        if !self.can_submit() {
            return false;
        }
        let translation = memory.translate(id.thread, mem.addr, mem.size, mem.kind);
        trace!(
            target: "lsq",
            inst = %id,
            vaddr = mem.addr,
            paddr = translation.paddr,
            ready = now + translation.latency,
            "submit"
        );
        self.requests.push_back(LsqEntry {
            id,
            kind: mem.kind,
            vaddr: mem.addr,
            paddr: translation.paddr,
            size: mem.size,
            data: mem.data,
            value: 0,
            state: LsqState::Requested,
            ready_at: now + translation.latency,
            accesses: 0,
            cancelled: false,
            fault: translation.fault,
        });
        true
    }

    /// Advances every queue by one cycle. Returns whether any entry changed state.
    pub fn step(&mut self, now: Cycle, memory: &mut dyn MemoryPort, stats: &mut PipelineStats) -> bool {
        let mut changed = self.drain_store_buffer(now, memory, stats);

        for entry in &mut self.transfers {
            if let LsqState::Transferring { done_at } = entry.state
                && done_at <= now
            {
                entry.state = if entry.fault.is_some() {
                    LsqState::Faulted
                } else {
                    LsqState::Complete
                };
                entry.accesses = 0;
                changed = true;
            }
        }

        let before = self.transfers.len();
        self.transfers.retain(|e| !e.cancelled || e.is_transferring());
        stats.lsq_cancelled += (before - self.transfers.len()) as u64;
        changed |= before != self.transfers.len();

        changed |= self.advance_request(now, stats);
        changed |= self.issue_loads(now, memory, stats);
        changed
    }

    fn accesses_in_flight(&self) -> usize {
        self.transfers.iter().map(|e| e.accesses).sum::<usize>() + self.store_buffer.writes_in_flight()
    }

    fn drain_store_buffer(&mut self, now: Cycle, memory: &mut dyn MemoryPort, stats: &mut PipelineStats) -> bool {
        let released = self.store_buffer.retire_completed(now);
        stats.stores_drained += released as u64;
        let mut budget = self.params.max_accesses.saturating_sub(self.accesses_in_flight());
        let issued = self
            .store_buffer
            .issue(now, self.params.stores_per_cycle, |entry| {
                if budget == 0 {
                    return None;
                }
                budget -= 1;
                let latency = memory.write(entry.paddr, entry.size, entry.data).latency;
                trace!(target: "lsq", inst = %entry.id, paddr = entry.paddr, done = now + latency, "store write");
                Some(latency)
            });
        released + issued > 0
    }

    fn advance_request(&mut self, now: Cycle, stats: &mut PipelineStats) -> bool {
        let mut changed = false;
        while self.requests.front().is_some_and(|e| e.cancelled && e.ready_at <= now) {
            let _ = self.requests.pop_front();
            stats.lsq_cancelled += 1;
            changed = true;
        }
        let ready = self
            .requests
            .front()
            .is_some_and(|e| !e.cancelled && e.ready_at <= now);
        if !ready || self.transfers.len() >= self.params.transfers {
            return changed;
        }
        let Some(mut entry) = self.requests.pop_front() else {
            return changed;
        };
        entry.state = match (entry.fault, entry.kind) {
            (Some(_), _) => LsqState::Faulted,
            (None, MemKind::Store) => LsqState::Complete,
            (None, MemKind::Load) => LsqState::Translated,
        };
        self.transfers.push_back(entry);
        true
    }

    /// Store-to-load forwarding for the load at `index` of the transfers queue.
    fn forward(&self, index: usize) -> ForwardResult {
        let load = &self.transfers[index];
        let older = self.transfers.iter().take(index).rev().find(|e| {
            e.kind == MemKind::Store
                && e.thread() == load.thread()
                && !e.cancelled
                && e.state == LsqState::Complete
                && overlaps(e.paddr, e.size, load.paddr, load.size)
        });
        match older {
            Some(store) => extract_covered(store.paddr, store.size, store.data, load.paddr, load.size)
                .map_or(ForwardResult::Stall, ForwardResult::Hit),
            None => self.store_buffer.forward_load(load.thread(), load.paddr, load.size),
        }
    }

    fn split_point(&self, paddr: u64, size: u8) -> Option<u8> {
        let width = self.params.memory_width;
        if width == 0 {
            return None;
        }
        let offset = paddr % width;
        let first = width - offset;
        (offset + u64::from(size) > width).then_some(first as u8)
    }

    fn issue_loads(&mut self, now: Cycle, memory: &mut dyn MemoryPort, stats: &mut PipelineStats) -> bool {
        let mut changed = false;
        for index in 0..self.transfers.len() {
            let entry = &self.transfers[index];
            if entry.cancelled || entry.kind != MemKind::Load || entry.state != LsqState::Translated {
                continue;
            }
            match self.forward(index) {
                ForwardResult::Hit(value) => {
                    let entry = &mut self.transfers[index];
                    entry.value = value;
                    entry.state = LsqState::Complete;
                    stats.loads_forwarded += 1;
                    changed = true;
                    trace!(target: "lsq", inst = %entry.id, value, "forwarded");
                }
                ForwardResult::Stall => {
                    stats.forward_stalls += 1;
                    break;
                }
                ForwardResult::Miss => {
                    let (paddr, size) = (entry.paddr, entry.size);
                    let split = self.split_point(paddr, size);
                    let needed = if split.is_some() { 2 } else { 1 };
                    // A split access may exceed a limit of one when memory is otherwise idle.
                    if self.accesses_in_flight() + needed > self.params.max_accesses.max(needed) {
                        break;
                    }
                    let response = match split {
                        Some(first) => {
                            stats.split_accesses += 1;
                            let low = memory.read(paddr, first);
                            let high = memory.read(paddr + u64::from(first), size - first);
                            MemResponse {
                                latency: low.latency.max(high.latency),
                                fault: low.fault.or(high.fault),
                                data: low.data | high.data.checked_shl(u32::from(first) * 8).unwrap_or(0),
                            }
                        }
                        None => memory.read(paddr, size),
                    };
                    stats.loads_sent += 1;
                    let entry = &mut self.transfers[index];
                    entry.value = response.data;
                    entry.fault = response.fault;
                    entry.accesses = needed;
                    entry.state = LsqState::Transferring {
                        done_at: now + response.latency,
                    };
                    trace!(target: "lsq", inst = %entry.id, paddr, done = now + response.latency, "load read");
                    changed = true;
                }
            }
        }
        changed
    }

    fn position(&self, id: InstId) -> Option<usize> {
        self.transfers.iter().position(|e| e.id == id)
    }

    /// State of the entry for `id`.
    pub fn state(&self, id: InstId) -> Option<LsqState> {
        self.requests
            .iter()
            .chain(&self.transfers)
            .find(|e| e.id == id)
            .map(|e| e.state)
    }

    /// Frees a completed load and returns its value.
    pub fn retire_load(&mut self, id: InstId) -> Option<u64> {
        let index = self.position(id)?;
        if self.transfers[index].state != LsqState::Complete {
            return None;
        }
        self.transfers.remove(index).map(|e| e.value)
    }

    /// Whether the store buffer can take another committed store.
    pub fn can_retire_store(&self) -> bool {
        !self.store_buffer.is_full()
    }

    /// Moves a completed store into the store buffer. Returns false if that is not possible.
    pub fn retire_store(&mut self, id: InstId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let entry = &self.transfers[index];
        if entry.state != LsqState::Complete
            || !self
                .store_buffer
                .insert(entry.id, entry.paddr, entry.size, entry.data)
        {
            return false;
        }
        let _ = self.transfers.remove(index);
        true
    }

    /// Removes the entry for `id`, whatever its state.
    pub fn take(&mut self, id: InstId) -> Option<LsqEntry> {
        if let Some(index) = self.requests.iter().position(|e| e.id == id) {
            return self.requests.remove(index);
        }
        let index = self.position(id)?;
        self.transfers.remove(index)
    }

    /// Marks every uncommitted entry of `thread` as cancelled.
    pub fn cancel(&mut self, thread: ThreadId) {
        for entry in self
            .requests
            .iter_mut()
            .chain(self.transfers.iter_mut())
            .filter(|e| e.thread() == thread)
        {
            entry.cancelled = true;
        }
    }

    /// True when no access is queued, transferring or draining.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.transfers.is_empty() && self.store_buffer.is_empty()
    }

    /// Earliest future cycle at which some entry changes state on its own.
    pub fn next_event(&self, now: Cycle) -> Option<Cycle> {
        let request = self
            .requests
            .front()
            .map(|e| e.ready_at.max(now + 1));
        let transfers = self.transfers.iter().filter_map(|e| match e.state {
            LsqState::Transferring { done_at } if done_at > now => Some(done_at),
            _ => None,
        });
        request
            .into_iter()
            .chain(transfers)
            .chain(self.store_buffer.next_event(now))
            .min()
    }

    /// Queue contents for state traces.
    pub fn describe(&self) -> String {
        let show = |q: &VecDeque<LsqEntry>| {
            q.iter()
                .map(|e| format!("{}:{:?}", e.id, e.state))
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "requests=[{}] transfers=[{}] sb=[{}]",
            show(&self.requests),
            show(&self.transfers),
            self.store_buffer.describe()
        )
    }
}
