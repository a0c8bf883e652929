//! Store Buffer for committed memory writes.
//!
//! Stores leave the LSQ transfers queue when they commit and wait here until memory has
//! accepted their write. The store buffer provides:
//! 1. **Insertion:** Append a committed store in commit order.
//! 2. **Forwarding:** Provide store-to-load forwarding for younger loads of the same thread.
//! 3. **Issue:** Hand committed stores to memory in FIFO order, a bounded number per cycle.
//! 4. **Release:** Free the oldest entries once their writes complete.

use crate::common::{Cycle, ThreadId};
use crate::core::inst::InstId;

/// Result of store-to-load forwarding check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardResult {
    /// Store fully covers the load; use the forwarded data.
    Hit(u64),
    /// No overlap with any buffered store; safe to read from memory.
    Miss,
    /// Partial overlap; must stall until the store drains to memory.
    Stall,
}

/// Lifecycle state of a store buffer entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StoreState {
    /// Committed, write not yet sent to memory.
    #[default]
    Committed,
    /// Write sent to memory; completes at `done_at`.
    Issued {
        /// Cycle the write completes.
        done_at: Cycle,
    },
}

/// A single entry in the store buffer.
#[derive(Clone, Debug, Default)]
pub struct StoreBufferEntry {
    /// Instruction that produced the store.
    pub id: InstId,
    /// Physical address of the store.
    pub paddr: u64,
    /// Access size in bytes.
    pub size: u8,
    /// Data to store (low `size` bytes).
    pub data: u64,
    /// Current lifecycle state.
    pub state: StoreState,
    /// Whether this slot is occupied.
    pub valid: bool,
}

impl StoreBufferEntry {
    /// Thread that issued the store.
    pub const fn thread(&self) -> ThreadId {
        self.id.thread
    }
}

/// Extracts `load_size` bytes at `load_addr` from a store of `size` bytes at `addr`.
///
/// Returns `None` when the store does not cover the whole load.
pub fn extract_covered(addr: u64, size: u8, data: u64, load_addr: u64, load_size: u8) -> Option<u64> {
    let store_end = addr + u64::from(size);
    let load_end = load_addr + u64::from(load_size);
    if addr > load_addr || store_end < load_end {
        return None;
    }
    let offset = (load_addr - addr) as u32;
    let shifted = data.checked_shr(offset * 8).unwrap_or(0);
    let mask = if load_size >= 8 {
        u64::MAX
    } else {
        (1u64 << (u32::from(load_size) * 8)) - 1
    };
    Some(shifted & mask)
}

/// Returns whether `[a, a+a_size)` and `[b, b+b_size)` overlap.
pub const fn overlaps(a: u64, a_size: u8, b: u64, b_size: u8) -> bool {
    a < b + b_size as u64 && b < a + a_size as u64
}

/// Store buffer: FIFO queue of committed stores.
#[derive(Debug)]
pub struct StoreBuffer {
    entries: Vec<StoreBufferEntry>,
    /// Index of the oldest entry.
    head: usize,
    /// Index where the next entry will be inserted.
    tail: usize,
    /// Number of valid entries.
    count: usize,
}

impl StoreBuffer {
    /// Creates a new store buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, StoreBufferEntry::default);
        Self {
            entries,
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Returns the capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of occupied entries.
    #[inline]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the store buffer is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if the store buffer is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    /// Returns the number of free slots.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.entries.len() - self.count
    }

    /// Appends a committed store. Returns false if the buffer is full.
    pub fn insert(&mut self, id: InstId, paddr: u64, size: u8, data: u64) -> bool {
        if self.is_full() {
            return false;
        }

        self.entries[self.tail] = StoreBufferEntry {
            id,
            paddr,
            size,
            data,
            state: StoreState::Committed,
            valid: true,
        };

        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        true
    }

    /// Iterates occupied slot indices from oldest to newest.
    fn indices(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        let cap = self.entries.len();
        (0..self.count).map(move |i| (self.head + i) % cap)
    }

    /// Attempts store-to-load forwarding for a load of `thread`.
    ///
    /// Searches from newest to oldest. Returns `Hit(data)` if the youngest overlapping store
    /// fully covers the load, `Stall` on a partial overlap, or `Miss` if nothing overlaps.
    pub fn forward_load(&self, thread: ThreadId, paddr: u64, size: u8) -> ForwardResult {
        for idx in self.indices().rev() {
            let entry = &self.entries[idx];
            if !entry.valid || entry.thread() != thread {
                continue;
            }
            if overlaps(entry.paddr, entry.size, paddr, size) {
                return extract_covered(entry.paddr, entry.size, entry.data, paddr, size)
                    .map_or(ForwardResult::Stall, ForwardResult::Hit);
            }
        }
        ForwardResult::Miss
    }

    /// Sends committed stores to memory in FIFO order.
    ///
    /// `write` is offered each unissued entry in turn and returns the write latency, or
    /// `None` when memory cannot take another access this cycle. At most `max` stores issue.
    /// Returns the number issued.
    pub fn issue<F>(&mut self, now: Cycle, max: usize, mut write: F) -> usize
    where
        F: FnMut(&StoreBufferEntry) -> Option<Cycle>,
    {
        let mut issued = 0;
        let order: Vec<usize> = self.indices().collect();
        for idx in order {
            if issued == max {
                break;
            }
            let entry = &self.entries[idx];
            if entry.state != StoreState::Committed {
                continue;
            }
            let Some(latency) = write(entry) else {
                break;
            };
            self.entries[idx].state = StoreState::Issued {
                done_at: now + latency,
            };
            issued += 1;
        }
        issued
    }

    /// Releases completed writes from the head of the buffer. Returns the number released.
    pub fn retire_completed(&mut self, now: Cycle) -> usize {
        let mut released = 0;
        while self.count > 0 {
            let entry = &mut self.entries[self.head];
            match entry.state {
                StoreState::Issued { done_at } if done_at <= now => {
                    entry.valid = false;
                    self.head = (self.head + 1) % self.entries.len();
                    self.count -= 1;
                    released += 1;
                }
                _ => break,
            }
        }
        released
    }

    /// Number of entries whose writes are in memory.
    pub fn writes_in_flight(&self) -> usize {
        self.indices()
            .filter(|&idx| matches!(self.entries[idx].state, StoreState::Issued { .. }))
            .count()
    }

    /// Whether any entry still waits to be sent to memory.
    pub fn has_unissued(&self) -> bool {
        self.indices()
            .any(|idx| self.entries[idx].state == StoreState::Committed)
    }

    /// Earliest future completion cycle of an issued write.
    pub fn next_event(&self, now: Cycle) -> Option<Cycle> {
        self.indices()
            .filter_map(|idx| match self.entries[idx].state {
                StoreState::Issued { done_at } if done_at > now => Some(done_at),
                _ => None,
            })
            .min()
    }

    /// Short state summary for traces, oldest first.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .indices()
            .map(|idx| {
                let e = &self.entries[idx];
                match e.state {
                    StoreState::Committed => format!("{}@{:#x}", e.id, e.paddr),
                    StoreState::Issued { done_at } => format!("{}@{:#x}->{done_at}", e.id, e.paddr),
                }
            })
            .collect();
        parts.join(",")
    }
}
