//! Flat reference memory.
//!
//! A sparse little-endian byte store behind the [`MemoryPort`] interface. It provides:
//! 1. **Storage:** Unwritten bytes read as zero.
//! 2. **Latency:** Fixed per-kind latencies for fetches, translations, reads and writes.
//! 3. **Faults:** Configurable address ranges that refuse every access, plus optional
//!    alignment checking on data accesses.
//!
//! Translation is the identity mapping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::{ConfigError, Cycle, Fault, ThreadId};
use crate::core::inst::MemKind;
use crate::soc::traits::{MemResponse, MemoryPort, Translation};

/// Latencies and fault map of a [`FlatMemory`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    /// Cycles per instruction line fetch.
    pub fetch_latency: Cycle,
    /// Cycles per data address translation.
    pub translation_latency: Cycle,
    /// Cycles per data read.
    pub read_latency: Cycle,
    /// Cycles per data write.
    pub write_latency: Cycle,
    /// Half-open `[start, end)` ranges where every access faults.
    pub fault_ranges: Vec<(u64, u64)>,
    /// Initial contents as `(address, bytes)` pairs.
    pub init: Vec<(u64, Vec<u8>)>,
    /// Fault data accesses that are not naturally aligned.
    pub fault_on_misaligned: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            fetch_latency: 1,
            translation_latency: 1,
            read_latency: 2,
            write_latency: 2,
            fault_ranges: Vec::new(),
            init: Vec::new(),
            fault_on_misaligned: false,
        }
    }
}

impl MemoryConfig {
    /// Parses a memory configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] when the document does not parse.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Sparse byte-addressed memory with fixed latencies.
#[derive(Clone, Debug, Default)]
pub struct FlatMemory {
    config: MemoryConfig,
    bytes: HashMap<u64, u8>,
}

impl FlatMemory {
    /// A memory filled from `config.init`.
    pub fn new(config: MemoryConfig) -> Self {
        let mut mem = Self {
            bytes: HashMap::new(),
            config,
        };
        let init = std::mem::take(&mut mem.config.init);
        for (addr, data) in &init {
            mem.write_bytes(*addr, data);
        }
        mem.config.init = init;
        mem
    }

    /// The configuration this memory was built from.
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Stores `data` starting at `addr` without any timing.
    pub fn write_bytes(&mut self, addr: u64, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            let _ = self.bytes.insert(addr.wrapping_add(i as u64), byte);
        }
    }

    /// Reads `size` bytes at `addr` as a little-endian value without any timing.
    pub fn load(&self, addr: u64, size: u8) -> u64 {
        (0..u64::from(size.min(8))).fold(0, |acc, i| {
            let byte = self.bytes.get(&addr.wrapping_add(i)).copied().unwrap_or(0);
            acc | (u64::from(byte) << (i * 8))
        })
    }

    fn store(&mut self, addr: u64, size: u8, data: u64) {
        let bytes = data.to_le_bytes();
        self.write_bytes(addr, &bytes[..usize::from(size.min(8))]);
    }

    fn faults(&self, addr: u64, size: u64) -> bool {
        let end = addr.saturating_add(size);
        self.config
            .fault_ranges
            .iter()
            .any(|&(start, stop)| addr < stop && start < end)
    }
}

impl MemoryPort for FlatMemory {
    fn fetch(&mut self, _thread: ThreadId, addr: u64, size: u64) -> MemResponse {
        MemResponse {
            latency: self.config.fetch_latency,
            fault: self.faults(addr, size).then_some(Fault::FetchAccess { addr }),
            data: 0,
        }
    }

    fn translate(&mut self, _thread: ThreadId, addr: u64, size: u8, kind: MemKind) -> Translation {
        let misaligned = self.config.fault_on_misaligned && size > 0 && addr % u64::from(size) != 0;
        let fault = if misaligned {
            Some(Fault::Misaligned { addr, size })
        } else if self.faults(addr, u64::from(size)) {
            Some(match kind {
                MemKind::Load => Fault::LoadAccess { addr },
                MemKind::Store => Fault::StoreAccess { addr },
            })
        } else {
            None
        };
        Translation {
            paddr: addr,
            latency: self.config.translation_latency,
            fault,
        }
    }

    fn read(&mut self, addr: u64, size: u8) -> MemResponse {
        MemResponse {
            latency: self.config.read_latency,
            fault: self
                .faults(addr, u64::from(size))
                .then_some(Fault::LoadAccess { addr }),
            data: self.load(addr, size),
        }
    }

    fn write(&mut self, addr: u64, size: u8, data: u64) -> MemResponse {
        self.store(addr, size, data);
        MemResponse {
            latency: self.config.write_latency,
            fault: None,
            data: 0,
        }
    }
}
