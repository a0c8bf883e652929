//! Serde-loadable workloads.
//!
//! A [`Program`] is a list of per-thread instruction streams. Thread `t`'s instructions are laid
//! out at 4-byte steps from its entry pc; decoding any other address raises
//! [`Fault::NoInstruction`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::{ConfigError, Fault, INST_BYTES, ThreadId};
use crate::core::inst::StaticInst;
use crate::soc::traits::InstSource;

/// Instructions of one hardware thread.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadProgram {
    /// Address of the first instruction.
    #[serde(default)]
    pub entry: u64,
    /// Instructions in address order.
    #[serde(default)]
    pub insts: Vec<StaticInst>,
}

impl ThreadProgram {
    /// A program starting at `entry`.
    pub const fn new(entry: u64, insts: Vec<StaticInst>) -> Self {
        Self { entry, insts }
    }

    /// Address just past the last instruction.
    pub fn end(&self) -> u64 {
        self.entry + INST_BYTES * self.insts.len() as u64
    }

    fn at(&self, pc: u64) -> Option<&StaticInst> {
        if pc < self.entry || (pc - self.entry) % INST_BYTES != 0 {
            return None;
        }
        self.insts.get(((pc - self.entry) / INST_BYTES) as usize)
    }
}

/// A multi-threaded workload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// One stream per hardware thread.
    pub threads: Vec<ThreadProgram>,
}

impl Program {
    /// A single-threaded workload.
    pub fn single(entry: u64, insts: Vec<StaticInst>) -> Self {
        Self {
            threads: vec![ThreadProgram::new(entry, insts)],
        }
    }

    /// Parses a workload from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] when the document does not parse.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a workload file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or [`ConfigError::Json`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

impl InstSource for Program {
    fn decode(&self, thread: ThreadId, pc: u64) -> Result<StaticInst, Fault> {
        self.threads
            .get(thread)
            .and_then(|t| t.at(pc))
            .cloned()
            .ok_or(Fault::NoInstruction { pc })
    }

    fn threads(&self) -> usize {
        self.threads.len()
    }

    fn entry(&self, thread: ThreadId) -> Option<u64> {
        self.threads.get(thread).map(|t| t.entry)
    }

    fn static_insts(&self, thread: ThreadId) -> Vec<(u64, StaticInst)> {
        self.threads.get(thread).map_or_else(Vec::new, |t| {
            t.insts
                .iter()
                .enumerate()
                .map(|(i, si)| (t.entry + INST_BYTES * i as u64, si.clone()))
                .collect()
        })
    }
}
