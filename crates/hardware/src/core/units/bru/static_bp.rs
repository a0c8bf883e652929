//! Static Branch Predictor.
//!
//! Implements an "Always Not Taken" policy: fetch always continues sequentially and every
//! taken control instruction is discovered at commit.

use super::BranchPredictor;
use crate::common::ThreadId;
use crate::core::inst::BranchOutcome;

/// Static Branch Predictor structure.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticPredictor;

impl StaticPredictor {
    /// Creates a new Static Predictor.
    pub const fn new() -> Self {
        Self
    }
}

impl BranchPredictor for StaticPredictor {
    fn predict(&self, _thread: ThreadId, _pc: u64) -> Option<u64> {
        None
    }

    fn resolve(&mut self, _thread: ThreadId, _pc: u64, _outcome: &BranchOutcome, _mispredicted: bool) {}
}
