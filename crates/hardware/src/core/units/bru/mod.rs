//! Branch prediction unit (BRU) implementations.
//!
//! This module contains the branch predictor interface consulted by Fetch1 and Execute, plus
//! two reference predictors: static not-taken and a branch target buffer (BTB).

pub use self::branch_predictor::BranchPredictor;
pub use self::btb::BtbPredictor;
pub use self::static_bp::StaticPredictor;

/// Branch predictor trait.
pub mod branch_predictor;

/// Branch Target Buffer and the BTB predictor.
pub mod btb;

/// Static branch predictor (always not-taken).
pub mod static_bp;

use crate::common::ThreadId;
use crate::config::{BranchPredictorKind, Config};
use crate::core::inst::BranchOutcome;

/// Enum wrapper for static dispatch of Branch Predictors.
/// This avoids vtable lookups in the fetch loop.
#[derive(Debug, Clone)]
pub enum BranchPredictorWrapper {
    /// Always not taken.
    Static(StaticPredictor),
    /// Last-taken-target BTB.
    Btb(BtbPredictor),
}

impl BranchPredictorWrapper {
    /// Creates the predictor selected by the configuration.
    pub fn new(config: &Config) -> Self {
        match config.branch_predictor {
            BranchPredictorKind::Static => Self::Static(StaticPredictor::new()),
            BranchPredictorKind::Btb => Self::Btb(BtbPredictor::new(config.btb_size)),
        }
    }
}

impl BranchPredictor for BranchPredictorWrapper {
    #[inline(always)]
    fn predict(&self, thread: ThreadId, pc: u64) -> Option<u64> {
        match self {
            Self::Static(bp) => bp.predict(thread, pc),
            Self::Btb(bp) => bp.predict(thread, pc),
        }
    }

    #[inline(always)]
    fn resolve(&mut self, thread: ThreadId, pc: u64, outcome: &BranchOutcome, mispredicted: bool) {
        match self {
            Self::Static(bp) => bp.resolve(thread, pc, outcome, mispredicted),
            Self::Btb(bp) => bp.resolve(thread, pc, outcome, mispredicted),
        }
    }
}
