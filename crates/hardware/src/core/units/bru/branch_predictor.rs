//! Branch Predictor Interface.
//!
//! This module defines the `BranchPredictor` trait the pipeline consults. Fetch1 asks for a
//! predicted-taken target for every instruction slot of a fetched line, and Execute reports the
//! resolved outcome of control instructions back at commit.

use crate::common::ThreadId;
use crate::core::inst::BranchOutcome;

/// Trait for branch prediction collaborators.
///
/// The pipeline owns only the redirect-on-misprediction protocol; how predictions are made is up
/// to the implementation.
pub trait BranchPredictor {
    /// Predicts whether the instruction at `pc` redirects fetch.
    ///
    /// # Arguments
    ///
    /// * `thread` - Thread fetching the instruction
    /// * `pc` - Address of the instruction slot
    ///
    /// # Returns
    ///
    /// `Some(target)` if control is predicted to transfer to `target`, `None` to continue
    /// sequentially.
    fn predict(&self, thread: ThreadId, pc: u64) -> Option<u64>;

    /// Trains the predictor with a resolved outcome.
    ///
    /// Called for every committed control instruction and for every instruction whose
    /// prediction turned out wrong.
    ///
    /// # Arguments
    ///
    /// * `thread` - Thread that executed the instruction
    /// * `pc` - Address of the instruction
    /// * `outcome` - Architecturally correct control flow (not taken for non-control instructions)
    /// * `mispredicted` - Whether the fetched path diverged from `outcome`
    fn resolve(&mut self, thread: ThreadId, pc: u64, outcome: &BranchOutcome, mispredicted: bool);
}
