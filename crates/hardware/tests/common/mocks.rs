use std::sync::{Arc, Mutex};

use cva6_core::common::{Fault, ThreadId};
use cva6_core::core::inst::BranchOutcome;
use cva6_core::core::units::bru::BranchPredictor;
use cva6_core::soc::{TrapAction, TrapHandler};
use mockall::mock;

mock! {
    pub Predictor {}

    impl BranchPredictor for Predictor {
        fn predict(&self, thread: ThreadId, pc: u64) -> Option<u64>;
        fn resolve(&mut self, thread: ThreadId, pc: u64, outcome: &BranchOutcome, mispredicted: bool);
    }
}

/// A fault seen by [`RecordingTraps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapEvent {
    pub thread: ThreadId,
    pub pc: u64,
    pub fault: Fault,
}

/// Trap handler that records every fault and redirects to `vector` until `halt_after` faults
/// have been seen, then halts.
#[derive(Clone)]
pub struct RecordingTraps {
    pub events: Arc<Mutex<Vec<TrapEvent>>>,
    vector: u64,
    halt_after: usize,
}

impl RecordingTraps {
    pub fn new(vector: u64, halt_after: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            vector,
            halt_after,
        }
    }

    pub fn events(&self) -> Vec<TrapEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TrapHandler for RecordingTraps {
    fn handle(&mut self, thread: ThreadId, pc: u64, fault: &Fault) -> TrapAction {
        let mut events = self.events.lock().unwrap();
        events.push(TrapEvent {
            thread,
            pc,
            fault: *fault,
        });
        if events.len() >= self.halt_after {
            TrapAction::Halt
        } else {
            TrapAction::Redirect(self.vector)
        }
    }
}
