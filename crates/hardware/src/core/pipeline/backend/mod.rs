//! Backend pipeline stage.
//!
//! The backend is a single Execute stage that issues to the functional unit pool, runs
//! memory instructions through the LSQ and commits in program order per thread.

pub mod execute;

pub use execute::{Execute, ExecuteIo, InFlight};
