//! Execution resources.
//!
//! This module contains the functional unit pool Execute issues into and the branch
//! prediction unit consulted by Fetch1.

/// Branch Resolution Unit including the predictor interface and BTB.
pub mod bru;

/// Functional unit descriptions, timing rules and the runtime pool.
pub mod fu;
