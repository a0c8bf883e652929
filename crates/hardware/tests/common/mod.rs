//! Shared helpers for the pipeline tests.

/// Workload and configuration builders.
pub mod builder;


/// Mock collaborators.
pub mod mocks;
