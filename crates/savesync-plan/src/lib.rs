//! SaveSync Plan - Sync plan resolution
//!
//! Provides:
//! - Per-file classification by checksum and modification time
//! - Deterministic tie-breaking for equal timestamps
//! - Explicit delete marker handling
//! - The proposed remote manifest for two-phase completion

pub mod classify;
pub mod resolver;

pub use classify::{break_tie, classify, Classification};
pub use resolver::PlanResolver;
