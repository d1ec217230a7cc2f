// This module is the hub for infrastructure shared by the builder and the compiler: error
// types for both layers, the first-fit register file and allocator, the remaining-dependency
// bookkeeping that decides when a register can be recycled, and the statistics collected
// over a unit compile.

//! Core infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - `BuildError` for IR construction, `CompileError` for internal compiler errors
//!
//! ## Register Allocation (`register_file`)
//! - Strict first-fit slot reuse, `r0` reserved as the null register
//! - No spilling; running out of `u8` registers is an error
//!
//! ## Liveness (`value_assignment`)
//! - Per-value remaining dependents, replayed in address order
//!
//! ## Statistics (`stats`)
//! - Per-unit counters and the largest register file

pub mod error;
pub mod register_file;
pub mod stats;
pub mod value_assignment;

pub use error::{BuildError, BuildResult, CompileError, CompileResult};

pub use register_file::{AllocatorStats, RegisterAllocator, RegisterFile, MAX_REGISTERS};

pub use stats::CompileStats;

pub use value_assignment::{ValueAssignment, ValueAssignmentManager};
