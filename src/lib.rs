//! SSA IR to register bytecode backend.
//!
//! An upstream translator builds a unit of functions through the IR builder
//! layer, which records for every SSA value the addresses of the instructions
//! that read it. The compiler then lowers each function block by block,
//! assigning every value a register with strict first-fit reuse and freeing
//! it as soon as its last dependent has been compiled.
//!
//! # Usage
//!
//! ```
//! use ssa_bytecode::ir::{InstructionBuilder, UnitBuilder};
//! use ssa_bytecode::bytecode::Instruction;
//!
//! let mut unit = UnitBuilder::new();
//! let main = unit.new_function("main")?;
//! let five = main.build_make_integer(5)?;
//! let i = main.get_or_add_local("i")?;
//! main.build_set_local(i, five)?;
//! let loaded = main.build_get_local(i)?;
//! main.build_return(loaded)?;
//!
//! let compiled = ssa_bytecode::compiler::compile(&unit)?;
//! let main = compiled.entry().unwrap();
//! assert_eq!(main.registers, 1);
//! assert_eq!(main.basic_blocks[0].instructions[0], Instruction::MakeInteger(1, 5));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - SSA values, blocks, functions and units under construction
//! - [`compiler`] - Block finder and per-block, per-function and per-unit compilers
//! - [`bytecode`] - Register-addressed output
//! - [`core`] - Errors, register allocation, liveness bookkeeping, statistics
//! - [`text_ir`] - Text format for tests and the `regtrace` tool

pub mod bytecode;
pub mod compiler;
pub mod core;
pub mod ir;
pub mod text_ir;

pub use crate::compiler::{compile, UnitCompiler};
pub use crate::core::{BuildError, CompileError, CompileStats};
pub use crate::ir::{InstructionBuilder, UnitBuilder};
