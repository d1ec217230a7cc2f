// This module lowers a finished UnitBuilder into a bytecode Unit in one deterministic pass.
// UnitCompiler maps every FunctionBuilder, in builder order, through a fresh FunctionCompiler.
// FunctionCompiler creates the per-function BasicBlockFinder and RegisterAllocator, compiles
// each basic block in creation order (not control-flow order), and records the number of
// register slots the allocator ever created. BasicBlockCompiler translates each addressed IR
// instruction by allocating its result register first and then replaying operand uses left
// to right. Liveness is derived from the single per-function address space and ignores
// branch edges, so results are only guaranteed for functions whose blocks behave like
// straight-line code. Any internal error aborts the whole unit.

//! Compiler from SSA IR to register bytecode.
//!
//! Typical flow:
//! ```text
//! for each function {
//!     finder = BasicBlockFinder::new(function);
//!     allocator = RegisterAllocator::new();
//!     for each block in creation order {
//!         for (address, inst) in block {
//!             allocate result; use operands left to right;
//!         }
//!     }
//!     registers = allocator.registers_required();
//! }
//! ```

pub mod basic_block;
pub mod block_finder;

pub use basic_block::BasicBlockCompiler;
pub use block_finder::BasicBlockFinder;

use log::debug;

use crate::bytecode;
use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::RegisterAllocator;
use crate::core::stats::CompileStats;
use crate::ir::{FunctionBuilder, UnitBuilder};

/// Compiles one function with its own allocator and block finder.
pub struct FunctionCompiler<'a> {
    function: &'a FunctionBuilder,
}

impl<'a> FunctionCompiler<'a> {
    pub fn new(function: &'a FunctionBuilder) -> Self {
        Self { function }
    }

    pub fn compile(&self, stats: &mut CompileStats) -> CompileResult<bytecode::Function> {
        self.compile_inner(stats)
            .map_err(|err| err.in_function(self.function.name()))
    }

    fn compile_inner(&self, stats: &mut CompileStats) -> CompileResult<bytecode::Function> {
        let function = self.function;
        let finder = BasicBlockFinder::new(function)?;
        let mut allocator = RegisterAllocator::new();

        let mut basic_blocks = Vec::with_capacity(function.basic_blocks().len());
        for (block, basic_block) in function.block_refs().zip(function.basic_blocks()) {
            let id = finder.find(block)?;
            let compiled =
                BasicBlockCompiler::new(function, basic_block, &finder, &mut allocator, stats)
                    .compile(id)?;
            basic_blocks.push(compiled);
        }

        let locals = u8::try_from(function.locals().len()).map_err(|_| {
            CompileError::TooManyLocals {
                count: function.locals().len(),
            }
        })?;
        let registers = allocator.registers_required();

        debug!(
            "compiled function {} ({}): {} blocks, {} registers, {} locals",
            function.name(),
            function.id(),
            basic_blocks.len(),
            registers,
            locals
        );
        stats.record_function_compiled(function.name(), registers, allocator.stats());

        Ok(bytecode::Function {
            id: function.id().0,
            name: function.name().to_string(),
            registers,
            basic_blocks,
            locals,
            locals_names: function.locals().to_vec(),
        })
    }
}

/// Compiles every function of a unit, all or nothing.
pub struct UnitCompiler<'a> {
    unit: &'a UnitBuilder,
    repl: bool,
}

impl<'a> UnitCompiler<'a> {
    pub fn new(unit: &'a UnitBuilder) -> Self {
        Self { unit, repl: false }
    }

    /// Set the flag carried on the compiled unit. The compiler never reads it.
    pub fn with_repl(mut self, repl: bool) -> Self {
        self.repl = repl;
        self
    }

    pub fn compile(&self) -> CompileResult<bytecode::Unit> {
        self.compile_with_stats().map(|(unit, _)| unit)
    }

    pub fn compile_with_stats(&self) -> CompileResult<(bytecode::Unit, CompileStats)> {
        let mut stats = CompileStats::new();
        let functions = self
            .unit
            .functions()
            .iter()
            .map(|function| FunctionCompiler::new(function).compile(&mut stats))
            .collect::<CompileResult<Vec<_>>>()?;

        debug!(
            "compiled unit: {} functions, {} instructions",
            stats.functions_compiled, stats.instructions_compiled
        );

        Ok((
            bytecode::Unit {
                repl: self.repl,
                functions,
            },
            stats,
        ))
    }
}

/// Compile a unit with default settings.
pub fn compile(unit: &UnitBuilder) -> CompileResult<bytecode::Unit> {
    UnitCompiler::new(unit).compile()
}
