//! Lowering of one basic block.

use log::trace;

use super::block_finder::BasicBlockFinder;
use crate::bytecode::{self, BlockId, Reg};
use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::RegisterAllocator;
use crate::core::stats::CompileStats;
use crate::ir::{self, Address, BasicBlockBuilder, FunctionBuilder, ValueRef};

/// Translates a block's addressed IR instructions into bytecode.
///
/// Borrows the function-wide allocator and finder; the function compiler
/// visits blocks in creation order so addresses reach the allocator in
/// increasing order.
pub struct BasicBlockCompiler<'a> {
    function: &'a FunctionBuilder,
    basic_block: &'a BasicBlockBuilder,
    finder: &'a BasicBlockFinder,
    allocator: &'a mut RegisterAllocator,
    stats: &'a mut CompileStats,
}

impl<'a> BasicBlockCompiler<'a> {
    pub fn new(
        function: &'a FunctionBuilder,
        basic_block: &'a BasicBlockBuilder,
        finder: &'a BasicBlockFinder,
        allocator: &'a mut RegisterAllocator,
        stats: &'a mut CompileStats,
    ) -> Self {
        Self {
            function,
            basic_block,
            finder,
            allocator,
            stats,
        }
    }

    pub fn compile(mut self, id: BlockId) -> CompileResult<bytecode::BasicBlock> {
        let basic_block = self.basic_block;
        let mut instructions = Vec::with_capacity(basic_block.instructions().len());

        for addressed in basic_block.instructions() {
            let instruction = self.compile_instruction(addressed.address, &addressed.instruction)?;
            trace!(
                "{:04} {} => {}",
                addressed.address,
                addressed.instruction,
                instruction
            );
            self.stats
                .record_instruction_compiled(addressed.instruction.opcode());
            instructions.push(instruction);
        }

        Ok(bytecode::BasicBlock {
            id,
            name: basic_block.name().to_string(),
            instructions,
        })
    }

    /// Results are allocated before operands are used, and operands are used
    /// left to right.
    fn compile_instruction(
        &mut self,
        address: Address,
        instruction: &ir::Instruction,
    ) -> CompileResult<bytecode::Instruction> {
        use bytecode::Instruction as Bc;
        use ir::Instruction as Ir;

        let lowered = match instruction {
            Ir::GetLocal(lval, index) => Bc::GetLocal(self.allocate(*lval)?, *index),
            Ir::GetLocalLexical(lval, name) => {
                Bc::GetLocalLexical(self.allocate(*lval)?, name.clone())
            }
            Ir::SetLocal(index, rval) => Bc::SetLocal(*index, self.read(*rval, address)?),
            Ir::SetLocalLexical(name, rval) => {
                Bc::SetLocalLexical(name.clone(), self.read(*rval, address)?)
            }
            Ir::MakeFunction(lval, function) => Bc::MakeFunction(self.allocate(*lval)?, function.0),
            Ir::MakeInteger(lval, value) => Bc::MakeInteger(self.allocate(*lval)?, *value),
            Ir::OpAdd(lval, lhs, rhs) => {
                let lval = self.allocate(*lval)?;
                let lhs = self.read(*lhs, address)?;
                let rhs = self.read(*rhs, address)?;
                Bc::OpAdd(lval, lhs, rhs)
            }
            Ir::OpLessThan(lval, lhs, rhs) => {
                let lval = self.allocate(*lval)?;
                let lhs = self.read(*lhs, address)?;
                let rhs = self.read(*rhs, address)?;
                Bc::OpLessThan(lval, lhs, rhs)
            }
            Ir::Branch(destination) => Bc::Branch(self.finder.find(*destination)?),
            Ir::BranchIf(destination, condition) => {
                let destination = self.finder.find(*destination)?;
                Bc::BranchIf(destination, self.read(*condition, address)?)
            }
            Ir::Call(lval, target, arguments) => {
                let lval = self.allocate(*lval)?;
                let target = self.read(*target, address)?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.read(*argument, address))
                    .collect::<CompileResult<Vec<Reg>>>()?;
                Bc::Call(lval, target, arguments)
            }
            Ir::Return(rval) => Bc::Return(self.read(*rval, address)?),
            Ir::ReturnNull => Bc::ReturnNull,
        };
        Ok(lowered)
    }

    fn allocate(&mut self, lval: ValueRef) -> CompileResult<Reg> {
        let value = self
            .function
            .value(lval)
            .ok_or(CompileError::UnknownValue { value: lval })?;
        self.allocator.allocate(lval, value.dependents())
    }

    fn read(&mut self, rval: ValueRef, address: Address) -> CompileResult<Reg> {
        self.allocator.use_value(rval, address)
    }
}
