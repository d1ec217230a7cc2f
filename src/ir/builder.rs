//! IR construction.
//!
//! An upstream translator drives these operations in the order the resulting
//! code should execute. Every operation that reads a value appends its own
//! address to that value's dependency list at the moment the instruction is
//! emitted, so def/use edges are complete once construction finishes and no
//! separate analysis pass is needed.

use log::trace;

use super::{
    Address, AddressedInstruction, BlockRef, FunctionId, Instruction, LocalIndex, ValueRef,
    MAX_LOCALS,
};
use crate::core::error::{BuildError, BuildResult};

/// Def/use record for one SSA value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    /// Addresses of the instructions that read this value, in emission order.
    dependents: Vec<Address>,
}

impl Value {
    /// Addresses expected to read this value.
    pub fn dependents(&self) -> &[Address] {
        &self.dependents
    }

    /// Whether nothing will ever read this value.
    pub fn is_dead(&self) -> bool {
        self.dependents.is_empty()
    }

    fn used_by(&mut self, address: Address) {
        self.dependents.push(address);
    }
}

/// Named, ordered sequence of addressed instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlockBuilder {
    name: String,
    instructions: Vec<AddressedInstruction>,
}

impl BasicBlockBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[AddressedInstruction] {
        &self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Owns the blocks, locals and values of one function under construction.
///
/// A new function starts with a single current block named `entry`.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    id: FunctionId,
    name: String,
    /// Creation order is also compilation order.
    blocks: Vec<BasicBlockBuilder>,
    /// Index of the block new instructions are appended to.
    current: usize,
    /// Used like a set with fixed insertion order.
    locals: Vec<String>,
    /// Slot 0 is the null sentinel and never gains dependents.
    values: Vec<Value>,
    /// Generates monotonically increasing instruction addresses.
    instruction_counter: Address,
}

impl FunctionBuilder {
    pub fn new(id: FunctionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            blocks: vec![BasicBlockBuilder::new("entry")],
            current: 0,
            locals: Vec::new(),
            values: vec![Value::default()],
            instruction_counter: 0,
        }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ---- basic blocks ----

    /// Blocks in creation order.
    pub fn basic_blocks(&self) -> &[BasicBlockBuilder] {
        &self.blocks
    }

    /// Handles for every block, in creation order.
    pub fn block_refs(&self) -> impl Iterator<Item = BlockRef> + '_ {
        (0..self.blocks.len()).map(|index| self.block_ref(index))
    }

    pub fn block(&self, block: BlockRef) -> BuildResult<&BasicBlockBuilder> {
        let index = self.resolve_block(block)?;
        Ok(&self.blocks[index])
    }

    pub fn entry_block(&self) -> BlockRef {
        self.block_ref(0)
    }

    pub fn current_block(&self) -> BlockRef {
        self.block_ref(self.current)
    }

    /// Append an anonymous block and make it current.
    pub fn new_block(&mut self) -> BlockRef {
        let name = format!("anonymous.{}", self.blocks.len());
        self.new_named_block(name)
    }

    /// Append a named block and make it current.
    pub fn new_named_block(&mut self, name: impl Into<String>) -> BlockRef {
        let index = self.blocks.len();
        self.blocks.push(BasicBlockBuilder::new(name));
        self.current = index;
        self.block_ref(index)
    }

    /// Append an anonymous block, optionally branching to it from the
    /// current block first, and make it current.
    pub fn push_block(&mut self, build_branch: bool) -> BuildResult<BlockRef> {
        let index = self.blocks.len();
        let block = self.block_ref(index);
        self.blocks
            .push(BasicBlockBuilder::new(format!("anonymous.{index}")));
        if build_branch {
            self.build_branch(block)?;
        }
        self.current = index;
        Ok(block)
    }

    /// Move the insertion point to an existing block of this function.
    pub fn set_current_block(&mut self, block: BlockRef) -> BuildResult<()> {
        self.current = self.resolve_block(block)?;
        Ok(())
    }

    /// Build into a specific block without moving the insertion point.
    pub fn at(&mut self, block: BlockRef) -> BuildResult<BlockCursor<'_>> {
        let index = self.resolve_block(block)?;
        Ok(BlockCursor {
            function: self,
            index,
        })
    }

    fn block_ref(&self, index: usize) -> BlockRef {
        BlockRef::new(self.id, index as u32)
    }

    fn resolve_block(&self, block: BlockRef) -> BuildResult<usize> {
        let index = block.index() as usize;
        if block.function() != self.id || index >= self.blocks.len() {
            return Err(BuildError::UnknownBlock {
                block,
                function: self.id,
            });
        }
        Ok(index)
    }

    // ---- locals ----

    pub fn locals(&self) -> &[String] {
        &self.locals
    }

    /// The first request for a name allocates its slot; later requests
    /// return the same slot.
    ///
    /// At most [`MAX_LOCALS`] names fit, so the table size is itself a
    /// `LocalIndex`.
    pub fn get_or_add_local(&mut self, name: &str) -> BuildResult<LocalIndex> {
        if let Some(index) = self.find_local(name) {
            return Ok(index);
        }
        if self.locals.len() >= MAX_LOCALS {
            return Err(BuildError::TooManyLocals {
                name: name.to_string(),
            });
        }
        let index = self.locals.len() as LocalIndex;
        self.locals.push(name.to_string());
        Ok(index)
    }

    pub fn get_local(&self, name: &str) -> BuildResult<LocalIndex> {
        self.find_local(name).ok_or_else(|| BuildError::LocalNotFound {
            name: name.to_string(),
        })
    }

    pub fn have_local(&self, name: &str) -> bool {
        self.find_local(name).is_some()
    }

    fn find_local(&self, name: &str) -> Option<LocalIndex> {
        // Insertion is capped at the LocalIndex range, so positions always fit.
        self.locals
            .iter()
            .position(|existing| existing == name)
            .map(|index| index as LocalIndex)
    }

    // ---- values ----

    pub fn null_value(&self) -> ValueRef {
        ValueRef::NULL
    }

    pub fn new_value(&mut self) -> ValueRef {
        let value = ValueRef::new(self.id, self.values.len() as u32);
        self.values.push(Value::default());
        value
    }

    /// Def/use record for `value`. The null sentinel resolves to an empty record.
    /// Values minted by another function resolve to nothing.
    pub fn value(&self, value: ValueRef) -> Option<&Value> {
        if !self.owns(value) {
            return None;
        }
        self.values.get(value.index())
    }

    /// Every non-sentinel value with its record, in creation order.
    pub fn values(&self) -> impl Iterator<Item = (ValueRef, &Value)> + '_ {
        self.values
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, value)| (ValueRef::new(self.id, id as u32), value))
    }

    fn owns(&self, value: ValueRef) -> bool {
        value.is_null() || value.function() == self.id
    }

    /// Record that the instruction at `address` reads `value`.
    pub fn used_by(&mut self, value: ValueRef, address: Address) -> BuildResult<()> {
        if value.is_null() {
            return Err(BuildError::NullValueUse { address });
        }
        if !self.owns(value) {
            return Err(BuildError::UnknownValue { value });
        }
        self.values
            .get_mut(value.index())
            .ok_or(BuildError::UnknownValue { value })?
            .used_by(address);
        Ok(())
    }

    pub fn next_address(&mut self) -> Address {
        let address = self.instruction_counter;
        self.instruction_counter += 1;
        address
    }

    /// Number of addresses handed out so far.
    pub fn instruction_count(&self) -> Address {
        self.instruction_counter
    }

    fn emit(&mut self, block_index: usize, instruction: Instruction) -> BuildResult<Address> {
        let operands = instruction.operands();
        let referenced = instruction.result().into_iter().chain(operands.iter().copied());
        for value in referenced {
            if self.value(value).is_none() {
                return Err(BuildError::UnknownValue { value });
            }
        }

        let address = self.next_address();
        trace!(
            "{}: {:04} {} <- {}",
            self.name,
            address,
            self.blocks[block_index].name,
            instruction
        );
        self.blocks[block_index]
            .instructions
            .push(AddressedInstruction {
                address,
                instruction,
            });

        // The null sentinel is exempt from dependency tracking.
        for operand in operands.into_iter().filter(|operand| !operand.is_null()) {
            self.used_by(operand, address)?;
        }
        Ok(address)
    }
}

/// Per-opcode build operations.
///
/// Defining operations mint a fresh value and return it; reading operations
/// record their address on each operand as they are emitted.
pub trait InstructionBuilder {
    /// Mint a fresh value in the owning function.
    fn new_value(&mut self) -> ValueRef;

    /// Append an instruction at the next address and track its operands.
    fn push(&mut self, instruction: Instruction) -> BuildResult<Address>;

    fn build_get_local(&mut self, index: LocalIndex) -> BuildResult<ValueRef> {
        let lval = self.new_value();
        self.push(Instruction::GetLocal(lval, index))?;
        Ok(lval)
    }

    fn build_get_local_lexical(&mut self, name: &str) -> BuildResult<ValueRef> {
        let lval = self.new_value();
        self.push(Instruction::GetLocalLexical(lval, name.to_string()))?;
        Ok(lval)
    }

    fn build_set_local(&mut self, index: LocalIndex, rval: ValueRef) -> BuildResult<()> {
        self.push(Instruction::SetLocal(index, rval))?;
        Ok(())
    }

    fn build_set_local_lexical(&mut self, name: &str, rval: ValueRef) -> BuildResult<()> {
        self.push(Instruction::SetLocalLexical(name.to_string(), rval))?;
        Ok(())
    }

    fn build_make_function(&mut self, function: FunctionId) -> BuildResult<ValueRef> {
        let lval = self.new_value();
        self.push(Instruction::MakeFunction(lval, function))?;
        Ok(lval)
    }

    fn build_make_integer(&mut self, value: i64) -> BuildResult<ValueRef> {
        let lval = self.new_value();
        self.push(Instruction::MakeInteger(lval, value))?;
        Ok(lval)
    }

    fn build_op_add(&mut self, lhs: ValueRef, rhs: ValueRef) -> BuildResult<ValueRef> {
        let lval = self.new_value();
        self.push(Instruction::OpAdd(lval, lhs, rhs))?;
        Ok(lval)
    }

    fn build_op_less_than(&mut self, lhs: ValueRef, rhs: ValueRef) -> BuildResult<ValueRef> {
        let lval = self.new_value();
        self.push(Instruction::OpLessThan(lval, lhs, rhs))?;
        Ok(lval)
    }

    fn build_branch(&mut self, destination: BlockRef) -> BuildResult<()> {
        self.push(Instruction::Branch(destination))?;
        Ok(())
    }

    fn build_branch_if(&mut self, destination: BlockRef, condition: ValueRef) -> BuildResult<()> {
        self.push(Instruction::BranchIf(destination, condition))?;
        Ok(())
    }

    fn build_call(&mut self, target: ValueRef, arguments: &[ValueRef]) -> BuildResult<ValueRef> {
        let lval = self.new_value();
        self.push(Instruction::Call(lval, target, arguments.to_vec()))?;
        Ok(lval)
    }

    fn build_return(&mut self, rval: ValueRef) -> BuildResult<()> {
        self.push(Instruction::Return(rval))?;
        Ok(())
    }

    fn build_return_null(&mut self) -> BuildResult<()> {
        self.push(Instruction::ReturnNull)?;
        Ok(())
    }
}

/// Builds into the function's current block.
impl InstructionBuilder for FunctionBuilder {
    fn new_value(&mut self) -> ValueRef {
        FunctionBuilder::new_value(self)
    }

    fn push(&mut self, instruction: Instruction) -> BuildResult<Address> {
        self.emit(self.current, instruction)
    }
}

/// Builds into one fixed block of a function.
///
/// Addresses still come from the function's shared counter.
pub struct BlockCursor<'f> {
    function: &'f mut FunctionBuilder,
    index: usize,
}

impl BlockCursor<'_> {
    pub fn block(&self) -> BlockRef {
        self.function.block_ref(self.index)
    }
}

impl InstructionBuilder for BlockCursor<'_> {
    fn new_value(&mut self) -> ValueRef {
        self.function.new_value()
    }

    fn push(&mut self, instruction: Instruction) -> BuildResult<Address> {
        self.function.emit(self.index, instruction)
    }
}

/// Ordered functions of one compilation unit. Index 0 is the entry function.
#[derive(Debug, Clone, Default)]
pub struct UnitBuilder {
    functions: Vec<FunctionBuilder>,
}

impl UnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_function(&mut self, name: &str) -> BuildResult<&mut FunctionBuilder> {
        let id = u16::try_from(self.functions.len()).map_err(|_| BuildError::TooManyFunctions {
            name: name.to_string(),
        })?;
        self.functions.push(FunctionBuilder::new(FunctionId(id), name));
        Ok(&mut self.functions[id as usize])
    }

    /// Add a function named after its enclosing function, e.g. `main.3`.
    pub fn new_anonymous_function(
        &mut self,
        enclosing: FunctionId,
    ) -> BuildResult<&mut FunctionBuilder> {
        let enclosing_name = self
            .function(enclosing)
            .map(|function| function.name().to_string())
            .ok_or_else(|| BuildError::FunctionNotFound {
                name: enclosing.to_string(),
            })?;
        let name = format!("{}.{}", enclosing_name, self.functions.len());
        self.new_function(&name)
    }

    pub fn functions(&self) -> &[FunctionBuilder] {
        &self.functions
    }

    pub fn function(&self, id: FunctionId) -> Option<&FunctionBuilder> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut FunctionBuilder> {
        self.functions.get_mut(id.0 as usize)
    }

    /// Look up the first function with the given name.
    pub fn function_id(&self, name: &str) -> BuildResult<FunctionId> {
        self.functions
            .iter()
            .find(|function| function.name() == name)
            .map(FunctionBuilder::id)
            .ok_or_else(|| BuildError::FunctionNotFound {
                name: name.to_string(),
            })
    }

    pub fn entry(&self) -> Option<&FunctionBuilder> {
        self.functions.first()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
