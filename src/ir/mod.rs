// This module defines the SSA intermediate representation consumed by the bytecode compiler.
// Values, basic blocks and functions are arena-indexed: a ValueRef is an index into its
// function's value table (index 0 is the shared null sentinel), a BlockRef names a block by
// its owning function and creation position, and a FunctionId is a function's position in
// its unit. Instruction is the closed set of IR opcodes; each defining opcode carries the
// ValueRef it defines and each reading opcode carries the ValueRefs it reads. Addresses are
// minted per function in emission order and are the sole basis for the compiler's liveness
// bookkeeping. The builder submodule provides the operations an upstream translator uses to
// construct this IR while recording every def/use edge in the same forward pass.

//! SSA intermediate representation.
//!
//! Instructions are recorded as `(address, instruction)` pairs in basic blocks.
//! Addresses increase strictly across a whole function, regardless of which
//! block an instruction lands in.

use std::fmt;

pub mod builder;

pub use builder::{
    BasicBlockBuilder, BlockCursor, FunctionBuilder, InstructionBuilder, UnitBuilder, Value,
};

/// Monotonic per-function instruction address.
pub type Address = u32;

/// Index into a function's local-variable table.
pub type LocalIndex = u8;

/// Largest local-variable table a function may hold; its size fits a `LocalIndex`.
pub const MAX_LOCALS: usize = LocalIndex::MAX as usize;

/// Handle to an SSA value, tagged with the function that minted it.
///
/// Identity 0 is the null sentinel: it stands for "no value", is exempt
/// from dependency tracking and is accepted by every function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueRef {
    function: FunctionId,
    id: u32,
}

impl ValueRef {
    /// The shared "no value" sentinel.
    pub const NULL: ValueRef = ValueRef::new(FunctionId(0), 0);

    pub const fn new(function: FunctionId, id: u32) -> Self {
        Self { function, id }
    }

    /// Handle to value `id` of the entry function.
    pub const fn from_raw(id: u32) -> Self {
        Self::new(FunctionId(0), id)
    }

    /// The function that minted this value.
    pub const fn function(self) -> FunctionId {
        self.function
    }

    pub const fn id(self) -> u32 {
        self.id
    }

    pub const fn is_null(self) -> bool {
        self.id == 0
    }

    pub(crate) fn index(self) -> usize {
        self.id as usize
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.id)
    }
}

/// Position of a function within its unit. Index 0 is the entry function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u16);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a basic block: the owning function plus the block's creation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    function: FunctionId,
    index: u32,
}

impl BlockRef {
    pub(crate) const fn new(function: FunctionId, index: u32) -> Self {
        Self { function, index }
    }

    /// Function that owns this block.
    pub const fn function(self) -> FunctionId {
        self.function
    }

    /// Creation position of this block within its function.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}.{}", self.function.0, self.index)
    }
}

/// IR opcodes.
///
/// Result values come first, followed by the values read, mirroring the
/// `$1 = Op($2, $3)` notation used in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    GetLocal(ValueRef, LocalIndex),
    GetLocalLexical(ValueRef, String),
    SetLocal(LocalIndex, ValueRef),
    SetLocalLexical(String, ValueRef),
    MakeFunction(ValueRef, FunctionId),
    MakeInteger(ValueRef, i64),
    OpAdd(ValueRef, ValueRef, ValueRef),      // $1 = $2 + $3
    OpLessThan(ValueRef, ValueRef, ValueRef), // $1 = $2 < $3
    Branch(BlockRef),
    BranchIf(BlockRef, ValueRef),
    Call(ValueRef, ValueRef, Vec<ValueRef>), // $1 = $2($3[])
    Return(ValueRef),
    ReturnNull,
}

impl Instruction {
    /// Short opcode name, used for statistics and logging.
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::GetLocal(..) => "GetLocal",
            Instruction::GetLocalLexical(..) => "GetLocalLexical",
            Instruction::SetLocal(..) => "SetLocal",
            Instruction::SetLocalLexical(..) => "SetLocalLexical",
            Instruction::MakeFunction(..) => "MakeFunction",
            Instruction::MakeInteger(..) => "MakeInteger",
            Instruction::OpAdd(..) => "OpAdd",
            Instruction::OpLessThan(..) => "OpLessThan",
            Instruction::Branch(..) => "Branch",
            Instruction::BranchIf(..) => "BranchIf",
            Instruction::Call(..) => "Call",
            Instruction::Return(..) => "Return",
            Instruction::ReturnNull => "ReturnNull",
        }
    }

    /// The value this instruction defines, if any.
    pub fn result(&self) -> Option<ValueRef> {
        match self {
            Instruction::GetLocal(lval, _)
            | Instruction::GetLocalLexical(lval, _)
            | Instruction::MakeFunction(lval, _)
            | Instruction::MakeInteger(lval, _)
            | Instruction::OpAdd(lval, _, _)
            | Instruction::OpLessThan(lval, _, _)
            | Instruction::Call(lval, _, _) => Some(*lval),
            _ => None,
        }
    }

    /// Values read by this instruction, in the order the compiler uses them.
    ///
    /// A value read twice appears twice.
    pub fn operands(&self) -> Vec<ValueRef> {
        match self {
            Instruction::SetLocal(_, rval)
            | Instruction::SetLocalLexical(_, rval)
            | Instruction::BranchIf(_, rval)
            | Instruction::Return(rval) => vec![*rval],
            Instruction::OpAdd(_, lhs, rhs) | Instruction::OpLessThan(_, lhs, rhs) => {
                vec![*lhs, *rhs]
            }
            Instruction::Call(_, target, arguments) => {
                let mut operands = Vec::with_capacity(arguments.len() + 1);
                operands.push(*target);
                operands.extend_from_slice(arguments);
                operands
            }
            Instruction::GetLocal(..)
            | Instruction::GetLocalLexical(..)
            | Instruction::MakeFunction(..)
            | Instruction::MakeInteger(..)
            | Instruction::Branch(..)
            | Instruction::ReturnNull => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::GetLocal(lval, index) => write!(f, "{lval} = GetLocal({index})"),
            Instruction::GetLocalLexical(lval, name) => {
                write!(f, "{lval} = GetLocalLexical({name})")
            }
            Instruction::SetLocal(index, rval) => write!(f, "SetLocal({index}, {rval})"),
            Instruction::SetLocalLexical(name, rval) => {
                write!(f, "SetLocalLexical({name}, {rval})")
            }
            Instruction::MakeFunction(lval, id) => write!(f, "{lval} = MakeFunction({id})"),
            Instruction::MakeInteger(lval, value) => write!(f, "{lval} = MakeInteger({value})"),
            Instruction::OpAdd(lval, lhs, rhs) => write!(f, "{lval} = OpAdd({lhs}, {rhs})"),
            Instruction::OpLessThan(lval, lhs, rhs) => {
                write!(f, "{lval} = OpLessThan({lhs}, {rhs})")
            }
            Instruction::Branch(destination) => write!(f, "Branch({destination})"),
            Instruction::BranchIf(destination, condition) => {
                write!(f, "BranchIf({destination}, {condition})")
            }
            Instruction::Call(lval, target, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{lval} = Call({target}, [{arguments}])")
            }
            Instruction::Return(rval) => write!(f, "Return({rval})"),
            Instruction::ReturnNull => write!(f, "ReturnNull"),
        }
    }
}

/// An instruction paired with the address it was emitted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedInstruction {
    pub address: Address,
    pub instruction: Instruction,
}

impl fmt::Display for AddressedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}: {}", self.address, self.instruction)
    }
}
