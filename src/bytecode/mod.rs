// This module defines the compiled output of the backend: a Unit of Functions, each holding
// BasicBlocks of register-addressed Instructions. The layout mirrors the IR builder layer
// but every value operand has been replaced by a register number and every branch target by
// the destination block's id (its position in emission order). Register 0 is the null
// register: it receives discarded results and stands in for the null sentinel. Only the
// logical instruction set and operand arities are defined here; byte-level encoding and
// the unit printer belong to downstream consumers. Instructions render in the
// `r1 = MakeInteger(5)` style for logs and the regtrace tool.

//! Register-addressed bytecode produced by the compiler.

use std::fmt;

use crate::ir::LocalIndex;

/// Register number. `r0` is the null register.
pub type Reg = u8;

/// The permanent, never-live null register.
pub const NULL_REGISTER: Reg = 0;

/// Position of a basic block within its function's emission order.
pub type BlockId = u16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    GetLocal(Reg, LocalIndex),
    GetLocalLexical(Reg, String),
    SetLocal(LocalIndex, Reg),
    SetLocalLexical(String, Reg),
    MakeFunction(Reg, u16),
    MakeInteger(Reg, i64),
    OpAdd(Reg, Reg, Reg),
    OpLessThan(Reg, Reg, Reg),
    Branch(BlockId),
    BranchIf(BlockId, Reg),
    Call(Reg, Reg, Vec<Reg>), // $1 = $2($3[])
    Return(Reg),
    ReturnNull,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::GetLocal(lval, index) => write!(f, "r{lval} = GetLocal({index})"),
            Instruction::GetLocalLexical(lval, name) => {
                write!(f, "r{lval} = GetLocalLexical({name})")
            }
            Instruction::SetLocal(index, rval) => write!(f, "SetLocal({index}, r{rval})"),
            Instruction::SetLocalLexical(name, rval) => {
                write!(f, "SetLocalLexical({name}, r{rval})")
            }
            Instruction::MakeFunction(lval, id) => write!(f, "r{lval} = MakeFunction({id})"),
            Instruction::MakeInteger(lval, value) => write!(f, "r{lval} = MakeInteger({value})"),
            Instruction::OpAdd(lval, lhs, rhs) => write!(f, "r{lval} = OpAdd(r{lhs}, r{rhs})"),
            Instruction::OpLessThan(lval, lhs, rhs) => {
                write!(f, "r{lval} = OpLessThan(r{lhs}, r{rhs})")
            }
            Instruction::Branch(destination) => write!(f, "Branch(@{destination})"),
            Instruction::BranchIf(destination, condition) => {
                write!(f, "BranchIf(@{destination}, r{condition})")
            }
            Instruction::Call(lval, target, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|argument| format!("r{argument}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "r{lval} = Call(r{target}, [{arguments}])")
            }
            Instruction::Return(rval) => write!(f, "Return(r{rval})"),
            Instruction::ReturnNull => write!(f, "ReturnNull"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub id: u16,
    pub name: String,
    /// Size of the register file, not counting the null register.
    pub registers: u8,
    pub basic_blocks: Vec<BasicBlock>,
    pub locals: u8,
    pub locals_names: Vec<String>,
}

impl Function {
    /// Instructions of every block, in emission order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.basic_blocks
            .iter()
            .flat_map(|basic_block| basic_block.instructions.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Owned by the caller (e.g. REPL compilation); never derived by the compiler.
    pub repl: bool,
    pub functions: Vec<Function>,
}

impl Unit {
    pub fn entry(&self) -> Option<&Function> {
        self.functions.first()
    }
}
