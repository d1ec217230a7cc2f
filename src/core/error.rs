// This module defines the error types for the bytecode backend using the thiserror crate.
// BuildError covers failures while an upstream translator drives the IR builder: unknown
// local names, reads of the null sentinel, references to values or blocks that the current
// function never minted, and overflow of the small index spaces (locals, functions).
// CompileError covers the internal-compiler-error conditions raised while the compiler
// replays the recorded def/use information: double allocation of an SSA value, a use at an
// address the builder never recorded, a use of a value with no live register, exhaustion
// of the u8 register space, and branch targets that belong to another function. Every
// CompileError is fatal for the whole unit; FunctionCompiler wraps failures with the name
// of the function being compiled. BuildResult<T> and CompileResult<T> are convenience
// aliases used throughout the crate.

//! Error types for the IR builder and the bytecode compiler.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

use crate::ir::{Address, BlockRef, FunctionId, ValueRef};

/// Errors raised while constructing IR.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("local not found: {name}")]
    LocalNotFound { name: String },

    #[error("null value cannot be used (at address {address:04})")]
    NullValueUse { address: Address },

    #[error("value {value} was not created by this function")]
    UnknownValue { value: ValueRef },

    #[error("block {block} does not belong to function {function}")]
    UnknownBlock { block: BlockRef, function: FunctionId },

    #[error("too many locals: cannot add {name}")]
    TooManyLocals { name: String },

    #[error("too many functions: cannot add {name}")]
    TooManyFunctions { name: String },

    #[error("function not found: {name}")]
    FunctionNotFound { name: String },
}

/// Internal compiler errors raised while lowering IR into bytecode.
///
/// These signal a desync between what the builder recorded and what the
/// compiler replays. None of them is recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("value already allocated: {value}")]
    ValueAlreadyAllocated { value: ValueRef },

    #[error("dependent not found: {value} is not used at {address:04}")]
    DependencyNotFound { value: ValueRef, address: Address },

    #[error("value not live: {value}")]
    ValueNotLive { value: ValueRef },

    #[error("register not found: {value}")]
    RegisterNotFound { value: ValueRef },

    #[error("value {value} is unknown to the function being compiled")]
    UnknownValue { value: ValueRef },

    #[error("register file exhausted while allocating {value}")]
    RegisterFileExhausted { value: ValueRef },

    #[error("basic block not found: {block} (compiling function {function})")]
    BlockNotFound { block: BlockRef, function: FunctionId },

    #[error("too many basic blocks: {count}")]
    TooManyBlocks { count: usize },

    #[error("too many locals: {count}")]
    TooManyLocals { count: usize },

    #[error("in function {function}: {source}")]
    InFunction {
        function: String,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// Attach the name of the function that was being compiled.
    pub fn in_function(self, function: &str) -> Self {
        CompileError::InFunction {
            function: function.to_string(),
            source: Box::new(self),
        }
    }

    /// Strip any function context and return the underlying failure.
    pub fn root_cause(&self) -> &CompileError {
        match self {
            CompileError::InFunction { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for builder operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_value_message() {
        let err = BuildError::NullValueUse { address: 7 };
        assert_eq!(err.to_string(), "null value cannot be used (at address 0007)");
    }

    #[test]
    fn test_root_cause_unwraps_function_context() {
        let err = CompileError::ValueNotLive { value: ValueRef::from_raw(3) }
            .in_function("outer")
            .in_function("outermost");
        assert_eq!(
            err.root_cause(),
            &CompileError::ValueNotLive { value: ValueRef::from_raw(3) }
        );
        assert!(err.to_string().starts_with("in function outermost: in function outer:"));
    }
}
