//! Text IR format for writing backend tests and traces.
//!
//! The parser acts as an upstream translator: it calls the builder
//! operations line by line, in the order the code should execute, so the
//! recorded def/use edges are exactly what a real front end would produce.
//!
//! # Format
//!
//! ```text
//! ; Comments start with semicolon
//! fn main {
//! entry:
//!     %x = int 5
//!     setlocal i, %x
//!     %y = getlocal i
//!     ret %y
//! }
//! ```
//!
//! Operations: `int N`, `getlocal NAME`, `setlocal NAME, %v`,
//! `getlexical NAME`, `setlexical NAME, %v`, `function NAME`,
//! `add %a, %b`, `lt %a, %b`, `call %f(%a, ...)`, `br ^label`,
//! `brif %c, ^label`, `ret %v` and `ret`. `null` names the null sentinel.
//! Defining operations without a `%name =` prefix produce a discarded value.

use thiserror::Error;

use crate::core::error::BuildError;
use crate::ir::UnitBuilder;

pub mod parser;

pub use parser::parse_unit;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: {source}")]
    Build {
        line: usize,
        #[source]
        source: BuildError,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. } | ParseError::Build { line, .. } => *line,
        }
    }
}

/// Render the IR of a unit with addresses and per-value dependents.
pub fn print(unit: &UnitBuilder) -> String {
    let mut output = String::new();
    for function in unit.functions() {
        output.push_str(&format!("fn {} {{\n", function.name()));
        if !function.locals().is_empty() {
            output.push_str(&format!("  locals {}\n", function.locals().join(", ")));
        }
        for basic_block in function.basic_blocks() {
            output.push_str(&format!("{}:\n", basic_block.name()));
            for addressed in basic_block.instructions() {
                output.push_str(&format!("  {addressed}\n"));
            }
        }
        for (value, record) in function.values() {
            let dependents = record
                .dependents()
                .iter()
                .map(|address| format!("{address:04}"))
                .collect::<Vec<_>>()
                .join(" ");
            if dependents.is_empty() {
                output.push_str(&format!("  ; {value} unused\n"));
            } else {
                output.push_str(&format!("  ; {value} -> {dependents}\n"));
            }
        }
        output.push_str("}\n");
    }
    output
}
