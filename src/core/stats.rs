// This module tracks statistics about a compile of one unit. CompileStats counts functions
// and instructions lowered (with a per-opcode breakdown), how the register allocator spent
// its slots (fresh allocations, reuses of freed slots, discarded results sent to the null
// register, releases), and which function needed the largest register file. The compiler
// folds each function's AllocatorStats into the unit totals as it goes. The Display
// implementation renders a short report used by the regtrace tool.

//! Compilation statistics.

use std::collections::HashMap;
use std::fmt;

use super::register_file::AllocatorStats;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompileStats {
    /// Number of functions compiled.
    pub functions_compiled: usize,

    /// Number of IR instructions lowered.
    pub instructions_compiled: usize,

    /// Count of each opcode lowered.
    pub instruction_counts: HashMap<&'static str, usize>,

    /// Allocations that claimed a slot.
    pub registers_allocated: usize,

    /// Allocations that reused a freed slot.
    pub registers_reused: usize,

    /// Results nothing reads, mapped to the null register.
    pub discarded_results: usize,

    /// Slots released after their last use.
    pub registers_freed: usize,

    /// Largest register file of any function.
    pub largest_register_file: u8,

    /// Name of the function with the largest register file.
    pub largest_register_file_function: String,
}

impl CompileStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one lowered instruction.
    pub fn record_instruction_compiled(&mut self, opcode: &'static str) {
        self.instructions_compiled += 1;
        *self.instruction_counts.entry(opcode).or_insert(0) += 1;
    }

    /// Record a finished function and fold in its allocator counters.
    pub fn record_function_compiled(
        &mut self,
        name: &str,
        registers: u8,
        allocator: AllocatorStats,
    ) {
        self.functions_compiled += 1;
        self.registers_allocated += allocator.allocated;
        self.registers_reused += allocator.reused;
        self.discarded_results += allocator.discarded;
        self.registers_freed += allocator.freed;

        if self.largest_register_file_function.is_empty()
            || registers > self.largest_register_file
        {
            self.largest_register_file = registers;
            self.largest_register_file_function = name.to_string();
        }
    }
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Statistics:")?;
        writeln!(f, "  Functions compiled: {}", self.functions_compiled)?;
        writeln!(f, "  Instructions compiled: {}", self.instructions_compiled)?;
        writeln!(f, "  Registers allocated: {}", self.registers_allocated)?;
        writeln!(f, "  Registers reused: {}", self.registers_reused)?;
        writeln!(f, "  Registers freed: {}", self.registers_freed)?;
        writeln!(f, "  Discarded results: {}", self.discarded_results)?;

        if !self.largest_register_file_function.is_empty() {
            writeln!(
                f,
                "  Largest register file: {} ({} registers)",
                self.largest_register_file_function, self.largest_register_file
            )?;
        }

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|(a_op, a_count), (b_op, b_count)| {
                b_count.cmp(a_count).then_with(|| a_op.cmp(b_op))
            });

            for (opcode, count) in sorted {
                writeln!(f, "    {}: {}", opcode, count)?;
            }
        }

        Ok(())
    }
}
