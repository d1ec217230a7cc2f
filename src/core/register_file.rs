//! Register allocation and management.
//!
//! This module implements the RegisterFile that hands out numbered bytecode
//! registers and the RegisterAllocator that drives it from recorded def/use
//! order. Allocation is strict first-fit: the lowest free slot is reused,
//! otherwise the file grows by one. There is no spilling, no coalescing and
//! no control-flow awareness; a register is freed as soon as its value's last
//! recorded dependent has been replayed. Slot `n` is exposed as register
//! `n + 1` because `r0` is the permanent null register.

use log::trace;

use super::error::{CompileError, CompileResult};
use super::value_assignment::ValueAssignmentManager;
use crate::bytecode::{Reg, NULL_REGISTER};
use crate::ir::{Address, ValueRef};

/// Largest number of slots the `u8` register space can address next to `r0`.
pub const MAX_REGISTERS: usize = Reg::MAX as usize;

/// One register slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    live: bool,
    owner: ValueRef,
}

/// Slot pool for a single function.
#[derive(Debug, Default)]
pub struct RegisterFile {
    slots: Vec<Slot>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lowest free slot for `value`, growing the file if none is free.
    ///
    /// Returns the slot index and whether an existing slot was reused.
    pub fn claim(&mut self, value: ValueRef) -> CompileResult<(usize, bool)> {
        if let Some(index) = self.slots.iter().position(|slot| !slot.live) {
            self.slots[index] = Slot { live: true, owner: value };
            return Ok((index, true));
        }

        if self.slots.len() >= MAX_REGISTERS {
            return Err(CompileError::RegisterFileExhausted { value });
        }
        self.slots.push(Slot { live: true, owner: value });
        Ok((self.slots.len() - 1, false))
    }

    /// Slot currently live and owned by `value`.
    pub fn find_register_for_value(&self, value: ValueRef) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.live && slot.owner == value)
    }

    pub fn free(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.live = false;
        }
    }

    pub fn is_live(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.live)
    }

    /// Number of slots ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }

    /// Offset a slot index to leave `r0` free for the null register.
    pub fn offset_register(index: usize) -> Reg {
        // Slot count is capped at MAX_REGISTERS, so `index + 1` fits.
        (index + 1) as Reg
    }
}

/// Counters describing one allocator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Allocations that claimed a slot.
    pub allocated: usize,
    /// Allocations that reused a previously freed slot.
    pub reused: usize,
    /// Allocations mapped to the null register because nothing reads the value.
    pub discarded: usize,
    /// Slots released after their value's last use.
    pub freed: usize,
}

/// Assigns and recycles registers from recorded def/use order.
///
/// One allocator is created per function compile and never shared.
#[derive(Debug, Default)]
pub struct RegisterAllocator {
    registers: RegisterFile,
    values: ValueAssignmentManager,
    stats: AllocatorStats,
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `value` a register for its whole live range.
    ///
    /// The null sentinel maps to `r0`. A value nothing reads also maps to
    /// `r0` without touching the slot pool, though it still counts as
    /// allocated. Note this cannot tell a discarded result from a value whose
    /// dependents were never recorded.
    pub fn allocate(&mut self, value: ValueRef, dependents: &[Address]) -> CompileResult<Reg> {
        if value.is_null() {
            return Ok(NULL_REGISTER);
        }

        // IR values are SSA-form, so allocation happens once.
        self.values.mark_allocated(value)?;

        if dependents.is_empty() {
            trace!("allocate {value} -> r0 (no dependents)");
            self.stats.discarded += 1;
            return Ok(NULL_REGISTER);
        }

        let (index, reused) = self.registers.claim(value)?;
        self.values.create_assignment(value, dependents);
        self.stats.allocated += 1;
        if reused {
            self.stats.reused += 1;
        }

        let reg = RegisterFile::offset_register(index);
        trace!(
            "allocate {value} -> r{reg} ({}, dependents {:?})",
            if reused { "reused" } else { "new" },
            dependents
        );
        Ok(reg)
    }

    /// Replay the read of `value` by the instruction at `address`.
    ///
    /// Frees the register once the value has no pending dependents.
    pub fn use_value(&mut self, value: ValueRef, address: Address) -> CompileResult<Reg> {
        if value.is_null() {
            return Ok(NULL_REGISTER);
        }

        let exhausted = self.values.consume(value, address)?;

        let index = self
            .registers
            .find_register_for_value(value)
            .ok_or(CompileError::RegisterNotFound { value })?;

        let reg = RegisterFile::offset_register(index);
        if exhausted {
            self.registers.free(index);
            self.stats.freed += 1;
            trace!("use {value} at {address:04} -> r{reg} (freed)");
        } else {
            trace!("use {value} at {address:04} -> r{reg}");
        }
        Ok(reg)
    }

    /// Total number of slots ever created, i.e. the function's register count.
    pub fn registers_required(&self) -> u8 {
        // Capped at MAX_REGISTERS by `RegisterFile::claim`.
        self.registers.len() as u8
    }

    pub fn live_registers(&self) -> usize {
        self.registers.live_count()
    }

    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }
}
