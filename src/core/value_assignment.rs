// This module implements the liveness half of the register allocator: it tracks, for every
// SSA value the compiler has allocated, which recorded dependency addresses have not yet been
// consumed. ValueAssignment holds one value's remaining dependents; ValueAssignmentManager
// maps values to their assignments and guards the SSA rule that each value is allocated at
// most once. When the compiler replays a use at some address, the matching dependent is
// removed; once none remain the assignment is dropped and the caller may release the value's
// register. Uses at addresses the builder never recorded, or of values whose dependents are
// already exhausted, are reported as internal compiler errors.

//! Remaining-dependency bookkeeping for allocated values.

use std::collections::{HashMap, HashSet};

use super::error::{CompileError, CompileResult};
use crate::ir::{Address, ValueRef};

/// Dependents of one value that the compiler has not replayed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAssignment {
    remaining: Vec<Address>,
}

impl ValueAssignment {
    pub fn new(dependents: &[Address]) -> Self {
        Self {
            remaining: dependents.to_vec(),
        }
    }

    pub fn remaining(&self) -> &[Address] {
        &self.remaining
    }

    /// Consume one occurrence of `address`. Returns false if it was not pending.
    fn consume(&mut self, address: Address) -> bool {
        match self.remaining.iter().position(|pending| *pending == address) {
            Some(index) => {
                self.remaining.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Tracks every allocated value of one function.
#[derive(Debug, Default)]
pub struct ValueAssignmentManager {
    /// Values that have already been allocated, live or not.
    allocated: HashSet<ValueRef>,
    /// Values that still have dependents to replay.
    live: HashMap<ValueRef, ValueAssignment>,
}

impl ValueAssignmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the single allocation of `value`.
    pub fn mark_allocated(&mut self, value: ValueRef) -> CompileResult<()> {
        if !self.allocated.insert(value) {
            return Err(CompileError::ValueAlreadyAllocated { value });
        }
        Ok(())
    }

    /// Start tracking `value` with all of its dependents live.
    pub fn create_assignment(&mut self, value: ValueRef, dependents: &[Address]) {
        self.live.insert(value, ValueAssignment::new(dependents));
    }

    pub fn get_assignment(&self, value: ValueRef) -> Option<&ValueAssignment> {
        self.live.get(&value)
    }

    /// Replay the use of `value` at `address`.
    ///
    /// Returns true when this was the last pending dependent, at which point
    /// the assignment is dropped.
    pub fn consume(&mut self, value: ValueRef, address: Address) -> CompileResult<bool> {
        let assignment = self
            .live
            .get_mut(&value)
            .ok_or(CompileError::ValueNotLive { value })?;

        if !assignment.consume(address) {
            return Err(CompileError::DependencyNotFound { value, address });
        }

        if assignment.is_exhausted() {
            self.live.remove(&value);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn is_allocated(&self, value: ValueRef) -> bool {
        self.allocated.contains(&value)
    }

    /// Number of values with dependents still pending.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
