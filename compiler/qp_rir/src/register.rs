// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ids::Register;
use qp_data_structures::constants::NUM_REGISTERS;
use rustc_hash::FxHashSet;
use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("register file exhausted: all {0} registers are live")]
pub struct RegisterOverflow(pub usize);

/// An integer free-list allocator with stack discipline per lexical scope
/// (spec §9 design note, §4.4.1): on `pop_scope`, every register acquired
/// since the matching `push_scope` is returned to the free list, except
/// those explicitly pinned (loop counters still live in an outer scope).
pub struct RegisterAllocator {
    free: Vec<u8>,
    scopes: Vec<FxHashSet<Register>>,
    pinned: FxHashSet<Register>,
}

impl RegisterAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(NUM_REGISTERS)
    }

    #[must_use]
    pub fn with_capacity(num_registers: usize) -> Self {
        let free = (0..num_registers as u8).rev().collect();
        Self {
            free,
            scopes: vec![FxHashSet::default()],
            pinned: FxHashSet::default(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashSet::default());
    }

    /// Pops the current scope, freeing every register it acquired that
    /// isn't pinned (spec invariant §3.6.7: the allocator never frees a
    /// register holding a live loop counter).
    pub fn pop_scope(&mut self) {
        let scope = self
            .scopes
            .pop()
            .expect("register allocator scope stack is never empty");
        for reg in scope {
            if !self.pinned.contains(&reg) {
                self.free.push(reg.0);
            }
        }
    }

    /// Allocates a fresh register in the current scope.
    ///
    /// # Errors
    /// Returns [`RegisterOverflow`] if the free list is empty.
    pub fn alloc(&mut self) -> Result<Register, RegisterOverflow> {
        let raw = self
            .free
            .pop()
            .ok_or(RegisterOverflow(self.total_capacity()))?;
        let reg = Register(raw);
        self.scopes
            .last_mut()
            .expect("register allocator scope stack is never empty")
            .insert(reg);
        Ok(reg)
    }

    /// Allocates a register and marks it pinned: it survives `pop_scope`
    /// calls for any scope nested inside the one that allocated it, and is
    /// only released by an explicit [`Self::unpin_and_free`].
    pub fn alloc_pinned(&mut self) -> Result<Register, RegisterOverflow> {
        let reg = self.alloc()?;
        self.pinned.insert(reg);
        Ok(reg)
    }

    pub fn unpin_and_free(&mut self, reg: Register) {
        self.pinned.remove(&reg);
        self.free.push(reg.0);
    }

    fn total_capacity(&self) -> usize {
        self.free.len()
            + self.scopes.iter().map(FxHashSet::len).sum::<usize>()
            + self.pinned.len()
    }
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_exit_frees_non_pinned_registers() {
        let mut alloc = RegisterAllocator::with_capacity(2);
        alloc.push_scope();
        let a = alloc.alloc().unwrap();
        alloc.pop_scope();
        let b = alloc.alloc().unwrap();
        assert_eq!(a, b, "freed register should be reused");
    }

    #[test]
    fn pinned_register_survives_scope_exit() {
        let mut alloc = RegisterAllocator::with_capacity(2);
        let counter = alloc.alloc_pinned().unwrap();
        alloc.push_scope();
        let _inner = alloc.alloc().unwrap();
        alloc.pop_scope();
        // Only one register (the inner, freed one) should be available;
        // the pinned counter must not have been returned to the free list.
        let next = alloc.alloc().unwrap();
        assert_ne!(next, counter);
    }

    #[test]
    fn exhausted_allocator_reports_overflow() {
        let mut alloc = RegisterAllocator::with_capacity(1);
        alloc.alloc().unwrap();
        assert_eq!(alloc.alloc().unwrap_err(), RegisterOverflow(1));
    }
}
