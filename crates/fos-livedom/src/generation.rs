//! Mutation Generation
//!
//! The tree carries a counter that ticks once per child-list insertion
//! or removal. Multi-step operations that hand control to listeners take
//! a [`MutationGuard`] first; afterwards they compare the tick count with
//! the number of mutations they performed themselves. Any surplus means a
//! callback changed the tree and every earlier check must be redone.

use crate::DomTree;

/// Generation counter - incremented on every child-list mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Generation(u64);

impl Generation {
    /// Initial generation (never mutated)
    pub const INITIAL: Self = Generation(0);

    /// Get the raw value
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next generation
    #[inline]
    pub const fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    /// Mutations between `earlier` and `self`
    #[inline]
    pub fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Snapshot of the mutation counter taken before a multi-step operation
#[derive(Debug, Clone, Copy)]
pub struct MutationGuard {
    start: Generation,
}

impl MutationGuard {
    pub fn new(tree: &DomTree) -> Self {
        Self { start: tree.generation() }
    }

    /// Mutations observed since the guard was taken
    pub fn mutations(&self, tree: &DomTree) -> u64 {
        tree.generation().since(self.start)
    }

    /// True if more than `expected` mutations happened since the guard was taken
    pub fn mutated(&self, tree: &DomTree, expected: u64) -> bool {
        self.mutations(tree) > expected
    }
}

impl DomTree {
    /// Current mutation generation
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.next();
    }
}
