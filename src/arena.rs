//! Per-worker bump scratch memory with bookmark rewind.
//!
//! Every transient per-batch array is carved out of an [`ArenaMark`]. Nothing is freed
//! individually: `reset` rewinds the whole mark in O(1) and dropping the mark rewinds it and
//! hands its block back to the arena for the next batch. The borrow checker guarantees no
//! slice from a mark outlives a rewind.

use crate::{DispatchError, Result};
use bumpalo::Bump;
use std::cell::{Cell, RefCell};

/// Capacity-bounded scratch memory owned by exactly one worker.
#[derive(Debug)]
pub struct ScratchArena {
    capacity: usize,
    in_use: Cell<usize>,
    high_water: Cell<usize>,
    spare: RefCell<Vec<Bump>>,
}

impl ScratchArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: Cell::new(0),
            high_water: Cell::new(0),
            spare: RefCell::new(Vec::new()),
        }
    }

    /// Opens a new scope. Marks may nest; each one rewinds independently.
    pub fn mark(&self) -> ArenaMark<'_> {
        let bump = self.spare.borrow_mut().pop().unwrap_or_default();
        ArenaMark {
            arena: self,
            bump,
            bytes: Cell::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes_in_use(&self) -> usize {
        self.in_use.get()
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water.get()
    }

    fn reserve(&self, requested: usize) -> Result<()> {
        let available = self.capacity - self.in_use.get();
        if requested > available {
            return Err(DispatchError::ArenaOverflow {
                requested,
                available,
            });
        }
        let in_use = self.in_use.get() + requested;
        self.in_use.set(in_use);
        self.high_water.set(self.high_water.get().max(in_use));
        Ok(())
    }

    fn give_back(&self, bytes: usize) {
        debug_assert!(bytes <= self.in_use.get());
        self.in_use.set(self.in_use.get() - bytes);
    }
}

/// A bookmark into the arena. Allocations borrow the mark, so they cannot outlive it.
#[derive(Debug)]
pub struct ArenaMark<'a> {
    arena: &'a ScratchArena,
    bump: Bump,
    bytes: Cell<usize>,
}

impl<'a> ArenaMark<'a> {
    pub fn alloc_slice_fill<T: Copy>(&self, len: usize, value: T) -> Result<&mut [T]> {
        self.reserve::<T>(len)?;
        Ok(self.bump.alloc_slice_fill_copy(len, value))
    }

    pub fn alloc_slice_from_iter<T, I>(&self, iter: I) -> Result<&mut [T]>
    where
        T: Copy,
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = iter.into_iter();
        self.reserve::<T>(iter.len())?;
        Ok(self.bump.alloc_slice_fill_iter(iter))
    }

    /// Rewinds everything allocated from this mark.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.arena.give_back(self.bytes.replace(0));
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes.get()
    }

    fn reserve<T>(&self, len: usize) -> Result<()> {
        let requested = std::mem::size_of::<T>().checked_mul(len).ok_or(
            DispatchError::ArenaOverflow {
                requested: usize::MAX,
                available: self.arena.capacity - self.arena.in_use.get(),
            },
        )?;
        self.arena.reserve(requested)?;
        self.bytes.set(self.bytes.get() + requested);
        Ok(())
    }
}

impl Drop for ArenaMark<'_> {
    fn drop(&mut self) {
        self.reset();
        let bump = std::mem::take(&mut self.bump);
        self.arena.spare.borrow_mut().push(bump);
    }
}

#[cfg(test)]
mod test_scratch_arena {
    use super::*;

    #[test]
    fn test_mark_rewinds_on_drop() {
        let arena = ScratchArena::new(1024);
        {
            let mark = arena.mark();
            let a = mark.alloc_slice_fill(16, 7u32).unwrap();
            assert_eq!(a.len(), 16);
            assert!(a.iter().all(|&v| v == 7));
            assert_eq!(arena.bytes_in_use(), 64);
        }
        assert_eq!(arena.bytes_in_use(), 0);
        assert_eq!(arena.high_water_mark(), 64);
    }

    #[test]
    fn test_nested_marks_rewind_independently() {
        let arena = ScratchArena::new(4096);
        let outer = arena.mark();
        let kept = outer.alloc_slice_from_iter(0..8u32).unwrap();

        let mut inner = arena.mark();
        for round in 0..4u32 {
            let scratch = inner.alloc_slice_fill(32, round).unwrap();
            scratch[0] = round + 1;
            assert_eq!(arena.bytes_in_use(), 32 + 128);
            inner.reset();
        }
        drop(inner);

        assert_eq!(kept, &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(arena.bytes_in_use(), 32);
    }

    #[test]
    fn test_overflow_is_reported() {
        let arena = ScratchArena::new(64);
        let mark = arena.mark();
        mark.alloc_slice_fill(8, 0u32).unwrap();
        let err = mark.alloc_slice_fill(16, 0u32).unwrap_err();
        assert_eq!(
            err,
            DispatchError::ArenaOverflow {
                requested: 64,
                available: 32
            }
        );
    }
}
