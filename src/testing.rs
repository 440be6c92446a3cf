// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Special-purpose allocators for exercising corner cases of buffer code.
//!
//! These are not optimized for real-world usage; they exist so that tests -
//! both this crate's and downstream ones - can drive the buffer through
//! block-boundary and allocation-failure paths deterministically.

use crate::pool::{Chunk, PoolAlloc};
use crate::{Error, Result};

/// A pool allocator that fails after a fixed number of successful
/// allocations.
///
/// Use it to verify that buffer operations which allocate mid-way roll back
/// cleanly. Deallocation always succeeds and does not refund the budget.
///
/// # Examples
///
/// ```
/// use chainbuf::{ChainBuf, Error, FailingAlloc, Mempool};
///
/// // One block for construction; every later allocation fails.
/// let alloc = FailingAlloc::new(Mempool::<64>::new(), 1);
/// let mut buf = ChainBuf::with_allocator(alloc).unwrap();
///
/// let result = buf.add_back(&[0u8; 200]);
/// assert!(matches!(result, Err(Error::OutOfMemory)));
/// assert!(buf.is_empty());
/// ```
#[derive(Debug)]
pub struct FailingAlloc<A: PoolAlloc> {
    inner: A,
    budget: usize,
}

impl<A: PoolAlloc> FailingAlloc<A> {
    /// Wraps `inner`, allowing `budget` successful allocations before every
    /// further attempt fails.
    #[must_use]
    pub fn new(inner: A, budget: usize) -> Self {
        Self { inner, budget }
    }

    /// Successful allocations still allowed.
    #[must_use]
    pub fn remaining_budget(&self) -> usize {
        self.budget
    }
}

impl<A: PoolAlloc> PoolAlloc for FailingAlloc<A> {
    const BLOCK_SIZE: usize = A::BLOCK_SIZE;
    const REAL_SIZE: usize = A::REAL_SIZE;

    fn allocate(&mut self) -> Result<Chunk> {
        if self.budget == 0 {
            return Err(Error::OutOfMemory);
        }
        self.budget -= 1;
        self.inner.allocate()
    }

    fn deallocate(&mut self, chunk: Chunk) {
        self.inner.deallocate(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Mempool;

    #[test]
    fn fails_when_the_budget_runs_out() {
        let mut alloc = FailingAlloc::new(Mempool::<64>::new(), 2);

        let first = alloc.allocate().unwrap();
        let second = alloc.allocate().unwrap();
        assert!(matches!(alloc.allocate(), Err(Error::OutOfMemory)));
        assert_eq!(alloc.remaining_budget(), 0);

        alloc.deallocate(first);
        alloc.deallocate(second);

        // Returning chunks does not refund the budget.
        assert!(matches!(alloc.allocate(), Err(Error::OutOfMemory)));
    }
}
