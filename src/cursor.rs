// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::rc::Rc;

use crate::buf::Core;
use crate::pool::{Mempool, PoolAlloc};
use crate::registry::{advance_pos, pos_distance, Anchor, CursorKey, Pos};

/// A stable position inside a [`ChainBuf`][crate::ChainBuf].
///
/// A cursor stays valid while the buffer grows and while bytes are inserted
/// or released in the middle: the buffer keeps every live cursor registered
/// and repositions it whenever an edit shifts the bytes it points at.
///
/// Cursors are first-class owned values. Cloning one registers the clone
/// next to its source; dropping one deregisters it. Comparison operators are
/// positional and assume both cursors belong to the same buffer (checked by
/// debug assertion).
///
/// Reading goes through the cursor ([`read_byte()`][Self::read_byte],
/// [`read_into()`][Self::read_into]); writing goes through the buffer
/// ([`set()`][crate::ChainBuf::set] and friends), which is what lets
/// exported I/O slices borrow the buffer safely.
pub struct Cursor<A: PoolAlloc = Mempool> {
    core: Rc<RefCell<Core<A>>>,
    key: CursorKey,
}

impl<A: PoolAlloc> Cursor<A> {
    pub(crate) fn from_parts(core: Rc<RefCell<Core<A>>>, key: CursorKey) -> Self {
        Self { core, key }
    }

    pub(crate) fn key(&self) -> CursorKey {
        self.key
    }

    pub(crate) fn core_rc(&self) -> &Rc<RefCell<Core<A>>> {
        &self.core
    }

    fn pos(&self) -> Pos {
        self.core.borrow().registry.pos(self.key)
    }

    /// Moves the cursor forward by `step` bytes, crossing block boundaries
    /// transparently. The cursor must not be advanced past the buffer end.
    pub fn advance(&mut self, step: usize) {
        let mut core = self.core.borrow_mut();

        let pos = core.registry.pos(self.key);
        let moved = advance_pos(pos, step, A::REAL_SIZE);
        debug_assert!(moved <= core.end_pos(), "cursor advanced past the buffer end");

        core.registry.set_pos(self.key, moved);
        core.registry.adjust_forward(self.key);
    }

    /// The byte at the cursor. The cursor must not equal `end()`.
    #[must_use]
    pub fn read_byte(&self) -> u8 {
        let core = self.core.borrow();

        let pos = core.registry.pos(self.key);
        debug_assert!(pos != core.end_pos(), "read through an end cursor");

        core.block_data(pos.block)[pos.off]
    }

    /// Copies `out.len()` bytes starting at the cursor into `out`.
    ///
    /// Equivalent to [`ChainBuf::get()`][crate::ChainBuf::get] at this
    /// cursor. The buffer must hold that many bytes past the cursor.
    pub fn read_into(&self, out: &mut [u8]) {
        let core = self.core.borrow();
        core.get_at(core.registry.pos(self.key), out);
    }
}

impl<A: PoolAlloc> Clone for Cursor<A> {
    fn clone(&self) -> Self {
        let key = {
            let mut core = self.core.borrow_mut();
            let pos = core.registry.pos(self.key);
            core.registry.register(pos, Anchor::After(self.key))
        };

        Self {
            core: Rc::clone(&self.core),
            key,
        }
    }
}

impl<A: PoolAlloc> Drop for Cursor<A> {
    fn drop(&mut self) {
        self.core.borrow_mut().registry.deregister(self.key);
    }
}

impl<A: PoolAlloc> PartialEq for Cursor<A> {
    fn eq(&self, other: &Self) -> bool {
        debug_assert!(Rc::ptr_eq(&self.core, &other.core), "cursors from different buffers");
        self.pos() == other.pos()
    }
}

impl<A: PoolAlloc> Eq for Cursor<A> {}

impl<A: PoolAlloc> PartialOrd for Cursor<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A: PoolAlloc> Ord for Cursor<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        debug_assert!(Rc::ptr_eq(&self.core, &other.core), "cursors from different buffers");
        self.pos().cmp(&other.pos())
    }
}

impl<A: PoolAlloc> AddAssign<usize> for Cursor<A> {
    fn add_assign(&mut self, step: usize) {
        self.advance(step);
    }
}

impl<A: PoolAlloc> Add<usize> for &Cursor<A> {
    type Output = Cursor<A>;

    fn add(self, step: usize) -> Cursor<A> {
        let mut moved = self.clone();
        moved.advance(step);
        moved
    }
}

/// Byte distance between two cursors of the same buffer; the right-hand
/// cursor must not be past the left-hand one.
impl<A: PoolAlloc> Sub for &Cursor<A> {
    type Output = usize;

    fn sub(self, other: &Cursor<A>) -> usize {
        debug_assert!(Rc::ptr_eq(&self.core, &other.core), "cursors from different buffers");

        let core = self.core.borrow();
        let from = core.registry.pos(other.key);
        let to = core.registry.pos(self.key);
        pos_distance(from, to, A::REAL_SIZE)
    }
}

impl<A: PoolAlloc> fmt::Debug for Cursor<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pos = self.pos();
        f.debug_struct("Cursor").field("block", &pos.block).field("off", &pos.off).finish()
    }
}
