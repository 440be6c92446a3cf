// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::RefCell;
use std::fmt;
use std::io::IoSlice;
use std::mem;
use std::ptr;
use std::rc::Rc;

use bytemuck::Pod;

use crate::block::{Block, Chain};
use crate::cursor::Cursor;
use crate::pool::{Mempool, PoolAlloc};
use crate::registry::{advance_pos, pos_distance, Anchor, Pos, Registry};
use crate::Result;

/// The buffer state shared between the façade and its cursors.
///
/// All invariant-bearing logic lives here; [`ChainBuf`] and
/// [`Cursor`] are thin shells around `Rc<RefCell<Core>>`.
pub(crate) struct Core<A: PoolAlloc> {
    chain: Chain,
    pub(crate) registry: Registry,
    /// Id for the next allocated block. Rolled back when staged allocations
    /// fail and when `drop_back` frees live blocks, so that
    /// `next_block_id == tail.id + 1` at every quiescent point.
    next_block_id: u64,
    /// Offset of the first live byte in the head block.
    begin: usize,
    /// Offset one past the last live byte in the tail block.
    end: usize,
    alloc: A,
}

/// Blocks staged for an append that has not committed yet.
///
/// Holding them apart from the main chain is what gives `add_back` strong
/// exception safety: if an allocation fails partway, the drop glue returns
/// every staged chunk to the pool and rewinds the id counter by the same
/// count, leaving the buffer observably untouched.
struct Staged<'a, A: PoolAlloc> {
    alloc: &'a mut A,
    next_block_id: &'a mut u64,
    blocks: Vec<Block>,
}

impl<'a, A: PoolAlloc> Staged<'a, A> {
    fn new(alloc: &'a mut A, next_block_id: &'a mut u64) -> Self {
        Self {
            alloc,
            next_block_id,
            blocks: Vec::new(),
        }
    }

    fn push_block(&mut self) -> Result<()> {
        let chunk = self.alloc.allocate()?;
        let id = *self.next_block_id;
        *self.next_block_id += 1;
        self.blocks.push(Block::new(id, chunk));
        Ok(())
    }

    fn last_data_mut(&mut self) -> &mut [u8] {
        self.blocks.last_mut().expect("push_block() ran before any write").data_mut()
    }

    /// Hands the staged blocks over for splicing; disarms the rollback.
    fn commit(mut self) -> Vec<Block> {
        mem::take(&mut self.blocks)
    }
}

impl<A: PoolAlloc> Drop for Staged<'_, A> {
    fn drop(&mut self) {
        for block in self.blocks.drain(..) {
            self.alloc.deallocate(block.into_chunk());
            *self.next_block_id -= 1;
        }
    }
}

impl<A: PoolAlloc> Core<A> {
    pub(crate) fn new(mut alloc: A) -> Result<Self> {
        const {
            assert!(A::BLOCK_SIZE.is_power_of_two(), "block size must be a power of two");
            assert!(A::REAL_SIZE > 0, "chunks must have a usable data area");
            assert!(A::REAL_SIZE <= A::BLOCK_SIZE, "usable chunk size cannot exceed the block stride");
        }

        let chunk = alloc.allocate()?;

        Ok(Self {
            chain: Chain::with_first(Block::new(0, chunk)),
            registry: Registry::default(),
            next_block_id: 1,
            begin: 0,
            end: 0,
            alloc,
        })
    }

    pub(crate) fn begin_pos(&self) -> Pos {
        Pos {
            block: self.chain.head_id(),
            off: self.begin,
        }
    }

    pub(crate) fn end_pos(&self) -> Pos {
        Pos {
            block: self.chain.tail_id(),
            off: self.end,
        }
    }

    pub(crate) fn block_data(&self, id: u64) -> &[u8] {
        self.chain.get(id).data()
    }

    pub(crate) fn add_back(&mut self, data: &[u8]) -> Result<()> {
        debug_assert!(!data.is_empty());

        let data_size = A::REAL_SIZE;
        let room = data_size - self.end;

        if data.len() < room {
            let end = self.end;
            self.chain.tail_mut().data_mut()[end..end + data.len()].copy_from_slice(data);
            self.end += data.len();
            return Ok(());
        }

        // The tail's remaining room is filled first. These bytes sit past
        // `end` until the staged blocks commit, so a failed allocation below
        // leaves nothing observable.
        let (head, mut rest) = data.split_at(room);
        {
            let end = self.end;
            self.chain.tail_mut().data_mut()[end..end + head.len()].copy_from_slice(head);
        }

        let mut staged = Staged::new(&mut self.alloc, &mut self.next_block_id);
        loop {
            staged.push_block()?;
            if rest.len() < data_size {
                break;
            }
            let (full, remainder) = rest.split_at(data_size);
            staged.last_data_mut()[..data_size].copy_from_slice(full);
            rest = remainder;
        }
        staged.last_data_mut()[..rest.len()].copy_from_slice(rest);

        let staged_blocks = staged.commit();
        self.chain.splice_back(staged_blocks);
        self.end = rest.len();

        debug_assert!(self.registry.is_sorted());
        Ok(())
    }

    /// Appends `size` bytes of reserved, unwritten space.
    pub(crate) fn advance_uninit(&mut self, size: usize) -> Result<()> {
        debug_assert!(size != 0);

        let data_size = A::REAL_SIZE;
        let room = data_size - self.end;

        if size < room {
            self.end += size;
            return Ok(());
        }

        let mut remaining = size - room;
        let mut staged = Staged::new(&mut self.alloc, &mut self.next_block_id);
        loop {
            staged.push_block()?;
            if remaining < data_size {
                break;
            }
            remaining -= data_size;
        }

        let staged_blocks = staged.commit();
        self.chain.splice_back(staged_blocks);
        self.end = remaining;
        Ok(())
    }

    pub(crate) fn drop_front(&mut self, size: usize) {
        debug_assert!(size != 0);

        let data_size = A::REAL_SIZE;
        let mut size = size;
        let mut room = data_size - self.begin;

        while size > room {
            debug_assert!(
                self.registry.first().is_none_or(|pos| pos.block != self.chain.head_id()),
                "cursor points into a block being dropped"
            );

            let block = self.chain.pop_front().expect("drop_front crossed the buffer end");
            self.alloc.deallocate(block.into_chunk());
            self.begin = 0;
            size -= room;
            room = data_size;
        }
        self.begin += size;

        debug_assert!(self.begin <= data_size);
        debug_assert!(
            self.registry
                .first()
                .is_none_or(|pos| pos.block != self.chain.head_id() || pos.off >= self.begin),
            "cursor points into the dropped range"
        );
        debug_assert!(self.chain.len() > 1 || self.begin <= self.end);
    }

    pub(crate) fn drop_back(&mut self, size: usize) {
        debug_assert!(size != 0);

        let data_size = A::REAL_SIZE;
        let mut size = size;
        let mut room = self.end;

        while size > room {
            let block = self.chain.pop_back().expect("drop_back crossed the buffer start");
            debug_assert!(
                self.registry.last().is_none_or(|pos| pos.block < block.id()),
                "cursor points into a block being dropped"
            );

            self.alloc.deallocate(block.into_chunk());
            // The tail of the id sequence retreats with the freed block so
            // that next_block_id stays aligned with tail.id + 1.
            self.next_block_id -= 1;
            self.end = data_size;
            size -= room;
            room = data_size;
        }
        self.end -= size;

        debug_assert!(
            self.registry
                .last()
                .is_none_or(|pos| pos.block != self.chain.tail_id() || pos.off <= self.end),
            "cursor points into the dropped range"
        );
        debug_assert!(self.chain.len() > 1 || self.begin <= self.end);
    }

    /// Opens a `size`-byte hole at `at`, shifting `[at, end)` toward the
    /// tail. `size` must be smaller than the block data area.
    pub(crate) fn insert_at(&mut self, at: Pos, size: usize) -> Result<()> {
        let data_size = A::REAL_SIZE;
        assert!(size < data_size, "insert hole must be smaller than the block data area");
        debug_assert!(size != 0);
        debug_assert!(at >= self.begin_pos() && at <= self.end_pos());

        let src_tail = self.chain.tail_id();
        let src_end = self.end;
        self.advance_uninit(size)?;

        // Shift the bytes back-to-front in per-block chunks so that no byte
        // is overwritten before it has been copied. Within the cursor's own
        // block the source window is clamped to the cursor offset.
        let mut src = Pos {
            block: src_tail,
            off: src_end,
        };
        let mut dst = self.end_pos();
        let mut remaining = pos_distance(at, src, data_size);

        while remaining > 0 {
            let src_low = if src.block == at.block { at.off } else { 0 };
            if src.off == src_low {
                src = Pos {
                    block: src.block - 1,
                    off: data_size,
                };
                continue;
            }
            if dst.off == 0 {
                dst = Pos {
                    block: dst.block - 1,
                    off: data_size,
                };
                continue;
            }

            let step = remaining.min(src.off - src_low).min(dst.off);
            let src_ptr = self.chain.get(src.block).data_ptr();
            let dst_ptr = self.chain.get(dst.block).data_ptr();

            // SAFETY: Both ranges lie inside their blocks' data areas, and
            // ptr::copy tolerates the overlap that occurs when source and
            // destination share a block.
            unsafe { ptr::copy(src_ptr.add(src.off - step), dst_ptr.add(dst.off - step), step) };

            src.off -= step;
            dst.off -= step;
            remaining -= step;
        }

        self.registry.shift_after_forward(at, size, data_size);
        debug_assert!(self.registry.is_sorted());
        Ok(())
    }

    /// Closes the `size`-byte region at `at`, shifting `[at + size, end)`
    /// toward the head, then trims the tail.
    pub(crate) fn release_at(&mut self, at: Pos, size: usize) {
        debug_assert!(size != 0);

        let data_size = A::REAL_SIZE;
        let end_pos = self.end_pos();
        let mut src = advance_pos(at, size, data_size);
        debug_assert!(src <= end_pos, "release crosses the buffer end");

        let mut dst = at;
        let mut remaining = pos_distance(src, end_pos, data_size);

        while remaining > 0 {
            if src.off == data_size {
                src = Pos {
                    block: src.block + 1,
                    off: 0,
                };
                continue;
            }
            if dst.off == data_size {
                dst = Pos {
                    block: dst.block + 1,
                    off: 0,
                };
                continue;
            }

            let step = remaining.min(data_size - src.off).min(data_size - dst.off);
            let src_ptr = self.chain.get(src.block).data_ptr();
            let dst_ptr = self.chain.get(dst.block).data_ptr();

            // SAFETY: Both ranges lie inside their blocks' data areas;
            // ptr::copy tolerates intra-block overlap.
            unsafe { ptr::copy(src_ptr.add(src.off), dst_ptr.add(dst.off), step) };

            src.off += step;
            dst.off += step;
            remaining -= step;
        }

        self.registry.shift_after_backward(at, size, data_size);
        debug_assert!(self.registry.is_sorted());

        self.drop_back(size);
    }

    pub(crate) fn get_at(&self, pos: Pos, out: &mut [u8]) {
        let data_size = A::REAL_SIZE;
        let mut pos = pos;
        let mut copied = 0;

        while copied < out.len() {
            if pos.off == data_size {
                pos = Pos {
                    block: pos.block + 1,
                    off: 0,
                };
                continue;
            }
            let step = (out.len() - copied).min(data_size - pos.off);
            out[copied..copied + step].copy_from_slice(&self.chain.get(pos.block).data()[pos.off..pos.off + step]);
            copied += step;
            pos.off += step;
        }
    }

    pub(crate) fn set_at(&mut self, pos: Pos, data: &[u8]) {
        let data_size = A::REAL_SIZE;
        let mut pos = pos;
        let mut copied = 0;

        while copied < data.len() {
            if pos.off == data_size {
                pos = Pos {
                    block: pos.block + 1,
                    off: 0,
                };
                continue;
            }
            let step = (data.len() - copied).min(data_size - pos.off);
            self.chain.get_mut(pos.block).data_mut()[pos.off..pos.off + step].copy_from_slice(&data[copied..copied + step]);
            copied += step;
            pos.off += step;
        }
    }

    pub(crate) fn has_at(&self, pos: Pos, size: usize) -> bool {
        let data_size = A::REAL_SIZE;
        let tail = self.chain.tail_id();
        let mut size = size;
        let mut block = pos.block;

        if block != tail {
            let have = data_size - pos.off;
            if size <= have {
                return true;
            }
            size -= have;
            block += 1;
        }
        while block != tail {
            if size <= data_size {
                return true;
            }
            size -= data_size;
            block += 1;
        }

        let start = if pos.block == tail { pos.off } else { 0 };
        size <= self.end.saturating_sub(start)
    }

    pub(crate) fn fill_iov<'a>(&self, start: Pos, end: Pos, vecs: &mut [IoSlice<'a>]) -> usize {
        debug_assert!(start <= end);
        debug_assert!(end <= self.end_pos());

        let data_size = A::REAL_SIZE;
        let mut pos = start;
        let mut count = 0;

        while count < vecs.len() {
            let block = self.chain.get(pos.block);
            let len = if pos.block == end.block {
                end.off - pos.off
            } else {
                data_size - pos.off
            };

            // SAFETY: The span lies inside the block's data area. Validity
            // for 'a holds because the caller ties 'a to a shared borrow of
            // the buffer, and every operation that frees blocks or mutates
            // bytes requires an exclusive borrow.
            let span = unsafe { std::slice::from_raw_parts(block.data_ptr().add(pos.off).cast_const(), len) };
            vecs[count] = IoSlice::new(span);
            count += 1;

            if pos.block == end.block {
                break;
            }
            pos = Pos {
                block: pos.block + 1,
                off: 0,
            };
        }

        count
    }

    pub(crate) fn flush(&mut self) {
        let begin = self.begin_pos();
        let target = self.registry.first().unwrap_or_else(|| self.end_pos());
        debug_assert!(begin <= target);

        let distance = pos_distance(begin, target, A::REAL_SIZE);
        if distance > 0 {
            self.drop_front(distance);
        }
    }

    pub(crate) fn self_check(&self) -> u32 {
        let data_size = A::REAL_SIZE;
        let mut result = 0;

        let mut first = true;
        let mut expected_id = self.next_block_id;
        for block in self.chain.iter() {
            if !first && block.id() != expected_id {
                result |= 1;
            }
            first = false;
            expected_id = block.id() + 1;
        }
        if expected_id != self.next_block_id {
            result |= 2;
        }

        for pos in self.registry.iter_pos() {
            if pos.off >= data_size {
                result |= 4;
            }
            if pos.block < self.chain.head_id() || pos.block > self.chain.tail_id() {
                result |= 8;
            }
        }

        result
    }

    /// Live span lengths per block, head to tail. Debug rendering only.
    fn span_lens(&self) -> Vec<usize> {
        let data_size = A::REAL_SIZE;
        let head_id = self.chain.head_id();
        let tail_id = self.chain.tail_id();

        self.chain
            .iter()
            .map(|block| {
                let from = if block.id() == head_id { self.begin } else { 0 };
                let to = if block.id() == tail_id { self.end } else { data_size };
                to.saturating_sub(from)
            })
            .collect()
    }
}

impl<A: PoolAlloc> Drop for Core<A> {
    fn drop(&mut self) {
        let blocks: Vec<Block> = self.chain.drain().collect();
        for block in blocks {
            self.alloc.deallocate(block.into_chunk());
        }
    }
}

/// A segmented I/O buffer.
///
/// Bytes live in a chain of fixed-size blocks rented from a pool allocator.
/// Appending never moves existing bytes; mid-buffer edits
/// ([`insert()`][Self::insert], [`release()`][Self::release]) shift bytes in
/// place and reposition every live [`Cursor`] past the edit point. Content
/// can be exported block-by-block as [`IoSlice`]s for vectored I/O without
/// copying.
///
/// The buffer is a single-owner structure and is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```
/// use chainbuf::ChainBuf;
///
/// # fn main() -> chainbuf::Result<()> {
/// let mut buf = ChainBuf::new()?;
/// buf.add_back(b"hello world")?;
///
/// let w = &buf.begin() + 6;
/// assert_eq!(w.read_byte(), b'w');
/// assert_eq!(&buf.end() - &buf.begin(), 11);
/// # Ok(())
/// # }
/// ```
pub struct ChainBuf<A: PoolAlloc = Mempool> {
    core: Rc<RefCell<Core<A>>>,
}

impl ChainBuf<Mempool> {
    /// Creates a buffer backed by a fresh default [`Mempool`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when the
    /// initial block cannot be allocated.
    pub fn new() -> Result<Self> {
        Self::with_allocator(Mempool::new())
    }
}

impl<A: PoolAlloc> ChainBuf<A> {
    /// Creates a buffer that rents its blocks from `alloc`.
    ///
    /// The buffer owns the allocator for its whole life; every block is
    /// returned to it before it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when the
    /// initial block cannot be allocated.
    pub fn with_allocator(alloc: A) -> Result<Self> {
        Ok(Self {
            core: Rc::new(RefCell::new(Core::new(alloc)?)),
        })
    }

    fn assert_owns(&self, cursor: &Cursor<A>) {
        debug_assert!(Rc::ptr_eq(&self.core, cursor.core_rc()), "cursor belongs to another buffer");
    }

    /// A cursor at the first live byte.
    #[must_use]
    pub fn begin(&self) -> Cursor<A> {
        let key = {
            let mut core = self.core.borrow_mut();
            let pos = core.begin_pos();
            core.registry.register(pos, Anchor::Front)
        };
        Cursor::from_parts(Rc::clone(&self.core), key)
    }

    /// A cursor one past the last live byte.
    #[must_use]
    pub fn end(&self) -> Cursor<A> {
        let key = {
            let mut core = self.core.borrow_mut();
            let pos = core.end_pos();
            core.registry.register(pos, Anchor::Back)
        };
        Cursor::from_parts(Rc::clone(&self.core), key)
    }

    /// Appends `data` at the tail, renting blocks from the pool as needed.
    ///
    /// On failure the buffer is unchanged: blocks staged for the append are
    /// returned to the pool before the error propagates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when the
    /// pool cannot supply a needed block.
    pub fn add_back(&mut self, data: &[u8]) -> Result<()> {
        self.core.borrow_mut().add_back(data)
    }

    /// Appends the byte representation of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when the
    /// pool cannot supply a needed block.
    pub fn add_back_value<T: Pod>(&mut self, value: &T) -> Result<()> {
        let bytes = bytemuck::bytes_of(value);
        if bytes.is_empty() {
            return Ok(());
        }
        self.add_back(bytes)
    }

    /// Appends the UTF-8 bytes of `text`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when the
    /// pool cannot supply a needed block.
    pub fn add_back_str(&mut self, text: &str) -> Result<()> {
        self.add_back(text.as_bytes())
    }

    /// Appends `size` reserved bytes without writing them. The reserved
    /// region's content is unspecified until written via
    /// [`set()`][Self::set].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when the
    /// pool cannot supply a needed block.
    pub fn advance(&mut self, size: usize) -> Result<()> {
        self.core.borrow_mut().advance_uninit(size)
    }

    /// Drops `size` bytes from the front, returning whole blocks crossed to
    /// the pool. No live cursor may point into the dropped range.
    pub fn drop_front(&mut self, size: usize) {
        self.core.borrow_mut().drop_front(size);
    }

    /// Drops `size` bytes from the back, returning whole blocks crossed to
    /// the pool. No live cursor may point into the dropped range.
    pub fn drop_back(&mut self, size: usize) {
        self.core.borrow_mut().drop_back(size);
    }

    /// Opens a `size`-byte hole at `cursor`, shifting everything from the
    /// cursor onward toward the tail and repositioning every live cursor
    /// strictly past the insertion point. The hole's content is unspecified
    /// until written.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not smaller than the block data area.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when the
    /// pool cannot supply a needed block; the buffer is unchanged.
    pub fn insert(&mut self, cursor: &Cursor<A>, size: usize) -> Result<()> {
        self.assert_owns(cursor);
        let mut core = self.core.borrow_mut();
        let at = core.registry.pos(cursor.key());
        core.insert_at(at, size)
    }

    /// Removes the `size` bytes at `cursor`, shifting everything past them
    /// toward the head and repositioning every live cursor strictly past
    /// the cursor.
    pub fn release(&mut self, cursor: &Cursor<A>, size: usize) {
        self.assert_owns(cursor);
        let mut core = self.core.borrow_mut();
        let at = core.registry.pos(cursor.key());
        core.release_at(at, size);
    }

    /// Grows or shrinks the region at `cursor` from `old_size` to
    /// `new_size` bytes via [`insert()`][Self::insert] or
    /// [`release()`][Self::release].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] when
    /// growing requires a block the pool cannot supply.
    pub fn resize(&mut self, cursor: &Cursor<A>, old_size: usize, new_size: usize) -> Result<()> {
        if new_size > old_size {
            self.insert(cursor, new_size - old_size)
        } else if old_size > new_size {
            self.release(cursor, old_size - new_size);
            Ok(())
        } else {
            Ok(())
        }
    }

    /// Overwrites `data.len()` bytes starting at `cursor`. Does not change
    /// the buffer's length, does not move cursors, never allocates.
    pub fn set(&mut self, cursor: &Cursor<A>, data: &[u8]) {
        self.assert_owns(cursor);
        let mut core = self.core.borrow_mut();
        let at = core.registry.pos(cursor.key());
        core.set_at(at, data);
    }

    /// Overwrites bytes at `cursor` with the representation of `value`.
    pub fn set_value<T: Pod>(&mut self, cursor: &Cursor<A>, value: &T) {
        self.set(cursor, bytemuck::bytes_of(value));
    }

    /// Copies `out.len()` bytes starting at `cursor` into `out`.
    pub fn get(&self, cursor: &Cursor<A>, out: &mut [u8]) {
        self.assert_owns(cursor);
        let core = self.core.borrow();
        let at = core.registry.pos(cursor.key());
        core.get_at(at, out);
    }

    /// Reads a `T` from the bytes at `cursor`.
    #[must_use]
    pub fn get_value<T: Pod>(&self, cursor: &Cursor<A>) -> T {
        let mut value = T::zeroed();
        self.get(cursor, bytemuck::bytes_of_mut(&mut value));
        value
    }

    /// Whether at least `size` bytes follow `cursor`.
    #[must_use]
    pub fn has(&self, cursor: &Cursor<A>, size: usize) -> bool {
        self.assert_owns(cursor);
        let core = self.core.borrow();
        let at = core.registry.pos(cursor.key());
        core.has_at(at, size)
    }

    /// Fills `vecs` with one descriptor per block covering `[start, end)`.
    /// Returns the number of descriptors written, capped at `vecs.len()`;
    /// call again with an advanced start to continue after a capped export.
    ///
    /// The slices borrow the buffer: they stay valid until the next call
    /// that takes the buffer by `&mut`.
    pub fn get_iov<'a>(&'a self, start: &Cursor<A>, end: &Cursor<A>, vecs: &mut [IoSlice<'a>]) -> usize {
        self.assert_owns(start);
        self.assert_owns(end);
        let core = self.core.borrow();
        let from = core.registry.pos(start.key());
        let to = core.registry.pos(end.key());
        core.fill_iov(from, to, vecs)
    }

    /// [`get_iov()`][Self::get_iov] from `start` to the buffer end.
    pub fn get_iov_to_end<'a>(&'a self, start: &Cursor<A>, vecs: &mut [IoSlice<'a>]) -> usize {
        self.assert_owns(start);
        let core = self.core.borrow();
        let from = core.registry.pos(start.key());
        let to = core.end_pos();
        core.fill_iov(from, to, vecs)
    }

    /// Drops bytes from the front up to the first live cursor, or drops
    /// everything when no cursor is registered. No-op when the first cursor
    /// already sits at the front.
    pub fn flush(&mut self) {
        self.core.borrow_mut().flush();
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let core = self.core.borrow();
        core.begin_pos() == core.end_pos()
    }

    /// The block stride `N` of the backing allocator.
    #[must_use]
    pub const fn block_size() -> usize {
        A::BLOCK_SIZE
    }

    /// Verifies internal invariants, returning 0 when healthy.
    ///
    /// Bits in the result: bit 0 - block ids are not contiguous; bit 1 - the
    /// id counter disagrees with the tail block; bit 2 - a cursor offset is
    /// past its block's data area; bit 3 - a cursor's block is not in the
    /// chain.
    #[must_use]
    pub fn debug_self_check(&self) -> u32 {
        self.core.borrow().self_check()
    }
}

impl<A: PoolAlloc> fmt::Debug for ChainBuf<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.borrow();
        let spans = core.span_lens();
        f.debug_struct("ChainBuf")
            .field("blocks", &spans.len())
            .field("span_lens", &spans)
            .field("cursors", &core.registry.len())
            .finish()
    }
}
