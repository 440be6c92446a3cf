// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::ptr;

use crate::pool::Chunk;

/// One buffer block: a pool chunk paired with its allocation-order id.
///
/// The id is assigned by the buffer's monotonic counter and is what gives
/// positions their total order. The entire chunk is data area; the block
/// header lives here, outside the chunk.
#[derive(Debug)]
pub(crate) struct Block {
    id: u64,
    chunk: Chunk,
}

impl Block {
    /// Wraps a freshly rented chunk.
    ///
    /// The data area is zero-filled so that every byte of every block is
    /// initialized memory, which keeps slice access to reserved-but-unwritten
    /// regions well defined.
    pub(crate) fn new(id: u64, chunk: Chunk) -> Self {
        // SAFETY: The chunk is exclusively owned and chunk.len() bytes long.
        unsafe { ptr::write_bytes(chunk.as_non_null().as_ptr(), 0, chunk.len()) };

        Self { id, chunk }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Base pointer of the data area. Used for the overlap-tolerant copies
    /// in insert/release and for the scatter/gather export.
    pub(crate) fn data_ptr(&self) -> *mut u8 {
        self.chunk.as_non_null().as_ptr()
    }

    pub(crate) fn data(&self) -> &[u8] {
        // SAFETY: The chunk is exclusively owned by this block, zero-filled
        // at construction, and chunk.len() bytes long.
        unsafe { std::slice::from_raw_parts(self.chunk.as_non_null().as_ptr(), self.chunk.len()) }
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        // SAFETY: As in data(), plus &mut self guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.chunk.as_non_null().as_ptr(), self.chunk.len()) }
    }

    /// Unwraps the block for returning its chunk to the pool.
    pub(crate) fn into_chunk(self) -> Chunk {
        self.chunk
    }
}

/// The ordered block list.
///
/// Ids are strictly increasing and contiguous from head to tail, which makes
/// id-to-block lookup a constant-time index computation. The buffer only
/// ever inserts or removes at the ends: appends splice at the tail,
/// `drop_front` pops at the head, `drop_back` pops at the tail.
#[derive(Debug, Default)]
pub(crate) struct Chain {
    blocks: VecDeque<Block>,
}

impl Chain {
    pub(crate) fn with_first(block: Block) -> Self {
        let mut blocks = VecDeque::new();
        blocks.push_back(block);
        Self { blocks }
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn head(&self) -> &Block {
        self.blocks.front().expect("chain is never empty")
    }

    pub(crate) fn tail(&self) -> &Block {
        self.blocks.back().expect("chain is never empty")
    }

    pub(crate) fn head_id(&self) -> u64 {
        self.head().id()
    }

    pub(crate) fn tail_mut(&mut self) -> &mut Block {
        self.blocks.back_mut().expect("chain is never empty")
    }

    pub(crate) fn tail_id(&self) -> u64 {
        self.tail().id()
    }

    /// Looks a block up by id. The id must be in `[head_id, tail_id]`.
    pub(crate) fn get(&self, id: u64) -> &Block {
        let index = id.checked_sub(self.head_id()).expect("block id below chain head");
        &self.blocks[usize::try_from(index).expect("chain length fits in usize")]
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> &mut Block {
        let index = id.checked_sub(self.head_id()).expect("block id below chain head");
        &mut self.blocks[usize::try_from(index).expect("chain length fits in usize")]
    }

    /// Splices a staged batch of blocks onto the tail.
    pub(crate) fn splice_back(&mut self, staged: Vec<Block>) {
        debug_assert!(staged
            .first()
            .is_none_or(|first| first.id() == self.tail_id() + 1));

        self.blocks.extend(staged);
    }

    pub(crate) fn pop_front(&mut self) -> Option<Block> {
        self.blocks.pop_front()
    }

    pub(crate) fn pop_back(&mut self) -> Option<Block> {
        self.blocks.pop_back()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Block> + '_ {
        self.blocks.drain(..)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }
}
