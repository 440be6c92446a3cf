// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Segmented I/O buffer for wire-protocol clients.
//!
//! A [`ChainBuf`] stores its bytes in a chain of fixed-size blocks rented
//! from a pool allocator. It is append-biased - marshalling a message means
//! appending fields at the tail - but it also supports the editing patterns
//! protocol code actually needs:
//!
//! * **Stable cursors.** A [`Cursor`] marks a position and stays valid while
//!   the buffer grows and while bytes are inserted or released ahead of it.
//!   Every live cursor is registered with its buffer, and mid-buffer edits
//!   reposition the registered cursors past the edit point.
//! * **Reserve now, write later.** [`ChainBuf::advance()`] reserves space
//!   for a length field or checksum whose value is only known once the rest
//!   of the message is marshalled; [`ChainBuf::set()`] backfills it through
//!   a cursor taken before the reservation.
//! * **Zero-copy export.** [`ChainBuf::get_iov()`] describes any range of
//!   the buffer as one [`std::io::IoSlice`] per block, ready for a vectored
//!   write, without copying a byte.
//!
//! # Producing and consuming
//!
//! ```
//! use std::io::IoSlice;
//!
//! use chainbuf::ChainBuf;
//!
//! # fn main() -> chainbuf::Result<()> {
//! let mut buf = ChainBuf::new()?;
//!
//! // Marshal a little message: tag, reserved length field, payload.
//! buf.add_back_str("PUT ")?;
//! let len_field = buf.end();
//! buf.advance(4)?;
//! buf.add_back(b"some payload")?;
//!
//! // Backfill the length now that it is known.
//! buf.set(&len_field, &12u32.to_be_bytes());
//!
//! // Export the whole buffer for a vectored write.
//! let start = buf.begin();
//! let end = buf.end();
//! let mut vecs = [IoSlice::new(&[]); 8];
//! let count = buf.get_iov(&start, &end, &mut vecs);
//! assert!(count >= 1);
//!
//! // Once the consumer is done with a prefix, drop it.
//! drop(start);
//! drop(end);
//! drop(len_field);
//! buf.drop_front(4);
//! # Ok(())
//! # }
//! ```
//!
//! # Memory model
//!
//! Blocks come from an allocator implementing [`PoolAlloc`]; the default is
//! [`Mempool`], a slab-backed free list. Chunk ends are aligned at the block
//! stride, so interior pointers can be resolved to their block by rounding
//! up - a property some transports use for O(1) lookups.
//!
//! Appends that need more than the tail block stage their new blocks off to
//! the side and splice them in only once every allocation has succeeded; a
//! failed allocation returns the staged blocks to the pool and leaves the
//! buffer untouched.
//!
//! # Concurrency
//!
//! The buffer is a single-owner structure: no operation blocks, suspends or
//! synchronizes, and neither [`ChainBuf`] nor [`Cursor`] is `Send` or
//! `Sync`. Cursors keep their buffer's storage alive, so dropping the
//! buffer before its cursors is safe.
//!
//! # Testing
//!
//! [`FailingAlloc`] wraps any allocator with an allocation budget, for
//! driving the failure paths deterministically. Small block sizes (e.g.
//! `Mempool<64>`) make block-boundary behavior easy to exercise.

mod block;
mod buf;
mod constants;
mod cursor;
mod error;
mod pool;
mod registry;
mod testing;

pub use buf::ChainBuf;
pub use constants::DEFAULT_BLOCK_SIZE;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use pool::{Chunk, Mempool, PoolAlloc};
pub use testing::FailingAlloc;
