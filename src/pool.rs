// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::constants::{DEFAULT_BLOCK_SIZE, SLAB_CHUNKS};
use crate::{Error, Result};

/// An exclusively owned memory chunk rented from a [`PoolAlloc`].
///
/// A chunk is `REAL_SIZE` bytes of uninitialized memory. It carries no
/// destructor: whoever holds a `Chunk` is responsible for returning it to
/// the pool it came from via [`PoolAlloc::deallocate`].
#[derive(Debug)]
pub struct Chunk {
    ptr: NonNull<u8>,
    len: usize,
}

impl Chunk {
    /// Describes an exclusively owned chunk of `len` readable+writable bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long
    /// as the chunk (or any pointer derived from it) is in use, and nothing
    /// else may access that memory in the meantime.
    #[must_use]
    pub const unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Base address of the chunk's memory.
    #[must_use]
    pub const fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Usable size of the chunk in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the chunk has zero usable bytes. Always false for chunks
    /// produced by a conforming [`PoolAlloc`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A fixed-size chunk allocator.
///
/// The buffer obtains all of its block storage through this trait. The
/// contract, which [`Mempool`] implements and which any custom allocator
/// must uphold:
///
/// * [`allocate()`][Self::allocate] returns a chunk of exactly
///   [`REAL_SIZE`][Self::REAL_SIZE] bytes whose end address, taken at the
///   [`BLOCK_SIZE`][Self::BLOCK_SIZE] stride, is a multiple of `BLOCK_SIZE`.
///   On failure it returns an error and commits nothing.
/// * [`deallocate()`][Self::deallocate] releases a chunk previously returned
///   by `allocate()` on the same pool. It must not fail.
/// * `REAL_SIZE` is at most `BLOCK_SIZE`, and `BLOCK_SIZE` is a power of two.
///
/// The alignment clause means a pointer into a chunk's interior can be
/// resolved to its chunk by rounding up to the next `BLOCK_SIZE` boundary.
/// The buffer itself does not rely on this, but higher layers doing O(1)
/// pointer-to-block lookups may.
pub trait PoolAlloc {
    /// The chunk stride `N`. Power of two.
    const BLOCK_SIZE: usize;

    /// Usable bytes per chunk. At most `BLOCK_SIZE`.
    const REAL_SIZE: usize;

    /// Rents one chunk from the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] when the underlying memory source is
    /// exhausted. Nothing is partially committed on failure.
    fn allocate(&mut self) -> Result<Chunk>;

    /// Returns a chunk to the pool. Infallible.
    fn deallocate(&mut self, chunk: Chunk);
}

/// The default pool: a free list of `N`-byte, `N`-aligned chunks carved out
/// of slabs obtained from the Rust global allocator.
///
/// Freed chunks are reused most-recently-freed first. Slabs are only
/// returned to the global allocator when the pool itself is dropped.
#[derive(Debug)]
pub struct Mempool<const N: usize = DEFAULT_BLOCK_SIZE> {
    free: Vec<NonNull<u8>>,
    slabs: Vec<NonNull<u8>>,
    outstanding: usize,
}

impl<const N: usize> Mempool<N> {
    /// Creates an empty pool. No memory is allocated until the first
    /// [`allocate()`][PoolAlloc::allocate] call.
    #[must_use]
    pub const fn new() -> Self {
        const {
            assert!(N.is_power_of_two(), "block size must be a power of two");
            assert!(N >= 32, "block size must leave room for useful payloads");
        }

        Self {
            free: Vec::new(),
            slabs: Vec::new(),
            outstanding: 0,
        }
    }

    /// Chunks currently rented out and not yet returned.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    fn slab_layout() -> Layout {
        // N is a power of two, so it is a valid alignment, and the total
        // size cannot overflow isize for any block size we accept.
        Layout::from_size_align(N.saturating_mul(SLAB_CHUNKS), N).expect("slab layout parameters are statically valid")
    }

    /// Obtains one more slab from the global allocator and carves it into
    /// free chunks.
    fn grow(&mut self) -> Result<()> {
        // Reserve free-list capacity for every chunk this pool will have
        // carved, so that deallocate() never has to allocate (it must not
        // fail).
        let total_chunks = (self.slabs.len() + 1) * SLAB_CHUNKS;
        self.free.reserve(total_chunks - self.free.len());

        let layout = Self::slab_layout();

        // SAFETY: The layout has non-zero size (N >= 32, SLAB_CHUNKS > 0).
        let base = unsafe { alloc::alloc(layout) };

        let Some(base) = NonNull::new(base) else {
            return Err(Error::OutOfMemory);
        };

        tracing::trace!(block_size = N, chunks = SLAB_CHUNKS, "mempool slab allocated");

        self.slabs.push(base);

        for index in 0..SLAB_CHUNKS {
            // SAFETY: index * N stays within the slab allocation of
            // N * SLAB_CHUNKS bytes.
            let chunk = unsafe { base.add(index * N) };
            self.free.push(chunk);
        }

        Ok(())
    }
}

impl<const N: usize> Default for Mempool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PoolAlloc for Mempool<N> {
    const BLOCK_SIZE: usize = N;
    const REAL_SIZE: usize = N;

    fn allocate(&mut self) -> Result<Chunk> {
        if self.free.is_empty() {
            self.grow()?;
        }

        let ptr = self.free.pop().expect("grow() pushed at least one free chunk");

        debug_assert_eq!((ptr.as_ptr() as usize + N) % N, 0, "chunk end must land on an N boundary");

        self.outstanding += 1;

        // SAFETY: The chunk comes from a live slab, is N bytes long, and was
        // on the free list, so nothing else references it.
        Ok(unsafe { Chunk::new(ptr, N) })
    }

    fn deallocate(&mut self, chunk: Chunk) {
        debug_assert_eq!(chunk.len(), N);
        debug_assert!(self.outstanding > 0, "deallocate without a matching allocate");

        self.outstanding -= 1;

        // Capacity was reserved in grow(), so this push cannot allocate.
        self.free.push(chunk.as_non_null());
    }
}

impl<const N: usize> Drop for Mempool<N> {
    fn drop(&mut self) {
        debug_assert_eq!(self.outstanding, 0, "pool dropped while chunks are still rented out");

        if !self.slabs.is_empty() {
            tracing::trace!(block_size = N, slabs = self.slabs.len(), "mempool released");
        }

        let layout = Self::slab_layout();

        for slab in self.slabs.drain(..) {
            // SAFETY: Each slab was obtained from alloc::alloc with this
            // exact layout and is freed exactly once.
            unsafe { alloc::dealloc(slab.as_ptr(), layout) };
        }
    }
}
