// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Default block size (the `N` parameter of [`Mempool`][crate::Mempool]), in bytes.
///
/// Chosen to comfortably fit a typical request/response message in a single block
/// while keeping per-block overhead negligible.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// How many cursor registrations we expect to track without spilling to the heap.
///
/// Callers typically hold a handful of cursors at a time (a read position, a
/// backpatch position, maybe a checkpoint), so the registry order vector is
/// inline-sized for that case.
pub(crate) const MAX_INLINE_CURSORS: usize = 4;

/// How many chunks a [`Mempool`][crate::Mempool] slab carries.
pub(crate) const SLAB_CHUNKS: usize = 16;
